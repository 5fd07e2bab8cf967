//! End-to-end tests of the `quadwarp` binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn quadwarp_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quadwarp"))
}

/// 400x300 gray frame with a white "page" spanning (40,30)-(360,270).
fn write_page(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("page.png");
    let img = image::RgbImage::from_fn(400, 300, |x, y| {
        if (40..360).contains(&x) && (30..270).contains(&y) {
            image::Rgb([250, 250, 250])
        } else {
            image::Rgb([60, 60, 60])
        }
    });
    img.save(&path).unwrap();
    path
}

fn zip_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn help_lists_subcommands() {
    quadwarp_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("warp"))
        .stdout(predicate::str::contains("grid"))
        .stdout(predicate::str::contains("order"));
}

#[test]
fn warp_writes_image_archive_and_report() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);
    let out = dir.path().join("out/rect.png");
    let report = dir.path().join("report.json");

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "360,270", "40,30", "40,270", "360,30"])
        .arg("-o")
        .arg(&out)
        .args(["--size", "120", "--grid", "2x3"])
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("(120x120)"))
        .stdout(predicate::str::contains("6 tiles, 2x3 grid"));

    let rect = image::open(&out).unwrap().to_rgba8();
    assert_eq!(rect.dimensions(), (120, 120));
    assert_eq!(rect.get_pixel(60, 60).0, [250, 250, 250, 255]);

    let entries = zip_entries(&out.with_extension("zip"));
    assert_eq!(entries.len(), 6);
    assert!(entries.contains(&"tile_r0_c0.png".to_string()));
    assert!(entries.contains(&"tile_r1_c2.png".to_string()));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["input_format"], "png");
    assert_eq!(json["quad"]["top_left"], serde_json::json!([40.0, 30.0]));
    assert!(json["error"].is_null());
}

#[test]
fn warp_encodes_jpeg_from_extension() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);
    let out = dir.path().join("rect.jpg");

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "40,30", "360,30", "360,270", "40,270"])
        .arg("--output")
        .arg(&out)
        .args(["--width", "160", "--height", "120", "--quality", "90"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(160x120)"));

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
}

#[test]
fn warp_without_corners_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("four corner points are required"));
}

#[test]
fn warp_rejects_heic_with_hint() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("photo.heic");
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypheic");
    bytes.extend_from_slice(&[0; 4]);
    bytes.extend_from_slice(b"mif1heic");
    bytes.extend_from_slice(&[0; 32]);
    std::fs::write(&input, bytes).unwrap();

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "0,0", "10,0", "10,10", "0,10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HEIC/HEIF input is not supported"));
}

#[test]
fn warp_rejects_oversized_input() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "40,30", "360,30", "360,270", "40,270"])
        .args(["--max-bytes", "16"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("byte limit"));
}

#[test]
fn warp_rejects_non_finite_corner() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "NaN,10", "360,30", "360,270", "40,270"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be finite"));
}

#[test]
fn warp_rejects_huge_output_size() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);
    let out = dir.path().join("rect.png");

    quadwarp_cmd()
        .arg("warp")
        .arg(&input)
        .args(["--corners", "40,30", "360,30", "360,270", "40,270"])
        .args(["--size", "4294967295"])
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid output size"));
    assert!(!out.exists());
}

#[test]
fn grid_rejects_prefix_outside_archive_root() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);
    let zip = dir.path().join("tiles.zip");

    for prefix in ["../escape", "sub/tile", "a\\b"] {
        quadwarp_cmd()
            .arg("grid")
            .arg(&input)
            .args(["--grid", "2x2", "--prefix", prefix])
            .arg("--zip")
            .arg(&zip)
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid tile prefix"));
    }
    assert!(!zip.exists());
}

#[test]
fn grid_slices_existing_image() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);
    let zip = dir.path().join("tiles.zip");

    quadwarp_cmd()
        .arg("grid")
        .arg(&input)
        .args(["--grid", "2x2", "--prefix", "part", "--archive-full"])
        .arg("--zip")
        .arg(&zip)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 tiles, 2x2 grid"));

    assert_eq!(
        zip_entries(&zip),
        vec![
            "part.png",
            "part_r0_c0.png",
            "part_r0_c1.png",
            "part_r1_c0.png",
            "part_r1_c1.png"
        ]
    );
}

#[test]
fn grid_rejects_bad_spec() {
    let dir = TempDir::new().unwrap();
    let input = write_page(&dir);

    quadwarp_cmd()
        .arg("grid")
        .arg(&input)
        .args(["--grid", "three", "--zip", "t.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ROWSxCOLS"));
}

#[test]
fn order_prints_corners_as_json() {
    let output = quadwarp_cmd()
        .args(["order", "--corners", "300,200", "0,0", "300,0", "0,200"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["top_left"], serde_json::json!([0.0, 0.0]));
    assert_eq!(json["top_right"], serde_json::json!([300.0, 0.0]));
    assert_eq!(json["bottom_right"], serde_json::json!([300.0, 200.0]));
    assert_eq!(json["bottom_left"], serde_json::json!([0.0, 200.0]));
}
