use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point2;
use quadwarp::core::{
    order_corners, rectify_quad, slice_grid, GridSpec, Image, Interpolation, OutputSize, Quad,
    WarpParams,
};
use quadwarp::export::{encode_image, write_tiles_zip, ArchiveOptions, ExportFormat};

/// RGBA test card with a checker texture so sampling does real work.
fn test_card(w: usize, h: usize) -> Image {
    let mut data = Vec::with_capacity(w * h * 4);
    for y in 0..h {
        for x in 0..w {
            let v = if ((x / 16) + (y / 16)) % 2 == 0 { 230 } else { 40 };
            data.extend_from_slice(&[v, (x % 256) as u8, (y % 256) as u8, 255]);
        }
    }
    Image::from_raw(w, h, 4, data).expect("test card")
}

fn photo_quad() -> Quad {
    Quad::from_array([
        Point2::new(210.0, 95.0),
        Point2::new(1130.0, 160.0),
        Point2::new(1060.0, 860.0),
        Point2::new(150.0, 780.0),
    ])
}

fn bench_order(c: &mut Criterion) {
    let pts = [
        Point2::new(1060.0, 860.0),
        Point2::new(210.0, 95.0),
        Point2::new(150.0, 780.0),
        Point2::new(1130.0, 160.0),
    ];
    c.bench_function("order_corners", |b| {
        b.iter(|| order_corners(black_box(pts)))
    });
}

fn bench_rectify(c: &mut Criterion) {
    let src = test_card(1280, 960);
    let quad = photo_quad();

    let mut group = c.benchmark_group("rectify_quad");
    for side in [250u32, 500, 1000] {
        for (name, interpolation) in [
            ("bilinear", Interpolation::Bilinear),
            ("nearest", Interpolation::Nearest),
        ] {
            let params = WarpParams {
                output_size: OutputSize::Square(side),
                interpolation,
                ..WarpParams::default()
            };
            group.bench_with_input(BenchmarkId::new(name, side), &params, |b, params| {
                b.iter(|| rectify_quad(&src.view(), black_box(&quad), params).expect("rectify"))
            });
        }
    }
    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let rect = rectify_quad(&test_card(1280, 960).view(), &photo_quad(), &WarpParams::default())
        .expect("rectify")
        .image;

    c.bench_function("encode_png_500", |b| {
        b.iter(|| encode_image(black_box(&rect), ExportFormat::Png).expect("encode"))
    });
    c.bench_function("encode_jpeg_500", |b| {
        b.iter(|| encode_image(black_box(&rect), ExportFormat::jpeg()).expect("encode"))
    });

    let tiles = slice_grid(&rect, GridSpec::new(3, 3)).expect("slice");
    let opts = ArchiveOptions::default();
    c.bench_function("zip_3x3_png", |b| {
        b.iter(|| {
            let mut buf = std::io::Cursor::new(Vec::new());
            write_tiles_zip(&mut buf, black_box(&tiles), None, &opts).expect("zip");
            buf.into_inner().len()
        })
    });
}

criterion_group!(benches, bench_order, bench_rectify, bench_export);
criterion_main!(benches);
