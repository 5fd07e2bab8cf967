//! Rectify an image described by a JSON `WarpConfig`, stage by stage.
//!
//! ```text
//! cargo run -p quadwarp --example rectify_config -- tmpdata/warp_config.json
//! ```

use std::{env, path::PathBuf, time::Instant};

use quadwarp::export::{save_image, ArchiveOptions};
use quadwarp::io::{ArchiveInfo, RectifiedInfo, WarpConfig, WarpReport};
use quadwarp::load::load_image_path;
use quadwarp::pipeline::{export_grid, rectify_loaded};
#[cfg(feature = "tracing")]
use tracing::{info, info_span};
#[cfg(feature = "tracing")]
use tracing_log::LogTracer;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tmpdata/warp_config.json"));
    let cfg = WarpConfig::load_json(&config_path)?;
    let mut report = WarpReport::new(&cfg);

    let t_total = Instant::now();

    let loaded = {
        let span = make_span("load");
        let _g = span.enter();
        let t0 = Instant::now();
        let loaded = load_image_path(&cfg.image_path, &cfg.load_options())?;
        report.timings_ms.load = t0.elapsed().as_millis() as u64;
        report.input_format = Some(loaded.format);
        report.input_size = Some([loaded.width(), loaded.height()]);
        loaded
    };

    let rectified = {
        let span = make_span("rectify");
        let _g = span.enter();
        let t0 = Instant::now();
        let rectified = rectify_loaded(&loaded, &cfg, &mut report)?;
        report.timings_ms.rectify = t0.elapsed().as_millis() as u64;
        #[cfg(feature = "tracing")]
        info!(
            duration_ms = report.timings_ms.rectify,
            width = rectified.image.width,
            height = rectified.image.height,
            "rectified quad"
        );
        #[cfg(not(feature = "tracing"))]
        log::info!(
            "rectified quad duration_ms={} size={}x{}",
            report.timings_ms.rectify,
            rectified.image.width,
            rectified.image.height
        );
        rectified
    };

    let out_path = cfg.output_path();
    let format = cfg.export_format();
    let t_save = Instant::now();
    save_image(&rectified.image, &out_path, format)?;
    report.timings_ms.save = t_save.elapsed().as_millis() as u64;
    report.rectified = Some(RectifiedInfo {
        path: out_path.to_string_lossy().into_owned(),
        width: rectified.image.width,
        height: rectified.image.height,
        format,
        h_img_from_rect: rectified.h_img_from_rect,
    });

    if let (Some(grid), Some(zip_path)) = (cfg.grid, cfg.archive_path()) {
        let span = make_span("archive");
        let _g = span.enter();
        let t0 = Instant::now();
        let opts = ArchiveOptions {
            prefix: cfg.tile_prefix.clone(),
            format,
            include_full: cfg.archive_full,
        };
        let (tiles, entries) = export_grid(&rectified.image, grid, &zip_path, &opts)?;
        report.timings_ms.archive = Some(t0.elapsed().as_millis() as u64);
        log::info!("archived {} tiles into {}", tiles.len(), zip_path.display());
        report.archive = Some(ArchiveInfo {
            path: zip_path.to_string_lossy().into_owned(),
            grid,
            entries,
        });
    }

    report.timings_ms.total = t_total.elapsed().as_millis() as u64;

    match cfg.report_path.as_ref() {
        Some(path) => {
            report.write_json(path)?;
            println!("wrote report to {path}");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn init_tracing() {
    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = quadwarp::core::init_with_level(log::LevelFilter::Info);
    }
}

#[cfg(feature = "tracing")]
fn make_span(stage: &'static str) -> tracing::Span {
    info_span!("stage", name = stage)
}

#[cfg(not(feature = "tracing"))]
fn make_span(_stage: &'static str) -> NoopSpan {
    NoopSpan
}

#[cfg(not(feature = "tracing"))]
struct NoopSpan;
#[cfg(not(feature = "tracing"))]
struct NoopGuard;
#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    fn enter(&self) -> NoopGuard {
        NoopGuard
    }
}
