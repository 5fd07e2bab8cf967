use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use quadwarp::core::{order_corners_strict, GridSpec, Interpolation, OutputSize};
use quadwarp::export::{ArchiveOptions, ExportFormat};
use quadwarp::io::WarpConfig;
use quadwarp::load::{load_image_path, LoadOptions, DEFAULT_MAX_INPUT_BYTES};
use quadwarp::pipeline::{export_grid, run_warp};

#[derive(Parser, Debug)]
#[command(
    name = "quadwarp",
    version,
    about = "Rectify a photographed document or whiteboard from four corner points"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Warp the region bounded by four corners into a rectangle.
    Warp(WarpArgs),
    /// Cut an already rectified image into a grid and zip the tiles.
    Grid(GridArgs),
    /// Print the TL/TR/BR/BL ordering of four points as JSON.
    Order {
        /// Four points as X,Y in any order.
        #[arg(long, num_args = 4, value_parser = parse_point, required = true, allow_hyphen_values = true)]
        corners: Vec<[f32; 2]>,
    },
}

#[derive(Args, Debug)]
struct WarpArgs {
    /// Input PNG or JPEG. Optional when --config names one.
    input: Option<String>,

    /// JSON config; command-line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Four corner points as X,Y in any order.
    #[arg(long, num_args = 4, value_parser = parse_point, allow_hyphen_values = true)]
    corners: Option<Vec<[f32; 2]>>,

    /// Size WxH of the display the corners were picked on.
    #[arg(long, value_parser = parse_size)]
    display: Option<[f32; 2]>,

    /// Rectified image path (default: warpedPerspective.png).
    #[arg(short, long)]
    output: Option<String>,

    /// Square output side in pixels.
    #[arg(long, conflicts_with_all = ["width", "auto_size"])]
    size: Option<u32>,

    #[arg(long, requires = "height", conflicts_with = "auto_size")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Follow the quad's aspect ratio with this many pixels on the long side.
    #[arg(long)]
    auto_size: Option<u32>,

    /// Nearest-neighbour sampling instead of bilinear.
    #[arg(long)]
    nearest: bool,

    /// Slice the result into ROWSxCOLS tiles.
    #[arg(long)]
    grid: Option<GridSpec>,

    /// Zip archive for the tiles (default: output path with .zip).
    #[arg(long)]
    zip: Option<String>,

    /// Tile name prefix inside the archive.
    #[arg(long)]
    prefix: Option<String>,

    /// Also store the full rectified image in the archive.
    #[arg(long)]
    archive_full: bool,

    #[command(flatten)]
    encode: EncodeArgs,

    /// Write a JSON run report here.
    #[arg(long)]
    report: Option<String>,

    /// Reject inputs larger than this many bytes.
    #[arg(long)]
    max_bytes: Option<u64>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Output encoding (png or jpeg); inferred from the output extension otherwise.
    #[arg(long)]
    format: Option<ExportFormat>,

    /// JPEG quality 1-100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
}

impl EncodeArgs {
    fn resolve(&self) -> Option<ExportFormat> {
        match (self.format, self.quality) {
            (Some(ExportFormat::Jpeg { .. }), Some(quality)) | (None, Some(quality)) => {
                Some(ExportFormat::Jpeg { quality })
            }
            (format, _) => format,
        }
    }
}

#[derive(Args, Debug)]
struct GridArgs {
    /// Rectified PNG or JPEG.
    input: PathBuf,

    #[arg(long)]
    grid: GridSpec,

    #[arg(long)]
    zip: PathBuf,

    #[arg(long, default_value = "tile")]
    prefix: String,

    #[arg(long)]
    archive_full: bool,

    #[command(flatten)]
    encode: EncodeArgs,

    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_BYTES)]
    max_bytes: u64,
}

fn parse_point(s: &str) -> Result<[f32; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad x in '{s}': {e}"))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("bad y in '{s}': {e}"))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(format!("coordinates in '{s}' must be finite"));
    }
    Ok([x, y])
}

fn parse_size(s: &str) -> Result<[f32; 2], String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH but got '{s}'"))?;
    let w: f32 = w.trim().parse().map_err(|e| format!("bad width in '{s}': {e}"))?;
    let h: f32 = h.trim().parse().map_err(|e| format!("bad height in '{s}': {e}"))?;
    Ok([w, h])
}

fn init_logging(cli: &Cli) {
    let level = quadwarp::core::level_from_verbosity(cli.verbose);

    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        quadwarp::core::init_tracing(cli.json_logs, &quadwarp::core::filter_directive(level));
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = quadwarp::core::init_with_level(level);
    }
}

fn build_config(args: WarpArgs) -> Result<WarpConfig, Box<dyn Error>> {
    let mut cfg = match (&args.config, &args.input) {
        (Some(path), _) => WarpConfig::load_json(path)?,
        (None, Some(input)) => WarpConfig::new(input.clone()),
        (None, None) => return Err("an input image or --config is required".into()),
    };

    if let Some(input) = args.input {
        cfg.image_path = input;
    }
    if let Some(corners) = args.corners {
        cfg.corners = Some([corners[0], corners[1], corners[2], corners[3]]);
    }
    if args.display.is_some() {
        cfg.display = args.display;
    }
    if args.output.is_some() {
        cfg.output_path = args.output;
    }
    if let Some(side) = args.size {
        cfg.output_size = OutputSize::Square(side);
    }
    if let (Some(width), Some(height)) = (args.width, args.height) {
        cfg.output_size = OutputSize::Fixed { width, height };
    }
    if let Some(max_side) = args.auto_size {
        cfg.output_size = OutputSize::FromQuad { max_side };
    }
    if args.nearest {
        cfg.interpolation = Interpolation::Nearest;
    }
    if args.grid.is_some() {
        cfg.grid = args.grid;
    }
    if args.zip.is_some() {
        cfg.archive_path = args.zip;
    }
    if let Some(prefix) = args.prefix {
        cfg.tile_prefix = prefix;
    }
    if args.archive_full {
        cfg.archive_full = true;
    }
    if let Some(format) = args.encode.resolve() {
        cfg.export_format = Some(format);
    }
    if args.report.is_some() {
        cfg.report_path = args.report;
    }
    if let Some(max) = args.max_bytes {
        cfg.max_input_bytes = max;
    }
    Ok(cfg)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Warp(args) => {
            let cfg = build_config(args)?;
            let outcome = run_warp(&cfg)?;
            if let Some(rect) = &outcome.report.rectified {
                println!("wrote {} ({}x{})", rect.path, rect.width, rect.height);
            }
            if let Some(archive) = &outcome.report.archive {
                println!(
                    "wrote {} ({} tiles, {} grid)",
                    archive.path,
                    outcome.tiles.len(),
                    archive.grid
                );
            }
        }
        Command::Grid(args) => {
            let loaded = load_image_path(
                &args.input,
                &LoadOptions {
                    max_bytes: args.max_bytes,
                },
            )?;
            let format = args
                .encode
                .resolve()
                .or_else(|| ExportFormat::from_path(&args.input))
                .unwrap_or_default();
            let opts = ArchiveOptions {
                prefix: args.prefix,
                format,
                include_full: args.archive_full,
            };
            let (tiles, _) = export_grid(&loaded.image, args.grid, &args.zip, &opts)?;
            println!(
                "wrote {} ({} tiles, {} grid)",
                args.zip.display(),
                tiles.len(),
                args.grid
            );
        }
        Command::Order { corners } => {
            let quad = order_corners_strict([corners[0], corners[1], corners[2], corners[3]].map(
                |[x, y]| nalgebra::Point2::new(x, y),
            ))?;
            println!("{}", serde_json::to_string_pretty(&quad)?);
        }
    }
    Ok(())
}
