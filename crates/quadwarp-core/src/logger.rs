//! Stderr logging for the CLI and examples.
//!
//! Records from the `quadwarp*` crates follow the requested level; records
//! from dependencies (`image`, `zip`, ...) are capped at `warn` so `-vv`
//! stays readable. Warnings and errors print as `quadwarp: warning: ...`,
//! chattier levels carry the elapsed time and the emitting module.
//!
//! With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` driven by the same per-crate split, see
//! [`filter_directive`].

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

const OWN_TARGET: &str = "quadwarp";
const DEPENDENCY_CAP: LevelFilter = LevelFilter::Warn;

/// Map a `-v` count onto a level: 0 → warn, 1 → info, 2 → debug, 3+ → trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn is_own_target(target: &str) -> bool {
    target.starts_with(OWN_TARGET)
}

/// Level in effect for records emitted under `target`.
fn level_for(target: &str, level: LevelFilter) -> LevelFilter {
    if is_own_target(target) {
        level
    } else {
        level.min(DEPENDENCY_CAP)
    }
}

/// `EnvFilter` directive equivalent to the stderr logger's filtering,
/// e.g. `warn,quadwarp=debug,quadwarp_core=debug`.
pub fn filter_directive(level: LevelFilter) -> String {
    let own = level.to_string().to_lowercase();
    let deps = level.min(DEPENDENCY_CAP).to_string().to_lowercase();
    format!("{deps},quadwarp={own},quadwarp_core={own}")
}

/// Last path segment of a module target: `quadwarp_core::warp` → `warp`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn format_line(
    level: Level,
    target: &str,
    elapsed_ms: u128,
    args: &fmt::Arguments<'_>,
) -> String {
    match level {
        Level::Error => format!("{OWN_TARGET}: error: {args}"),
        Level::Warn => format!("{OWN_TARGET}: warning: {args}"),
        _ => format!(
            "{elapsed_ms:>6}ms {:<5} {}: {args}",
            level.as_str().to_lowercase(),
            short_target(target)
        ),
    }
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            record.level(),
            record.target(),
            self.started.elapsed().as_millis(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call takes effect.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber on stderr. `RUST_LOG` overrides
/// `default_directive`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
