use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Crates whose events follow `--log-level`. Everything else logs at warn.
const OWN_TARGETS: [&str; 5] = [
    "lightsweeper",
    "lightsweeper_serial",
    "lightsweeper_frame",
    "lightsweeper_tile",
    "lightsweeper_floor",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn targets(level: LogLevel) -> Targets {
    OWN_TARGETS.iter().fold(
        Targets::new().with_default(LevelFilter::WARN.min(level.as_filter())),
        |filter, target| filter.with_target(*target, level.as_filter()),
    )
}

/// Log to stderr so stdout stays clean for command output.
///
/// At trace the tile proxies log every frame they send. At debug and above
/// the emitting crate is shown so link chatter can be told apart from tile
/// and floor events.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(level >= LogLevel::Debug);
    let registry = tracing_subscriber::registry().with(targets(level));

    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}
