use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive, overriding `--log-level`.
pub const LOG_ENV: &str = "GOSOLIS_LOG";

/// Crates whose events follow `--log-level`; anything else logs warnings only.
const DRIVER_TARGETS: [&str; 5] = [
    "gosolis",
    "gosolis_transport",
    "gosolis_frame",
    "gosolis_bus",
    "gosolis_device",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Default directive: `level` for the driver crates, warnings for the rest.
///
/// At `trace` the receive thread logs every byte off the wire.
pub fn default_directive(level: LogLevel) -> String {
    let level = level.as_str();
    let mut directive = String::from("warn");
    for target in DRIVER_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the stderr subscriber. Stdout is reserved for command output and
/// daemon reports.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(level))
        .with_ansi(false)
        .with_target(matches!(level, LogLevel::Debug | LogLevel::Trace));

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
