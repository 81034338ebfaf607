//! Tracing/logging initialization.
//!
//! Configured from the environment:
//! - `RUST_LOG`: standard `EnvFilter` directives (default `info`).
//! - `STOCKROOM_LOG_FORMAT`: `json` (default), `pretty` or `compact`.

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "STOCKROOM_LOG_FORMAT";

/// Output format of the fmt subscriber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Parse the value of [`LOG_FORMAT_ENV`]. Unknown values fall back to JSON.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("pretty") => LogFormat::Pretty,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env());
}

/// Initialize tracing/logging with an explicit format, still honouring `RUST_LOG`.
pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let result = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    if result.is_err() {
        ::tracing::trace!("tracing subscriber already installed");
    }
}
