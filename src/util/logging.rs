//! Structured logging setup
//!
//! Logs are written to stderr through `tracing-subscriber`, either as
//! human-readable lines or as one JSON object per event. `RUST_LOG` directives
//! are honoured on top of the configured level.
//!
//! ```no_run
//! use stacksmith::util::logging::{init_logging, LoggingConfig};
//! use tracing::Level;
//!
//! init_logging(LoggingConfig::with_level(Level::DEBUG));
//! tracing::info!(kind = "postgresql", "Resolved data-store adapter");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_LEVEL_ENV: &str = "STACKSMITH_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "STACKSMITH_LOG_JSON";

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event, with file and line.
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Include the emitting module, e.g. `stacksmith::stack::assembler`
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Reads `STACKSMITH_LOG_LEVEL` and `STACKSMITH_LOG_JSON`.
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|v| parse_level(&v))
            .unwrap_or(Level::INFO);
        let format = match env::var(LOG_JSON_ENV).ok().and_then(|v| v.parse::<bool>().ok()) {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            level,
            format,
            ..Default::default()
        }
    }
}

/// Case-insensitive level name.
///
/// ```
/// use stacksmith::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Debug"), Some(Level::DEBUG));
/// assert_eq!(parse_level("loud"), None);
/// ```
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();

    if let Ok(directive) = format!("stacksmith={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // genai's HTTP stack is chatty at debug
    if env::var("RUST_LOG").is_err() {
        for noisy in ["h2=warn", "hyper=warn", "hyper_util=warn", "reqwest=warn"] {
            if let Ok(directive) = noisy.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Installs the global subscriber. Only the first call has any effect.
///
/// Everything goes to stderr; stdout carries rendered profiles and manifests.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let registry = tracing_subscriber::registry().with(filter);

        match config.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .init(),
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}
