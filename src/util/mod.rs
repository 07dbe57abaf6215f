//! Utility modules for stacksmith

pub mod logging;

pub use logging::{init_default, init_from_env, init_logging, LogFormat, LoggingConfig};
