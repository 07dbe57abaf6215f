//! stacksmith - technology classification and data-store stack assembly
//!
//! Two halves share this crate:
//!
//! - [`classify`] walks a project directory, turns what it sees into
//!   evidence, scores candidate technologies with heuristics and optionally
//!   lets a reasoning service arbitrate. The result is a
//!   [`TechnologyProfile`].
//! - [`stack`] picks a data-store adapter from that profile (or an explicit
//!   kind), merges in cross-cutting services and returns a
//!   consistency-checked [`Topology`] that [`output`] renders as a manifest,
//!   a compose file and an env file.
//!
//! # Example
//!
//! ```no_run
//! use stacksmith::classify::{Classifier, ScanConfig};
//! use stacksmith::stack::{AdapterRegistry, AssemblyOptions, StackAssembler};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let classification = Classifier::new(ScanConfig::default(), 0.5)
//!     .classify(Path::new("."))
//!     .await?;
//!
//! let assembler = StackAssembler::new(Arc::new(AdapterRegistry::with_defaults()));
//! let topology = assembler.assemble(Some(&classification.profile), &AssemblyOptions::default())?;
//! println!("{}", stacksmith::output::render_compose(&topology)?);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod heuristics;
pub mod llm;
pub mod output;
pub mod stack;
pub mod util;

pub use classify::{Classification, Classifier, ClassifyError, TechnologyProfile};
pub use config::{ConfigError, StacksmithConfig};
pub use llm::{BackendError, LLMClient};
pub use stack::{AdapterRegistry, AssemblyError, AssemblyOptions, StackAssembler, Topology};
pub use util::{init_default, init_from_env, init_logging, LogFormat, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_stacksmith() {
        assert_eq!(NAME, "stacksmith");
    }
}
