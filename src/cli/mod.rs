pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AdaptersArgs, AssembleArgs, CliArgs, ClassifyArgs, Commands};
pub use output::{AdapterSummary, OutputFormat, OutputFormatter};
