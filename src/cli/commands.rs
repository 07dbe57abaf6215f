use crate::stack::{DataStoreKind, FeatureSet, Scale, Tier};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Technology classification and data-store stack assembly
#[derive(Parser, Debug)]
#[command(
    name = "stacksmith",
    about = "Classify a project's technologies and assemble a data-store stack for it",
    version,
    author,
    long_about = "stacksmith inspects a project directory, classifies its languages, frameworks \
                  and data stores, and assembles a consistency-checked service topology around \
                  the primary data store (postgresql, mongodb, mysql, clickhouse, redis, \
                  elasticsearch). An optional reasoning provider arbitrates close calls."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        conflicts_with = "quiet",
        help = "Enable debug logging"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long, global = true, help = "Only log errors")]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "YAML or JSON configuration file"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the technologies used by a project
    Classify(ClassifyArgs),

    /// Classify a project and assemble its service topology
    Assemble(AssembleArgs),

    /// List registered data-store adapters
    Adapters(AdaptersArgs),
}

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    #[arg(value_name = "PATH", default_value = ".", help = "Project directory")]
    pub path: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: ProfileFormatArg,

    #[arg(long, help = "Skip arbitration even when a provider is configured")]
    pub no_llm: bool,
}

#[derive(Parser, Debug)]
pub struct AssembleArgs {
    #[arg(value_name = "PATH", default_value = ".", help = "Project directory")]
    pub path: PathBuf,

    #[arg(
        short = 'k',
        long,
        value_name = "KIND",
        value_parser = parse_kind,
        help = "Primary data-store kind (skips profile-based selection)"
    )]
    pub kind: Option<DataStoreKind>,

    #[arg(
        long,
        value_name = "LIST",
        value_parser = FeatureSet::parse,
        help = "Comma-separated features: cache, search, monitoring, ci"
    )]
    pub features: Option<FeatureSet>,

    #[arg(long, value_enum, help = "Environment tier")]
    pub tier: Option<Tier>,

    #[arg(long, value_enum, help = "Resource scale")]
    pub scale: Option<Scale>,

    #[arg(long, value_name = "NAME", help = "Project name used for the compose project and generic images")]
    pub name: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "compose",
        help = "Output format"
    )]
    pub format: ManifestFormatArg,

    #[arg(long, value_name = "FILE", help = "Write generated secrets to this env file")]
    pub env_file: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the manifest to this file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Skip arbitration even when a provider is configured")]
    pub no_llm: bool,
}

#[derive(Parser, Debug)]
pub struct AdaptersArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: ProfileFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormatArg {
    Json,
    Yaml,
    Human,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormatArg {
    Compose,
    Json,
    Human,
}

fn parse_kind(s: &str) -> Result<DataStoreKind, String> {
    if s.trim().is_empty() {
        return Err("data-store kind cannot be empty".to_string());
    }
    Ok(DataStoreKind::parse(s))
}
