//! Command handlers. Each returns the process exit code.
//!
//! - `0`: success
//! - `1`: typed failure, violations listed on stderr
//! - `2`: the requested data-store kind has no adapter

use super::commands::{AdaptersArgs, AssembleArgs, ClassifyArgs};
use super::output::{AdapterSummary, OutputFormat, OutputFormatter};
use crate::classify::Classification;
use crate::config::StacksmithConfig;
use crate::output::render_env_file;
use crate::stack::{AdapterRegistry, AssemblyError, AssemblyOptions, Topology};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_KIND_NOT_FOUND: i32 = 2;

pub async fn handle_classify(args: &ClassifyArgs, config: &StacksmithConfig) -> i32 {
    match run_classify(args, config).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => report_error(&e),
    }
}

pub async fn handle_assemble(args: &AssembleArgs, config: &StacksmithConfig) -> i32 {
    match run_assemble(args, config).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => report_error(&e),
    }
}

pub fn handle_adapters(args: &AdaptersArgs) -> i32 {
    let registry = AdapterRegistry::with_defaults();
    let summaries = AdapterSummary::list(&registry);
    match OutputFormatter::new(args.format.into()).format_adapters(&summaries) {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

async fn classify(path: &Path, no_llm: bool, config: &StacksmithConfig) -> Result<Classification> {
    let start = Instant::now();
    let classifier = config.classifier(no_llm);
    info!(
        path = %path.display(),
        arbitration = classifier.has_arbiter(),
        "Classifying project"
    );

    let classification = classifier
        .classify(path)
        .await
        .with_context(|| format!("Failed to classify {}", path.display()))?;

    for warning in &classification.warnings {
        warn!(%warning, "Classification warning");
    }
    debug!(
        entries = classification.profile.entries.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Classification finished"
    );
    Ok(classification)
}

async fn run_classify(args: &ClassifyArgs, config: &StacksmithConfig) -> Result<()> {
    let classification = classify(&args.path, args.no_llm, config).await?;
    let output = OutputFormatter::new(args.format.into()).format_classification(&classification)?;
    println!("{}", output);
    Ok(())
}

async fn run_assemble(args: &AssembleArgs, config: &StacksmithConfig) -> Result<()> {
    let classification = classify(&args.path, args.no_llm, config).await?;
    let options = assembly_options(args, config);

    let registry = Arc::new(AdapterRegistry::with_defaults());
    let topology = config
        .assembler(registry)
        .assemble(Some(&classification.profile), &options)?;

    let format: OutputFormat = args.format.into();
    let output = OutputFormatter::new(format).format_topology(&topology, Some(&classification.profile))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
            info!(path = %path.display(), "Wrote manifest");
        }
        None => println!("{}", output),
    }

    match &args.env_file {
        Some(path) => write_env_file(path, &topology)?,
        None if !topology.secrets().is_empty() => {
            info!("Generated secrets were not saved; pass --env-file to keep them");
        }
        None => {}
    }

    Ok(())
}

fn assembly_options(args: &AssembleArgs, config: &StacksmithConfig) -> AssemblyOptions {
    let mut options = config.assembly_options();
    options.kind_override = args.kind.clone();
    if let Some(features) = &args.features {
        options.features = features.clone();
    }
    if let Some(tier) = args.tier {
        options.tier = tier;
    }
    if let Some(scale) = args.scale {
        options.scale = scale;
    }
    options.project_name = args
        .name
        .clone()
        .or_else(|| project_name_from_path(&args.path))
        .unwrap_or_else(|| options.project_name.clone());
    options
}

/// Lowercased directory name with anything outside `[a-z0-9_-]` replaced.
fn project_name_from_path(path: &Path) -> Option<String> {
    let canonical = path.canonicalize().ok()?;
    let name = canonical.file_name()?.to_str()?;
    let sanitized: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    let sanitized = sanitized.trim_matches('-').to_string();
    (!sanitized.is_empty()).then_some(sanitized)
}

fn write_env_file(path: &Path, topology: &Topology) -> Result<()> {
    std::fs::write(path, render_env_file(topology))
        .with_context(|| format!("Failed to write env file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
    }

    info!(
        path = %path.display(),
        secrets = topology.secrets().len(),
        "Wrote env file"
    );
    Ok(())
}

/// Prints the failure and picks the exit code.
fn report_error(err: &anyhow::Error) -> i32 {
    error!(error = %err, "Command failed");

    match err.downcast_ref::<AssemblyError>() {
        Some(assembly) if assembly.is_kind_not_found() => {
            eprintln!("Error: {}", assembly);
            EXIT_KIND_NOT_FOUND
        }
        Some(AssemblyError::Topology(topology)) => {
            eprintln!("Error: topology is inconsistent");
            for violation in &topology.violations {
                eprintln!("  - {}", violation);
            }
            EXIT_FAILURE
        }
        Some(AssemblyError::Validation(validation)) => {
            eprintln!("Error: invalid {} configuration", validation.kind);
            for violation in &validation.violations {
                eprintln!("  - {}", violation);
            }
            EXIT_FAILURE
        }
        _ => {
            eprintln!("Error: {:#}", err);
            EXIT_FAILURE
        }
    }
}
