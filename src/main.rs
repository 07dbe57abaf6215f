use stacksmith::cli::commands::{CliArgs, Commands};
use stacksmith::cli::handlers::{handle_adapters, handle_assemble, handle_classify, EXIT_FAILURE};
use stacksmith::util::logging::{init_logging, parse_level, LoggingConfig};
use stacksmith::{StacksmithConfig, VERSION};

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Loaded before logging so the file's log_level applies
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };
    init_logging_from_args(&args, &config);

    debug!("stacksmith v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Classify(classify_args) => handle_classify(classify_args, &config).await,
        Commands::Assemble(assemble_args) => handle_assemble(assemble_args, &config).await,
        Commands::Adapters(adapters_args) => handle_adapters(adapters_args),
    };

    std::process::exit(exit_code);
}

fn load_config(args: &CliArgs) -> Result<StacksmithConfig, stacksmith::ConfigError> {
    let config = StacksmithConfig::load(args.config.as_deref())?;
    config.validate()?;
    Ok(config)
}

fn init_logging_from_args(args: &CliArgs, config: &StacksmithConfig) {
    let mut logging = LoggingConfig::from_env();
    logging.level = if let Some(level_str) = &args.log_level {
        parse_level(level_str).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using info", level_str);
            Level::INFO
        })
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        parse_level(&config.log_level).unwrap_or(Level::INFO)
    };
    init_logging(logging);
}
