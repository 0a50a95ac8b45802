use anyhow::{Context, Result};
use clap::Parser;
use enterprise_repo::commands::{deploy, destroy, outputs, publish, synth, Command};
use enterprise_repo_config::StackConfig;
use std::path::PathBuf;

/// Synthesize and deploy a private PyPI repository with a Glue ETL pipeline
#[derive(Parser)]
#[command(name = "enterprise-repo")]
#[command(version)]
#[command(about = "Synthesize and deploy a private PyPI repository with a Glue ETL pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// CloudFormation stack name (overrides config file)
    #[arg(long, value_name = "NAME", global = true)]
    stack_name: Option<String>,

    /// Target AWS account id (overrides config file)
    #[arg(long, value_name = "ID", global = true)]
    account_id: Option<String>,

    /// Target AWS region (overrides config file)
    #[arg(long, value_name = "REGION", global = true)]
    region: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        StackConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        StackConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);

    // Step 3: Initialize tracing before validation so warnings show up
    enterprise_repo::init_tracing(&config.logging);

    // Step 4: Validate
    config.validate().context("Invalid configuration")?;

    match cli.command {
        // Offline, no runtime needed
        Command::Synth(args) => synth::run(args, &config),
        command => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?
            .block_on(dispatch(command, config)),
    }
}

fn apply_cli_overrides(config: &mut StackConfig, cli: &Cli) {
    if let Some(name) = &cli.stack_name {
        config.stack.name = name.clone();
    }
    if let Some(account) = &cli.account_id {
        config.environment.account_id = account.clone();
    }
    if let Some(region) = &cli.region {
        config.environment.region = Some(region.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}

async fn dispatch(command: Command, config: StackConfig) -> Result<()> {
    match command {
        Command::Synth(args) => synth::run(args, &config),
        Command::Deploy(args) => deploy::run(args, &config).await,
        Command::Publish(args) => publish::run(args, &config).await,
        Command::Outputs(args) => outputs::run(args, &config).await,
        Command::Destroy(args) => destroy::run(args, &config).await,
    }
}
