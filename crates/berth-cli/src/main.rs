//! Berth - Deployment Orchestrator
//!
//! Usage:
//!   berth deploy --config berth.toml     # Deploy the configured artifact
//!   berth undeploy --config berth.toml   # Remove it again

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use berth_core::config::DeploymentConfig;
use berth_core::deploy::Deployer;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Deploy application artifacts to local and managed runtimes", long_about = None)]
struct Cli {
    /// Log step-by-step detail at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the configured artifact to its target
    Deploy {
        /// Deployment configuration file (TOML)
        #[arg(long, short, default_value = "berth.toml")]
        config: PathBuf,
    },

    /// Remove the configured application from its target
    Undeploy {
        /// Deployment configuration file (TOML)
        #[arg(long, short, default_value = "berth.toml")]
        config: PathBuf,
    },
}

enum Operation {
    Deploy,
    Undeploy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Deploy { config } => run(&config, Operation::Deploy),
        Commands::Undeploy { config } => run(&config, Operation::Undeploy),
    }
}

fn run(config_path: &Path, operation: Operation) -> Result<()> {
    let config = DeploymentConfig::load(config_path)?;
    let application = config.application_name.clone();
    let target = config.target;
    tracing::info!(%application, %target, config = %config_path.display(), "configuration loaded");

    let mut deployer = Deployer::from_config(config)?;
    deployer
        .prepare()
        .with_context(|| format!("preparing deployment of '{application}' to {target}"))?;

    match operation {
        Operation::Deploy => {
            deployer
                .deploy()
                .with_context(|| format!("deploying '{application}' to {target}"))?;
            println!("Deployed '{application}' to {target}");
        }
        Operation::Undeploy => {
            deployer
                .undeploy()
                .with_context(|| format!("undeploying '{application}' from {target}"))?;
            println!("Undeployed '{application}' from {target}");
        }
    }
    Ok(())
}
