use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::freeze::{freeze_top_level, FreezableStep};
use crate::runtime::{self, ExternalContext};
use crate::steps::{Step, StepFactoryStore};
use crate::types::SerializeMode;

#[derive(Parser)]
#[command(name = "scl")]
#[command(about = "SCL - freeze, verify and run step trees", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "scl_core=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Freeze, verify and run a step tree
    Run {
        /// JSON file holding the parsed tree
        path: PathBuf,

        /// Disable constant folding
        #[arg(long)]
        no_fold: bool,
    },

    /// Freeze and verify a step tree without running it
    Check {
        /// JSON file holding the parsed tree
        path: PathBuf,
    },

    /// List registered steps and their parameters
    Steps,

    /// Print the effective settings as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_tree(path: &Path) -> Result<FreezableStep> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Freeze and verify, turning engine diagnostics into one report
fn prepare(path: &Path, config: &Config, store: &StepFactoryStore) -> Result<Box<dyn Step>> {
    let tree = load_tree(path)?;
    let step = freeze_top_level(&tree, store, config)
        .map_err(|e| anyhow::anyhow!("Freezing failed:\n{}", e.render()))?;
    runtime::verify(step.as_ref(), config)
        .map_err(|e| anyhow::anyhow!("Requirements not met:\n{}", e.render()))?;
    Ok(step)
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(cli.log_level.as_deref());

    let no_fold = matches!(cli.command, Commands::Run { no_fold: true, .. });
    let config = Config::builder()
        .config_path(cli.config.clone())
        .constant_folding(no_fold.then_some(false))
        .build()?;

    let store = StepFactoryStore::build(&config, Vec::new())
        .map_err(|e| anyhow::anyhow!("Failed to register steps:\n{}", e.render()))?;

    match cli.command {
        Commands::Run { path, .. } => {
            let step = prepare(&path, &config, &store)?;
            let settings = Arc::new(config);
            let context = Arc::new(ExternalContext::with_defaults());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let result = tokio::task::spawn_blocking(move || {
                runtime::run_in_new_state(step.as_ref(), settings, context, &cancel)
            })
            .await
            .context("Run task failed")?;

            let value = result.map_err(|e| anyhow::anyhow!("Run failed:\n{}", e.render()))?;
            println!("{}", value.serialize(SerializeMode::Primitive));
        }

        Commands::Check { path } => {
            let step = prepare(&path, &config, &store)?;
            println!("✓ {}", step.serialize(SerializeMode::Source));
            println!("  output type: {}", step.output_type());
        }

        Commands::Steps => {
            for factory in store.factories() {
                println!("{}", factory.name());
                if !factory.description().is_empty() {
                    println!("  {}", factory.description());
                }
                for parameter in factory.parameters().iter() {
                    let aliases = if parameter.aliases.is_empty() {
                        String::new()
                    } else {
                        format!(" (alias {})", parameter.aliases.join(", "))
                    };
                    println!(
                        "  {}. {}{}: {} {}{}",
                        parameter.position,
                        parameter.name,
                        aliases,
                        parameter.kind,
                        parameter.declared_type(),
                        if parameter.required { "" } else { " [optional]" },
                    );
                }
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
