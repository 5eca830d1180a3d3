use std::path::Path;

use clap::Parser;
use tracing::instrument;

use super::{load_config, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Config {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Config {
    #[instrument]
    pub fn run(self, config_path: &Path) -> anyhow::Result<()> {
        match self.command {
            ConfigCommand::Show => {
                let config = load_config(config_path)?;
                let source = if config_path.exists() {
                    config_path.display().to_string()
                } else {
                    "defaults".to_string()
                };

                println!("Configuration ({}):", source.dim());
                println!(
                    "  history_limit: {}",
                    config
                        .history_limit
                        .map_or_else(|| "unlimited".to_string(), |limit| limit.to_string())
                );
                println!("  summary_examples: {}", config.summary_examples());
            }
            ConfigCommand::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                specdrift::Config::default()
                    .save(config_path)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!(
                    "{}",
                    format!("Wrote {}", config_path.display()).success()
                );
            }
        }
        Ok(())
    }
}
