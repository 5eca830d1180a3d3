use std::path::{Path, PathBuf};

mod config;
mod diff;
mod replay;
mod terminal;

use clap::ArgAction;
use config::Config;
use diff::Diff;
use replay::Replay;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the configuration file
    #[arg(short, long, default_value = "specdrift.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(&self.config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Compare two specification files
    ///
    /// Exits with status 2 when the comparison contains a breaking change.
    Diff(Diff),

    /// Replay a directory of specification snapshots through a ledger
    ///
    /// Files are observed in filename order, one minute apart.
    Replay(Replay),

    /// Show or initialize the configuration file
    Config(Config),
}

impl Command {
    fn run(self, config_path: &Path) -> anyhow::Result<()> {
        match self {
            Self::Diff(command) => command.run(config_path)?,
            Self::Replay(command) => command.run(config_path)?,
            Self::Config(command) => command.run(config_path)?,
        }
        Ok(())
    }
}

/// Loads the configuration, falling back to defaults if the file is absent.
fn load_config(path: &Path) -> anyhow::Result<specdrift::Config> {
    if path.exists() {
        specdrift::Config::load(path).map_err(|e| anyhow::anyhow!("{e}"))
    } else {
        Ok(specdrift::Config::default())
    }
}

/// Output format for change reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Writes change sets to stdout in the requested format.
fn print_change_sets(
    change_sets: &[specdrift::ChangeSet],
    format: OutputFormat,
) -> anyhow::Result<()> {
    use specdrift::storage::export;
    use terminal::Colorize;

    let stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => export::write_json(stdout, change_sets)?,
        OutputFormat::Csv => export::write_csv(stdout, change_sets)?,
        OutputFormat::Text => {
            if change_sets.is_empty() {
                println!("{}", "No changes detected.".success());
            }
            for change_set in change_sets {
                println!(
                    "{} {}",
                    change_set.summary.severity(change_set.severity),
                    format!("[impact {}]", change_set.impact_score).dim()
                );
                for classified in &change_set.changes {
                    println!(
                        "  {} {:<12} {}",
                        format!("{:<8}", classified.severity.as_str())
                            .severity(classified.severity),
                        classified.change_type.as_str(),
                        classified.change.description
                    );
                    println!("  {:<8} {:<12} {}", "", "", classified.change.path.dim());
                }
            }
        }
    }
    Ok(())
}
