use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use clap::Parser;
use specdrift::{ApiId, Ledger};
use tracing::{instrument, warn};
use walkdir::WalkDir;

use super::{
    OutputFormat,
    diff::{read_document, version_of},
    load_config, print_change_sets,
};

#[derive(Debug, Parser)]
#[command(about = "Replay a directory of specification snapshots")]
pub struct Replay {
    /// Directory containing one specification file per snapshot
    dir: PathBuf,

    /// Name of the API the snapshots belong to
    #[arg(long, default_value = "api")]
    api: ApiId,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: OutputFormat,
}

impl Replay {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, config_path: &Path) -> anyhow::Result<()> {
        let config = load_config(config_path)?;
        let ledger = Ledger::new(config);

        let start = Utc::now();
        let mut change_sets = Vec::new();
        for (minutes, path) in (0..).zip(snapshot_files(&self.dir)) {
            let document = match read_document(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!(path = %path.display(), "skipping snapshot: {e:#}");
                    continue;
                }
            };
            let version = version_of(&document, &path);

            match ledger.record_observation(
                &self.api,
                &version,
                document,
                start + Duration::minutes(minutes),
            ) {
                Ok(observation) => {
                    if observation.is_new_version() {
                        change_sets.extend(observation.change_set);
                    }
                }
                Err(e) => warn!(path = %path.display(), "skipping snapshot: {e}"),
            }
        }

        print_change_sets(&change_sets, self.format)
    }
}

/// JSON and YAML files under `dir`, sorted by file name.
fn snapshot_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("failed to read directory entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "json" | "yaml" | "yml"))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}
