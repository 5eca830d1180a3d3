use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use specdrift::{ApiId, ChangeSet, SpecDocument, analyze};
use tracing::instrument;

use super::{OutputFormat, load_config, print_change_sets};

#[derive(Debug, Parser)]
#[command(about = "Compare two specification files")]
pub struct Diff {
    /// The earlier specification (JSON or YAML)
    old: PathBuf,

    /// The later specification (JSON or YAML)
    new: PathBuf,

    /// Name of the API, used in the summary
    #[arg(long, default_value = "api")]
    api: ApiId,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: OutputFormat,
}

impl Diff {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, config_path: &Path) -> anyhow::Result<()> {
        let config = load_config(config_path)?;
        let old = read_document(&self.old)?;
        let new = read_document(&self.new)?;

        let from_version = version_of(&old, &self.old);
        let to_version = version_of(&new, &self.new);

        let analysis = analyze(
            &self.api,
            &from_version,
            &old,
            &to_version,
            &new,
            config.summary_examples(),
        )
        .with_context(|| {
            format!(
                "cannot compare {} with {}",
                self.old.display(),
                self.new.display()
            )
        })?;

        let change_set = ChangeSet::new(
            self.api,
            from_version,
            to_version,
            analysis.changes,
            analysis.impact,
            analysis.summary,
            Utc::now(),
        );
        print_change_sets(std::slice::from_ref(&change_set), self.format)?;

        if change_set.is_breaking() {
            process::exit(2);
        }
        Ok(())
    }
}

/// Reads and parses a specification file.
pub fn read_document(path: &Path) -> anyhow::Result<SpecDocument> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    SpecDocument::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// The declared `info.version`, or the file stem when none is declared.
pub fn version_of(document: &SpecDocument, path: &Path) -> String {
    document.version().map_or_else(
        || {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        },
        ToString::to_string,
    )
}
