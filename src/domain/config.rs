use std::{num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

/// Configuration for change detection.
///
/// The defaults are suitable for most monitoring setups; the file only needs
/// to list the settings that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The maximum number of snapshots retained per API.
    ///
    /// When the limit is exceeded the oldest snapshots are dropped. The most
    /// recent snapshot is always kept, and recorded transitions are never
    /// forgotten, so duplicate suppression is unaffected.
    ///
    /// `None` keeps every snapshot.
    pub history_limit: Option<NonZeroUsize>,

    /// The number of example changes named in a generated summary.
    summary_examples: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: None,
            summary_examples: default_summary_examples(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the number of example changes named in a summary.
    ///
    /// Always at least one.
    #[must_use]
    pub const fn summary_examples(&self) -> usize {
        if self.summary_examples == 0 {
            1
        } else {
            self.summary_examples
        }
    }

    /// Sets the number of example changes named in a summary.
    pub const fn set_summary_examples(&mut self, value: usize) {
        self.summary_examples = value;
    }
}

const fn default_summary_examples() -> usize {
    3
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history_limit: Option<NonZeroUsize>,

        #[serde(default = "default_summary_examples")]
        summary_examples: usize,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                history_limit,
                summary_examples,
            } => Self {
                history_limit,
                summary_examples,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            history_limit: config.history_limit,
            summary_examples: config.summary_examples,
        }
    }
}
