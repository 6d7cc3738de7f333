//! User settings.
//!
//! Settings are layered: built-in defaults, then the settings file
//! (`$XDG_CONFIG_HOME/rolebook/config.yml` unless another file is given), then
//! `ROLEBOOK_*` environment variables. Command-line flags are applied on top
//! by the CLI.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_INVENTORY, ENV_INVENTORY, ENV_SKIP_TAGS, ENV_TAGS};
use crate::sequencer::TagFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read settings {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid settings {path}: {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  /// Inventory used when none is given on the command line.
  pub inventory: PathBuf,
  /// Include tags applied when none are given.
  pub tags: Vec<String>,
  /// Skip tags applied when none are given.
  pub skip_tags: Vec<String>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      inventory: PathBuf::from(DEFAULT_INVENTORY),
      tags: Vec::new(),
      skip_tags: Vec::new(),
    }
  }
}

impl Settings {
  /// Load settings from `explicit` or the default settings file, then apply
  /// environment overrides.
  ///
  /// A missing default file is not an error; a missing explicit file is.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let mut settings = match explicit {
      Some(path) => Self::from_file(path)?,
      None => match paths::config_file() {
        Some(path) if path.is_file() => Self::from_file(&path)?,
        _ => Self::default(),
      },
    };
    settings.apply_env();
    Ok(settings)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let settings = if content.trim().is_empty() {
      Self::default()
    } else {
      serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
      })?
    };
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
  }

  /// Override fields from `ROLEBOOK_INVENTORY`, `ROLEBOOK_TAGS` and
  /// `ROLEBOOK_SKIP_TAGS`.
  pub fn apply_env(&mut self) {
    if let Some(inventory) = std::env::var_os(ENV_INVENTORY).filter(|v| !v.is_empty()) {
      self.inventory = PathBuf::from(inventory);
    }
    if let Ok(tags) = std::env::var(ENV_TAGS) {
      self.tags = TagFilter::parse_list(&tags).into_iter().collect();
    }
    if let Ok(skip) = std::env::var(ENV_SKIP_TAGS) {
      self.skip_tags = TagFilter::parse_list(&skip).into_iter().collect();
    }
  }

  pub fn tag_filter(&self) -> TagFilter {
    TagFilter::new(self.tags.clone(), self.skip_tags.clone())
  }
}
