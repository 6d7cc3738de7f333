//! Manifest loading and static validation.
//!
//! A manifest is parsed from YAML, then every guard and template it carries
//! is parsed once so that malformed expressions are reported before any host
//! is planned.

mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::expr::ExprError;
use crate::template;
use crate::value::Value;

pub use types::*;

/// Errors that can occur while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid manifest: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("role invocation #{position} has an empty role name")]
  EmptyRole { position: usize },

  #[error("role invocation #{position} ({role}): invalid template in {field}: {source}")]
  Template {
    position: usize,
    role: String,
    field: String,
    #[source]
    source: ExprError,
  },

  #[error("exclusive choice '{variable}': {message}")]
  InvalidExclusive { variable: String, message: String },
}

impl Manifest {
  /// Load and validate a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let manifest = Self::from_yaml_str(&content)?;
    debug!(
      path = %path.display(),
      roles = manifest.roles.len(),
      hosts = %manifest.hosts,
      "loaded manifest"
    );
    Ok(manifest)
  }

  /// Parse and validate a manifest document.
  pub fn from_yaml_str(content: &str) -> Result<Self, ManifestError> {
    let manifest: Manifest = serde_yaml::from_str(content)?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Check role names, templates and exclusive choices.
  pub fn validate(&self) -> Result<(), ManifestError> {
    for (position, invocation) in self.roles.iter().enumerate() {
      if invocation.role.trim().is_empty() {
        return Err(ManifestError::EmptyRole { position });
      }

      let sections = [
        ("vars", &invocation.vars),
        ("publish", &invocation.publish),
        ("contributes", &invocation.contributes),
      ];
      for (section, values) in sections {
        for (name, value) in values {
          template::referenced_variables(value).map_err(|source| ManifestError::Template {
            position,
            role: invocation.role.clone(),
            field: format!("{section}.{name}"),
            source,
          })?;
        }
      }
    }

    for (name, value) in &self.vars {
      template::referenced_variables(value).map_err(|source| ManifestError::Template {
        position: 0,
        role: "(play)".to_string(),
        field: format!("vars.{name}"),
        source,
      })?;
    }

    let mut seen = BTreeSet::new();
    for choice in &self.exclusive {
      if choice.variable.trim().is_empty() {
        return Err(ManifestError::InvalidExclusive {
          variable: choice.variable.clone(),
          message: "variable name is empty".to_string(),
        });
      }
      if !seen.insert(choice.variable.as_str()) {
        return Err(ManifestError::InvalidExclusive {
          variable: choice.variable.clone(),
          message: "declared more than once".to_string(),
        });
      }
      if choice.values.len() < 2 {
        return Err(ManifestError::InvalidExclusive {
          variable: choice.variable.clone(),
          message: "needs at least two alternative values".to_string(),
        });
      }
      if choice.values.iter().any(|v| matches!(v, Value::List(_) | Value::Map(_))) {
        return Err(ManifestError::InvalidExclusive {
          variable: choice.variable.clone(),
          message: "values must be scalars".to_string(),
        });
      }
    }

    Ok(())
  }

  /// Every tag used by any invocation.
  pub fn tags(&self) -> BTreeSet<String> {
    self.roles.iter().flat_map(|r| r.tags.iter().cloned()).collect()
  }

  /// Shared list variables some invocation contributes to.
  pub fn contribution_targets(&self) -> BTreeSet<String> {
    self
      .roles
      .iter()
      .flat_map(|r| r.contributes.keys().cloned())
      .collect()
  }

  pub fn exclusive_choice(&self, variable: &str) -> Option<&ExclusiveChoice> {
    self.exclusive.iter().find(|c| c.variable == variable)
  }
}
