//! Role sequencing: invocation order and tag filtering.
//!
//! The sequencer decides which invocations are candidates for a run and in
//! which order they are considered. Guard conditions depend on per-host
//! values and publications, so they are evaluated later by the
//! [resolver](crate::resolve).

mod dag;

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{ALL_TAG, ALWAYS_TAG};
use crate::expr::ExprError;
use crate::manifest::{Manifest, Ordering};

pub use dag::{Dependency, DependencyGraph, RoleNode};

/// Errors that can occur while ordering invocations.
#[derive(Debug, Error)]
pub enum SequenceError {
  #[error("dependency cycle between roles: {}", .0.join(" -> "))]
  Cycle(Vec<String>),

  #[error("role invocation #{position} ({role}): {source}")]
  Template {
    position: usize,
    role: String,
    #[source]
    source: ExprError,
  },
}

/// Include and skip tags requested for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagFilter {
  pub include: BTreeSet<String>,
  pub skip: BTreeSet<String>,
}

impl TagFilter {
  pub fn new<I, S>(include: I, skip: S) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
    S: IntoIterator,
    S::Item: Into<String>,
  {
    Self {
      include: include.into_iter().map(Into::into).collect(),
      skip: skip.into_iter().map(Into::into).collect(),
    }
  }

  /// Parse a comma-separated tag list, ignoring blanks.
  pub fn parse_list(list: &str) -> BTreeSet<String> {
    list
      .split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_string)
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.include.is_empty() && self.skip.is_empty()
  }

  /// Whether an invocation with `tags` passes the filter.
  ///
  /// Skip tags win over everything, including `always`.
  pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
    if !self.skip.is_disjoint(tags) {
      return false;
    }
    if self.include.is_empty() || self.include.contains(ALL_TAG) || tags.contains(ALWAYS_TAG) {
      return true;
    }
    !self.include.is_disjoint(tags)
  }
}

/// Invocation positions in the order they are considered.
///
/// # Errors
///
/// Returns an error if dependency ordering finds a cycle.
pub fn sequence(manifest: &Manifest) -> Result<Vec<usize>, SequenceError> {
  match manifest.ordering {
    Ordering::Manifest => Ok((0..manifest.roles.len()).collect()),
    Ordering::Dependencies => DependencyGraph::from_manifest(manifest)?.order(),
  }
}

/// Sequenced positions whose tags pass the filter.
///
/// The second list holds the positions removed by the filter, in sequence
/// order.
pub fn candidates(manifest: &Manifest, filter: &TagFilter) -> Result<(Vec<usize>, Vec<usize>), SequenceError> {
  let (selected, filtered): (Vec<usize>, Vec<usize>) = sequence(manifest)?
    .into_iter()
    .partition(|&position| filter.matches(&manifest.roles[position].tags));

  debug!(
    selected = selected.len(),
    filtered = filtered.len(),
    include = ?filter.include,
    skip = ?filter.skip,
    "applied tag filter"
  );
  Ok((selected, filtered))
}
