//! Data-flow graph between role invocations.
//!
//! An invocation produces the variables it publishes plus those it declares in
//! `produces`. It consumes every root variable its guard, parameters,
//! publications and contributions reference, plus its `requires`. The graph
//! has one node per invocation and an edge from producer to consumer for each
//! variable that links them.
//!
//! When several invocations publish the same variable, a consumer reads the
//! nearest one written before it (and any guarded ones in between) and later
//! publishers are ordered after the consumer. Contribution targets do not
//! create edges.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::manifest::Manifest;

use super::SequenceError;

/// A node of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNode {
  pub position: usize,
  pub role: String,
}

impl fmt::Display for RoleNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.role, self.position)
  }
}

/// A producer to consumer link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Dependency {
  pub from: usize,
  pub to: usize,
  pub variable: String,
}

/// Dependency graph over the invocations of one manifest.
pub struct DependencyGraph {
  graph: DiGraph<RoleNode, String>,
}

impl DependencyGraph {
  /// Build the graph for a manifest.
  ///
  /// # Errors
  ///
  /// Returns `SequenceError::Template` if an invocation carries a template
  /// that cannot be parsed.
  pub fn from_manifest(manifest: &Manifest) -> Result<Self, SequenceError> {
    let mut graph = DiGraph::new();

    for (position, invocation) in manifest.roles.iter().enumerate() {
      graph.add_node(RoleNode {
        position,
        role: invocation.role.clone(),
      });
    }

    let mut producers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, invocation) in manifest.roles.iter().enumerate() {
      for variable in invocation.produced_variables() {
        producers.entry(variable).or_default().push(position);
      }
    }

    for (position, invocation) in manifest.roles.iter().enumerate() {
      let consumed = invocation
        .referenced_variables()
        .map_err(|source| SequenceError::Template {
          position,
          role: invocation.role.clone(),
          source,
        })?;

      for variable in consumed {
        let Some(sources) = producers.get(&variable) else {
          continue;
        };
        for (from, to) in links(manifest, sources, position) {
          graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), variable.clone());
        }
      }
    }

    Ok(Self { graph })
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  /// Invocation positions ordered so that producers precede consumers.
  ///
  /// Among invocations that are ready at the same time the one with the lowest
  /// manifest position goes first, so a manifest whose data flow already
  /// matches its document order keeps that order.
  ///
  /// # Errors
  ///
  /// Returns `SequenceError::Cycle` naming the invocations of the first cycle.
  pub fn order(&self) -> Result<Vec<usize>, SequenceError> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
      .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
      .iter()
      .enumerate()
      .filter(|(_, degree)| **degree == 0)
      .map(|(position, _)| Reverse(position))
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());
    while let Some(Reverse(position)) = ready.pop() {
      order.push(position);
      for edge in self.graph.edges(NodeIndex::new(position)) {
        let target = edge.target().index();
        in_degree[target] -= 1;
        if in_degree[target] == 0 {
          ready.push(Reverse(target));
        }
      }
    }

    if order.len() < self.graph.node_count() {
      return Err(SequenceError::Cycle(self.first_cycle()));
    }

    Ok(order)
  }

  /// Labels of the invocations in the cycle with the lowest position.
  fn first_cycle(&self) -> Vec<String> {
    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|component| component.len() > 1)
      .collect();
    for component in &mut components {
      component.sort();
    }
    components.sort();

    components
      .first()
      .map(|component| component.iter().map(|&idx| self.graph[idx].to_string()).collect())
      .unwrap_or_default()
  }

  /// Every edge, sorted by producer, consumer and variable.
  pub fn edges(&self) -> Vec<Dependency> {
    let mut edges: Vec<Dependency> = self
      .graph
      .edge_references()
      .map(|edge| Dependency {
        from: edge.source().index(),
        to: edge.target().index(),
        variable: edge.weight().clone(),
      })
      .collect();
    edges.sort();
    edges
  }

  /// Edges whose consumer is written before its producer.
  pub fn backward_edges(&self) -> Vec<Dependency> {
    self.edges().into_iter().filter(|edge| edge.from > edge.to).collect()
  }

  /// Positions an invocation directly depends on.
  pub fn dependencies_of(&self, position: usize) -> BTreeSet<usize> {
    if position >= self.graph.node_count() {
      return BTreeSet::new();
    }
    self
      .graph
      .neighbors_directed(NodeIndex::new(position), Direction::Incoming)
      .map(|idx| idx.index())
      .collect()
  }

  /// Graphviz rendering, nodes labelled `role#position`, edges by variable.
  pub fn to_dot(&self) -> String {
    Dot::new(&self.graph).to_string()
  }
}

/// Edges that tie `reader` to the producers of one variable.
///
/// `producers` is in document order. The reader depends on the nearest
/// producer written before it, or on the first one after it when none
/// precedes it. A guarded producer may be skipped, so the search continues
/// past it up to the first producer without a guard. Producers after the
/// ones read must run after the reader so they cannot overwrite the value
/// first. An invocation that produces the variable itself reads its own
/// value and gets no edges to later producers.
fn links(manifest: &Manifest, producers: &[usize], reader: usize) -> Vec<(usize, usize)> {
  let unconditional = |p: usize| manifest.roles[p].when.is_empty();
  let produces_itself = producers.contains(&reader);
  let earlier: Vec<usize> = producers.iter().copied().filter(|&p| p < reader).collect();
  let later: Vec<usize> = producers.iter().copied().filter(|&p| p > reader).collect();

  let (read, overwriters) = if !earlier.is_empty() {
    let read = take_until(earlier.iter().rev().copied(), unconditional);
    (read, later)
  } else if produces_itself {
    (Vec::new(), Vec::new())
  } else {
    let read = take_until(later.iter().copied(), unconditional);
    let overwriters = later[read.len()..].to_vec();
    (read, overwriters)
  };

  let mut edges: Vec<(usize, usize)> = read.into_iter().map(|p| (p, reader)).collect();
  if !produces_itself {
    edges.extend(overwriters.into_iter().map(|p| (reader, p)));
  }
  edges
}

/// Items up to and including the first one matching `stop`.
fn take_until(items: impl Iterator<Item = usize>, stop: impl Fn(usize) -> bool) -> Vec<usize> {
  let mut taken = Vec::new();
  for item in items {
    taken.push(item);
    if stop(item) {
      break;
    }
  }
  taken
}
