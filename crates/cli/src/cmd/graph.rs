//! Implementation of the `rolebook graph` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rolebook_lib::sequencer::{Dependency, DependencyGraph, SequenceError};

use super::load_manifest;
use crate::output::{self, ARROW, Mark, OutputFormat};

#[derive(Serialize)]
struct GraphNode<'a> {
  position: usize,
  role: &'a str,
}

#[derive(Serialize)]
struct GraphOutput<'a> {
  nodes: Vec<GraphNode<'a>>,
  edges: Vec<Dependency>,
  #[serde(skip_serializing_if = "Option::is_none")]
  order: Option<Vec<usize>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  cycle: Option<Vec<String>>,
}

pub fn cmd_graph(manifest_path: &Path, dot: bool, format: OutputFormat) -> Result<()> {
  let manifest = load_manifest(manifest_path)?;
  let graph = DependencyGraph::from_manifest(&manifest).context("Failed to build dependency graph")?;

  let (order, cycle) = match graph.order() {
    Ok(order) => (Some(order), None),
    Err(SequenceError::Cycle(members)) => (None, Some(members)),
    Err(err) => return Err(err).context("Failed to order role invocations"),
  };
  let label = |position: usize| format!("{}#{}", manifest.roles[position].role, position);

  if dot {
    print!("{}", graph.to_dot());
  } else if format.is_json() {
    let out = GraphOutput {
      nodes: manifest
        .roles
        .iter()
        .enumerate()
        .map(|(position, invocation)| GraphNode {
          position,
          role: &invocation.role,
        })
        .collect(),
      edges: graph.edges(),
      order,
      cycle: cycle.clone(),
    };
    output::json(&out)?;
  } else {
    output::line(Mark::Heading, format!("Dependency graph: {} role invocation(s)", graph.node_count()));
    for edge in graph.edges() {
      println!(
        "  {} {} {} ({})",
        label(edge.from),
        ARROW,
        label(edge.to),
        edge.variable
      );
    }
    if let Some(order) = &order {
      let order: Vec<String> = order.iter().map(|&p| label(p)).collect();
      output::stat("Order", order.join(", "));
    }
  }

  match cycle {
    Some(members) => Err(SequenceError::Cycle(members).into()),
    None => Ok(()),
  }
}
