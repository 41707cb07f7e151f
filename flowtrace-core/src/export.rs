//! Stable JSON snapshot of a graph, and DOT output.

use crate::amount::short_address;
use crate::config::BuildParams;
use crate::error::ExportError;
use crate::graph::{AccountNode, BuildStatus, Edge, EdgeInsert, Graph, GraphStats};
use chrono::{DateTime, Utc};
use petgraph::dot::{Config, Dot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub format_version: u32,
    pub id: Uuid,
    pub built_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exported_at: DateTime<Utc>,
    pub status: BuildStatus,
    pub seeds: Vec<String>,
    #[serde(default)]
    pub rejected_seeds: Vec<String>,
    pub params: BuildParams,
    pub stats: GraphStats,
    pub nodes: Vec<AccountNode>,
    pub edges: Vec<Edge>,
}

pub fn export_graph(graph: &Graph) -> GraphSnapshot {
    GraphSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        id: Uuid::new_v4(),
        built_at: graph.built_at,
        finished_at: graph.finished_at,
        exported_at: Utc::now(),
        status: graph.status,
        seeds: graph.seeds.clone(),
        rejected_seeds: graph.rejected_seeds.clone(),
        params: graph.params.clone(),
        stats: graph.stats(),
        nodes: graph.nodes().to_vec(),
        edges: graph.edges().to_vec(),
    }
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ExportError> {
        let snapshot: GraphSnapshot = serde_json::from_str(raw)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ExportError::UnsupportedVersion(snapshot.format_version));
        }
        Ok(snapshot)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!("Wrote snapshot {} to {}", self.id, path.display());
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, ExportError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Rebuild a [`Graph`], replaying edges in their original order so the
    /// adjacency indexes come out exactly as the crawl left them.
    pub fn into_graph(self) -> Result<Graph, ExportError> {
        let mut graph = Graph::new(self.seeds, self.params);
        graph.rejected_seeds = self.rejected_seeds;
        graph.built_at = self.built_at;
        graph.finished_at = self.finished_at;
        graph.status = self.status;

        for node in self.nodes {
            let Some(slot) = graph.ensure_node(&node.address, node.level) else {
                return Err(ExportError::Inconsistent(format!(
                    "more nodes than max_accounts ({})",
                    graph.params.max_accounts
                )));
            };
            *slot = node;
        }

        for (i, edge) in self.edges.into_iter().enumerate() {
            if !graph.contains(&edge.to) {
                return Err(ExportError::Inconsistent(format!(
                    "edge {} points at unknown account {}",
                    i, edge.to
                )));
            }
            // every target already exists, so its recorded level stays put
            match graph.try_add_edge(edge, u32::MAX) {
                EdgeInsert::Added { .. } => {}
                other => {
                    return Err(ExportError::Inconsistent(format!(
                        "edge {} could not be replayed: {:?}",
                        i, other
                    )));
                }
            }
        }

        Ok(graph)
    }
}

/// Graphviz rendering: one vertex per account, one arc per edge labelled
/// with its kind and amount.
pub fn to_dot(graph: &Graph) -> String {
    let (digraph, _) = graph.to_digraph();
    let labelled = digraph.map(
        |_, address| short_address(address),
        |_, &i| {
            let edge = &graph.edges()[i];
            match &edge.amount {
                Some(amount) => format!("{} {}", edge.kind, amount),
                None => edge.kind.to_string(),
            }
        },
    );
    format!(
        "digraph flow {{\n{}}}\n",
        Dot::with_config(&labelled, &[Config::GraphContentOnly])
    )
}
