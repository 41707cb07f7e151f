//! Directed flow graph produced by a crawl.
//!
//! Nodes are kept in insertion order with an address index; edges are an
//! append-only sequence in discovery order. The outgoing and incoming
//! adjacency indexes hold edge positions and are only ever updated together
//! with the edge list, so they cannot drift from it.

use crate::amount::Amount;
use crate::cache::TokenSummary;
use crate::config::BuildParams;
use crate::normalize::{LedgerTx, TxKind};
use chrono::{DateTime, Utc};
use flowtrace_scanner::AccountInfo;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    InProgress,
    Complete,
    BudgetExhausted,
    Cancelled,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStatus::InProgress => "in progress",
            BuildStatus::Complete => "complete",
            BuildStatus::BudgetExhausted => "budget exhausted",
            BuildStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The payment that first funded an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub activator: String,
    pub tx_hash: String,
    pub ledger_index: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: Option<Amount>,
}

/// Outcome of an activation lookup. `NotFound` is a proven negative (history
/// exhausted); `NotFoundWithinBudget` only means the scan stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivationLookup {
    Found(Activation),
    NotFound,
    NotFoundWithinBudget,
}

impl ActivationLookup {
    pub fn activation(&self) -> Option<&Activation> {
        match self {
            ActivationLookup::Found(activation) => Some(activation),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self, ActivationLookup::NotFoundWithinBudget)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMeta {
    pub pages_scanned: u32,
    pub tx_scanned: u32,
    /// Outgoing history was read to its end and every metadata lookup
    /// succeeded.
    pub complete: bool,
    pub expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountNode {
    pub address: String,
    /// Minimum BFS depth at which the node was reached.
    pub level: u32,
    #[serde(default)]
    pub account_info: Option<AccountInfo>,
    /// `None` until a lookup ran.
    #[serde(default)]
    pub activation: Option<ActivationLookup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenSummary>,
    #[serde(default)]
    pub outgoing: Vec<LedgerTx>,
    #[serde(default)]
    pub scan: ScanMeta,
}

impl AccountNode {
    pub fn new(address: &str, level: u32) -> Self {
        Self {
            address: address.to_string(),
            level,
            account_info: None,
            activation: None,
            tokens: None,
            outgoing: Vec::new(),
            scan: ScanMeta::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: TxKind,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub ledger_index: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub tx_hash: String,
}

impl Edge {
    /// Edge for `tx` toward its counterparty, if it has one.
    pub fn from_tx(tx: &LedgerTx) -> Option<Self> {
        let to = tx.counterparty()?;
        Some(Self {
            from: tx.account.clone(),
            to: to.to_string(),
            kind: tx.kind.clone(),
            amount: tx.amount.clone(),
            ledger_index: tx.ledger_index,
            timestamp: tx.timestamp,
            tx_hash: tx.hash.clone(),
        })
    }
}

/// Result of [`Graph::try_add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Added { index: usize, new_node: bool },
    EdgeBudgetFull,
    AccountBudgetFull,
    UnknownSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub expanded: usize,
    pub incomplete: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<AccountNode>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
    pub seeds: Vec<String>,
    pub rejected_seeds: Vec<String>,
    pub params: BuildParams,
    pub built_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: BuildStatus,
}

impl Graph {
    pub fn new(seeds: Vec<String>, params: BuildParams) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            seeds,
            rejected_seeds: Vec::new(),
            params,
            built_at: Utc::now(),
            finished_at: None,
            status: BuildStatus::InProgress,
        }
    }

    pub fn node(&self, address: &str) -> Option<&AccountNode> {
        self.index.get(address).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, address: &str) -> Option<&mut AccountNode> {
        self.index.get(address).map(|&i| &mut self.nodes[i])
    }

    pub fn contains(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[AccountNode] {
        &self.nodes
    }

    /// Edges in discovery order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_at_account_capacity(&self) -> bool {
        self.nodes.len() >= self.params.max_accounts
    }

    pub fn is_at_edge_capacity(&self) -> bool {
        self.edges.len() >= self.params.max_edges
    }

    /// Get or create the node for `address`, lowering its level to `level` if
    /// that is smaller. Returns `None` when the node is absent and the account
    /// budget is spent.
    pub fn ensure_node(&mut self, address: &str, level: u32) -> Option<&mut AccountNode> {
        if let Some(&i) = self.index.get(address) {
            let node = &mut self.nodes[i];
            node.level = node.level.min(level);
            return Some(node);
        }
        if self.is_at_account_capacity() {
            return None;
        }
        let i = self.nodes.len();
        self.nodes.push(AccountNode::new(address, level));
        self.index.insert(address.to_string(), i);
        Some(&mut self.nodes[i])
    }

    /// Append `edge`, creating its target at `target_level` when needed.
    ///
    /// The edge budget is checked before any node is created, so a refused
    /// edge never leaves a dangling node behind, and an edge whose target
    /// cannot be created is not added.
    pub fn try_add_edge(&mut self, edge: Edge, target_level: u32) -> EdgeInsert {
        if !self.contains(&edge.from) {
            return EdgeInsert::UnknownSource;
        }
        if self.is_at_edge_capacity() {
            return EdgeInsert::EdgeBudgetFull;
        }
        let new_node = !self.contains(&edge.to);
        if self.ensure_node(&edge.to, target_level).is_none() {
            return EdgeInsert::AccountBudgetFull;
        }

        let index = self.edges.len();
        self.outgoing.entry(edge.from.clone()).or_default().push(index);
        self.incoming.entry(edge.to.clone()).or_default().push(index);
        self.edges.push(edge);
        EdgeInsert::Added { index, new_node }
    }

    pub fn outgoing_edges<'a>(&'a self, address: &str) -> impl Iterator<Item = &'a Edge> + use<'a> {
        self.outgoing
            .get(address)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn incoming_edges<'a>(&'a self, address: &str) -> impl Iterator<Item = &'a Edge> + use<'a> {
        self.incoming
            .get(address)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Distinct targets of outgoing edges, in first-seen order.
    pub fn successors(&self, address: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.outgoing_edges(address)
            .map(|e| e.to.as_str())
            .filter(|to| seen.insert(*to))
            .collect()
    }

    /// Distinct sources of incoming edges, in first-seen order.
    pub fn predecessors(&self, address: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.incoming_edges(address)
            .map(|e| e.from.as_str())
            .filter(|from| seen.insert(*from))
            .collect()
    }

    pub fn out_degree(&self, address: &str) -> usize {
        self.successors(address).len()
    }

    pub fn in_degree(&self, address: &str) -> usize {
        self.predecessors(address).len()
    }

    /// An expanded node stopped early, a node was never expanded, or the crawl
    /// itself ended before the queue drained.
    pub fn is_incomplete(&self) -> bool {
        self.status != BuildStatus::Complete
            || self
                .nodes
                .iter()
                .any(|n| n.scan.expanded && !n.scan.complete)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            expanded: self.nodes.iter().filter(|n| n.scan.expanded).count(),
            incomplete: self
                .nodes
                .iter()
                .filter(|n| n.scan.expanded && !n.scan.complete)
                .count(),
            errors: self.nodes.iter().filter(|n| n.scan.error.is_some()).count(),
        }
    }

    /// petgraph view with one vertex per node and one arc per edge. Arc
    /// weights are positions in [`edges`](Self::edges).
    pub fn to_digraph(&self) -> (DiGraph<String, usize>, HashMap<String, NodeIndex>) {
        let mut digraph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut indices = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            indices.insert(node.address.clone(), digraph.add_node(node.address.clone()));
        }
        for (i, edge) in self.edges.iter().enumerate() {
            if let (Some(&a), Some(&b)) = (indices.get(&edge.from), indices.get(&edge.to)) {
                digraph.add_edge(a, b, i);
            }
        }
        (digraph, indices)
    }

    /// Check the structural invariants; returns the first violation found.
    pub fn verify(&self) -> std::result::Result<(), String> {
        if self.nodes.len() > self.params.max_accounts {
            return Err(format!(
                "{} nodes exceed max_accounts {}",
                self.nodes.len(),
                self.params.max_accounts
            ));
        }
        if self.edges.len() > self.params.max_edges {
            return Err(format!(
                "{} edges exceed max_edges {}",
                self.edges.len(),
                self.params.max_edges
            ));
        }
        for (i, edge) in self.edges.iter().enumerate() {
            if !self.contains(&edge.from) || !self.contains(&edge.to) {
                return Err(format!("edge {} has an endpoint without a node", i));
            }
            let indexed_out = self.outgoing.get(&edge.from).is_some_and(|v| v.contains(&i));
            let indexed_in = self.incoming.get(&edge.to).is_some_and(|v| v.contains(&i));
            if !indexed_out || !indexed_in {
                return Err(format!("edge {} missing from adjacency index", i));
            }
        }
        let indexed: usize = self.outgoing.values().map(Vec::len).sum();
        let indexed_in: usize = self.incoming.values().map(Vec::len).sum();
        if indexed != self.edges.len() || indexed_in != self.edges.len() {
            return Err("adjacency index holds stale entries".to_string());
        }
        Ok(())
    }
}
