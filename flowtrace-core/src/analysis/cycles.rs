//! Bounded simple-cycle enumeration.
//!
//! Start nodes are the seeds plus the highest out-degree nodes. Nodes outside
//! a strongly connected component of two or more members cannot lie on a
//! cycle and are skipped, and the DFS never leaves the start's component.

use crate::graph::Graph;
use petgraph::algo::tarjan_scc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Longest cycle reported, in edges.
    pub max_depth: usize,
    /// Highest out-degree nodes used as extra start points.
    pub top_k_starts: usize,
    pub max_cycles: usize,
    /// DFS steps across all starts before giving up.
    pub max_steps: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            top_k_starts: 10,
            max_cycles: 100,
            max_steps: 200_000,
        }
    }
}

/// A simple cycle in canonical rotation. The closing edge back to
/// `path[0]` is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cycle {
    pub path: Vec<String>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycles: Vec<Cycle>,
    /// Enumeration stopped at the cycle or step cap.
    pub truncated: bool,
}

struct Frame<'a> {
    node: &'a str,
    next: usize,
}

pub fn find_cycles(graph: &Graph, config: &CycleConfig) -> CycleReport {
    let component = component_ids(graph);
    let neighbors: HashMap<&str, Vec<&str>> = graph
        .nodes()
        .iter()
        .map(|n| {
            let here = component.get(n.address.as_str());
            let mut next: Vec<&str> = graph
                .successors(&n.address)
                .into_iter()
                .filter(|s| here.is_some() && component.get(s) == here)
                .collect();
            next.sort_unstable();
            (n.address.as_str(), next)
        })
        .collect();

    let mut report = CycleReport::default();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut steps = 0usize;

    for start in start_nodes(graph, config.top_k_starts) {
        if !component.contains_key(start) {
            continue;
        }

        let mut stack = vec![Frame { node: start, next: 0 }];
        let mut path: Vec<&str> = vec![start];
        let mut on_path: HashSet<&str> = HashSet::from([start]);

        while let Some(frame) = stack.last_mut() {
            steps += 1;
            if steps > config.max_steps || report.cycles.len() >= config.max_cycles {
                report.truncated = true;
                return report;
            }

            let children = &neighbors[frame.node];
            if frame.next >= children.len() {
                stack.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(done);
                }
                continue;
            }
            let child = children[frame.next];
            frame.next += 1;

            if child == start {
                if path.len() >= 2 {
                    let canonical = canonical_rotation(&path);
                    if seen.insert(canonical.clone()) {
                        report.cycles.push(Cycle { path: canonical });
                    }
                }
                continue;
            }
            if on_path.contains(child) || path.len() >= config.max_depth {
                continue;
            }
            stack.push(Frame { node: child, next: 0 });
            path.push(child);
            on_path.insert(child);
        }
    }

    report
}

/// Component id for every node in a component with at least two members.
fn component_ids(graph: &Graph) -> HashMap<&str, usize> {
    let (digraph, _) = graph.to_digraph();
    let mut ids = HashMap::new();
    for (id, members) in tarjan_scc(&digraph).into_iter().enumerate() {
        if members.len() < 2 {
            continue;
        }
        for index in members {
            if let Some(node) = graph.node(&digraph[index]) {
                ids.insert(node.address.as_str(), id);
            }
        }
    }
    ids
}

/// Seeds first, then the `top_k` highest out-degree nodes, without repeats.
fn start_nodes(graph: &Graph, top_k: usize) -> Vec<&str> {
    let mut by_degree: Vec<(&str, usize)> = graph
        .nodes()
        .iter()
        .map(|n| (n.address.as_str(), graph.out_degree(&n.address)))
        .collect();
    by_degree.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut starts = Vec::new();
    let mut seen = HashSet::new();
    let seeds = graph.seeds.iter().filter_map(|s| graph.node(s)).map(|n| n.address.as_str());
    for address in seeds.chain(by_degree.into_iter().take(top_k).map(|(a, _)| a)) {
        if seen.insert(address) {
            starts.push(address);
        }
    }
    starts
}

fn canonical_rotation(path: &[&str]) -> Vec<String> {
    (0..path.len())
        .map(|i| {
            path[i..]
                .iter()
                .chain(&path[..i])
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        })
        .min()
        .unwrap_or_default()
}
