// Flow pattern heuristics: fan-in/out, hubs, bursts, ping-pong

use crate::amount::Amount;
use crate::graph::Graph;
use crate::normalize::TxKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeFinding {
    pub address: String,
    /// Distinct counterparties.
    pub degree: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubFinding {
    pub address: String,
    pub parents: usize,
    pub children: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstFinding {
    pub address: String,
    /// Most retained transactions inside one window.
    pub count: usize,
    pub first_ledger: i64,
    pub last_ledger: i64,
    /// The node's history was not read to the end.
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedAmount {
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// 0 to 100.
    pub score: u8,
    pub reasons: Vec<String>,
}

impl RiskScore {
    fn add(&mut self, points: u32, reason: String) {
        self.score = (u32::from(self.score) + points).min(100) as u8;
        self.reasons.push(reason);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPongFinding {
    /// Lexicographically smaller address of the pair.
    pub a: String,
    pub b: String,
    pub a_to_b: usize,
    pub b_to_a: usize,
    pub repeated_amounts: Vec<RepeatedAmount>,
    pub risk: RiskScore,
}

impl PingPongFinding {
    /// Payments in both directions together, zero for a one-way pair.
    pub fn reciprocal_count(&self) -> usize {
        if self.is_reciprocal() { self.a_to_b + self.b_to_a } else { 0 }
    }

    pub fn is_reciprocal(&self) -> bool {
        self.a_to_b > 0 && self.b_to_a > 0
    }
}

/// Nodes whose distinct-target count meets `threshold`.
pub fn fan_out(graph: &Graph, threshold: usize) -> Vec<DegreeFinding> {
    let mut findings: Vec<DegreeFinding> = graph
        .nodes()
        .iter()
        .map(|n| DegreeFinding {
            address: n.address.clone(),
            degree: graph.out_degree(&n.address),
            edges: graph.outgoing_edges(&n.address).count(),
        })
        .filter(|f| f.degree > 0 && f.degree >= threshold)
        .collect();
    findings.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.address.cmp(&b.address)));
    findings
}

/// Nodes whose distinct-source count meets `threshold`.
pub fn fan_in(graph: &Graph, threshold: usize) -> Vec<DegreeFinding> {
    let mut findings: Vec<DegreeFinding> = graph
        .nodes()
        .iter()
        .map(|n| DegreeFinding {
            address: n.address.clone(),
            degree: graph.in_degree(&n.address),
            edges: graph.incoming_edges(&n.address).count(),
        })
        .filter(|f| f.degree > 0 && f.degree >= threshold)
        .collect();
    findings.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.address.cmp(&b.address)));
    findings
}

/// Collection points: many distinct parents, few distinct children and a high
/// edge volume through the node.
pub fn hubs(graph: &Graph, min_parents: usize, max_children: usize, min_edges: usize) -> Vec<HubFinding> {
    let mut findings: Vec<HubFinding> = graph
        .nodes()
        .iter()
        .filter_map(|n| {
            let parents = graph.in_degree(&n.address);
            let children = graph.out_degree(&n.address);
            let edges =
                graph.incoming_edges(&n.address).count() + graph.outgoing_edges(&n.address).count();
            (parents >= min_parents && children <= max_children && edges >= min_edges).then(|| {
                HubFinding {
                    address: n.address.clone(),
                    parents,
                    children,
                    edges,
                }
            })
        })
        .collect();
    findings.sort_by(|a, b| b.parents.cmp(&a.parents).then(a.address.cmp(&b.address)));
    findings
}

/// Densest window of `window_ledgers` ledgers over each node's retained
/// outgoing transactions.
pub fn bursts(graph: &Graph, window_ledgers: u64, threshold: usize) -> Vec<BurstFinding> {
    let mut findings = Vec::new();
    for node in graph.nodes() {
        let mut ledgers: Vec<i64> = node.outgoing.iter().filter_map(|tx| tx.ledger_index).collect();
        if ledgers.len() < threshold.max(1) {
            continue;
        }
        ledgers.sort_unstable();

        let (mut best_lo, mut best_hi) = (0usize, 0usize);
        let mut lo = 0;
        for hi in 0..ledgers.len() {
            while ledgers[hi].abs_diff(ledgers[lo]) > window_ledgers {
                lo += 1;
            }
            if hi - lo > best_hi - best_lo {
                best_lo = lo;
                best_hi = hi;
            }
        }
        let count = best_hi - best_lo + 1;
        if count >= threshold {
            findings.push(BurstFinding {
                address: node.address.clone(),
                count,
                first_ledger: ledgers[best_lo],
                last_ledger: ledgers[best_hi],
                sampled: !node.scan.complete,
            });
        }
    }
    findings.sort_by(|a, b| b.count.cmp(&a.count).then(a.address.cmp(&b.address)));
    findings
}

/// Reciprocal Payment pairs and identical amounts repeated on one ordered
/// pair, scored 0 to 100. A one-way pair is reported only for its repeated
/// amounts.
pub fn ping_pong(graph: &Graph, min_reciprocal: usize, min_repeats: usize) -> Vec<PingPongFinding> {
    let mut directed: HashMap<(&str, &str), usize> = HashMap::new();
    let mut amounts: HashMap<(&str, &str), BTreeMap<String, (Amount, usize)>> = HashMap::new();

    for edge in graph.edges().iter().filter(|e| e.kind == TxKind::Payment) {
        let key = (edge.from.as_str(), edge.to.as_str());
        *directed.entry(key).or_default() += 1;
        if let Some(amount) = &edge.amount {
            amounts
                .entry(key)
                .or_default()
                .entry(amount.fingerprint())
                .or_insert_with(|| (amount.clone(), 0))
                .1 += 1;
        }
    }

    let pairs: BTreeSet<(&str, &str)> = directed
        .keys()
        .map(|&(from, to)| if from <= to { (from, to) } else { (to, from) })
        .collect();

    let mut findings = Vec::new();
    for (a, b) in pairs {
        let forward = directed.get(&(a, b)).copied().unwrap_or(0);
        let backward = directed.get(&(b, a)).copied().unwrap_or(0);
        let reciprocal = forward > 0 && backward > 0 && forward + backward >= min_reciprocal;

        let mut repeated = Vec::new();
        for (from, to) in [(a, b), (b, a)] {
            if let Some(seen) = amounts.get(&(from, to)) {
                repeated.extend(seen.values().filter(|(_, n)| *n >= min_repeats.max(2)).map(
                    |(amount, n)| RepeatedAmount {
                        from: from.to_string(),
                        to: to.to_string(),
                        amount: amount.clone(),
                        count: *n,
                    },
                ));
            }
        }
        if !reciprocal && repeated.is_empty() {
            continue;
        }

        let risk = score_pair(forward, backward, reciprocal, &repeated);
        findings.push(PingPongFinding {
            a: a.to_string(),
            b: b.to_string(),
            a_to_b: forward,
            b_to_a: backward,
            repeated_amounts: repeated,
            risk,
        });
    }

    findings.sort_by(|x, y| {
        y.risk
            .score
            .cmp(&x.risk.score)
            .then(y.reciprocal_count().cmp(&x.reciprocal_count()))
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });
    findings
}

fn score_pair(forward: usize, backward: usize, reciprocal: bool, repeated: &[RepeatedAmount]) -> RiskScore {
    let mut risk = RiskScore::default();
    if reciprocal {
        let total = forward + backward;
        let extra = (total.saturating_sub(2) as u32).min(5);
        risk.add(
            25 + 5 * extra,
            format!("{} payments back and forth ({} one way, {} the other)", total, forward, backward),
        );
        if forward.min(backward) >= 2 {
            risk.add(15, "funds returned more than once".to_string());
        }
    }
    for r in repeated {
        let points = (10 * (r.count as u32).saturating_sub(1)).min(30);
        risk.add(points, format!("{} sent {} times on one leg", r.amount, r.count));
    }
    risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildParams;
    use crate::graph::Edge;

    const A: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
    const B: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const C: &str = "rN7n7otQDd6FczFgLdSqtcsAUxDkw6fzRH";
    const D: &str = "rDsbeomae4FXwgQTJp9Rs64Qg9vDiTCdBv";
    const E: &str = "rEb8TK3gBgk5auZkwc6sHnwrGVJH8DuaLh";

    fn graph(edges: &[(&str, &str, f64)]) -> Graph {
        let mut graph = Graph::new(vec![A.to_string()], BuildParams::default());
        for (i, (from, to, xrp)) in edges.iter().enumerate() {
            graph.ensure_node(from, 0);
            graph.try_add_edge(
                Edge {
                    from: from.to_string(),
                    to: to.to_string(),
                    kind: TxKind::Payment,
                    amount: Some(Amount::xrp(*xrp)),
                    ledger_index: Some(100 + i as i64),
                    timestamp: None,
                    tx_hash: format!("H{}", i),
                },
                1,
            );
        }
        graph
    }

    #[test]
    fn test_fan_out_counts_distinct_targets() {
        let graph = graph(&[(A, B, 1.0), (A, B, 2.0), (A, C, 1.0), (A, D, 1.0)]);
        let findings = fan_out(&graph, 3);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].address, A);
        assert_eq!(findings[0].degree, 3);
        assert_eq!(findings[0].edges, 4);
        assert!(fan_out(&graph, 4).is_empty());
    }

    #[test]
    fn test_fan_in_and_hub() {
        let graph = graph(&[(A, E, 1.0), (B, E, 1.0), (C, E, 1.0), (D, E, 1.0), (E, A, 9.0)]);
        let fan = fan_in(&graph, 4);
        assert_eq!(fan[0].address, E);
        let hub = hubs(&graph, 4, 1, 5);
        assert_eq!(hub.len(), 1);
        assert_eq!(hub[0].parents, 4);
        assert_eq!(hub[0].children, 1);
        assert!(hubs(&graph, 4, 1, 6).is_empty());
    }

    #[test]
    fn test_burst_window() {
        let mut graph = graph(&[(A, B, 1.0)]);
        let node = graph.node_mut(A).unwrap();
        for ledger in [10, 12, 13, 15, 90, 200] {
            node.outgoing.push(crate::normalize::LedgerTx {
                hash: format!("T{}", ledger),
                kind: TxKind::Payment,
                account: A.to_string(),
                destination: Some(B.to_string()),
                amount: Some(Amount::xrp(1.0)),
                limit_amount: None,
                taker_gets: None,
                taker_pays: None,
                ledger_index: Some(ledger),
                timestamp: None,
                result: None,
            });
        }
        node.scan.complete = false;

        let findings = bursts(&graph, 5, 4);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].count, 4);
        assert_eq!(findings[0].first_ledger, 10);
        assert_eq!(findings[0].last_ledger, 15);
        assert!(findings[0].sampled);
        assert!(bursts(&graph, 5, 5).is_empty());
    }

    #[test]
    fn test_burst_window_edges() {
        let mut graph = graph(&[(A, B, 1.0)]);
        let node = graph.node_mut(A).unwrap();
        for ledger in [i64::MIN, 7, 7, 7, i64::MAX] {
            node.outgoing.push(crate::normalize::LedgerTx {
                hash: format!("T{}", ledger),
                kind: TxKind::Payment,
                account: A.to_string(),
                destination: Some(B.to_string()),
                amount: Some(Amount::xrp(1.0)),
                limit_amount: None,
                taker_gets: None,
                taker_pays: None,
                ledger_index: Some(ledger),
                timestamp: None,
                result: None,
            });
        }

        // a zero-width window only groups transactions in the same ledger
        let same_ledger = bursts(&graph, 0, 3);
        assert_eq!(same_ledger.len(), 1);
        assert_eq!(same_ledger[0].count, 3);
        assert_eq!(same_ledger[0].first_ledger, 7);

        let everything = bursts(&graph, u64::MAX, 5);
        assert_eq!(everything[0].count, 5);
    }

    #[test]
    fn test_ping_pong_scores_reciprocal_pairs() {
        let graph = graph(&[(A, B, 5.0), (A, B, 5.0), (B, A, 3.0), (A, C, 1.0)]);
        let findings = ping_pong(&graph, 2, 2);
        assert_eq!(findings.len(), 1);
        let pair = &findings[0];
        assert_eq!(pair.reciprocal_count(), 3);
        assert_eq!(pair.repeated_amounts.len(), 1);
        assert_eq!(pair.repeated_amounts[0].count, 2);
        assert!(pair.risk.score > 0 && pair.risk.score <= 100);
        assert!(!pair.risk.reasons.is_empty());
    }

    #[test]
    fn test_one_way_flow_reports_repeated_amounts_only() {
        let graph = graph(&[(A, B, 5.0); 6]);
        let findings = ping_pong(&graph, 2, 2);
        assert_eq!(findings.len(), 1);
        let pair = &findings[0];
        assert!(!pair.is_reciprocal());
        assert_eq!(pair.reciprocal_count(), 0);
        assert_eq!(pair.repeated_amounts.len(), 1);
        assert_eq!(pair.repeated_amounts[0].count, 6);
        // no back-and-forth points, only the repeated amount
        assert_eq!(pair.risk.score, 30);
        assert_eq!(pair.risk.reasons.len(), 1);
    }

    #[test]
    fn test_one_way_distinct_amounts_are_not_reported() {
        let graph = graph(&[(A, B, 1.0), (A, B, 2.0), (A, B, 3.0)]);
        assert!(ping_pong(&graph, 2, 2).is_empty());
    }

    #[test]
    fn test_one_way_pair_ranks_below_reciprocal_pair() {
        let graph = graph(&[(A, B, 5.0), (A, B, 5.0), (C, D, 1.0), (D, C, 2.0)]);
        let findings = ping_pong(&graph, 2, 2);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].is_reciprocal());
        assert!(!findings[1].is_reciprocal());
        assert!(findings[0].risk.score > findings[1].risk.score);
    }

    #[test]
    fn test_risk_score_is_capped() {
        let mut edges = Vec::new();
        for _ in 0..20 {
            edges.push((A, B, 1.0));
            edges.push((B, A, 1.0));
        }
        let graph = graph(&edges);
        let findings = ping_pong(&graph, 2, 2);
        assert_eq!(findings[0].risk.score, 100);
    }
}
