mod common;

use common::*;
use flowtrace_core::analysis::{CycleConfig, PatternConfig};
use flowtrace_core::{Graph, build_graph, detect_patterns, find_cycles, find_path};
use std::collections::HashSet;
use std::sync::Arc;

/// ISSUER -> A -> B -> C -> A, and C -> D.
async fn loop_graph() -> Graph {
    let ledger = Arc::new(StubLedger::new());
    ledger
        .pay(ISSUER, A, 50_000_000)
        .pay(A, B, 10_000_000)
        .pay(B, C, 9_000_000)
        .pay(C, A, 8_000_000)
        .pay(C, D, 1_000_000);
    let ctx = context(ledger);
    build_graph(&seeds(&[ISSUER]), params().with_max_depth(4), &ctx)
        .await
        .unwrap()
}

/// Length of the shortest path by trying every simple path.
fn brute_force_distance(graph: &Graph, src: &str, dst: &str) -> Option<usize> {
    fn walk<'a>(graph: &'a Graph, at: &'a str, dst: &str, seen: &mut Vec<&'a str>, best: &mut Option<usize>) {
        if at == dst {
            let hops = seen.len() - 1;
            *best = Some(best.map_or(hops, |b| b.min(hops)));
            return;
        }
        for next in graph.successors(at) {
            if !seen.contains(&next) {
                seen.push(next);
                walk(graph, next, dst, seen, best);
                seen.pop();
            }
        }
    }
    let mut best = None;
    walk(graph, src, dst, &mut vec![src], &mut best);
    best
}

fn is_edge(graph: &Graph, from: &str, to: &str) -> bool {
    graph.successors(from).contains(&to)
}

#[tokio::test]
async fn test_path_is_shortest() {
    let graph = loop_graph().await;
    let addresses: Vec<String> = graph.nodes().iter().map(|n| n.address.clone()).collect();

    for src in &addresses {
        for dst in &addresses {
            let found = find_path(&graph, src, dst);
            let expected = brute_force_distance(&graph, src, dst);
            assert_eq!(found.as_ref().map(|p| p.len() - 1), expected, "{} -> {}", src, dst);

            if let Some(path) = found {
                assert_eq!(path.first().map(String::as_str), Some(src.as_str()));
                assert_eq!(path.last().map(String::as_str), Some(dst.as_str()));
                assert!(path.windows(2).all(|w| is_edge(&graph, &w[0], &w[1])));
            }
        }
    }

    assert_eq!(
        find_path(&graph, ISSUER, D).unwrap(),
        vec![ISSUER, A, B, C, D]
    );
    assert!(find_path(&graph, D, ISSUER).is_none());
    assert!(find_path(&graph, ISSUER, "rUnknownAccountXXXXXXXXXXXXXX").is_none());
}

#[tokio::test]
async fn test_cycles_are_real_and_unique() {
    let graph = loop_graph().await;
    let report = find_cycles(&graph, &CycleConfig::default());

    assert_eq!(report.cycles.len(), 1);
    assert!(!report.truncated);

    let cycle = &report.cycles[0].path;
    assert_eq!(cycle.len(), 3);
    let members: HashSet<&str> = cycle.iter().map(String::as_str).collect();
    assert_eq!(members, HashSet::from([A, B, C]));

    // consecutive hops and the closing hop are all edges
    for i in 0..cycle.len() {
        let next = &cycle[(i + 1) % cycle.len()];
        assert!(is_edge(&graph, &cycle[i], next));
    }
}

#[tokio::test]
async fn test_cycle_depth_cap() {
    let graph = loop_graph().await;
    let config = CycleConfig {
        max_depth: 2,
        ..CycleConfig::default()
    };
    assert!(find_cycles(&graph, &config).cycles.is_empty());
}

#[tokio::test]
async fn test_findings_on_complete_crawl_carry_no_caveats() {
    let graph = loop_graph().await;
    let findings = detect_patterns(&graph, &PatternConfig::default());
    assert!(!findings.sampled_incomplete);
    assert!(findings.caveats.is_empty());
    assert_eq!(findings.cycles.cycles.len(), 1);
    assert!(findings.risk.score > 0);
}

#[tokio::test]
async fn test_findings_on_truncated_crawl_are_flagged() {
    let ledger = Arc::new(StubLedger::new());
    for _ in 0..6 {
        ledger.pay(ISSUER, A, 1_000_000);
    }
    let ctx = context(ledger);
    let graph = build_graph(&seeds(&[ISSUER]), params().with_per_node(5), &ctx)
        .await
        .unwrap();

    let findings = detect_patterns(&graph, &PatternConfig::default());
    assert!(findings.sampled_incomplete);
    assert!(!findings.caveats.is_empty());

    // five retained payments in consecutive ledgers
    let burst = &findings.bursts[0];
    assert_eq!(burst.address, ISSUER);
    assert_eq!(burst.count, 5);
    assert!(burst.sampled);
}
