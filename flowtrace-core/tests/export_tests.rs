mod common;

use common::*;
use flowtrace_core::export::SNAPSHOT_FORMAT_VERSION;
use flowtrace_core::{ActivationLookup, BuildStatus, ExportError, GraphSnapshot, build_graph, export_graph, to_dot};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_snapshot_round_trip_through_disk() {
    let ledger = Arc::new(StubLedger::new());
    ledger
        .pay(D, ISSUER, 100_000_000)
        .pay(ISSUER, A, 10_000_000)
        .pay(A, B, 4_000_000)
        .pay(B, A, 4_000_000)
        .info(ISSUER, 86_000_000);
    let ctx = context(ledger);
    let graph = build_graph(&seeds(&[ISSUER, "junk"]), params(), &ctx)
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshots").join("crawl.json");
    let snapshot = export_graph(&graph);
    snapshot.write_to(&path).unwrap();
    assert!(path.exists());

    let restored = GraphSnapshot::read_from(&path).unwrap();
    assert_eq!(restored, snapshot);
    assert_eq!(restored.format_version, SNAPSHOT_FORMAT_VERSION);
    assert_eq!(restored.rejected_seeds, vec!["junk".to_string()]);

    let rebuilt = restored.into_graph().unwrap();
    assert!(rebuilt.verify().is_ok());
    assert_eq!(rebuilt.status, BuildStatus::Complete);
    assert_eq!(rebuilt.edges(), graph.edges());
    assert_eq!(rebuilt.nodes(), graph.nodes());
    for node in graph.nodes() {
        assert_eq!(rebuilt.successors(&node.address), graph.successors(&node.address));
        assert_eq!(rebuilt.predecessors(&node.address), graph.predecessors(&node.address));
    }

    let issuer = rebuilt.node(ISSUER).unwrap();
    assert_eq!(issuer.account_info.as_ref().unwrap().balance, 86_000_000);
    assert!(matches!(
        issuer.activation,
        Some(ActivationLookup::Found(ref a)) if a.activator == D
    ));
}

#[test]
fn test_read_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        GraphSnapshot::read_from(&path),
        Err(ExportError::Serialization(_))
    ));
    assert!(matches!(
        GraphSnapshot::read_from(&dir.path().join("missing.json")),
        Err(ExportError::Io(_))
    ));
}

#[tokio::test]
async fn test_dot_has_one_arc_per_edge() {
    let ledger = Arc::new(StubLedger::new());
    ledger.pay(ISSUER, A, 1_000_000).pay(ISSUER, A, 2_000_000).pay(ISSUER, B, 3_000_000);
    let ctx = context(ledger);
    let graph = build_graph(&seeds(&[ISSUER]), params(), &ctx).await.unwrap();

    let dot = to_dot(&graph);
    assert_eq!(dot.matches(" -> ").count(), 3);
    assert!(dot.contains("Payment 3 XRP"));
}
