mod common;

use common::*;
use flowtrace_core::{ActivationBudget, ActivationLookup, TokenScanBudget};
use flowtrace_scanner::TrustLine;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn budget(max_pages: u32, page_size: u32) -> ActivationBudget {
    ActivationBudget {
        max_pages,
        max_tx: 1_000,
        page_size,
    }
}

#[tokio::test]
async fn test_activation_found_is_complete() {
    let ledger = Arc::new(StubLedger::new());
    ledger.pay(D, A, 20_000_000).pay(A, B, 1_000_000);
    let ctx = context(ledger.clone());

    let entry = ctx.activation(A, &budget(5, 10)).await.unwrap();
    assert!(entry.complete);
    let activation = entry.value.activation().expect("found");
    assert_eq!(activation.activator, D);
    assert_eq!(activation.ledger_index, Some(1000));
    assert_eq!(entry.source, "stub");

    ctx.activation(A, &budget(5, 10)).await.unwrap();
    assert_eq!(ledger.page_calls_for(A), 1);
}

#[tokio::test]
async fn test_activation_not_found_is_cached() {
    let ledger = Arc::new(StubLedger::new());
    ledger.pay(A, B, 1_000_000).pay(A, C, 1_000_000);
    let ctx = context(ledger.clone());

    let entry = ctx.activation(A, &budget(5, 10)).await.unwrap();
    assert_eq!(entry.value, ActivationLookup::NotFound);
    assert!(entry.complete);

    ctx.activation(A, &budget(5, 10)).await.unwrap();
    assert_eq!(ledger.page_calls_for(A), 1);
    let stats = &ctx.caches.stats()[1];
    assert_eq!(stats.name, "activation");
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_activation_budget_miss_is_refetched() {
    let ledger = Arc::new(StubLedger::new());
    ledger
        .pay(A, B, 1_000_000)
        .pay(A, C, 1_000_000)
        .pay(A, D, 1_000_000)
        .pay(D, A, 30_000_000);
    let ctx = context(ledger.clone());

    let entry = ctx.activation(A, &budget(1, 2)).await.unwrap();
    assert_eq!(entry.value, ActivationLookup::NotFoundWithinBudget);
    assert!(!entry.complete);
    assert_eq!(ledger.page_calls_for(A), 1);

    // incomplete entries never satisfy a later lookup
    let entry = ctx.activation(A, &budget(5, 2)).await.unwrap();
    assert!(entry.complete);
    assert_eq!(entry.value.activation().unwrap().activator, D);
    assert_eq!(ledger.page_calls_for(A), 3);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_errors_are_not_cached() {
    let ledger = Arc::new(StubLedger::new());
    ledger.fail_pages_for(A);
    let ctx = context(ledger.clone());

    assert!(ctx.activation(A, &budget(5, 10)).await.is_err());
    assert!(ctx.caches.activation.get(A).is_none());
    assert!(ctx.activation(A, &budget(5, 10)).await.is_err());
    // two lookups, each one attempt plus two retries
    assert_eq!(ledger.page_calls_for(A), 6);
}

#[tokio::test]
async fn test_missing_account_info_is_cached() {
    let ledger = Arc::new(StubLedger::new());
    ledger.info(B, 25_000_000);
    let ctx = context(ledger.clone());

    let missing = ctx.account_info(A).await.unwrap();
    assert!(missing.value.is_none());
    assert!(missing.complete);
    let found = ctx.account_info(B).await.unwrap();
    assert_eq!(found.value.unwrap().balance, 25_000_000);

    ctx.account_info(A).await.unwrap();
    ctx.account_info(B).await.unwrap();
    assert_eq!(ledger.info_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_token_summary_without_gateway_balances() {
    let ledger = Arc::new(StubLedger::new());
    ledger.lines(
        A,
        vec![TrustLine {
            peer: ISSUER.to_string(),
            currency: "USD".to_string(),
            balance: 12.0,
            limit: 100.0,
        }],
    );
    let ctx = context(ledger.clone());

    let entry = ctx.token_summary(A, &TokenScanBudget::default()).await.unwrap();
    assert!(entry.complete);
    assert!(entry.source.contains("unavailable"));
    assert!(entry.value.obligations.is_none());
    assert_eq!(entry.value.holdings.len(), 1);
    assert!(!entry.value.is_issuer());
}

#[tokio::test]
async fn test_token_summary_page_budget_marks_partial() {
    let ledger = Arc::new(StubLedger::new());
    let lines = (0..5)
        .map(|i| TrustLine {
            peer: ISSUER.to_string(),
            currency: format!("T{}", i),
            balance: 1.0,
            limit: 10.0,
        })
        .collect();
    ledger.lines(A, lines);
    let ctx = context(ledger.clone());

    let entry = ctx
        .token_summary(A, &TokenScanBudget { max_pages: 1 })
        .await
        .unwrap();
    assert!(!entry.complete);
    assert_eq!(entry.value.trust_lines, 2);
    assert_eq!(ledger.lines_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shared_caches_across_contexts() {
    let ledger = Arc::new(StubLedger::new());
    ledger.info(A, 1_000_000);
    let first = context(ledger.clone());
    let second = context(ledger.clone()).with_caches(first.caches.clone());

    first.account_info(A).await.unwrap();
    second.account_info(A).await.unwrap();
    assert_eq!(ledger.info_calls.load(Ordering::SeqCst), 1);

    second.caches.clear();
    second.account_info(A).await.unwrap();
    assert_eq!(ledger.info_calls.load(Ordering::SeqCst), 2);
}
