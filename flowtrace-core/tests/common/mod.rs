// In-memory ledger used by the builder and cache tests
#![allow(dead_code)]

use async_trait::async_trait;
use flowtrace_core::{BuildParams, CrawlContext};
use flowtrace_scanner::{
    AccountInfo, Cursor, GatewayBalances, LedgerGateway, LinesPage, RequestScheduler, Result,
    ScanError, SchedulerConfig, TrustLine, TxPage, TxQuery,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ISSUER: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
pub const A: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
pub const B: &str = "rN7n7otQDd6FczFgLdSqtcsAUxDkw6fzRH";
pub const C: &str = "rDsbeomae4FXwgQTJp9Rs64Qg9vDiTCdBv";
pub const D: &str = "rEb8TK3gBgk5auZkwc6sHnwrGVJH8DuaLh";

pub type PageHook = Box<dyn Fn(&str) + Send + Sync>;

/// Ledger history kept oldest-first per account. A transaction appears in the
/// history of its sender and of its destination, as `account_tx` reports it.
#[derive(Default)]
pub struct StubLedger {
    history: Mutex<HashMap<String, Vec<Value>>>,
    infos: Mutex<HashMap<String, AccountInfo>>,
    lines: Mutex<HashMap<String, Vec<TrustLine>>>,
    obligations: Mutex<HashMap<String, BTreeMap<String, f64>>>,
    failing: Mutex<HashSet<String>>,
    failing_info: Mutex<HashSet<String>>,
    next_ledger: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub info_calls: AtomicUsize,
    pub lines_calls: AtomicUsize,
    page_calls_by_account: Mutex<HashMap<String, usize>>,
    on_page: Mutex<Option<PageHook>>,
    delay: Mutex<Option<Duration>>,
}

impl StubLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.next_ledger.store(1_000, Ordering::SeqCst);
        ledger
    }

    fn push(&self, entry: Value, parties: &[&str]) {
        let mut history = self.history.lock().unwrap();
        let mut seen = HashSet::new();
        for party in parties {
            if seen.insert(*party) {
                history.entry(party.to_string()).or_default().push(entry.clone());
            }
        }
    }

    fn ledger(&self) -> i64 {
        self.next_ledger.fetch_add(1, Ordering::SeqCst) as i64
    }

    /// Applied XRP payment in the next ledger.
    pub fn pay(&self, from: &str, to: &str, drops: u64) -> &Self {
        self.pay_with_result(from, to, drops, "tesSUCCESS")
    }

    pub fn pay_with_result(&self, from: &str, to: &str, drops: u64, result: &str) -> &Self {
        let ledger = self.ledger();
        let entry = json!({
            "tx": {
                "TransactionType": "Payment",
                "Account": from,
                "Destination": to,
                "Amount": drops.to_string(),
                "hash": format!("TX{}", ledger),
                "ledger_index": ledger,
                "date": 760_000_000 + ledger,
            },
            "meta": { "TransactionResult": result, "delivered_amount": drops.to_string() }
        });
        self.push(entry, &[from, to]);
        self
    }

    pub fn trust(&self, from: &str, issuer: &str, currency: &str) -> &Self {
        let ledger = self.ledger();
        let entry = json!({
            "tx": {
                "TransactionType": "TrustSet",
                "Account": from,
                "LimitAmount": { "currency": currency, "issuer": issuer, "value": "1000" },
                "hash": format!("TX{}", ledger),
                "ledger_index": ledger,
            },
            "meta": { "TransactionResult": "tesSUCCESS" }
        });
        self.push(entry, &[from, issuer]);
        self
    }

    pub fn info(&self, address: &str, drops: u64) -> &Self {
        self.infos.lock().unwrap().insert(
            address.to_string(),
            AccountInfo {
                balance: drops,
                domain: None,
                sequence: 1,
                owner_count: 0,
            },
        );
        self
    }

    pub fn lines(&self, address: &str, lines: Vec<TrustLine>) -> &Self {
        self.lines.lock().unwrap().insert(address.to_string(), lines);
        self
    }

    pub fn obligations(&self, address: &str, obligations: BTreeMap<String, f64>) -> &Self {
        self.obligations
            .lock()
            .unwrap()
            .insert(address.to_string(), obligations);
        self
    }

    /// Every transaction page for `address` fails with a retryable error.
    pub fn fail_pages_for(&self, address: &str) -> &Self {
        self.failing.lock().unwrap().insert(address.to_string());
        self
    }

    /// `account_info` for `address` fails with a retryable error.
    pub fn fail_info_for(&self, address: &str) -> &Self {
        self.failing_info.lock().unwrap().insert(address.to_string());
        self
    }

    pub fn on_page(&self, hook: PageHook) {
        *self.on_page.lock().unwrap() = Some(hook);
    }

    pub fn with_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn page_calls_for(&self, address: &str) -> usize {
        self.page_calls_by_account
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for StubLedger {
    async fn account_info(&self, address: &str) -> Result<Option<AccountInfo>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.failing_info.lock().unwrap().contains(address) {
            return Err(ScanError::Unavailable("stub info outage".into()));
        }
        Ok(self.infos.lock().unwrap().get(address).cloned())
    }

    async fn account_lines(&self, address: &str, cursor: Option<Cursor>) -> Result<LinesPage> {
        self.lines_calls.fetch_add(1, Ordering::SeqCst);
        let all = self.lines.lock().unwrap().get(address).cloned().unwrap_or_default();
        let offset = cursor.and_then(|c| c.0.as_u64()).unwrap_or(0) as usize;
        let end = (offset + 2).min(all.len());
        Ok(LinesPage {
            lines: all[offset.min(end)..end].to_vec(),
            next_cursor: (end < all.len()).then(|| Cursor(json!(end))),
        })
    }

    async fn paged_transactions(&self, address: &str, query: TxQuery) -> Result<TxPage> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .page_calls_by_account
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default() += 1;
        if let Some(hook) = self.on_page.lock().unwrap().as_ref() {
            hook(address);
        }
        self.pause().await;

        if self.failing.lock().unwrap().contains(address) {
            return Err(ScanError::Unavailable("stub outage".into()));
        }

        let mut entries: Vec<Value> = self
            .history
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| {
                let ledger = e["tx"]["ledger_index"].as_i64().unwrap_or(0);
                query.ledger_min.is_none_or(|min| ledger >= min)
                    && query.ledger_max.is_none_or(|max| ledger <= max)
            })
            .collect();
        if !query.forward {
            entries.reverse();
        }

        let offset = query.cursor.and_then(|c| c.0.as_u64()).unwrap_or(0) as usize;
        let limit = query.limit.max(1) as usize;
        let end = (offset + limit).min(entries.len());
        let start = offset.min(end);
        Ok(TxPage {
            transactions: entries[start..end].to_vec(),
            next_cursor: (end < entries.len()).then(|| Cursor(json!(end))),
        })
    }

    async fn gateway_balances(&self, address: &str) -> Result<Option<GatewayBalances>> {
        Ok(self
            .obligations
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .map(|obligations| GatewayBalances { obligations }))
    }

    fn source_name(&self) -> &str {
        "stub"
    }
}

pub fn fast_scheduler() -> RequestScheduler {
    RequestScheduler::new(
        SchedulerConfig::default()
            .with_max_concurrent(4)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
            .with_default_retries(2),
    )
}

pub fn context(ledger: Arc<StubLedger>) -> CrawlContext {
    CrawlContext::new(ledger, fast_scheduler())
}

pub fn seeds(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(|a| a.to_string()).collect()
}

pub fn params() -> BuildParams {
    BuildParams::default()
}
