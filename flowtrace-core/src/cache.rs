//! Per-address lookup caches shared across crawls.
//!
//! Each cache maps an address to a [`CacheEntry`]. Lookups go through
//! [`AddressCache::get_or_compute`]: a complete entry is returned as is,
//! concurrent misses for the same address share one fetch, an incomplete
//! entry is refetched on the next request, and fetch errors are never stored.

use crate::graph::ActivationLookup;
use chrono::{DateTime, Utc};
use flowtrace_scanner::{AccountInfo, ScanError, TrustLine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub complete: bool,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

/// What a compute function hands back to the cache.
#[derive(Debug, Clone)]
pub struct Fetched<V> {
    pub value: V,
    pub complete: bool,
    pub source: String,
}

impl<V> Fetched<V> {
    pub fn complete(value: V, source: impl Into<String>) -> Self {
        Self {
            value,
            complete: true,
            source: source.into(),
        }
    }

    pub fn partial(value: V, source: impl Into<String>) -> Self {
        Self {
            value,
            complete: false,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub complete: usize,
    pub hits: u64,
    pub misses: u64,
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

pub struct AddressCache<V> {
    name: &'static str,
    slots: Mutex<HashMap<String, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> AddressCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Slot for `key`. An initialized but incomplete slot is swapped for a
    /// fresh one so the caller recomputes; callers arriving while that
    /// recompute runs share it.
    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots();
        let slot = slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        if slot.get().is_some_and(|entry| !entry.complete) {
            *slot = Arc::new(OnceCell::new());
        }
        slot.clone()
    }

    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<CacheEntry<V>, ScanError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<V>, ScanError>>,
    {
        let slot = self.slot(key);
        if let Some(entry) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.clone());
        }

        let entry = slot
            .get_or_try_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("{} cache miss for {}", self.name, key);
                let fetched = compute().await?;
                Ok::<_, ScanError>(CacheEntry {
                    key: key.to_string(),
                    value: fetched.value,
                    complete: fetched.complete,
                    source: fetched.source,
                    fetched_at: Utc::now(),
                })
            })
            .await?;
        Ok(entry.clone())
    }

    /// Peek without fetching.
    pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.slots().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Store an entry directly, replacing whatever was cached for its key.
    pub fn insert(&self, entry: CacheEntry<V>) {
        let key = entry.key.clone();
        self.slots().insert(key, Arc::new(OnceCell::new_with(Some(entry))));
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots();
        CacheStats {
            name: self.name,
            entries: slots.values().filter(|s| s.initialized()).count(),
            complete: slots
                .values()
                .filter(|s| s.get().is_some_and(|e| e.complete))
                .count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// A token the account holds through a trust line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub currency: String,
    pub issuer: String,
    pub balance: f64,
    pub limit: f64,
}

/// A token the account issues, seen from its own trust lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub currency: String,
    pub holders: usize,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub trust_lines: usize,
    pub holdings: Vec<TokenHolding>,
    pub issued: Vec<IssuedToken>,
    /// Issuer obligations from `gateway_balances`, when the server offers it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obligations: Option<BTreeMap<String, f64>>,
}

impl TokenSummary {
    /// Fold trust lines into holdings (positive balance or limit on our side)
    /// and issued tokens (negative balance: the peer holds our IOU).
    pub fn from_lines(lines: &[TrustLine]) -> Self {
        let mut holdings = Vec::new();
        let mut issued: BTreeMap<String, IssuedToken> = BTreeMap::new();

        for line in lines {
            if line.balance < 0.0 {
                let token = issued
                    .entry(line.currency.clone())
                    .or_insert_with(|| IssuedToken {
                        currency: line.currency.clone(),
                        holders: 0,
                        outstanding: 0.0,
                    });
                token.holders += 1;
                token.outstanding += -line.balance;
            } else if line.balance > 0.0 || line.limit > 0.0 {
                holdings.push(TokenHolding {
                    currency: line.currency.clone(),
                    issuer: line.peer.clone(),
                    balance: line.balance,
                    limit: line.limit,
                });
            }
        }

        Self {
            trust_lines: lines.len(),
            holdings,
            issued: issued.into_values().collect(),
            obligations: None,
        }
    }

    pub fn is_issuer(&self) -> bool {
        !self.issued.is_empty() || self.obligations.as_ref().is_some_and(|o| !o.is_empty())
    }
}

/// The three address caches, shared by every crawl in a session.
pub struct AddressCaches {
    /// `None` values are complete "account not found" results.
    pub account_info: AddressCache<Option<AccountInfo>>,
    pub activation: AddressCache<ActivationLookup>,
    pub tokens: AddressCache<TokenSummary>,
}

impl AddressCaches {
    pub fn new() -> Self {
        Self {
            account_info: AddressCache::new("account-info"),
            activation: AddressCache::new("activation"),
            tokens: AddressCache::new("tokens"),
        }
    }

    pub fn clear(&self) {
        self.account_info.clear();
        self.activation.clear();
        self.tokens.clear();
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![
            self.account_info.stats(),
            self.activation.stats(),
            self.tokens.stats(),
        ]
    }
}

impl Default for AddressCaches {
    fn default() -> Self {
        Self::new()
    }
}
