//! Remote ledger capability consumed by the crawler.
//!
//! The crawler never talks to the network directly; it goes through a
//! [`LedgerGateway`]. Implementations must distinguish failure from an
//! exhausted result: a page whose `next_cursor` is `None` means "no more data",
//! and must only ever come from a successful response.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque pagination marker handed back by the ledger server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub Value);

/// Account metadata snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Balance in drops.
    pub balance: u64,
    pub domain: Option<String>,
    pub sequence: u32,
    pub owner_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLine {
    pub peer: String,
    pub currency: String,
    pub balance: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LinesPage {
    pub lines: Vec<TrustLine>,
    pub next_cursor: Option<Cursor>,
}

/// Issuer-side totals reported by `gateway_balances`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayBalances {
    /// Outstanding obligations per currency code.
    pub obligations: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TxQuery {
    pub cursor: Option<Cursor>,
    /// `true` walks history oldest-first.
    pub forward: bool,
    pub ledger_min: Option<i64>,
    pub ledger_max: Option<i64>,
    pub limit: u32,
}

impl TxQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    pub fn with_ledger_bounds(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.ledger_min = min;
        self.ledger_max = max;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One page of raw transaction entries. Each entry is the server's
/// `{ tx | tx_json, meta, hash?, ledger_index?, ... }` object; normalization
/// happens in the core crate.
#[derive(Debug, Clone, Default)]
pub struct TxPage {
    pub transactions: Vec<Value>,
    pub next_cursor: Option<Cursor>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// `Ok(None)` when the account does not exist on the ledger.
    async fn account_info(&self, address: &str) -> Result<Option<AccountInfo>>;

    async fn account_lines(&self, address: &str, cursor: Option<Cursor>) -> Result<LinesPage>;

    async fn paged_transactions(&self, address: &str, query: TxQuery) -> Result<TxPage>;

    /// Best-effort issuer obligations. `Ok(None)` when the server does not
    /// offer the lookup.
    async fn gateway_balances(&self, _address: &str) -> Result<Option<GatewayBalances>> {
        Ok(None)
    }

    /// Short name used in cache entry provenance and logs.
    fn source_name(&self) -> &str {
        "gateway"
    }
}
