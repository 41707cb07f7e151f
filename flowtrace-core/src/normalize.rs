// Normalization of raw ledger transaction entries

use crate::amount::Amount;
use chrono::{DateTime, TimeZone, Utc};
use flowtrace_scanner::is_valid_address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z).
pub const LEDGER_EPOCH_OFFSET: i64 = 946_684_800;

pub const SUCCESS_RESULT: &str = "tesSUCCESS";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxKind {
    Payment,
    TrustSet,
    OfferCreate,
    Other(String),
}

impl TxKind {
    pub fn as_str(&self) -> &str {
        match self {
            TxKind::Payment => "Payment",
            TxKind::TrustSet => "TrustSet",
            TxKind::OfferCreate => "OfferCreate",
            TxKind::Other(name) => name,
        }
    }
}

impl From<String> for TxKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Payment" => TxKind::Payment,
            "TrustSet" => TxKind::TrustSet,
            "OfferCreate" => TxKind::OfferCreate,
            _ => TxKind::Other(name),
        }
    }
}

impl From<TxKind> for String {
    fn from(kind: TxKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction reduced to the fields the crawler and analysis need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTx {
    pub hash: String,
    pub kind: TxKind,
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Delivered amount for payments, limit for trust lines, offered amount
    /// (TakerGets) for offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taker_gets: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taker_pays: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl LedgerTx {
    /// Transactions without metadata are treated as applied; the ledger only
    /// returns validated history.
    pub fn is_success(&self) -> bool {
        self.result.as_deref().is_none_or(|r| r == SUCCESS_RESULT)
    }

    /// The other party of this transaction, by kind:
    /// Payment -> Destination, TrustSet -> LimitAmount issuer, OfferCreate ->
    /// issuer of TakerGets, else of TakerPays. Malformed addresses and
    /// self-references yield `None`.
    pub fn counterparty(&self) -> Option<&str> {
        let candidate = match self.kind {
            TxKind::Payment => self.destination.as_deref(),
            TxKind::TrustSet => self.limit_amount.as_ref()?.issuer.as_deref(),
            TxKind::OfferCreate => self
                .taker_gets
                .as_ref()
                .and_then(|a| a.issuer.as_deref())
                .or_else(|| self.taker_pays.as_ref().and_then(|a| a.issuer.as_deref())),
            TxKind::Other(_) => None,
        }?;

        (candidate != self.account && is_valid_address(candidate)).then_some(candidate)
    }

    /// XRP moved or offered by this transaction, if any side is native.
    pub fn xrp_value(&self) -> Option<f64> {
        match self.kind {
            TxKind::Payment => self.amount.as_ref()?.xrp_equivalent(),
            TxKind::OfferCreate => self
                .taker_gets
                .as_ref()
                .and_then(Amount::xrp_equivalent)
                .or_else(|| self.taker_pays.as_ref().and_then(Amount::xrp_equivalent)),
            _ => None,
        }
    }

    pub fn is_outgoing_from(&self, address: &str) -> bool {
        self.account == address
    }

    /// An applied Payment delivered to `address` from someone else.
    pub fn is_incoming_payment_to(&self, address: &str) -> bool {
        self.kind == TxKind::Payment
            && self.is_success()
            && self.account != address
            && self.destination.as_deref() == Some(address)
    }
}

pub fn ledger_time_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds.checked_add(LEDGER_EPOCH_OFFSET)?, 0).single()
}

/// Accepts both `{ tx, meta }` and `{ tx_json, hash, ledger_index, meta }`
/// entry shapes. Returns `None` for entries without a type or sender.
pub fn normalize(entry: &Value) -> Option<LedgerTx> {
    let tx = entry
        .get("tx_json")
        .or_else(|| entry.get("tx"))
        .unwrap_or(entry);
    let meta = entry.get("meta").filter(|m| m.is_object());

    let kind = TxKind::from(tx.get("TransactionType")?.as_str()?.to_string());
    let account = tx.get("Account")?.as_str()?.to_string();

    let hash = tx
        .get("hash")
        .or_else(|| entry.get("hash"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let ledger_index = tx
        .get("ledger_index")
        .or_else(|| entry.get("ledger_index"))
        .and_then(Value::as_i64);

    let timestamp = tx
        .get("date")
        .or_else(|| entry.get("date"))
        .and_then(Value::as_i64)
        .and_then(ledger_time_to_utc)
        .or_else(|| {
            entry
                .get("close_time_iso")
                .and_then(Value::as_str)
                .and_then(|iso| DateTime::parse_from_rfc3339(iso).ok())
                .map(|dt| dt.with_timezone(&Utc))
        });

    let delivered = meta
        .and_then(|m| m.get("delivered_amount").or_else(|| m.get("DeliveredAmount")))
        .and_then(Amount::from_json);
    let declared = tx
        .get("Amount")
        .or_else(|| tx.get("DeliverMax"))
        .and_then(Amount::from_json);

    let limit_amount = tx.get("LimitAmount").and_then(Amount::from_json);
    let taker_gets = tx.get("TakerGets").and_then(Amount::from_json);
    let taker_pays = tx.get("TakerPays").and_then(Amount::from_json);

    let amount = match kind {
        TxKind::Payment => delivered.or(declared),
        TxKind::TrustSet => limit_amount.clone(),
        TxKind::OfferCreate => taker_gets.clone(),
        TxKind::Other(_) => declared,
    };

    Some(LedgerTx {
        hash,
        kind,
        account,
        destination: tx
            .get("Destination")
            .and_then(Value::as_str)
            .map(str::to_string),
        amount,
        limit_amount,
        taker_gets,
        taker_pays,
        ledger_index,
        timestamp,
        result: meta
            .and_then(|m| m.get("TransactionResult"))
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Normalize a page, dropping entries that are not transactions.
pub fn normalize_page(entries: &[Value]) -> Vec<LedgerTx> {
    entries.iter().filter_map(normalize).collect()
}
