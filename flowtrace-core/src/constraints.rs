use crate::error::{BuildError, Result};
use crate::normalize::LedgerTx;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Per-crawl transaction filter. A transaction it rejects never becomes a
/// node or an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub ledger_min: Option<i64>,
    pub ledger_max: Option<i64>,
    /// Inclusive, compared against the UTC close date.
    pub date_min: Option<NaiveDate>,
    /// Inclusive, compared against the UTC close date.
    pub date_max: Option<NaiveDate>,
    /// Minimum XRP moved. Transactions with no native side are not filtered.
    pub min_xrp: Option<f64>,
}

impl Constraints {
    pub fn with_ledger_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.ledger_min = min;
        self.ledger_max = max;
        self
    }

    pub fn with_date_range(mut self, min: Option<NaiveDate>, max: Option<NaiveDate>) -> Self {
        self.date_min = min;
        self.date_max = max;
        self
    }

    pub fn with_min_xrp(mut self, min_xrp: Option<f64>) -> Self {
        self.min_xrp = min_xrp;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Constraints::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.ledger_min, self.ledger_max)
            && min > max
        {
            return Err(BuildError::InvalidConstraints(format!(
                "ledger min {} is above ledger max {}",
                min, max
            )));
        }
        if let (Some(min), Some(max)) = (self.date_min, self.date_max)
            && min > max
        {
            return Err(BuildError::InvalidConstraints(format!(
                "date min {} is after date max {}",
                min, max
            )));
        }
        if let Some(min_xrp) = self.min_xrp
            && (!min_xrp.is_finite() || min_xrp < 0.0)
        {
            return Err(BuildError::InvalidConstraints(format!(
                "minimum XRP amount {} must be a non-negative number",
                min_xrp
            )));
        }
        Ok(())
    }

    /// A bound that cannot be checked (missing ledger index or close time)
    /// rejects the transaction.
    pub fn admits(&self, tx: &LedgerTx) -> bool {
        if self.ledger_min.is_some() || self.ledger_max.is_some() {
            let Some(index) = tx.ledger_index else {
                return false;
            };
            if self.ledger_min.is_some_and(|min| index < min)
                || self.ledger_max.is_some_and(|max| index > max)
            {
                return false;
            }
        }

        if self.date_min.is_some() || self.date_max.is_some() {
            let Some(date) = tx.timestamp.map(|ts| ts.date_naive()) else {
                return false;
            };
            if self.date_min.is_some_and(|min| date < min)
                || self.date_max.is_some_and(|max| date > max)
            {
                return false;
            }
        }

        if let (Some(min_xrp), Some(value)) = (self.min_xrp, tx.xrp_value())
            && value < min_xrp
        {
            return false;
        }

        true
    }
}

/// Parse `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its UTC date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_utc().date()))
        .map_err(|_| BuildError::InvalidConstraints(format!("not an ISO date: {}", raw)))
}
