// Ledger amount parsing and formatting

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const XRP: &str = "XRP";
pub const DROPS_PER_XRP: f64 = 1_000_000.0;

/// A native (XRP) or issued-currency amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Amount {
    pub fn xrp(value: f64) -> Self {
        Self {
            value,
            currency: XRP.to_string(),
            issuer: None,
        }
    }

    pub fn from_drops(drops: u64) -> Self {
        Self::xrp(drops as f64 / DROPS_PER_XRP)
    }

    pub fn issued(value: f64, currency: &str, issuer: &str) -> Self {
        Self {
            value,
            currency: decode_currency(currency),
            issuer: Some(issuer.to_string()),
        }
    }

    /// Parse the wire form: a string of drops, or an
    /// `{ value, currency, issuer }` object.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(drops) => drops.parse::<u64>().ok().map(Self::from_drops),
            Value::Object(obj) => {
                let currency = obj.get("currency")?.as_str()?;
                let amount = match obj.get("value")? {
                    Value::String(s) => s.parse::<f64>().ok()?,
                    Value::Number(n) => n.as_f64()?,
                    _ => return None,
                };
                match obj.get("issuer").and_then(Value::as_str) {
                    Some(issuer) => Some(Self::issued(amount, currency, issuer)),
                    None if currency == XRP => Some(Self::xrp(amount)),
                    None => None,
                }
            }
            _ => None,
        }
    }

    pub fn is_xrp(&self) -> bool {
        self.issuer.is_none() && self.currency == XRP
    }

    /// XRP value when the amount is native. Issued currencies have no price
    /// reference here and yield `None`.
    pub fn xrp_equivalent(&self) -> Option<f64> {
        self.is_xrp().then_some(self.value)
    }

    /// Stable key for "same amount, same asset" comparisons; values are
    /// compared at 6 decimal places.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:.6}:{}:{}",
            self.value,
            self.currency,
            self.issuer.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(
                f,
                "{} {}.{}",
                format_value(self.value),
                self.currency,
                short_address(issuer)
            ),
            None => write!(f, "{} {}", format_value(self.value), self.currency),
        }
    }
}

/// Decode a 40-hex-character currency code to its ASCII name when it holds
/// printable text; standard 3-letter codes are returned unchanged.
pub fn decode_currency(code: &str) -> String {
    if code.len() != 40 || !code.chars().all(|c| c.is_ascii_hexdigit()) {
        return code.to_string();
    }
    let Ok(bytes) = hex::decode(code) else {
        return code.to_string();
    };
    let text: Vec<u8> = bytes.into_iter().filter(|b| *b != 0).collect();
    if !text.is_empty() && text.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8(text).unwrap_or_else(|_| code.to_string())
    } else {
        code.to_string()
    }
}

/// Up to 6 decimals, trailing zeros trimmed.
pub fn format_value(value: f64) -> String {
    let formatted = format!("{:.6}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `rAbcde…wxyz` form for reports.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}
