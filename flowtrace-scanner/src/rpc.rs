use crate::error::{Result, ScanError};
use crate::gateway::{
    AccountInfo, Cursor, GatewayBalances, LedgerGateway, LinesPage, TrustLine, TxPage, TxQuery,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// RPC error tokens the server uses when it is overloaded or not synced.
const TRANSIENT_ERRORS: &[&str] = &[
    "tooBusy",
    "slowDown",
    "noNetwork",
    "noCurrent",
    "noClosed",
    "amendmentBlocked",
];

/// Error tokens meaning the method is not offered by this server.
const UNSUPPORTED_ERRORS: &[&str] = &["unknownCmd", "notImpl", "noPermission", "notSupported"];

const LINES_PAGE_LIMIT: u32 = 200;

/// [`LedgerGateway`] backed by a rippled-compatible JSON-RPC endpoint.
pub struct JsonRpcGateway {
    client: Client,
    endpoint: Url,
}

impl JsonRpcGateway {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, 20)
    }

    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let client = Client::builder()
            .user_agent(concat!("flowtrace/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST a single JSON-RPC call and return its `result` object.
    async fn call(&self, method: &str, params: Value) -> Result<Map<String, Value>> {
        debug!("rpc {} {}", method, params);

        let body = json!({ "method": method, "params": [params] });
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ScanError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ScanError::Other(format!("HTTP {} from {}", status, method)));
        }

        let payload: Value = response.json().await.map_err(map_transport_error)?;
        let result = match payload.get("result") {
            Some(Value::Object(result)) => result.clone(),
            _ => {
                return Err(ScanError::ParseError(format!(
                    "{} response has no result object",
                    method
                )));
            }
        };

        if let Some(code) = result.get("error").and_then(Value::as_str) {
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or(code)
                .to_string();
            if TRANSIENT_ERRORS.contains(&code) {
                return Err(ScanError::Unavailable(format!("{}: {}", code, message)));
            }
            return Err(ScanError::Rpc {
                code: code.to_string(),
                message,
            });
        }

        Ok(result)
    }
}

fn map_transport_error(err: reqwest::Error) -> ScanError {
    if err.is_timeout() {
        ScanError::Timeout
    } else {
        ScanError::HttpError(err)
    }
}

fn is_rpc_error(err: &ScanError, codes: &[&str]) -> bool {
    matches!(err, ScanError::Rpc { code, .. } if codes.contains(&code.as_str()))
}

/// Numbers arrive as JSON strings or numbers depending on the field.
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn decode_domain(hex_domain: &str) -> Option<String> {
    let bytes = hex::decode(hex_domain).ok()?;
    String::from_utf8(bytes).ok().filter(|d| !d.is_empty())
}

fn parse_account_info(result: &Map<String, Value>) -> Result<AccountInfo> {
    let data = result
        .get("account_data")
        .and_then(Value::as_object)
        .ok_or_else(|| ScanError::ParseError("account_info without account_data".to_string()))?;

    let balance = data
        .get("Balance")
        .and_then(Value::as_str)
        .and_then(|b| b.parse::<u64>().ok())
        .ok_or_else(|| ScanError::ParseError("account_data.Balance is not drops".to_string()))?;

    Ok(AccountInfo {
        balance,
        domain: data
            .get("Domain")
            .and_then(Value::as_str)
            .and_then(decode_domain),
        sequence: data.get("Sequence").and_then(Value::as_u64).unwrap_or(0) as u32,
        owner_count: data.get("OwnerCount").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

fn parse_trust_line(line: &Value) -> Option<TrustLine> {
    let obj = line.as_object()?;
    Some(TrustLine {
        peer: obj.get("account")?.as_str()?.to_string(),
        currency: obj.get("currency")?.as_str()?.to_string(),
        balance: number_field(obj, "balance").unwrap_or(0.0),
        limit: number_field(obj, "limit").unwrap_or(0.0),
    })
}

fn next_cursor(result: &Map<String, Value>) -> Option<Cursor> {
    result
        .get("marker")
        .filter(|m| !m.is_null())
        .cloned()
        .map(Cursor)
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn account_info(&self, address: &str) -> Result<Option<AccountInfo>> {
        let params = json!({ "account": address, "ledger_index": "validated" });
        match self.call("account_info", params).await {
            Ok(result) => parse_account_info(&result).map(Some),
            Err(e) if is_rpc_error(&e, &["actNotFound"]) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn account_lines(&self, address: &str, cursor: Option<Cursor>) -> Result<LinesPage> {
        let mut params = json!({
            "account": address,
            "ledger_index": "validated",
            "limit": LINES_PAGE_LIMIT,
        });
        if let Some(Cursor(marker)) = cursor {
            params["marker"] = marker;
        }

        let result = match self.call("account_lines", params).await {
            Ok(result) => result,
            Err(e) if is_rpc_error(&e, &["actNotFound"]) => return Ok(LinesPage::default()),
            Err(e) => return Err(e),
        };

        let lines = result
            .get("lines")
            .and_then(Value::as_array)
            .ok_or_else(|| ScanError::ParseError("account_lines without lines".to_string()))?
            .iter()
            .filter_map(parse_trust_line)
            .collect();

        Ok(LinesPage {
            lines,
            next_cursor: next_cursor(&result),
        })
    }

    async fn paged_transactions(&self, address: &str, query: TxQuery) -> Result<TxPage> {
        let mut params = json!({
            "account": address,
            "ledger_index_min": query.ledger_min.unwrap_or(-1),
            "ledger_index_max": query.ledger_max.unwrap_or(-1),
            "forward": query.forward,
            "limit": query.limit,
        });
        if let Some(Cursor(marker)) = query.cursor {
            params["marker"] = marker;
        }

        let result = match self.call("account_tx", params).await {
            Ok(result) => result,
            Err(e) if is_rpc_error(&e, &["actNotFound"]) => return Ok(TxPage::default()),
            Err(e) => return Err(e),
        };

        let transactions = result
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| ScanError::ParseError("account_tx without transactions".to_string()))?
            .clone();

        Ok(TxPage {
            transactions,
            next_cursor: next_cursor(&result),
        })
    }

    async fn gateway_balances(&self, address: &str) -> Result<Option<GatewayBalances>> {
        let params = json!({ "account": address, "ledger_index": "validated", "strict": true });
        let result = match self.call("gateway_balances", params).await {
            Ok(result) => result,
            Err(e) if is_rpc_error(&e, UNSUPPORTED_ERRORS) => {
                warn!("gateway_balances unavailable on {}: {}", self.endpoint, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut obligations = BTreeMap::new();
        if let Some(map) = result.get("obligations").and_then(Value::as_object) {
            for currency in map.keys() {
                if let Some(value) = number_field(map, currency) {
                    obligations.insert(currency.clone(), value);
                }
            }
        }

        Ok(Some(GatewayBalances { obligations }))
    }

    fn source_name(&self) -> &str {
        "json-rpc"
    }
}
