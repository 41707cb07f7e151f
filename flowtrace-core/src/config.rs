// Crawl budgets and parameters

use crate::constraints::Constraints;
use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};

/// Limits for the earliest-forward scan that looks for an account's funding
/// payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationBudget {
    pub max_pages: u32,
    pub max_tx: u32,
    pub page_size: u32,
}

impl Default for ActivationBudget {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_tx: 1_000,
            page_size: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenScanBudget {
    pub max_pages: u32,
}

impl Default for TokenScanBudget {
    fn default() -> Self {
        Self { max_pages: 5 }
    }
}

/// Everything that shapes one crawl. Stored on the resulting graph and in
/// its export snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    /// Nodes at this depth or deeper are recorded but not expanded.
    pub max_depth: u32,
    pub max_accounts: usize,
    pub max_edges: usize,
    /// Retained outgoing transactions per expanded node.
    pub per_node: usize,
    pub page_size: u32,
    pub max_pages_per_node: u32,
    pub max_pages_total: u32,
    pub max_tx_scanned: u32,
    pub constraints: Constraints,
    pub resolve_account_info: bool,
    pub resolve_activation: bool,
    /// Fetch trust line summaries for seed accounts.
    pub resolve_seed_tokens: bool,
    pub activation: ActivationBudget,
    pub tokens: TokenScanBudget,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_accounts: 200,
            max_edges: 1_000,
            per_node: 50,
            page_size: 50,
            max_pages_per_node: 10,
            max_pages_total: 500,
            max_tx_scanned: 25_000,
            constraints: Constraints::default(),
            resolve_account_info: true,
            resolve_activation: true,
            resolve_seed_tokens: false,
            activation: ActivationBudget::default(),
            tokens: TokenScanBudget::default(),
        }
    }
}

impl BuildParams {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_accounts(mut self, max_accounts: usize) -> Self {
        self.max_accounts = max_accounts;
        self
    }

    pub fn with_max_edges(mut self, max_edges: usize) -> Self {
        self.max_edges = max_edges;
        self
    }

    pub fn with_per_node(mut self, per_node: usize) -> Self {
        self.per_node = per_node;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Skip account-info and activation lookups; only transactions are paged.
    pub fn transactions_only(mut self) -> Self {
        self.resolve_account_info = false;
        self.resolve_activation = false;
        self.resolve_seed_tokens = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_accounts == 0 {
            return Err(BuildError::InvalidParams("max_accounts must be at least 1".into()));
        }
        if self.per_node == 0 {
            return Err(BuildError::InvalidParams("per_node must be at least 1".into()));
        }
        if self.page_size == 0 || self.activation.page_size == 0 {
            return Err(BuildError::InvalidParams("page sizes must be at least 1".into()));
        }
        self.constraints.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(BuildParams::default().validate().is_ok());
    }

    #[test]
    fn test_zero_budgets_rejected() {
        assert!(BuildParams::default().with_max_accounts(0).validate().is_err());
        assert!(BuildParams::default().with_per_node(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let params: BuildParams = serde_json::from_str(r#"{ "max_depth": 4 }"#).unwrap();
        assert_eq!(params.max_depth, 4);
        assert_eq!(params.max_accounts, BuildParams::default().max_accounts);
    }
}
