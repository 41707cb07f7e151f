// Shared crawl services: gateway, scheduler and caches

use crate::cache::{AddressCaches, CacheEntry, Fetched, TokenSummary};
use crate::config::{ActivationBudget, TokenScanBudget};
use crate::graph::{Activation, ActivationLookup};
use crate::normalize::normalize_page;
use flowtrace_scanner::{
    AccountInfo, Cursor, GatewayBalances, LedgerGateway, LinesPage, RequestScheduler, Result,
    TxPage, TxQuery,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Transaction pages drive the crawl and go ahead of metadata lookups.
pub const PAGE_PRIORITY: i32 = 1;
pub const METADATA_PRIORITY: i32 = 0;

/// Everything a crawl talks through. Cloning is cheap and every clone shares
/// the same scheduler, cancel flag and caches.
#[derive(Clone)]
pub struct CrawlContext {
    pub gateway: Arc<dyn LedgerGateway>,
    pub scheduler: RequestScheduler,
    pub caches: Arc<AddressCaches>,
}

impl CrawlContext {
    pub fn new(gateway: Arc<dyn LedgerGateway>, scheduler: RequestScheduler) -> Self {
        Self {
            gateway,
            scheduler,
            caches: Arc::new(AddressCaches::new()),
        }
    }

    pub fn with_caches(mut self, caches: Arc<AddressCaches>) -> Self {
        self.caches = caches;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    fn max_retries(&self) -> u32 {
        self.scheduler.config().default_max_retries
    }

    pub async fn fetch_transactions(&self, address: &str, query: TxQuery, priority: i32) -> Result<TxPage> {
        let gateway = self.gateway.clone();
        let address = address.to_string();
        self.scheduler
            .enqueue(
                move || {
                    let gateway = gateway.clone();
                    let address = address.clone();
                    let query = query.clone();
                    async move { gateway.paged_transactions(&address, query).await }
                },
                priority,
                self.max_retries(),
            )
            .await
    }

    pub async fn fetch_account_info(&self, address: &str) -> Result<Option<AccountInfo>> {
        let gateway = self.gateway.clone();
        let address = address.to_string();
        self.scheduler
            .enqueue(
                move || {
                    let gateway = gateway.clone();
                    let address = address.clone();
                    async move { gateway.account_info(&address).await }
                },
                METADATA_PRIORITY,
                self.max_retries(),
            )
            .await
    }

    pub async fn fetch_lines(&self, address: &str, cursor: Option<Cursor>) -> Result<LinesPage> {
        let gateway = self.gateway.clone();
        let address = address.to_string();
        self.scheduler
            .enqueue(
                move || {
                    let gateway = gateway.clone();
                    let address = address.clone();
                    let cursor = cursor.clone();
                    async move { gateway.account_lines(&address, cursor).await }
                },
                METADATA_PRIORITY,
                self.max_retries(),
            )
            .await
    }

    pub async fn fetch_gateway_balances(&self, address: &str) -> Result<Option<GatewayBalances>> {
        let gateway = self.gateway.clone();
        let address = address.to_string();
        self.scheduler
            .enqueue(
                move || {
                    let gateway = gateway.clone();
                    let address = address.clone();
                    async move { gateway.gateway_balances(&address).await }
                },
                METADATA_PRIORITY,
                self.max_retries(),
            )
            .await
    }

    /// Cached account metadata. "Not found" is a complete result.
    pub async fn account_info(&self, address: &str) -> Result<CacheEntry<Option<AccountInfo>>> {
        self.caches
            .account_info
            .get_or_compute(address, || async {
                let info = self.fetch_account_info(address).await?;
                Ok(Fetched::complete(info, self.gateway.source_name()))
            })
            .await
    }

    /// Cached first-funding lookup: an oldest-first scan for the first
    /// applied Payment into `address`.
    pub async fn activation(
        &self,
        address: &str,
        budget: &ActivationBudget,
    ) -> Result<CacheEntry<ActivationLookup>> {
        self.caches
            .activation
            .get_or_compute(address, || self.scan_activation(address, budget))
            .await
    }

    async fn scan_activation(
        &self,
        address: &str,
        budget: &ActivationBudget,
    ) -> Result<Fetched<ActivationLookup>> {
        let source = self.gateway.source_name().to_string();
        let mut cursor = None;
        let mut pages = 0u32;
        let mut scanned = 0u32;

        loop {
            if pages >= budget.max_pages || scanned >= budget.max_tx {
                debug!(
                    "activation scan for {} stopped after {} pages / {} transactions",
                    address, pages, scanned
                );
                return Ok(Fetched::partial(ActivationLookup::NotFoundWithinBudget, source));
            }

            let query = TxQuery::new(budget.page_size)
                .forward(true)
                .with_cursor(cursor.take());
            let page = self.fetch_transactions(address, query, METADATA_PRIORITY).await?;
            pages += 1;
            scanned = scanned.saturating_add(page.transactions.len() as u32);

            let funding = normalize_page(&page.transactions)
                .into_iter()
                .find(|tx| tx.is_incoming_payment_to(address));
            if let Some(tx) = funding {
                let activation = Activation {
                    activator: tx.account,
                    tx_hash: tx.hash,
                    ledger_index: tx.ledger_index,
                    timestamp: tx.timestamp,
                    amount: tx.amount,
                };
                return Ok(Fetched::complete(ActivationLookup::Found(activation), source));
            }

            match page.next_cursor {
                Some(next) if !page.transactions.is_empty() => cursor = Some(next),
                _ => return Ok(Fetched::complete(ActivationLookup::NotFound, source)),
            }
        }
    }

    /// Cached trust line summary. The `gateway_balances` lookup is best
    /// effort: when it fails or is not offered the summary carries no
    /// obligations and its source says so.
    pub async fn token_summary(
        &self,
        address: &str,
        budget: &TokenScanBudget,
    ) -> Result<CacheEntry<TokenSummary>> {
        self.caches
            .tokens
            .get_or_compute(address, || self.scan_tokens(address, budget))
            .await
    }

    async fn scan_tokens(&self, address: &str, budget: &TokenScanBudget) -> Result<Fetched<TokenSummary>> {
        let mut lines = Vec::new();
        let mut cursor = None;
        let mut pages = 0u32;
        let mut complete = false;

        while pages < budget.max_pages {
            let page = self.fetch_lines(address, cursor.take()).await?;
            pages += 1;
            lines.extend(page.lines);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    complete = true;
                    break;
                }
            }
        }

        let mut summary = TokenSummary::from_lines(&lines);
        let mut source = format!("{}:account_lines", self.gateway.source_name());
        match self.fetch_gateway_balances(address).await {
            Ok(Some(balances)) => {
                summary.obligations = Some(balances.obligations);
                source.push_str("+gateway_balances");
            }
            Ok(None) => source.push_str(" (gateway_balances unavailable)"),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("gateway_balances failed for {}: {}", address, e);
                source.push_str(" (gateway_balances failed)");
            }
        }

        Ok(if complete {
            Fetched::complete(summary, source)
        } else {
            Fetched::partial(summary, source)
        })
    }
}
