//! Breadth-first flow graph crawl.
//!
//! Seeds are expanded in BFS order. Expanding a node pages its outgoing
//! history newest-first, keeps the transactions that pass the constraints,
//! and turns each into an edge toward its counterparty. New counterparties
//! become nodes one level deeper and are queued in turn. The crawl stops when
//! the queue drains, a budget is spent, or the cancel flag is raised; all
//! three leave a usable graph.

use crate::cache::TokenSummary;
use crate::config::BuildParams;
use crate::context::{CrawlContext, PAGE_PRIORITY};
use crate::error::{BuildError, Result};
use crate::graph::{ActivationLookup, BuildStatus, Edge, EdgeInsert, Graph};
use crate::normalize::{LedgerTx, normalize_page};
use chrono::Utc;
use flowtrace_scanner::{AccountInfo, ScanError, SchedulerProgress, TxQuery, parse_address};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct BuildProgress {
    pub nodes: usize,
    pub edges: usize,
    pub queued: usize,
    pub expanded: usize,
    pub current: Option<String>,
    pub depth: u32,
    pub scheduler: SchedulerProgress,
}

pub type BuildProgressCallback = Arc<dyn Fn(&BuildProgress) + Send + Sync>;

/// Page and transaction counters shared by every node of one crawl.
#[derive(Debug, Default)]
struct ScanBudget {
    pages: u32,
    tx: u32,
}

#[derive(Debug, Default)]
struct NodeScan {
    retained: Vec<LedgerTx>,
    pages: u32,
    tx_scanned: u32,
    complete: bool,
    budget_exhausted: bool,
    error: Option<ScanError>,
}

pub struct FlowGraphBuilder {
    ctx: CrawlContext,
    params: BuildParams,
    progress_callback: Option<BuildProgressCallback>,
}

impl FlowGraphBuilder {
    pub fn new(ctx: CrawlContext, params: BuildParams) -> Self {
        Self {
            ctx,
            params,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: BuildProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn build(&self, seeds: &[String]) -> Result<Graph> {
        self.params.validate()?;

        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();
        for seed in seeds {
            match parse_address(seed) {
                Ok(address) => {
                    if seen.insert(address.clone()) {
                        valid.push(address);
                    }
                }
                Err(e) => {
                    warn!("Rejecting seed: {}", e);
                    rejected.push(seed.clone());
                }
            }
        }
        if valid.is_empty() {
            return Err(BuildError::NoValidSeeds(rejected));
        }

        info!(
            "Building flow graph from {} seed(s), max depth {}, {} accounts / {} edges",
            valid.len(),
            self.params.max_depth,
            self.params.max_accounts,
            self.params.max_edges
        );

        let mut graph = Graph::new(valid.clone(), self.params.clone());
        graph.rejected_seeds = rejected;

        let mut queue: VecDeque<String> = VecDeque::new();
        for seed in &valid {
            if graph.ensure_node(seed, 0).is_some() {
                queue.push_back(seed.clone());
            } else {
                warn!("Account budget reached before seed {} could be added", seed);
            }
        }

        let mut budget = ScanBudget::default();
        let mut status = BuildStatus::Complete;

        while let Some(address) = queue.pop_front() {
            if self.ctx.is_cancelled() {
                info!("Crawl cancelled with {} accounts queued", queue.len() + 1);
                status = BuildStatus::Cancelled;
                break;
            }
            if graph.is_at_account_capacity() || graph.is_at_edge_capacity() {
                info!(
                    "Crawl budget reached at {} accounts / {} edges",
                    graph.node_count(),
                    graph.edge_count()
                );
                status = BuildStatus::BudgetExhausted;
                break;
            }

            // queued nodes always exist; the level may have dropped since
            let Some(depth) = graph.node(&address).map(|n| n.level) else {
                continue;
            };
            if depth >= self.params.max_depth {
                debug!("{} at depth {} left unexpanded", address, depth);
                continue;
            }

            self.emit(&graph, queue.len(), Some(&address), depth);

            let (scan, metadata) = tokio::join!(
                self.scan_outgoing(&address, &mut budget),
                self.resolve_metadata(&address, depth)
            );

            if self.ctx.is_cancelled() {
                debug!("Discarding results for {} fetched after cancellation", address);
                status = BuildStatus::Cancelled;
                break;
            }

            metadata.apply(&mut graph, &address);
            let budget_exhausted = scan.budget_exhausted;
            let edge_budget_hit = self.apply_scan(&mut graph, &address, depth, scan, &mut queue);

            if edge_budget_hit || budget_exhausted {
                status = BuildStatus::BudgetExhausted;
                break;
            }
        }

        if status != BuildStatus::Complete {
            debug!("{} queued accounts left unexpanded", queue.len());
        }
        graph.status = status;
        graph.finished_at = Some(Utc::now());
        self.emit(&graph, queue.len(), None, 0);

        let stats = graph.stats();
        info!(
            "Crawl {}: {} accounts ({} expanded, {} incomplete), {} edges, {} pages",
            graph.status, stats.nodes, stats.expanded, stats.incomplete, stats.edges, budget.pages
        );
        Ok(graph)
    }

    /// Page outgoing history for one node until the history ends or a
    /// budget is met.
    async fn scan_outgoing(&self, address: &str, budget: &mut ScanBudget) -> NodeScan {
        let params = &self.params;
        let mut scan = NodeScan::default();
        let mut cursor = None;

        loop {
            if self.ctx.is_cancelled() {
                break;
            }
            if scan.pages >= params.max_pages_per_node {
                debug!("{}: per-node page cap reached", address);
                break;
            }
            if budget.pages >= params.max_pages_total || budget.tx >= params.max_tx_scanned {
                info!("Global scan budget exhausted while paging {}", address);
                scan.budget_exhausted = true;
                break;
            }

            let query = TxQuery::new(params.page_size)
                .forward(false)
                .with_ledger_bounds(params.constraints.ledger_min, params.constraints.ledger_max)
                .with_cursor(cursor.take());
            let page = match self.ctx.fetch_transactions(address, query, PAGE_PRIORITY).await {
                Ok(page) => page,
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!("Giving up on {} after page {}: {}", address, scan.pages, e);
                    }
                    scan.error = Some(e);
                    break;
                }
            };

            let count = page.transactions.len() as u32;
            scan.pages += 1;
            scan.tx_scanned = scan.tx_scanned.saturating_add(count);
            budget.pages += 1;
            budget.tx = budget.tx.saturating_add(count);

            if page.transactions.is_empty() {
                scan.complete = true;
                break;
            }

            let txs = normalize_page(&page.transactions);
            let last = txs.len().saturating_sub(1);
            let mut filled_at = None;
            for (i, tx) in txs.into_iter().enumerate() {
                if !tx.is_outgoing_from(address)
                    || !tx.is_success()
                    || !params.constraints.admits(&tx)
                {
                    continue;
                }
                scan.retained.push(tx);
                if scan.retained.len() >= params.per_node {
                    filled_at = Some(i);
                    break;
                }
            }

            if let Some(i) = filled_at {
                // history is only proven complete if nothing was left unread
                scan.complete = i == last && page.next_cursor.is_none();
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    scan.complete = true;
                    break;
                }
            }
        }

        scan
    }

    async fn resolve_metadata(&self, address: &str, depth: u32) -> NodeMetadata {
        let params = &self.params;
        let info = async {
            if params.resolve_account_info {
                Some(self.ctx.account_info(address).await.map(|e| e.value))
            } else {
                None
            }
        };
        let activation = async {
            if params.resolve_activation {
                Some(self.ctx.activation(address, &params.activation).await.map(|e| e.value))
            } else {
                None
            }
        };
        let tokens = async {
            if params.resolve_seed_tokens && depth == 0 {
                Some(self.ctx.token_summary(address, &params.tokens).await.map(|e| e.value))
            } else {
                None
            }
        };
        let (info, activation, tokens) = tokio::join!(info, activation, tokens);
        NodeMetadata {
            info,
            activation,
            tokens,
        }
    }

    /// Record a node's scan and add its edges. Returns `true` when the edge
    /// budget refused an edge.
    fn apply_scan(
        &self,
        graph: &mut Graph,
        address: &str,
        depth: u32,
        scan: NodeScan,
        queue: &mut VecDeque<String>,
    ) -> bool {
        let mut edge_budget_hit = false;
        let mut applied = Vec::with_capacity(scan.retained.len());

        for tx in scan.retained {
            if let Some(edge) = Edge::from_tx(&tx) {
                match graph.try_add_edge(edge, depth + 1) {
                    EdgeInsert::Added { new_node: true, .. } => {
                        if let Some(to) = tx.counterparty() {
                            queue.push_back(to.to_string());
                        }
                    }
                    EdgeInsert::Added { .. } => {}
                    EdgeInsert::AccountBudgetFull => {
                        debug!(
                            "Account budget full, dropping edge {} -> {:?}",
                            address,
                            tx.counterparty()
                        );
                    }
                    EdgeInsert::EdgeBudgetFull => {
                        edge_budget_hit = true;
                        break;
                    }
                    EdgeInsert::UnknownSource => {}
                }
            }
            applied.push(tx);
        }

        if let Some(node) = graph.node_mut(address) {
            node.outgoing = applied;
            node.scan.expanded = true;
            node.scan.pages_scanned = scan.pages;
            node.scan.tx_scanned = scan.tx_scanned;
            // a failed metadata lookup already left its message here
            node.scan.complete =
                scan.complete && !edge_budget_hit && scan.error.is_none() && node.scan.error.is_none();
            if let Some(e) = scan.error {
                let outgoing = format!("outgoing: {}", e);
                node.scan.error = Some(match node.scan.error.take() {
                    Some(metadata) => format!("{}; {}", metadata, outgoing),
                    None => outgoing,
                });
            }
        }

        edge_budget_hit
    }

    fn emit(&self, graph: &Graph, queued: usize, current: Option<&str>, depth: u32) {
        if let Some(callback) = &self.progress_callback {
            let stats = graph.stats();
            callback(&BuildProgress {
                nodes: stats.nodes,
                edges: stats.edges,
                queued,
                expanded: stats.expanded,
                current: current.map(str::to_string),
                depth,
                scheduler: self.ctx.scheduler.progress(),
            });
        }
    }
}

type Lookup<T> = Option<std::result::Result<T, ScanError>>;

/// Metadata lookups for one node; `None` when the lookup is switched off.
struct NodeMetadata {
    info: Lookup<Option<AccountInfo>>,
    activation: Lookup<ActivationLookup>,
    tokens: Lookup<TokenSummary>,
}

impl NodeMetadata {
    fn apply(self, graph: &mut Graph, address: &str) {
        let Some(node) = graph.node_mut(address) else {
            return;
        };
        let mut errors = Vec::new();

        match self.info {
            Some(Ok(info)) => node.account_info = info,
            Some(Err(e)) => errors.push(format!("account info: {}", e)),
            None => {}
        }
        match self.activation {
            Some(Ok(lookup)) => node.activation = Some(lookup),
            Some(Err(e)) => errors.push(format!("activation: {}", e)),
            None => {}
        }
        match self.tokens {
            Some(Ok(summary)) => node.tokens = Some(summary),
            Some(Err(e)) => errors.push(format!("tokens: {}", e)),
            None => {}
        }

        if !errors.is_empty() {
            warn!("Metadata lookup failed for {}: {}", address, errors.join("; "));
            node.scan.error = Some(errors.join("; "));
        }
    }
}

/// Crawl from `seeds` with the given parameters.
pub async fn build_graph(seeds: &[String], params: BuildParams, ctx: &CrawlContext) -> Result<Graph> {
    FlowGraphBuilder::new(ctx.clone(), params).build(seeds).await
}
