pub mod amount;
pub mod analysis;
pub mod builder;
pub mod cache;
pub mod config;
pub mod constraints;
pub mod context;
pub mod error;
pub mod export;
pub mod graph;
pub mod normalize;
pub mod report;

pub use amount::Amount;
pub use analysis::{Findings, PatternConfig, detect_patterns, find_cycles, find_path};
pub use builder::{BuildProgress, BuildProgressCallback, FlowGraphBuilder, build_graph};
pub use cache::{AddressCache, AddressCaches, CacheEntry, TokenSummary};
pub use config::{ActivationBudget, BuildParams, TokenScanBudget};
pub use constraints::Constraints;
pub use context::CrawlContext;
pub use error::{BuildError, ExportError};
pub use export::{GraphSnapshot, export_graph, to_dot};
pub use graph::{AccountNode, Activation, ActivationLookup, BuildStatus, Edge, Graph};
pub use normalize::{LedgerTx, TxKind};
