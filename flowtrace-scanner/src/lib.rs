pub mod address;
pub mod cancel;
pub mod error;
pub mod gateway;
pub mod rpc;
pub mod scheduler;

pub use address::{is_valid_address, parse_address};
pub use cancel::CancelFlag;
pub use error::{Result, ScanError};
pub use gateway::{
    AccountInfo, Cursor, GatewayBalances, LedgerGateway, LinesPage, TrustLine, TxPage, TxQuery,
};
pub use rpc::JsonRpcGateway;
pub use scheduler::{
    RequestScheduler, SchedulerConfig, SchedulerProgress, SchedulerProgressCallback,
};
