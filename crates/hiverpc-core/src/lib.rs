pub mod accounts;
pub mod assets;
pub mod blocks;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod head;
pub mod rpc;
pub mod stream;
pub mod types;

pub use assets::{Amount, Asset, KnownAssets};
pub use client::{ChainClient, Session};
pub use config::{ClientConfig, Network};
pub use error::{CoreError, ErrorKind, RpcErrorPayload};
pub use rpc::Retry;
pub use stream::StopSignal;
pub use types::{Account, Block, HistoryItem, Operation, Transaction};
