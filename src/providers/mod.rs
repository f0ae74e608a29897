//! Providers Module - External Data Sources
//!
//! Chain RPC clients, the per-chain registry and block-explorer lookups.

pub mod explorer;
pub mod registry;
pub mod rpc;

pub use explorer::{flatten_source, ExplorerClient, SourceLookup};
pub use registry::{ChainRegistry, ClientConnector, DetachedConnector, RpcConnector};
pub use rpc::{ChainClient, RpcProvider};
