//! File-provision coordinator of a sower gateway node.
//!
//! A file arrives erasure-coded into an `S x G` fragment matrix. The gateway
//! registers a storage order on chain, announces the work on the provide
//! channel, hands out one column per claiming worker, serves fragment paths
//! to each claimant, and sweeps the persisted task records against on-chain
//! deal state until every slice is settled and the local fragments can go.

pub mod buffer;
pub mod bus;
pub mod chain;
pub mod config;
pub mod error;
pub mod keylock;
pub mod provide;
pub mod stats;

// Re-export
pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use provide::{FileRequest, FileResponse, Gateway};
