//! Solo mining client for a Bitcoin-style full node.
//!
//! Work comes from the node's `getblocktemplate`, is turned into a header
//! preimage by [`miner_core`], and is searched by a pool of OS threads in
//! fixed-size nonce ranges. Winning blocks go back through `submitblock`.

pub mod allocator;
pub mod backoff;
pub mod config;
pub mod error;
pub mod logging;
pub mod miner;
pub mod payout;
pub mod pool;
pub mod rpc;
pub mod submit;
pub mod template_cache;

pub use allocator::NonceAllocator;
pub use config::MinerConfig;
pub use error::{ResolutionError, RpcError};
pub use miner::{Miner, WaveOutcome};
pub use payout::PayoutScript;
pub use rpc::{NodeRpc, RpcClient, SubmitOutcome};
pub use template_cache::TemplateCache;
