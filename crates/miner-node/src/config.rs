//! Miner configuration.
//!
//! Every setting has a default suitable for a local regtest node and can be
//! overridden through environment variables:
//!
//! - `GBT_MINER_NETWORK` - `mainnet`, `testnet4` or `regtest` (default), picks the default RPC port
//! - `GBT_MINER_RPC_URL` - node endpoint (default `http://127.0.0.1:<port>`)
//! - `GBT_MINER_RPC_USER` / `GBT_MINER_RPC_PASSWORD` - basic auth credentials
//! - `GBT_MINER_THREADS` - worker count (default: detected cores)
//! - `GBT_MINER_TAG` - coinbase tag bytes, truncated to fit the scriptSig
//! - `GBT_MINER_NONCE_RANGE` - nonces handed to a worker at a time
//! - `GBT_MINER_REFRESH_SECS` - template refresh interval
//!
//! Unparsable values are ignored in favour of the default.

use std::time::Duration;

use miner_core::coinbase::MAX_TAG_SIZE;
use miner_core::Network;
use tracing::warn;

/// Runtime settings for the miner.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Network the node runs on.
    pub network: Network,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    /// Per-request timeout.
    pub rpc_timeout: Duration,
    /// Number of worker threads.
    pub threads: usize,
    /// Tag appended to the coinbase scriptSig.
    pub coinbase_tag: Vec<u8>,
    /// Size of each nonce range handed to a worker.
    pub nonce_range_size: u32,
    /// Maximum age of a cached template before it is re-fetched.
    pub template_refresh: Duration,
    /// First cooldown after a failed template fetch.
    pub backoff_base: Duration,
    /// Longest cooldown between failed template fetches.
    pub backoff_max: Duration,
    /// Pause between dispatch waves.
    pub wave_pause: Duration,
    /// Pause when there is no template to mine.
    pub idle_pause: Duration,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let network = Network::default();
        MinerConfig {
            network,
            rpc_url: default_rpc_url(network),
            rpc_user: "user".to_string(),
            rpc_password: "pass".to_string(),
            rpc_timeout: Duration::from_secs(2),
            threads: num_cpus::get().max(1),
            coinbase_tag: b"/gbt-miner/".to_vec(),
            nonce_range_size: 1000,
            template_refresh: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            wave_pause: Duration::from_millis(50),
            idle_pause: Duration::from_secs(1),
        }
    }
}

impl MinerConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = MinerConfig::default();

        if let Some(network) = lookup("GBT_MINER_NETWORK").and_then(|s| Network::parse(&s)) {
            config.network = network;
            config.rpc_url = default_rpc_url(network);
        }
        if let Some(url) = lookup("GBT_MINER_RPC_URL").filter(|s| !s.is_empty()) {
            config.rpc_url = url;
        }
        if let Some(user) = lookup("GBT_MINER_RPC_USER") {
            config.rpc_user = user;
        }
        if let Some(password) = lookup("GBT_MINER_RPC_PASSWORD") {
            config.rpc_password = password;
        }
        if let Some(threads) = lookup("GBT_MINER_THREADS").and_then(|s| s.parse::<usize>().ok()) {
            config.threads = threads.max(1);
        }
        if let Some(tag) = lookup("GBT_MINER_TAG") {
            let mut tag = tag.into_bytes();
            if tag.len() > MAX_TAG_SIZE {
                warn!(len = tag.len(), max = MAX_TAG_SIZE, "Coinbase tag too long, truncating");
                tag.truncate(MAX_TAG_SIZE);
            }
            config.coinbase_tag = tag;
        }
        if let Some(size) = lookup("GBT_MINER_NONCE_RANGE").and_then(|s| s.parse::<u32>().ok()) {
            config.nonce_range_size = size.max(1);
        }
        if let Some(secs) = lookup("GBT_MINER_REFRESH_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.template_refresh = Duration::from_secs(secs);
        }

        config
    }
}

fn default_rpc_url(network: Network) -> String {
    format!("http://127.0.0.1:{}", network.default_rpc_port())
}
