//! Network selection and consensus-format constants.

/// Bitcoin network the node is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Bitcoin mainnet
    Mainnet,
    /// Bitcoin testnet4
    Testnet4,
    /// Local regression-test network
    #[default]
    Regtest,
}

impl Network {
    /// Get the default JSON-RPC port for this network.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Network::Mainnet => 8332,
            Network::Testnet4 => 48332,
            Network::Regtest => 18443,
        }
    }

    /// Parse network from string.
    pub fn parse(s: &str) -> Option<Self> {
        const ALIASES: [(&str, Network); 7] = [
            ("mainnet", Network::Mainnet),
            ("main", Network::Mainnet),
            ("bitcoin", Network::Mainnet),
            ("testnet4", Network::Testnet4),
            ("testnet", Network::Testnet4),
            ("test", Network::Testnet4),
            ("regtest", Network::Regtest),
        ];

        ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
            .map(|(_, network)| *network)
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet4 => "testnet4",
            Network::Regtest => "regtest",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Size of the header before the trailing nonce.
pub const HEADER_PREIMAGE_SIZE: usize = 76;

/// Fixed coinbase payout in satoshis (50 BTC).
///
/// No halving schedule is applied; the node rejects an overpaying coinbase
/// on networks past the first halving.
pub const COINBASE_SUBSIDY: u64 = 50 * 100_000_000;
