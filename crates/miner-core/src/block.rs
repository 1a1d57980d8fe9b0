//! Block templates, header preimages and block serialization.

use alloc::string::String;
use alloc::vec::Vec;

use crate::coinbase::{encode_compact_size, CoinbaseTransaction};
use crate::difficulty::target_difficulty;
use crate::network::{BLOCK_HEADER_SIZE, HEADER_PREIMAGE_SIZE};

/// Errors raised while decoding a node-supplied template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A hex field did not decode
    InvalidHex { field: &'static str },
    /// A field decoded to the wrong number of bytes
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

impl core::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TemplateError::InvalidHex { field } => write!(f, "Invalid hex in {}", field),
            TemplateError::InvalidLength { field, expected, got } => {
                write!(f, "{} must be {} bytes, got {}", field, expected, got)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TemplateError {}

/// The mining-relevant fields of a `getblocktemplate` response.
///
/// Byte fields are kept in the order the node sends them (the hex strings
/// decoded as-is); the header assembler reverses them where needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Block version.
    pub version: i32,
    /// Previous block hash, display byte order.
    pub previous_block_hash: [u8; 32],
    /// Current time the node suggests for the header.
    pub curtime: u32,
    /// Compact target, display byte order.
    pub bits: [u8; 4],
    /// Full 256-bit target, big-endian.
    pub target: [u8; 32],
    /// Height of the block being mined.
    pub height: u32,
}

impl BlockTemplate {
    /// Build a template from the node's hex-encoded fields.
    pub fn from_hex_fields(
        version: i32,
        previous_block_hash: &str,
        curtime: u32,
        bits: &str,
        target: &str,
        height: u32,
    ) -> Result<Self, TemplateError> {
        Ok(BlockTemplate {
            version,
            previous_block_hash: decode_fixed("previousblockhash", previous_block_hash)?,
            curtime,
            bits: decode_fixed("bits", bits)?,
            target: decode_fixed("target", target)?,
            height,
        })
    }

    /// Compact bits as an integer.
    pub fn compact_bits(&self) -> u32 {
        u32::from_be_bytes(self.bits)
    }

    /// Difficulty of this template's target.
    pub fn difficulty(&self) -> f64 {
        target_difficulty(&self.target)
    }
}

/// Decode a hex string into exactly `N` bytes.
fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], TemplateError> {
    let bytes = hex::decode(value).map_err(|_| TemplateError::InvalidHex { field })?;
    bytes.as_slice().try_into().map_err(|_| TemplateError::InvalidLength {
        field,
        expected: N,
        got: bytes.len(),
    })
}

/// The first 76 bytes of a block header: everything except the nonce.
///
/// Computed once per template and shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPreimage([u8; HEADER_PREIMAGE_SIZE]);

impl HeaderPreimage {
    /// Assemble the preimage for a template and its coinbase.
    ///
    /// Layout: version (LE) | previous hash (reversed) | merkle root |
    /// curtime (LE) | bits (reversed).
    pub fn assemble(template: &BlockTemplate, coinbase: &CoinbaseTransaction) -> Self {
        let merkle_root = coinbase_merkle_root(coinbase);

        let mut previous_hash = template.previous_block_hash;
        previous_hash.reverse();
        let mut bits = template.bits;
        bits.reverse();

        let mut preimage = [0u8; HEADER_PREIMAGE_SIZE];
        preimage[0..4].copy_from_slice(&template.version.to_le_bytes());
        preimage[4..36].copy_from_slice(&previous_hash);
        preimage[36..68].copy_from_slice(&merkle_root);
        preimage[68..72].copy_from_slice(&template.curtime.to_le_bytes());
        preimage[72..76].copy_from_slice(&bits);

        HeaderPreimage(preimage)
    }

    /// Wrap raw preimage bytes.
    pub fn from_bytes(bytes: [u8; HEADER_PREIMAGE_SIZE]) -> Self {
        HeaderPreimage(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_PREIMAGE_SIZE] {
        &self.0
    }

    /// Merkle root field of the preimage.
    pub fn merkle_root(&self) -> [u8; 32] {
        let mut root = [0u8; 32];
        root.copy_from_slice(&self.0[36..68]);
        root
    }

    /// The full 80-byte header with `nonce` appended little-endian.
    pub fn with_nonce(&self, nonce: u32) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..HEADER_PREIMAGE_SIZE].copy_from_slice(&self.0);
        header[HEADER_PREIMAGE_SIZE..].copy_from_slice(&nonce.to_le_bytes());
        header
    }
}

/// Merkle root of a block whose only transaction is the coinbase.
///
/// With a single leaf the root is the leaf itself: the coinbase txid, i.e.
/// the double SHA256 of its bytes. This holds only because the miner never
/// includes mempool transactions; adding any would require building the
/// full tree.
pub fn coinbase_merkle_root(coinbase: &CoinbaseTransaction) -> [u8; 32] {
    coinbase.txid
}

/// Serialize a solved coinbase-only block for `submitblock`.
pub fn serialize_block(
    preimage: &HeaderPreimage,
    nonce: u32,
    coinbase: &CoinbaseTransaction,
) -> Vec<u8> {
    let mut block = Vec::with_capacity(BLOCK_HEADER_SIZE + 1 + coinbase.raw_tx.len());
    block.extend_from_slice(&preimage.with_nonce(nonce));
    encode_compact_size(1, &mut block);
    block.extend_from_slice(&coinbase.raw_tx);
    block
}

/// Hex form of [`serialize_block`].
pub fn serialize_block_hex(
    preimage: &HeaderPreimage,
    nonce: u32,
    coinbase: &CoinbaseTransaction,
) -> String {
    hex::encode(serialize_block(preimage, nonce, coinbase))
}
