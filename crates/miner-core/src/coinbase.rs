//! Coinbase transaction construction.
//!
//! The coinbase (generation) transaction is the first transaction in a block.
//! It spends no previous output and pays the block subsidy to the miner. The
//! miner only ever builds blocks that contain this one transaction, so the
//! legacy (non-witness) serialization is all that is needed.

use alloc::vec;
use alloc::vec::Vec;

use crate::hash::double_sha256;
use crate::network::COINBASE_SUBSIDY;

/// Consensus limit on the coinbase scriptSig length.
pub const MAX_SCRIPT_SIG_SIZE: usize = 100;

/// Consensus minimum on the coinbase scriptSig length.
pub const MIN_SCRIPT_SIG_SIZE: usize = 2;

/// Longest height push: a 4-byte height plus a sign pad, behind its opcode.
const MAX_HEIGHT_PUSH_SIZE: usize = 6;

/// Longest tag that always fits in the scriptSig next to the height push.
pub const MAX_TAG_SIZE: usize = MAX_SCRIPT_SIG_SIZE - MAX_HEIGHT_PUSH_SIZE;

/// Builder for the legacy coinbase transaction of a coinbase-only block.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    /// The block height (pushed into the scriptSig per BIP34).
    block_height: u32,
    /// Arbitrary tag appended after the height push.
    tag: Vec<u8>,
    /// The scriptPubKey that receives the subsidy.
    payout_script: Vec<u8>,
}

impl CoinbaseBuilder {
    /// Create a new coinbase builder.
    ///
    /// Tags longer than [`MAX_TAG_SIZE`] are truncated.
    pub fn new(block_height: u32, tag: &[u8], payout_script: &[u8]) -> Self {
        CoinbaseBuilder {
            block_height,
            tag: tag[..tag.len().min(MAX_TAG_SIZE)].to_vec(),
            payout_script: payout_script.to_vec(),
        }
    }

    /// Build the coinbase transaction.
    ///
    /// Output depends only on height, tag and payout script; identical inputs
    /// always yield identical bytes.
    pub fn build(&self) -> CoinbaseTransaction {
        let script_sig = self.build_script_sig();

        let mut raw_tx = Vec::with_capacity(
            4 + 1 + 36 + 9 + script_sig.len() + 4 + 1 + 8 + 9 + self.payout_script.len() + 4,
        );

        // Version 1
        raw_tx.extend_from_slice(&1u32.to_le_bytes());

        // One input spending the null outpoint
        raw_tx.push(0x01);
        raw_tx.extend_from_slice(&[0u8; 32]);
        raw_tx.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        encode_compact_size(script_sig.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(&script_sig);
        raw_tx.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        // One output paying the subsidy
        raw_tx.push(0x01);
        raw_tx.extend_from_slice(&COINBASE_SUBSIDY.to_le_bytes());
        encode_compact_size(self.payout_script.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(&self.payout_script);

        // Locktime
        raw_tx.extend_from_slice(&0u32.to_le_bytes());

        let txid = double_sha256(&raw_tx);
        CoinbaseTransaction { raw_tx, txid }
    }

    /// scriptSig: minimal height push followed by the tag bytes.
    fn build_script_sig(&self) -> Vec<u8> {
        let mut script_sig = encode_height_push(self.block_height);
        script_sig.extend_from_slice(&self.tag);
        // A lone small-int opcode is too short to be a valid coinbase scriptSig.
        while script_sig.len() < MIN_SCRIPT_SIG_SIZE {
            script_sig.push(OP_0);
        }
        script_sig
    }
}

/// A serialized coinbase transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    /// Legacy serialization, as embedded in the block.
    pub raw_tx: Vec<u8>,
    /// Double SHA256 of `raw_tx`, in internal byte order.
    pub txid: [u8; 32],
}

/// Encode a block height as a minimal script number (BIP34).
///
/// Little-endian, no trailing zero bytes, plus a 0x00 pad when the top bit
/// of the last byte would otherwise read as a sign bit.
pub fn encode_block_height(height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(5);
    let mut n = height;
    while n > 0 {
        bytes.push((n & 0xFF) as u8);
        n >>= 8;
    }

    if bytes.last().is_some_and(|last| last & 0x80 != 0) {
        bytes.push(0x00);
    }

    bytes
}

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;

/// Script that pushes `height` the way consensus checks it (BIP34).
///
/// Heights 0 to 16 use the small-integer opcodes `OP_0`, `OP_1`..`OP_16`;
/// larger heights are a direct data push of [`encode_block_height`].
pub fn encode_height_push(height: u32) -> Vec<u8> {
    match height {
        0 => vec![OP_0],
        1..=16 => vec![OP_1 + (height - 1) as u8],
        _ => {
            let bytes = encode_block_height(height);
            let mut push = Vec::with_capacity(1 + bytes.len());
            push.push(bytes.len() as u8);
            push.extend_from_slice(&bytes);
            push
        }
    }
}

/// Append a Bitcoin compact-size integer to `output`.
pub fn encode_compact_size(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}
