//! Consensus-format building blocks for the getblocktemplate miner.
//!
//! This crate provides pure Rust implementations of:
//! - Block template decoding from node-supplied hex fields
//! - Coinbase transaction building with BIP34 height encoding
//! - Header preimage assembly and block serialization
//! - SHA256 double-hashing and the per-range nonce search
//! - Compact target decoding and difficulty reporting

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod coinbase;
pub mod difficulty;
pub mod hash;
pub mod network;

pub use block::{serialize_block, serialize_block_hex, BlockTemplate, HeaderPreimage, TemplateError};
pub use coinbase::{CoinbaseBuilder, CoinbaseTransaction};
pub use difficulty::{bits_to_target, format_difficulty};
pub use hash::{double_sha256, search, MiningResult, NonceRange};
pub use network::Network;
