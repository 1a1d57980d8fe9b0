//! Block submission.
//!
//! Submission is fire-and-forget: the outcome is logged and returned for
//! bookkeeping, but the miner moves on to the next template either way and
//! leaves it to the node to reject stale or invalid blocks.

use miner_core::hash::hash_to_display_hex;
use miner_core::serialize_block_hex;
use tracing::{error, info, warn};

use crate::error::RpcError;
use crate::pool::Work;
use crate::rpc::{NodeRpc, SubmitOutcome};

/// Serialize the block solved by `nonce` and hand it to the node.
pub fn submit_solution<R: NodeRpc>(
    rpc: &R,
    work: &Work,
    nonce: u32,
    hash: &[u8; 32],
) -> Result<SubmitOutcome, RpcError> {
    let block_hex = serialize_block_hex(&work.preimage, nonce, &work.coinbase);
    let display_hash = hash_to_display_hex(hash);
    info!(height = work.height, nonce, hash = %display_hash, "Block found, submitting");

    let outcome = rpc.submit_block(&block_hex);
    match &outcome {
        Ok(SubmitOutcome::Accepted) => {
            info!(height = work.height, hash = %display_hash, "Block accepted");
        }
        Ok(SubmitOutcome::Rejected(reason)) => {
            warn!(height = work.height, hash = %display_hash, reason = %reason, "Block rejected");
        }
        Err(err) => {
            error!(height = work.height, hash = %display_hash, error = %err, "submitblock failed");
        }
    }
    outcome
}
