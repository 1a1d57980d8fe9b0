//! Hands out disjoint nonce ranges from a single shared counter.

use std::sync::atomic::{AtomicU64, Ordering};

use miner_core::NonceRange;

/// One past the largest nonce.
const NONCE_SPACE: u64 = 1 << 32;

/// Lock-free nonce range allocator.
///
/// Each `allocate` claims the next `range_size` nonces with a single
/// `fetch_add`, so concurrent callers never receive overlapping ranges.
/// The counter is 64-bit and never wraps; once it passes the top of the
/// 32-bit nonce space, allocation reports exhaustion until `reset`.
#[derive(Debug)]
pub struct NonceAllocator {
    counter: AtomicU64,
    range_size: u32,
}

impl NonceAllocator {
    pub fn new(range_size: u32) -> Self {
        NonceAllocator {
            counter: AtomicU64::new(0),
            range_size: range_size.max(1),
        }
    }

    /// Claim the next range, or `None` when the nonce space is used up.
    ///
    /// The final range is truncated at `2^32`.
    pub fn allocate(&self) -> Option<NonceRange> {
        let start = self
            .counter
            .fetch_add(self.range_size as u64, Ordering::Relaxed);
        if start >= NONCE_SPACE {
            return None;
        }
        Some(NonceRange::new(start as u32, self.range_size))
    }

    /// Rewind to nonce 0 for a new template.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    pub fn range_size(&self) -> u32 {
        self.range_size
    }
}
