//! SHA256 double-hashing and the per-range nonce search.

use sha2::{Digest, Sha256};

use crate::block::HeaderPreimage;
use crate::network::BLOCK_HEADER_SIZE;

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for block header hashing and transaction IDs.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// A contiguous slice of the 32-bit nonce space, `[start, start + len)`.
///
/// The exclusive end may be `2^32`, so it is reported as a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    start: u32,
    len: u32,
}

impl NonceRange {
    /// Create a range of up to `len` nonces starting at `start`.
    ///
    /// The length is clamped so the range never runs past `u32::MAX`.
    pub fn new(start: u32, len: u32) -> Self {
        let room = (1u64 << 32) - start as u64;
        NonceRange {
            start,
            len: (len as u64).min(room) as u32,
        }
    }

    /// First nonce in the range.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> u64 {
        self.start as u64 + self.len as u64
    }

    /// Number of nonces covered.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate the nonces in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        let start = self.start;
        (0..self.len).map(move |offset| start + offset)
    }
}

/// Outcome of searching one nonce range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningResult {
    /// The winning nonce (if found).
    pub nonce: Option<u32>,
    /// The winning header hash in internal byte order (if found).
    pub hash: Option<[u8; 32]>,
    /// Whether a header below the target was found.
    pub found: bool,
    /// Number of hashes computed for this range.
    pub hashes_computed: u64,
}

impl MiningResult {
    /// Create a result indicating the range held no valid nonce.
    pub fn not_found(hashes: u64) -> Self {
        MiningResult {
            nonce: None,
            hash: None,
            found: false,
            hashes_computed: hashes,
        }
    }

    /// Create a result indicating a valid block header.
    pub fn found(nonce: u32, hash: [u8; 32], hashes: u64) -> Self {
        MiningResult {
            nonce: Some(nonce),
            hash: Some(hash),
            found: true,
            hashes_computed: hashes,
        }
    }
}

/// Exhaustively search `range` for a header hash below `target`.
///
/// Each nonce is appended little-endian to the 76-byte preimage and the
/// 80-byte header is double-hashed. The digest is compared as a big-endian
/// integer after reversing its bytes, so `target` is the usual big-endian
/// 256-bit threshold. Returns the first qualifying nonce in ascending order.
///
/// The loop runs to completion; there is no way to interrupt it mid-range.
pub fn search(range: NonceRange, preimage: &HeaderPreimage, target: &[u8; 32]) -> MiningResult {
    let mut header = [0u8; BLOCK_HEADER_SIZE];
    header[..76].copy_from_slice(preimage.as_bytes());

    let mut hashes = 0u64;
    for nonce in range.iter() {
        header[76..80].copy_from_slice(&nonce.to_le_bytes());
        let hash = double_sha256(&header);
        hashes += 1;

        if hash_below_target(&hash, target) {
            return MiningResult::found(nonce, hash, hashes);
        }
    }

    MiningResult::not_found(hashes)
}

/// Check whether a header hash (internal byte order) is strictly below a
/// big-endian target.
#[inline]
pub fn hash_below_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    // The most significant byte of the hash value is the last internal byte.
    for (h, t) in hash.iter().rev().zip(target.iter()) {
        if h != t {
            return h < t;
        }
    }
    false
}

/// Reverse the byte order of a 32-byte array.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> alloc::string::String {
    hex::encode(reverse_bytes(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preimage() -> HeaderPreimage {
        let mut bytes = [0u8; 76];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        HeaderPreimage::from_bytes(bytes)
    }

    /// Interpret a hash the way the search does: reversed, big-endian.
    fn as_target(hash: &[u8; 32]) -> [u8; 32] {
        reverse_bytes(hash)
    }

    /// Add one to a big-endian 256-bit value.
    fn plus_one(mut value: [u8; 32]) -> [u8; 32] {
        for byte in value.iter_mut().rev() {
            let (next, carry) = byte.overflowing_add(1);
            *byte = next;
            if !carry {
                break;
            }
        }
        value
    }

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        let expected =
            hex::decode("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50").unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_nonce_range_clamps_at_top_of_space() {
        let range = NonceRange::new(u32::MAX - 9, 1000);
        assert_eq!(range.len(), 10);
        assert_eq!(range.end(), 1u64 << 32);
        assert_eq!(range.iter().last(), Some(u32::MAX));

        let full = NonceRange::new(0, u32::MAX);
        assert_eq!(full.end(), u32::MAX as u64);
    }

    #[test]
    fn test_search_with_max_target_finds_first_nonce() {
        let result = search(NonceRange::new(0, 1000), &preimage(), &[0xFF; 32]);
        assert!(result.found);
        assert_eq!(result.nonce, Some(0));
        assert_eq!(result.hashes_computed, 1);
    }

    #[test]
    fn test_search_strictly_below_target() {
        let pre = preimage();
        let hash = double_sha256(&pre.with_nonce(0));

        // Target one above the hash value: nonce 0 qualifies.
        let result = search(NonceRange::new(0, 1), &pre, &plus_one(as_target(&hash)));
        assert!(result.found);
        assert_eq!(result.nonce, Some(0));
        assert_eq!(result.hash, Some(hash));

        // Target equal to the hash value: not below, so not found.
        let result = search(NonceRange::new(0, 1), &pre, &as_target(&hash));
        assert!(!result.found);
        assert_eq!(result.nonce, None);
        assert_eq!(result.hashes_computed, 1);
    }

    #[test]
    fn test_search_exhausts_range_with_zero_target() {
        let result = search(NonceRange::new(500, 250), &preimage(), &[0u8; 32]);
        assert_eq!(result, MiningResult::not_found(250));
    }

    #[test]
    fn test_search_reports_nonce_within_range() {
        let pre = preimage();
        let hash = double_sha256(&pre.with_nonce(42));
        let target = plus_one(as_target(&hash));

        let result = search(NonceRange::new(42, 10), &pre, &target);
        assert!(result.found);
        assert_eq!(result.nonce, Some(42));
    }

    #[test]
    fn test_hash_below_target_compares_reversed_hash() {
        let mut target = [0u8; 32];
        target[2] = 0x01;

        // Internal byte 28 is display byte 3, below the target's first set byte.
        let mut hash = [0u8; 32];
        hash[28] = 0xFF;
        assert!(hash_below_target(&hash, &target));

        // Internal byte 29 maps to display byte 2; 0x02 > 0x01.
        hash[29] = 0x02;
        assert!(!hash_below_target(&hash, &target));
    }

    #[test]
    fn test_hash_to_display_hex() {
        let mut hash = [0u8; 32];
        hash[0] = 0xAB;
        let display = hash_to_display_hex(&hash);
        assert!(display.ends_with("ab"));
        assert!(display.starts_with("00"));
    }
}
