//! Compact target decoding and difficulty reporting.
//!
//! The miner compares hashes against the full 256-bit `target` supplied by
//! the node; the compact form is only decoded to sanity-check that target
//! and to report a human-readable difficulty.

/// Target of difficulty 1 in compact form (the genesis block bits).
pub const DIFFICULTY_1_BITS: u32 = 0x1d00ffff;

/// Expand compact "bits" into a 32-byte big-endian target.
///
/// `target = mantissa * 256^(exponent - 3)`. A set sign bit, or a value that
/// does not fit in 256 bits, yields the zero target.
pub fn bits_to_target(bits: u32) -> [u8; 32] {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007F_FFFF;
    let mut target = [0u8; 32];

    if bits & 0x0080_0000 != 0 || exponent > 32 {
        return target;
    }

    let mantissa_bytes = mantissa.to_be_bytes();
    // Mantissa byte i (of 3) lands at big-endian position 32 - exponent + i.
    for (i, byte) in mantissa_bytes[1..].iter().enumerate() {
        let pos = 32 + i;
        if pos >= exponent && pos - exponent < 32 {
            target[pos - exponent] = *byte;
        }
    }

    target
}

/// Difficulty of a big-endian target relative to difficulty 1.
pub fn target_difficulty(target: &[u8; 32]) -> f64 {
    let current = target_to_f64(target);
    if current == 0.0 {
        return f64::INFINITY;
    }
    target_to_f64(&bits_to_target(DIFFICULTY_1_BITS)) / current
}

/// Difficulty of a compact target relative to difficulty 1.
pub fn bits_to_difficulty(bits: u32) -> f64 {
    target_difficulty(&bits_to_target(bits))
}

/// Approximate a big-endian 256-bit integer as an `f64`.
fn target_to_f64(target: &[u8; 32]) -> f64 {
    target
        .iter()
        .fold(0.0f64, |acc, byte| acc * 256.0 + *byte as f64)
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> alloc::string::String {
    const UNITS: [(f64, &str); 5] = [(1e15, "P"), (1e12, "T"), (1e9, "G"), (1e6, "M"), (1e3, "K")];

    for (scale, suffix) in UNITS {
        if difficulty >= scale {
            return alloc::format!("{:.2}{}", difficulty / scale, suffix);
        }
    }
    alloc::format!("{:.2}", difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_to_target_genesis() {
        let target = bits_to_target(DIFFICULTY_1_BITS);

        // 00000000ffff0000...
        assert_eq!(&target[0..4], &[0x00; 4]);
        assert_eq!(&target[4..6], &[0xff, 0xff]);
        assert!(target[6..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bits_to_target_regtest() {
        // Regtest minimum difficulty: 0x207fffff -> 7fffff00..00
        let target = bits_to_target(0x207fffff);
        assert_eq!(&target[0..3], &[0x7f, 0xff, 0xff]);
        assert!(target[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bits_to_target_small_exponent() {
        // Exponent 2 drops the low mantissa byte: 0x02123456 -> 0x1234
        let target = bits_to_target(0x02123456);
        assert_eq!(&target[30..], &[0x12, 0x34]);
        assert!(target[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bits_to_target_rejects_negative() {
        assert_eq!(bits_to_target(0x1d80ffff), [0u8; 32]);
    }

    #[test]
    fn test_difficulty_calculation() {
        let genesis = bits_to_difficulty(DIFFICULTY_1_BITS);
        assert!((genesis - 1.0).abs() < 1e-9);

        // Halving the target doubles the difficulty.
        let harder = bits_to_difficulty(0x1c7fff80);
        assert!((harder - 2.0).abs() < 1e-6);

        assert!(target_difficulty(&[0u8; 32]).is_infinite());
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(0.5), "0.50");
        assert_eq!(format_difficulty(1_500.0), "1.50K");
        assert_eq!(format_difficulty(83_150_000_000_000.0), "83.15T");
    }
}
