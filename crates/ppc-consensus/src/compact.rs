//! Compact ("nBits") target encoding.
//!
//! Targets are 256-bit unsigned integers. Arithmetic on them is truncated to
//! 256 bits so products overflow the same way the fixed-width integers used
//! by every other node do.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Largest 256-bit value (2^256 - 1).
pub fn max_uint256() -> BigUint {
    (BigUint::one() << 256) - BigUint::one()
}

/// Reduce a value modulo 2^256.
pub fn truncate_256(value: BigUint) -> BigUint {
    if value.bits() <= 256 {
        value
    } else {
        value & max_uint256()
    }
}

/// Decode compact nBits into a target.
///
/// The sign bit (0x00800000) is masked off, as are bits shifted past 256.
pub fn nbits_to_target(nbits: u32) -> BigUint {
    let size = (nbits >> 24) as usize;
    let word = nbits & 0x007f_ffff;

    if size <= 3 {
        BigUint::from(word >> (8 * (3 - size)))
    } else {
        truncate_256(BigUint::from(word) << (8 * (size - 3)))
    }
}

/// Encode a target as compact nBits.
pub fn target_to_nbits(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }

    let mut size = ((target.bits() + 7) / 8) as u32;
    let mut compact: u32 = if size <= 3 {
        let low = target.to_u64_digits().first().copied().unwrap_or(0);
        (low << (8 * (3 - size))) as u32
    } else {
        let shifted: BigUint = target >> (8 * (size - 3));
        shifted.to_u64_digits().first().copied().unwrap_or(0) as u32
    };

    // The sign bit is set: move one byte into the exponent.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | (size << 24)
}
