//! Stake entropy bit.
//!
//! One bit per block feeds the stake modifier. From v0.4 it is the lowest bit
//! of the block hash; before that it was the top bit of the last byte of the
//! Hash160 digest of the block signature.

use crate::hash::Hash256;
use crate::network::NetworkParameters;
use crate::protocol::is_protocol_v04;

/// Hash160 (RIPEMD-160 of SHA-256) of an empty block signature.
pub const EMPTY_SIGNATURE_DIGEST: [u8; 20] = [
    0xb4, 0x72, 0xa2, 0x66, 0xd0, 0xbd, 0x89, 0xc1, 0x37, 0x06, 0xa4, 0x13, 0x2c, 0xcf, 0xb1,
    0x6f, 0x7c, 0x3b, 0x9f, 0xcb,
];

/// Entropy bit from a block hash: bit 0 of the hash read as a little-endian integer.
pub fn stake_entropy_bit_from_hash(hash: &Hash256) -> u8 {
    (hash.low_u64() & 1) as u8
}

/// Entropy bit of a block.
///
/// `signature_digest` is the Hash160 digest of the block signature, only
/// consulted before v0.4. A block without a signature uses the digest of
/// the empty signature.
pub fn stake_entropy_bit(
    params: &NetworkParameters,
    block_time: u32,
    block_hash: &Hash256,
    signature_digest: Option<&[u8; 20]>,
) -> u8 {
    if is_protocol_v04(params, block_time) {
        stake_entropy_bit_from_hash(block_hash)
    } else {
        let digest = signature_digest.unwrap_or(&EMPTY_SIGNATURE_DIGEST);
        digest[19] >> 7
    }
}
