//! Stake modifier checksums and hard checkpoints.
//!
//! Each position's checksum chains its predecessor's checksum with its own
//! flags, proof hash and modifier. Pinning a handful of heights to known
//! checksums catches any divergence in modifier computation early.

use crate::chain::{resolve, BlockFlags, ChainPosition, ChainView};
use crate::error::{ConsensusResult, RejectReason};
use crate::hash::{Hash256, HashWriter};
use crate::network::NetworkParameters;
use tracing::warn;

/// Checksum over a position's modifier inputs.
///
/// The checksum is the top 32 bits of the double SHA-256 digest read as a
/// little-endian 256-bit integer.
pub fn stake_modifier_checksum(
    prev_checksum: Option<u32>,
    flags: BlockFlags,
    hash_proof_of_stake: &Hash256,
    stake_modifier: u64,
) -> u32 {
    let mut writer = HashWriter::new();
    if let Some(prev) = prev_checksum {
        writer.write_u32(prev);
    }
    let digest = writer
        .write_u32(flags.0)
        .write_hash(hash_proof_of_stake)
        .write_u64(stake_modifier)
        .finalize();
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]])
}

/// Checksum of `position`, chained from its predecessor's stored checksum.
pub fn get_stake_modifier_checksum<C: ChainView + ?Sized>(
    chain: &C,
    position: &ChainPosition,
) -> ConsensusResult<u32> {
    let prev_checksum = match position.prev {
        Some(prev) => Some(resolve(chain, prev)?.stake_modifier_checksum),
        None => None,
    };
    Ok(stake_modifier_checksum(
        prev_checksum,
        position.flags,
        &position.hash_proof_of_stake,
        position.stake_modifier,
    ))
}

/// True unless `height` has a checkpoint that disagrees with `checksum`.
pub fn check_stake_modifier_checkpoints(
    params: &NetworkParameters,
    height: u32,
    checksum: u32,
) -> bool {
    match params.checkpoint(height) {
        Some(expected) => expected == checksum,
        None => true,
    }
}

/// Like [`check_stake_modifier_checkpoints`], reporting the mismatch.
pub fn enforce_stake_modifier_checkpoint(
    params: &NetworkParameters,
    height: u32,
    checksum: u32,
) -> Result<(), RejectReason> {
    if check_stake_modifier_checkpoints(params, height, checksum) {
        return Ok(());
    }
    let expected = params.checkpoint(height).unwrap_or_default();
    warn!(
        height,
        got = %format_args!("{:#010x}", checksum),
        expected = %format_args!("{:#010x}", expected),
        "Stake modifier checkpoint mismatch"
    );
    Err(RejectReason::CheckpointMismatch {
        height,
        got: checksum,
        expected,
    })
}
