//! Proof-of-stake validation of a candidate block's coinstake.
//!
//! Three gates run in order, each with its own rejection kind:
//! structure (is this a coinstake spending a known output on this branch),
//! timestamps (coinstake time rules and stake maturity) and finally the
//! kernel hash against its weighted target.

use crate::chain::{resolve, ChainView, OutputView, PositionId, StakeSource, Transaction};
use crate::error::{ConsensusResult, RejectReason};
use crate::hash::Hash256;
use crate::kernel::check_stake_kernel_hash;
use crate::modifier::kernel_stake_modifier;
use crate::network::NetworkParameters;
use crate::protocol::{is_protocol_v03, is_protocol_v09};
use tracing::{debug, instrument};

/// Coinstake timestamp rules relative to the block time.
///
/// From v0.3 the two must be equal; before that the block may be up to
/// `max_clock_drift` seconds later. From v0.9 the coinstake time must also
/// sit on the stake timestamp granularity.
pub fn check_coinstake_timestamp(
    params: &NetworkParameters,
    block_time: u32,
    tx_time: u32,
) -> Result<(), RejectReason> {
    if is_protocol_v09(params, tx_time) && tx_time & params.stake_timestamp_mask != 0 {
        return Err(RejectReason::TimestampGranularity {
            tx_time,
            granularity: params.stake_timestamp_granularity(),
        });
    }

    let ok = if is_protocol_v03(params, tx_time) {
        block_time == tx_time
    } else {
        block_time >= tx_time && block_time as u64 <= tx_time as u64 + params.max_clock_drift as u64
    };
    if ok {
        Ok(())
    } else {
        Err(RejectReason::CoinstakeTimestamp { block_time, tx_time })
    }
}

/// Resolve the kernel output and make sure its block is on the branch ending at `prev`.
fn resolve_kernel_source<C, O>(
    chain: &C,
    outputs: &O,
    prev: PositionId,
    tx: &Transaction,
) -> ConsensusResult<StakeSource>
where
    C: ChainView + ?Sized,
    O: OutputView + ?Sized,
{
    let prevout = tx
        .kernel_prevout()
        .ok_or(RejectReason::NotCoinstake { txid: tx.txid })?;
    let source = outputs
        .resolve_output(&prevout)?
        .ok_or(RejectReason::PrevoutNotFound(prevout))?;

    let on_branch = chain
        .ancestor(prev, source.block.height)
        .and_then(|id| chain.position(id))
        .map(|position| position.hash == source.block.hash)
        .unwrap_or(false);
    if !on_branch {
        return Err(RejectReason::PrevoutNotInChain {
            outpoint: prevout,
            block: source.block.hash,
        }
        .into());
    }
    Ok(source)
}

/// Validate the coinstake `tx` of a block at `block_time` extending `prev`.
///
/// Returns the kernel proof hash. Rejections are deterministic for the same
/// chain state; any other error means the index or output view is broken.
#[instrument(skip(chain, outputs, params, tx), fields(txid = %tx.txid))]
pub fn check_proof_of_stake<C, O>(
    chain: &C,
    outputs: &O,
    params: &NetworkParameters,
    prev: PositionId,
    tx: &Transaction,
    n_bits: u32,
    block_time: u32,
) -> ConsensusResult<Hash256>
where
    C: ChainView + ?Sized,
    O: OutputView + ?Sized,
{
    let source = resolve_kernel_source(chain, outputs, prev, tx)?;

    let time_tx = tx.time.unwrap_or(block_time);
    check_coinstake_timestamp(params, block_time, time_tx)?;

    let prev_height = resolve(chain, prev)?.height;
    let depth = prev_height - source.block.height;
    let required = params.stake_min_depth.saturating_sub(1);
    if depth < required {
        return Err(RejectReason::StakeTooShallow { depth, required }.into());
    }

    let modifier = kernel_stake_modifier(chain, params, prev, &source.block, time_tx)?;
    let proof_hash = check_stake_kernel_hash(params, modifier, n_bits, &source, time_tx)?;

    debug!(%proof_hash, depth, "Proof of stake accepted");
    Ok(proof_hash)
}
