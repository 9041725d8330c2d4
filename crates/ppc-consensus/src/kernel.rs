//! Stake kernel hash evaluation.
//!
//! A kernel qualifies when
//!
//! ```text
//! sha256d(modifier, block_from_time, tx_prev_offset, tx_prev_time, vout, time_tx)
//!     <= coin_day_weight * target_per_coin_day
//! ```
//!
//! `block_from_time` and `tx_prev_offset` only make the input unique per
//! output, they carry no entropy. The weight grows with value and age, so
//! bigger and older stakes get proportionally easier targets. Evaluation is
//! pure: a staker may retry the same output at many timestamps, which is why
//! the modifier has to be unpredictable.

use crate::chain::StakeSource;
use crate::compact::{nbits_to_target, truncate_256};
use crate::error::RejectReason;
use crate::hash::{Hash256, HashWriter};
use crate::network::NetworkParameters;
use crate::protocol::{is_protocol_v03, is_protocol_v09};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, trace};

/// Seconds in a coin-day.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Value mixed in front of the kernel hash input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelModifier {
    /// A 64-bit stake modifier (v0.3 and later).
    Modifier(u64),
    /// The compact difficulty bits (before v0.3).
    LegacyBits,
}

/// Seconds of age that count towards the kernel weight.
///
/// Capped at the maximum stake age; from v0.3 the weight starts at zero
/// when the output reaches the minimum age.
pub fn stake_time_weight(params: &NetworkParameters, time_tx_prev: u32, time_tx: u32) -> i64 {
    let age = (time_tx as i64 - time_tx_prev as i64).min(params.stake_max_age as i64);
    let weight = if is_protocol_v03(params, time_tx) {
        age - params.stake_min_age as i64
    } else {
        age
    };
    weight.max(0)
}

/// Coin-days contributed by `value` over `time_weight` seconds.
pub fn coin_day_weight(params: &NetworkParameters, value: i64, time_weight: i64) -> BigUint {
    if value <= 0 || time_weight <= 0 {
        return BigUint::zero();
    }
    BigUint::from(value as u64) * BigUint::from(time_weight as u64)
        / BigUint::from(params.coin as u64)
        / BigUint::from(SECONDS_PER_DAY as u64)
}

/// Weighted target for staking `value` first seen at `time_tx_prev`, at `time_tx`.
pub fn stake_weighted_target(
    params: &NetworkParameters,
    n_bits: u32,
    value: i64,
    time_tx_prev: u32,
    time_tx: u32,
) -> BigUint {
    let time_weight = stake_time_weight(params, time_tx_prev, time_tx);
    target_for_weight(params, &nbits_to_target(n_bits), value, time_weight)
}

fn target_for_weight(
    params: &NetworkParameters,
    target_per_coin_day: &BigUint,
    value: i64,
    time_weight: i64,
) -> BigUint {
    truncate_256(coin_day_weight(params, value, time_weight) * target_per_coin_day)
}

/// Transaction time and minimum age checks that precede the hash.
fn check_kernel_times(
    params: &NetworkParameters,
    source: &StakeSource,
    time_tx: u32,
) -> Result<(), RejectReason> {
    let block_from_time = source.block.time;
    let tx_prev_time = source.effective_tx_time();

    if time_tx < tx_prev_time {
        return Err(RejectReason::TxTimeViolation {
            tx_time: time_tx,
            prev_time: tx_prev_time,
        });
    }

    if block_from_time as u64 + params.stake_min_age as u64 > time_tx as u64 {
        return Err(RejectReason::MinAgeViolation {
            block_from_time,
            min_age: params.stake_min_age,
            tx_time: time_tx,
        });
    }
    Ok(())
}

/// The kernel hash itself, without any target comparison.
pub fn kernel_hash(
    modifier: KernelModifier,
    n_bits: u32,
    block_from_time: u32,
    tx_prev_offset: u32,
    tx_prev_time: u32,
    prevout_index: u32,
    time_tx: u32,
) -> Hash256 {
    let mut writer = HashWriter::new();
    match modifier {
        KernelModifier::Modifier(value) => writer.write_u64(value),
        KernelModifier::LegacyBits => writer.write_u32(n_bits),
    };
    writer
        .write_u32(block_from_time)
        .write_u32(tx_prev_offset)
        .write_u32(tx_prev_time)
        .write_u32(prevout_index)
        .write_u32(time_tx)
        .finalize()
}

fn source_kernel_hash(
    modifier: KernelModifier,
    n_bits: u32,
    source: &StakeSource,
    time_tx: u32,
) -> Hash256 {
    kernel_hash(
        modifier,
        n_bits,
        source.block.time,
        source.tx_offset,
        source.effective_tx_time(),
        source.outpoint.vout,
        time_tx,
    )
}

/// Check whether staking `source` at `time_tx` meets the weighted target.
///
/// Returns the proof hash on success.
pub fn check_stake_kernel_hash(
    params: &NetworkParameters,
    modifier: KernelModifier,
    n_bits: u32,
    source: &StakeSource,
    time_tx: u32,
) -> Result<Hash256, RejectReason> {
    check_kernel_times(params, source, time_tx)?;

    let block_from_time = source.block.time;
    let tx_prev_time = source.effective_tx_time();
    let target = stake_weighted_target(params, n_bits, source.output.value, tx_prev_time, time_tx);
    let proof_hash = source_kernel_hash(modifier, n_bits, source, time_tx);

    trace!(
        ?modifier,
        block_from_time,
        tx_prev_offset = source.tx_offset,
        tx_prev_time,
        vout = source.outpoint.vout,
        time_tx,
        %proof_hash,
        "Kernel hash computed"
    );

    if proof_hash.to_uint() > target {
        return Err(RejectReason::KernelTargetMissed { proof_hash });
    }

    debug!(%proof_hash, outpoint = %source.outpoint, time_tx, "Stake kernel meets target");
    Ok(proof_hash)
}

/// Whether `time_tx` sits on the coinstake time granularity (v0.9 and later).
pub fn is_valid_stake_time(params: &NetworkParameters, time_tx: u32) -> bool {
    !is_protocol_v09(params, time_tx) || time_tx & params.stake_timestamp_mask == 0
}

/// First timestamp in `from..=to` at which `source` stakes, with its proof hash.
///
/// Skips timestamps off the coinstake granularity. The weighted target is
/// only recomputed when the time weight changes.
pub fn search_kernel(
    params: &NetworkParameters,
    modifier: KernelModifier,
    n_bits: u32,
    source: &StakeSource,
    from: u32,
    to: u32,
) -> Option<(u32, Hash256)> {
    let target_per_coin_day = nbits_to_target(n_bits);
    let tx_prev_time = source.effective_tx_time();
    let mut cached: Option<(i64, BigUint)> = None;

    (from..=to)
        .filter(|time| is_valid_stake_time(params, *time))
        .find_map(|time| {
            check_kernel_times(params, source, time).ok()?;
            let time_weight = stake_time_weight(params, tx_prev_time, time);
            if cached.as_ref().map(|(weight, _)| *weight) != Some(time_weight) {
                let target =
                    target_for_weight(params, &target_per_coin_day, source.output.value, time_weight);
                cached = Some((time_weight, target));
            }
            let (_, target) = cached.as_ref()?;
            let proof = source_kernel_hash(modifier, n_bits, source, time);
            (proof.to_uint() <= *target).then_some((time, proof))
        })
}
