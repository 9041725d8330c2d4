//! Stake modifier generation.
//!
//! The stake modifier keeps an output's owner from computing, at the time
//! the output confirms, which future timestamps will let it stake: the
//! kernel hash mixes in a modifier that does not exist yet.
//!
//! A new modifier is generated at most once per `modifier_interval`. Each of
//! its 64 bits is the entropy bit of one block picked from the selection
//! interval preceding the generation time. Round `n` may only pick blocks up
//! to the end of section `n`, and later sections are longer, so recent
//! blocks get more chances. Within a round the candidate with the lowest
//! selection score wins; the score hashes the candidate's proof hash with
//! the previous modifier, so every node re-walking the same window picks the
//! same blocks.

use crate::chain::{resolve, ChainPosition, ChainView, PositionId, SourceBlock};
use crate::error::{ConsensusError, ConsensusResult, RejectReason};
use crate::hash::{Hash256, HashWriter};
use crate::kernel::KernelModifier;
use crate::network::NetworkParameters;
use crate::protocol::{is_protocol_v03, is_protocol_v05};
use num_bigint::BigUint;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Ratio of the last selection section's length to the first's.
pub const MODIFIER_INTERVAL_RATIO: i64 = 3;

/// Number of selection rounds, one per modifier bit.
pub const MODIFIER_ROUNDS: usize = 64;

/// Modifier for the position following a predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStakeModifier {
    pub modifier: u64,
    /// False when the modifier is inherited from an ancestor.
    pub generated: bool,
}

/// Length in seconds of selection section `section` (0..64).
pub fn selection_interval_section(params: &NetworkParameters, section: usize) -> i64 {
    debug_assert!(section < MODIFIER_ROUNDS);
    let interval = params.modifier_interval as i64;
    let section = section as i64;
    interval * 63 / (63 + (63 - section) * (MODIFIER_INTERVAL_RATIO - 1))
}

/// Total length in seconds of the selection interval.
pub fn selection_interval(params: &NetworkParameters) -> i64 {
    (0..MODIFIER_ROUNDS)
        .map(|section| selection_interval_section(params, section))
        .sum()
}

/// Most recent generated modifier at or before `from`, with its block time.
fn last_stake_modifier<C: ChainView + ?Sized>(
    chain: &C,
    from: PositionId,
) -> ConsensusResult<(u64, i64)> {
    let mut cursor = from;
    loop {
        let position = resolve(chain, cursor)?;
        if position.generated_stake_modifier() {
            return Ok((position.stake_modifier, position.time as i64));
        }
        match position.prev {
            Some(prev) => cursor = prev,
            None => return Err(ConsensusError::NoModifierGeneration(from)),
        }
    }
}

/// Selection score of a candidate; lower wins.
///
/// Proof-of-stake scores are divided by 2^32 so a proof-of-stake block is
/// always favoured over a proof-of-work block.
fn selection_score(candidate: &ChainPosition, prev_modifier: u64) -> BigUint {
    let hash = HashWriter::new()
        .write_hash(&candidate.selection_proof_hash())
        .write_u64(prev_modifier)
        .finalize();
    let score = hash.to_uint();
    if candidate.is_proof_of_stake() {
        score >> 32u32
    } else {
        score
    }
}

/// Pick the lowest-scoring unselected candidate with time up to `stop`.
///
/// The first unselected candidate is always eligible, whatever its time.
fn select_block_from_candidates<'a>(
    candidates: &[&'a ChainPosition],
    selected: &HashSet<Hash256>,
    stop: i64,
    prev_modifier: u64,
) -> Option<&'a ChainPosition> {
    let mut best: Option<(BigUint, &'a ChainPosition)> = None;

    for &candidate in candidates {
        if best.is_some() && candidate.time as i64 > stop {
            break;
        }
        if selected.contains(&candidate.hash) {
            continue;
        }
        let score = selection_score(candidate, prev_modifier);
        match &best {
            Some((best_score, _)) if score >= *best_score => {}
            _ => best = Some((score, candidate)),
        }
    }

    if let Some((score, _)) = &best {
        trace!(selection_score = %score, "Selected modifier candidate");
    }
    best.map(|(_, candidate)| candidate)
}

/// Compute the stake modifier for the position following `prev`.
///
/// Genesis (`prev == None`) gets modifier 0, flagged as generated. Fails
/// only when the index cannot be walked, which is local corruption.
pub fn compute_next_stake_modifier<C: ChainView + ?Sized>(
    chain: &C,
    params: &NetworkParameters,
    prev: Option<PositionId>,
) -> ConsensusResult<NextStakeModifier> {
    let Some(prev_id) = prev else {
        return Ok(NextStakeModifier {
            modifier: 0,
            generated: true,
        });
    };
    let prev_position = resolve(chain, prev_id)?;

    let (prev_modifier, modifier_time) = last_stake_modifier(chain, prev_id)?;
    let interval = params.modifier_interval as i64;
    let prev_time = prev_position.time as i64;
    let (Some(modifier_bucket), Some(prev_bucket)) =
        (modifier_time.checked_div(interval), prev_time.checked_div(interval))
    else {
        return Err(ConsensusError::InvalidParameter {
            field: "modifier_interval",
            message: "must be greater than zero",
        });
    };

    if modifier_bucket >= prev_bucket {
        trace!(
            height = prev_position.height,
            prev_time, "No new modifier interval, keeping current modifier"
        );
        return Ok(NextStakeModifier {
            modifier: prev_modifier,
            generated: false,
        });
    }

    let selection_start = prev_bucket * interval - selection_interval(params);

    // Walk back over the selection window only.
    let mut candidates: Vec<&ChainPosition> = Vec::new();
    let mut cursor = Some(prev_id);
    while let Some(id) = cursor {
        let position = resolve(chain, id)?;
        if (position.time as i64) < selection_start {
            break;
        }
        candidates.push(position);
        cursor = position.prev;
    }
    candidates.reverse();
    candidates.sort_by(|a, b| (a.time, a.hash).cmp(&(b.time, b.hash)));

    let rounds = candidates.len().min(MODIFIER_ROUNDS);
    let mut selected: HashSet<Hash256> = HashSet::with_capacity(rounds);
    let mut new_modifier = 0u64;
    let mut selection_stop = selection_start;

    for round in 0..rounds {
        selection_stop += selection_interval_section(params, round);
        let Some(winner) =
            select_block_from_candidates(&candidates, &selected, selection_stop, prev_modifier)
        else {
            break;
        };
        new_modifier |= u64::from(winner.entropy_bit()) << round;
        selected.insert(winner.hash);
        trace!(
            round,
            stop = selection_stop,
            height = winner.height,
            bit = winner.entropy_bit(),
            "Selected block for stake modifier"
        );
    }

    debug!(
        height = prev_position.height + 1,
        modifier = %format_args!("{:#018x}", new_modifier),
        candidates = candidates.len(),
        rounds,
        "Generated stake modifier"
    );

    Ok(NextStakeModifier {
        modifier: new_modifier,
        generated: true,
    })
}

/// Modifier mixed into the kernel of a coinstake at `time_tx` on the branch
/// ending at `prev`, for an output confirmed in `block_from`.
///
/// - before v0.3: the compact difficulty bits take the modifier's place
/// - v0.3 to v0.5: the modifier generated about one selection interval after `block_from`
/// - from v0.5: the predecessor's modifier
pub fn kernel_stake_modifier<C: ChainView + ?Sized>(
    chain: &C,
    params: &NetworkParameters,
    prev: PositionId,
    block_from: &SourceBlock,
    time_tx: u32,
) -> ConsensusResult<KernelModifier> {
    if !is_protocol_v03(params, time_tx) {
        return Ok(KernelModifier::LegacyBits);
    }
    let prev_position = resolve(chain, prev)?;
    if is_protocol_v05(params, time_tx) {
        return Ok(KernelModifier::Modifier(prev_position.stake_modifier));
    }

    if prev_position.height < block_from.height {
        return Err(ConsensusError::MissingAncestor {
            from: prev,
            height: block_from.height,
        });
    }

    // Branch segment strictly after `block_from`, oldest first.
    let mut segment: Vec<&ChainPosition> = Vec::new();
    let mut cursor = Some(prev);
    while let Some(id) = cursor {
        let position = resolve(chain, id)?;
        if position.height <= block_from.height {
            break;
        }
        segment.push(position);
        cursor = position.prev;
    }
    segment.reverse();

    let target_time = block_from.time as i64 + selection_interval(params);
    let mut modifier_time = block_from.time as i64;
    let mut current: Option<&ChainPosition> = None;
    let mut next = segment.into_iter();

    while modifier_time < target_time {
        let Some(position) = next.next() else {
            return Err(RejectReason::ModifierNotYetAvailable {
                block_from: block_from.hash,
            }
            .into());
        };
        if position.generated_stake_modifier() {
            modifier_time = position.time as i64;
        }
        current = Some(position);
    }

    match current {
        Some(position) => Ok(KernelModifier::Modifier(position.stake_modifier)),
        // Only reachable with an empty selection interval.
        None => {
            let from = chain
                .lookup(&block_from.hash)
                .ok_or(ConsensusError::MissingAncestor {
                    from: prev,
                    height: block_from.height,
                })?;
            Ok(KernelModifier::Modifier(resolve(chain, from)?.stake_modifier))
        }
    }
}
