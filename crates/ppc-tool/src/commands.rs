//! Subcommand implementations.

use crate::fixture::ChainFixture;
use anyhow::{bail, Context, Result};
use ppc_consensus::{Hash256, NetworkParameters, OutPoint};
use ppc_state::ChainState;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// One accepted block as printed by `replay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRow {
    pub height: u32,
    pub hash: Hash256,
    pub stake_modifier: u64,
    pub checksum: u32,
    pub generated: bool,
    pub proof_hash: Option<Hash256>,
}

impl fmt::Display for ReplayRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>8} {} modifier={:#018x} checksum={:#010x} generated={}",
            self.height, self.hash, self.stake_modifier, self.checksum, self.generated
        )?;
        if let Some(proof) = &self.proof_hash {
            write!(f, " proof={}", proof)?;
        }
        Ok(())
    }
}

/// Accept every fixture block into `state`, stopping at the first failure.
pub fn replay(state: &ChainState, fixture: &ChainFixture) -> Result<Vec<ReplayRow>> {
    let mut rows = Vec::with_capacity(fixture.blocks.len());
    for (i, block) in fixture.blocks.iter().enumerate() {
        let accepted = state
            .accept_block(block)
            .with_context(|| format!("Block #{} ({}) not accepted", i, block.hash))?;
        rows.push(ReplayRow {
            height: accepted.block.height,
            hash: block.hash,
            stake_modifier: accepted.block.stake_modifier,
            checksum: accepted.block.stake_modifier_checksum,
            generated: accepted.block.generated_modifier,
            proof_hash: accepted.block.proof_hash,
        });
    }
    info!(blocks = rows.len(), "Replay finished");
    Ok(rows)
}

/// Checksum comparison at one checkpointed height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointReport {
    pub height: u32,
    pub expected: u32,
    /// Computed checksum, `None` when the fixture does not reach the height.
    pub computed: Option<u32>,
}

impl CheckpointReport {
    pub fn matches(&self) -> bool {
        self.computed == Some(self.expected)
    }
}

impl fmt::Display for CheckpointReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.computed {
            Some(computed) if computed == self.expected => {
                write!(f, "{:>8} {:#010x} ok", self.height, self.expected)
            }
            Some(computed) => write!(
                f,
                "{:>8} {:#010x} MISMATCH computed {:#010x}",
                self.height, self.expected, computed
            ),
            None => write!(f, "{:>8} {:#010x} not reached", self.height, self.expected),
        }
    }
}

/// Replay without enforcing checkpoints, then compare every checkpoint.
pub fn checkpoints(params: &NetworkParameters, fixture: &ChainFixture) -> Result<Vec<CheckpointReport>> {
    let unchecked = ChainState::new(params.clone().with_checkpoints(BTreeMap::new()));
    let rows = replay(&unchecked, fixture)?;

    let mut computed: BTreeMap<u32, u32> = BTreeMap::new();
    for row in &rows {
        computed.entry(row.height).or_insert(row.checksum);
    }

    let reports: Vec<CheckpointReport> = params
        .checkpoints()
        .map(|(height, expected)| CheckpointReport {
            height,
            expected,
            computed: computed.get(&height).copied(),
        })
        .collect();

    for report in reports.iter().filter(|r| r.computed.is_some() && !r.matches()) {
        warn!(height = report.height, "Checkpoint mismatch");
    }
    Ok(reports)
}

/// Replay the fixture, then search for a kernel staking `outpoint` on its tip.
pub fn search(
    params: &NetworkParameters,
    fixture: &ChainFixture,
    outpoint: OutPoint,
    n_bits: u32,
    from: u32,
    to: u32,
) -> Result<Option<(u32, Hash256)>> {
    if from > to {
        bail!("Empty search range {}..={}", from, to);
    }
    let state = ChainState::new(params.clone());
    replay(&state, fixture)?;
    let found = state
        .search_kernel(&outpoint, n_bits, from, to)
        .with_context(|| format!("Kernel search for {} failed", outpoint))?;
    Ok(found)
}
