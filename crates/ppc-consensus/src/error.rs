//! Error types for kernel validation.
//!
//! Two classes are kept apart: [`RejectReason`] is a verdict about the
//! candidate block, while the remaining [`ConsensusError`] variants report a
//! broken chain index or output view on this node.

use crate::chain::{OutPoint, PositionId};
use crate::hash::Hash256;
use thiserror::Error;

/// Coarse classification of a rejection, one per validation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    /// The coinstake shape or its kernel input is unusable.
    Structural,
    /// Timestamp or maturity constraints failed.
    Timestamp,
    /// The kernel hash missed its weighted target.
    Kernel,
    /// A stake modifier checksum disagrees with a hard checkpoint.
    Checkpoint,
}

/// Why a candidate block's stake proof was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The transaction is not a coinstake.
    #[error("Not a coinstake transaction: {txid}")]
    NotCoinstake { txid: Hash256 },

    /// The kernel input's previous output could not be found.
    #[error("Kernel prevout not found: {0}")]
    PrevoutNotFound(OutPoint),

    /// The kernel input's block is not an ancestor of the predecessor.
    #[error("Kernel prevout {outpoint} is not in the active branch (block {block})")]
    PrevoutNotInChain { outpoint: OutPoint, block: Hash256 },

    /// The staked output is not buried deep enough.
    #[error("Tried to stake at depth {depth}, required {required}")]
    StakeTooShallow { depth: u32, required: u32 },

    /// The coinstake time does not match the block time rules.
    #[error("Coinstake timestamp violation: block {block_time}, tx {tx_time}")]
    CoinstakeTimestamp { block_time: u32, tx_time: u32 },

    /// The coinstake time is not on the required granularity.
    #[error("Coinstake timestamp {tx_time} not a multiple of {granularity} seconds")]
    TimestampGranularity { tx_time: u32, granularity: u32 },

    /// The coinstake claims a time before the transaction it spends.
    #[error("Transaction time {tx_time} precedes previous transaction time {prev_time}")]
    TxTimeViolation { tx_time: u32, prev_time: u32 },

    /// The staked output has not reached the minimum age.
    #[error("Min age violation: block from {block_from_time} + {min_age} > {tx_time}")]
    MinAgeViolation {
        block_from_time: u32,
        min_age: u32,
        tx_time: u32,
    },

    /// The modifier a selection interval after the output is not known yet.
    #[error("Stake modifier for kernel block {block_from} not yet available")]
    ModifierNotYetAvailable { block_from: Hash256 },

    /// The kernel hash is above the weighted target.
    #[error("Kernel hash {proof_hash} does not meet weighted target")]
    KernelTargetMissed { proof_hash: Hash256 },

    /// A stake modifier checksum disagrees with a hard checkpoint.
    #[error("Stake modifier checkpoint mismatch at height {height}: got {got:#010x}, expected {expected:#010x}")]
    CheckpointMismatch { height: u32, got: u32, expected: u32 },
}

impl RejectReason {
    /// Which validation gate produced this rejection.
    pub fn kind(&self) -> RejectKind {
        match self {
            RejectReason::NotCoinstake { .. }
            | RejectReason::PrevoutNotFound(_)
            | RejectReason::PrevoutNotInChain { .. } => RejectKind::Structural,
            RejectReason::StakeTooShallow { .. }
            | RejectReason::CoinstakeTimestamp { .. }
            | RejectReason::TimestampGranularity { .. }
            | RejectReason::TxTimeViolation { .. }
            | RejectReason::MinAgeViolation { .. } => RejectKind::Timestamp,
            RejectReason::ModifierNotYetAvailable { .. } | RejectReason::KernelTargetMissed { .. } => {
                RejectKind::Kernel
            }
            RejectReason::CheckpointMismatch { .. } => RejectKind::Checkpoint,
        }
    }
}

/// Kernel errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// The candidate is invalid. Deterministic for the same chain state.
    #[error("Rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// A position id the index handed out cannot be resolved.
    #[error("Chain position {0} missing from index")]
    MissingPosition(PositionId),

    /// The backward walk from a position ended before the requested height.
    #[error("Ancestor at height {height} of position {from} not reachable")]
    MissingAncestor { from: PositionId, height: u32 },

    /// No position on the branch ever generated a stake modifier.
    #[error("No stake modifier generation found at or before position {0}")]
    NoModifierGeneration(PositionId),

    /// Parameters that cannot drive the kernel, such as a zero modifier interval.
    #[error("Invalid network parameter {field}: {message}")]
    InvalidParameter {
        field: &'static str,
        message: &'static str,
    },

    /// The output view reported an output it could not load.
    #[error("Output view corrupt for {outpoint}: {reason}")]
    CorruptOutput { outpoint: OutPoint, reason: String },
}

impl ConsensusError {
    /// True for verdicts about the candidate, false for local corruption.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ConsensusError::Rejected(_))
    }

    /// The rejection reason, if this is a rejection.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            ConsensusError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Result type for kernel operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
