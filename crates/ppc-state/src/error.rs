//! Error types for chain state.

use ppc_consensus::{ConsensusError, Hash256, OutPoint, PositionId, RejectReason};
use thiserror::Error;

/// Chain state errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// Kernel validation failed, either as a rejection or an internal error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    /// The block is already in the index.
    #[error("Block already known: {0}")]
    DuplicateBlock(Hash256),

    /// The predecessor is not in the index.
    #[error("Unknown predecessor {prev} for block {hash}")]
    UnknownPredecessor { hash: Hash256, prev: Hash256 },

    /// A second block without predecessor.
    #[error("Genesis already set, refusing block {0}")]
    GenesisExists(Hash256),

    /// Block not found.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// A transaction input spends an output that does not exist or is spent.
    #[error("Missing or spent input {0}")]
    MissingInput(OutPoint),

    /// Two inputs in the same block spend one output.
    #[error("Output {0} spent twice in one block")]
    DoubleSpend(OutPoint),

    /// Re-validating a connected block gave a different proof hash than the
    /// one recorded when it was accepted.
    #[error("Proof hash of {id} replayed as {replayed}, recorded {recorded}")]
    ProofMismatch {
        id: PositionId,
        recorded: Hash256,
        replayed: Hash256,
    },

    /// Invalid state transition.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

impl StateError {
    /// True when the block was judged invalid by the kernel rules.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StateError::Consensus(err) if err.is_rejection())
    }

    /// The kernel rejection reason, if any.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            StateError::Consensus(err) => err.reject_reason(),
            _ => None,
        }
    }
}

impl From<RejectReason> for StateError {
    fn from(reason: RejectReason) -> Self {
        StateError::Consensus(ConsensusError::Rejected(reason))
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
