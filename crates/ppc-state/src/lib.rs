//! # ppc-state
//!
//! Chain state for the proof-of-stake kernel.
//!
//! This crate provides:
//! - An append-only chain index implementing [`ppc_consensus::ChainView`]
//! - An in-memory output store whose per-branch views implement
//!   [`ppc_consensus::OutputView`]
//! - `ChainState`, the block-acceptance path
//!
//! ## Locking
//!
//! `ChainState` keeps the index and the output store behind one
//! `parking_lot::RwLock`. Acceptance is single-writer; checking alternate
//! candidates only needs a shared read.

mod error;
mod index;
mod manager;
mod outputs;

pub use error::{StateError, StateResult};
pub use index::ChainIndex;
pub use manager::{AcceptedBlock, CandidateBlock, ChainState, ValidatedBlock};
pub use outputs::{
    compact_size_len, transaction_offsets, BranchOutputs, OutputStore, BLOCK_HEADER_SIZE,
};
