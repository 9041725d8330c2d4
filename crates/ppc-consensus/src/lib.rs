//! # ppc-consensus
//!
//! Proof-of-stake kernel rules for a Peercoin-style chain.
//!
//! This crate provides:
//! - Protocol version gates keyed by timestamp (and supermajority for v0.6)
//! - Stake entropy bits and the 64-round stake modifier generator
//! - Stake modifier checksums and hard checkpoints
//! - Coin age and the weighted kernel hash check
//! - Full coinstake validation against a chain view and an output view
//!
//! ## Kernel
//!
//! A coinstake is valid when the double SHA-256 of its kernel input,
//! prefixed by a stake modifier the staker could not have known when the
//! output confirmed, falls below the block target scaled by the output's
//! coin-days.
//!
//! Chain state is read through [`ChainView`] and [`OutputView`]; nothing in
//! this crate mutates it.

mod chain;
mod checksum;
pub mod coin_age;
pub mod compact;
mod entropy;
mod error;
mod hash;
pub mod kernel;
pub mod modifier;
mod network;
mod proof;
pub mod protocol;

pub use chain::{
    BlockFlags, ChainPosition, ChainView, OutPoint, OutputView, PositionId, SourceBlock,
    StakeSource, Transaction, TxIn, TxOut,
};
pub use checksum::{
    check_stake_modifier_checkpoints, enforce_stake_modifier_checkpoint,
    get_stake_modifier_checksum, stake_modifier_checksum,
};
pub use coin_age::get_coin_age;
pub use entropy::{stake_entropy_bit, stake_entropy_bit_from_hash, EMPTY_SIGNATURE_DIGEST};
pub use error::{ConsensusError, ConsensusResult, RejectKind, RejectReason};
pub use hash::{sha256d, Hash256, HashWriter};
pub use kernel::{check_stake_kernel_hash, search_kernel, stake_weighted_target, KernelModifier};
pub use modifier::{compute_next_stake_modifier, kernel_stake_modifier, NextStakeModifier};
pub use network::{
    Network, NetworkParameters, NetworkParamsConfig, NetworkParamsError, ProtocolSwitchTable,
    SuperMajorityRule,
};
pub use proof::{check_coinstake_timestamp, check_proof_of_stake};
pub use protocol::{is_protocol_v06, ProtocolFeature};
