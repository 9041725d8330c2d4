//! # ppc-tool
//!
//! Offline verification of proof-of-stake chains.
//!
//! A chain fixture (JSON) is replayed through `ppc_state::ChainState` to
//! print stake modifiers and checksums, compare them against checkpoints,
//! or search kernel timestamps for an output.

pub mod commands;
pub mod config;
pub mod fixture;
