//! # ppc-tests
//!
//! Integration tests for the proof-of-stake kernel.
//!
//! This crate provides:
//! - Deterministic chain generators and a harness driving `ChainState`
//! - Frozen stake modifier fixtures
//! - Property-based tests for gates, coin age and kernel weighting
//! - End-to-end proof-of-stake scenarios, including concurrent readers
//! - Output visibility across competing branches
//! - Tool tests over fixture files in temporary directories

pub mod generators;
pub mod harness;

#[cfg(test)]
mod checksum_tests;


#[cfg(test)]
mod fork_tests;



#[cfg(test)]
mod property_tests;


pub use generators::*;
pub use harness::*;
