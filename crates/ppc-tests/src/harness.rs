//! Test harness for integration tests.
//!
//! [`TestChain`] drives a `ChainState` on regtest parameters through the
//! real acceptance path, and [`FixtureDir`] holds files for tool tests.

use crate::generators::{align_up, stake_block, work_block, EASY_BITS};
use ppc_consensus::{ChainPosition, Hash256, NetworkParameters, OutPoint};
use ppc_state::{AcceptedBlock, CandidateBlock, ChainState, StateResult};
use ppc_tool::fixture::ChainFixture;
use std::path::PathBuf;
use tempfile::TempDir;

/// Reward of ordinary generated blocks.
pub const BLOCK_REWARD: i64 = 50_000_000;

/// Chain driven through `ChainState::accept_block`.
pub struct TestChain {
    pub state: ChainState,
    /// Every block accepted so far, in order.
    pub blocks: Vec<CandidateBlock>,
}

impl TestChain {
    pub fn new(params: NetworkParameters) -> Self {
        Self {
            state: ChainState::new(params),
            blocks: Vec::new(),
        }
    }

    /// Empty regtest chain.
    pub fn regtest() -> Self {
        Self::new(NetworkParameters::regtest())
    }

    pub fn params(&self) -> &NetworkParameters {
        self.state.params()
    }

    pub fn tip(&self) -> ChainPosition {
        self.state.best_tip().expect("chain has a tip").1
    }

    /// Offer a block; it is remembered only when accepted.
    pub fn submit(&mut self, block: CandidateBlock) -> StateResult<AcceptedBlock> {
        let accepted = self.state.accept_block(&block)?;
        self.blocks.push(block);
        Ok(accepted)
    }

    /// Accept proof-of-work blocks at the given times on branch 0.
    pub fn mine_at(&mut self, times: &[u32]) -> Vec<AcceptedBlock> {
        times
            .iter()
            .map(|time| {
                let (height, prev) = self.next_slot();
                let block = work_block(0, height, prev, *time, BLOCK_REWARD);
                self.submit(block).expect("work block accepted")
            })
            .collect()
    }

    /// Accept `count` proof-of-work blocks `spacing` seconds apart.
    pub fn mine(&mut self, count: u32, spacing: u32) -> Vec<AcceptedBlock> {
        let start = self.tip().time;
        let times: Vec<u32> = (1..=count).map(|i| start + i * spacing).collect();
        self.mine_at(&times)
    }

    /// Accept a proof-of-work block paying `value`, returning its output.
    pub fn fund(&mut self, value: i64, spacing: u32) -> OutPoint {
        let (height, prev) = self.next_slot();
        let time = self.tip().time + spacing;
        let block = work_block(0, height, prev, time, value);
        let txid = block.transactions[0].txid;
        self.submit(block).expect("funding block accepted");
        OutPoint::new(txid, 0)
    }

    /// Proof-of-stake block on the tip at the first time `outpoint` stakes.
    pub fn find_stake(&self, outpoint: OutPoint, value: i64) -> Option<CandidateBlock> {
        let tip = self.tip();
        let params = self.params();
        let from = align_up(tip.time + 1, params.stake_timestamp_granularity());
        let to = tip.time + params.stake_max_age;
        let (time, _) = self
            .state
            .search_kernel(&outpoint, EASY_BITS, from, to)
            .expect("kernel search")?;
        Some(stake_block(tip.hash, time, EASY_BITS, outpoint, value))
    }

    /// Chain fixture of every accepted block.
    pub fn fixture(&self) -> ChainFixture {
        ChainFixture {
            network: self.params().network,
            blocks: self.blocks.clone(),
        }
    }

    fn next_slot(&self) -> (u32, Option<Hash256>) {
        match self.state.best_tip() {
            Some((_, tip)) => (tip.height + 1, Some(tip.hash)),
            None => (0, None),
        }
    }
}

/// Temporary directory for fixture and parameter files.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of `name` inside the directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }
}

impl Default for FixtureDir {
    fn default() -> Self {
        Self::new()
    }
}
