//! In-memory output store.
//!
//! Every output ever connected is kept together with the position that
//! created it and the positions that spent it. Reading the store through a
//! branch tip gives that branch's output set, so sibling candidates and
//! re-validation each see exactly their own ancestry.

use crate::{StateError, StateResult};
use ppc_consensus::{
    ChainView, ConsensusResult, OutPoint, OutputView, PositionId, SourceBlock, StakeSource,
    Transaction,
};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Serialized block header size in bytes.
pub const BLOCK_HEADER_SIZE: u32 = 80;

/// Length of the compact size prefix encoding `n`.
pub fn compact_size_len(n: u64) -> u32 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Byte offset of each transaction from the start of the serialized block.
pub fn transaction_offsets(transactions: &[Transaction]) -> Vec<u32> {
    let mut offset = BLOCK_HEADER_SIZE + compact_size_len(transactions.len() as u64);
    transactions
        .iter()
        .map(|tx| {
            let current = offset;
            offset += tx.serialized_size;
            current
        })
        .collect()
}

#[derive(Debug, Clone)]
struct OutputEntry {
    source: StakeSource,
    created_by: PositionId,
    /// Every position that spent the output, on any branch.
    spent_by: Vec<PositionId>,
}

/// Whether `id` is `tip` or one of its ancestors.
fn on_branch<C: ChainView + ?Sized>(chain: &C, id: PositionId, tip: Option<PositionId>) -> bool {
    let (Some(tip), Some(position)) = (tip, chain.position(id)) else {
        return false;
    };
    chain.ancestor(tip, position.height) == Some(id)
}

/// Outputs created by connected blocks on every branch.
///
/// Each entry remembers the position that created it and the positions
/// that spent it, so the output set of any branch can be read back with
/// [`at`](Self::at).
#[derive(Debug, Default)]
pub struct OutputStore {
    entries: HashMap<OutPoint, Vec<OutputEntry>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outputs ever connected, across branches.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outputs as they stand after `tip` was connected. `None` is the empty
    /// set before genesis.
    pub fn at<'a, C: ChainView + ?Sized>(
        &'a self,
        chain: &'a C,
        tip: Option<PositionId>,
    ) -> BranchOutputs<'a, C> {
        BranchOutputs {
            store: self,
            chain,
            tip,
        }
    }

    /// Spend the inputs and add the outputs of the block indexed as `id`.
    ///
    /// `id` must already be in `chain`. Check the block with
    /// [`BranchOutputs::check_spendable`] first; unknown inputs are skipped
    /// here.
    pub fn connect<C: ChainView + ?Sized>(
        &mut self,
        chain: &C,
        id: PositionId,
        block: SourceBlock,
        transactions: &[Transaction],
    ) {
        let offsets = transaction_offsets(transactions);

        for (tx, tx_offset) in transactions.iter().zip(offsets) {
            for input in &tx.inputs {
                let live = self.entries.get_mut(&input.prevout).and_then(|entries| {
                    entries
                        .iter_mut()
                        .find(|entry| live_on(chain, &**entry, Some(id)))
                });
                if let Some(entry) = live {
                    entry.spent_by.push(id);
                }
            }
            for (vout, output) in tx.outputs.iter().enumerate() {
                if output.is_empty() {
                    continue;
                }
                let outpoint = OutPoint::new(tx.txid, vout as u32);
                trace!(%outpoint, value = output.value, tx_offset, %id, "Output connected");
                self.entries.entry(outpoint).or_default().push(OutputEntry {
                    source: StakeSource {
                        outpoint,
                        output: output.clone(),
                        tx_time: tx.time,
                        block,
                        tx_offset,
                    },
                    created_by: id,
                    spent_by: Vec::new(),
                });
            }
        }
    }
}

/// Created on the branch ending at `tip` and not spent on it.
fn live_on<C: ChainView + ?Sized>(chain: &C, entry: &OutputEntry, tip: Option<PositionId>) -> bool {
    on_branch(chain, entry.created_by, tip)
        && !entry.spent_by.iter().any(|by| on_branch(chain, *by, tip))
}

/// Output set of the branch ending at one position.
pub struct BranchOutputs<'a, C: ?Sized> {
    store: &'a OutputStore,
    chain: &'a C,
    tip: Option<PositionId>,
}

impl<'a, C: ChainView + ?Sized> BranchOutputs<'a, C> {
    /// An output unspent on this branch.
    pub fn get(&self, outpoint: &OutPoint) -> Option<&'a StakeSource> {
        self.store
            .entries
            .get(outpoint)?
            .iter()
            .find(|entry| live_on(self.chain, entry, self.tip))
            .map(|entry| &entry.source)
    }

    /// Number of outputs unspent on this branch.
    pub fn unspent_count(&self) -> usize {
        self.store
            .entries
            .values()
            .flatten()
            .filter(|entry| live_on(self.chain, entry, self.tip))
            .count()
    }

    /// Check that every input of `transactions` can be spent on top of this
    /// branch, in block order.
    pub fn check_spendable(&self, transactions: &[Transaction]) -> StateResult<()> {
        let mut created = HashSet::new();
        let mut spent = HashSet::new();

        for tx in transactions {
            for input in &tx.inputs {
                let prevout = input.prevout;
                if prevout.is_null() {
                    continue;
                }
                if !spent.insert(prevout) {
                    return Err(StateError::DoubleSpend(prevout));
                }
                if self.get(&prevout).is_none() && !created.contains(&prevout) {
                    return Err(StateError::MissingInput(prevout));
                }
            }
            for (vout, output) in tx.outputs.iter().enumerate() {
                if !output.is_empty() {
                    created.insert(OutPoint::new(tx.txid, vout as u32));
                }
            }
        }
        Ok(())
    }
}

impl<C: ChainView + ?Sized> OutputView for BranchOutputs<'_, C> {
    fn resolve_output(&self, outpoint: &OutPoint) -> ConsensusResult<Option<StakeSource>> {
        Ok(self.get(outpoint).cloned())
    }
}
