//! Chain state and the block-acceptance path.
//!
//! All mutation goes through [`ChainState::accept_block`], which holds an
//! upgradable read lock while validating and upgrades to a write lock only
//! to connect. At most one acceptance runs at a time, while
//! [`ChainState::check_block`] may validate alternate candidates in
//! parallel under shared read locks.

use crate::{ChainIndex, OutputStore, StateError, StateResult};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use ppc_consensus::{
    check_proof_of_stake, compute_next_stake_modifier, enforce_stake_modifier_checkpoint,
    get_stake_modifier_checksum, kernel_stake_modifier, search_kernel, stake_entropy_bit,
    BlockFlags, ChainPosition, ChainView, Hash256, NetworkParameters, OutPoint, OutputView,
    PositionId, SourceBlock, Transaction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// A block offered for acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBlock {
    pub hash: Hash256,
    /// `None` only for genesis.
    #[serde(default)]
    pub prev_hash: Option<Hash256>,
    pub time: u32,
    #[serde(default = "default_version")]
    pub version: i32,
    /// Compact difficulty target.
    pub n_bits: u32,
    pub transactions: Vec<Transaction>,
    /// Hash160 digest of the block signature, for pre-v0.4 entropy bits.
    #[serde(default, with = "digest_hex")]
    pub signature_digest: Option<[u8; 20]>,
}

fn default_version() -> i32 {
    1
}

impl CandidateBlock {
    /// The coinstake, which is always the second transaction.
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }
}

/// Derived values of a block that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedBlock {
    pub height: u32,
    pub stake_modifier: u64,
    pub stake_modifier_checksum: u32,
    pub generated_modifier: bool,
    pub entropy_bit: u8,
    /// Kernel proof hash, for proof-of-stake blocks.
    pub proof_hash: Option<Hash256>,
}

/// A block connected to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedBlock {
    pub id: PositionId,
    pub block: ValidatedBlock,
}

#[derive(Debug, Clone)]
struct StoredCoinstake {
    tx: Transaction,
    n_bits: u32,
}

#[derive(Debug, Default)]
struct Inner {
    index: ChainIndex,
    outputs: OutputStore,
    coinstakes: HashMap<PositionId, StoredCoinstake>,
}

impl Inner {
    fn resolve_prev(&self, block: &CandidateBlock) -> StateResult<Option<PositionId>> {
        if self.index.lookup(&block.hash).is_some() {
            return Err(StateError::DuplicateBlock(block.hash));
        }
        match block.prev_hash {
            Some(prev) => self
                .index
                .lookup(&prev)
                .map(Some)
                .ok_or(StateError::UnknownPredecessor {
                    hash: block.hash,
                    prev,
                }),
            None if self.index.is_empty() => Ok(None),
            None => Err(StateError::GenesisExists(block.hash)),
        }
    }

    /// Run every check and derive the position `block` would get.
    fn evaluate(
        &self,
        params: &NetworkParameters,
        block: &CandidateBlock,
    ) -> StateResult<(ChainPosition, ValidatedBlock)> {
        let prev = self.resolve_prev(block)?;
        let outputs = self.outputs.at(&self.index, prev);

        let proof_hash = match (block.coinstake(), prev) {
            (Some(coinstake), Some(prev)) => Some(check_proof_of_stake(
                &self.index,
                &outputs,
                params,
                prev,
                coinstake,
                block.n_bits,
                block.time,
            )?),
            (Some(_), None) => {
                return Err(StateError::InvalidTransition(
                    "Proof-of-stake genesis block".to_string(),
                ))
            }
            (None, _) => None,
        };

        outputs.check_spendable(&block.transactions)?;

        let height = match prev {
            Some(prev) => {
                self.index
                    .position(prev)
                    .ok_or_else(|| StateError::BlockNotFound(prev.to_string()))?
                    .height
                    + 1
            }
            None => 0,
        };

        let entropy_bit =
            stake_entropy_bit(params, block.time, &block.hash, block.signature_digest.as_ref());
        let next = compute_next_stake_modifier(&self.index, params, prev)?;

        let mut position = ChainPosition {
            prev,
            height,
            time: block.time,
            version: block.version,
            hash: block.hash,
            flags: BlockFlags::new(proof_hash.is_some(), entropy_bit, next.generated),
            stake_modifier: next.modifier,
            stake_modifier_checksum: 0,
            hash_proof_of_stake: proof_hash.unwrap_or(Hash256::ZERO),
        };
        position.stake_modifier_checksum = get_stake_modifier_checksum(&self.index, &position)?;
        enforce_stake_modifier_checkpoint(params, height, position.stake_modifier_checksum)?;

        let validated = ValidatedBlock {
            height,
            stake_modifier: position.stake_modifier,
            stake_modifier_checksum: position.stake_modifier_checksum,
            generated_modifier: next.generated,
            entropy_bit,
            proof_hash,
        };
        Ok((position, validated))
    }
}

/// Chain index and output store behind one lock.
pub struct ChainState {
    params: NetworkParameters,
    inner: RwLock<Inner>,
}

impl ChainState {
    /// Create an empty chain state.
    pub fn new(params: NetworkParameters) -> Self {
        Self {
            params,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn params(&self) -> &NetworkParameters {
        &self.params
    }

    /// Number of indexed positions.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().index.is_empty()
    }

    /// Best tip id and position.
    pub fn best_tip(&self) -> Option<(PositionId, ChainPosition)> {
        let inner = self.inner.read();
        let id = inner.index.best_tip()?;
        inner.index.position(id).map(|position| (id, position.clone()))
    }

    /// Position by id.
    pub fn position(&self, id: PositionId) -> Option<ChainPosition> {
        self.inner.read().index.position(id).cloned()
    }

    /// Position by block hash.
    pub fn position_by_hash(&self, hash: &Hash256) -> Option<(PositionId, ChainPosition)> {
        let inner = self.inner.read();
        let id = inner.index.lookup(hash)?;
        inner.index.position(id).map(|position| (id, position.clone()))
    }

    /// All positions in acceptance order.
    pub fn positions(&self) -> Vec<(PositionId, ChainPosition)> {
        let inner = self.inner.read();
        inner
            .index
            .iter()
            .map(|(id, position)| (id, position.clone()))
            .collect()
    }

    /// Validate and connect a block.
    #[instrument(skip(self, block), fields(hash = %block.hash, time = block.time))]
    pub fn accept_block(&self, block: &CandidateBlock) -> StateResult<AcceptedBlock> {
        let inner = self.inner.upgradable_read();

        let (position, validated) = match inner.evaluate(&self.params, block) {
            Ok(evaluated) => evaluated,
            Err(err) => {
                if err.is_rejection() {
                    warn!(error = %err, "Block rejected");
                }
                return Err(err);
            }
        };

        let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
        let source = SourceBlock {
            hash: position.hash,
            height: position.height,
            time: position.time,
        };
        let Inner {
            index,
            outputs,
            coinstakes,
        } = &mut *inner;
        let id = index.insert(position)?;
        outputs.connect(&*index, id, source, &block.transactions);
        if let Some(coinstake) = block.coinstake() {
            coinstakes.insert(
                id,
                StoredCoinstake {
                    tx: coinstake.clone(),
                    n_bits: block.n_bits,
                },
            );
        }

        info!(
            height = validated.height,
            %id,
            modifier = %format_args!("{:#018x}", validated.stake_modifier),
            checksum = %format_args!("{:#010x}", validated.stake_modifier_checksum),
            generated = validated.generated_modifier,
            "Block accepted"
        );
        Ok(AcceptedBlock {
            id,
            block: validated,
        })
    }

    /// Validate a block without connecting it.
    #[instrument(skip(self, block), fields(hash = %block.hash))]
    pub fn check_block(&self, block: &CandidateBlock) -> StateResult<ValidatedBlock> {
        let inner = self.inner.read();
        let (_, validated) = inner.evaluate(&self.params, block)?;
        debug!(height = validated.height, "Block checked");
        Ok(validated)
    }

    /// Re-run the kernel check of a connected proof-of-stake block against
    /// the chain as it stood when the block was accepted.
    ///
    /// Returns `None` for proof-of-work blocks, and
    /// [`StateError::ProofMismatch`] when the replay does not reproduce the
    /// recorded proof hash.
    #[instrument(skip(self))]
    pub fn revalidate(&self, id: PositionId) -> StateResult<Option<Hash256>> {
        let inner = self.inner.read();
        let position = inner
            .index
            .position(id)
            .ok_or_else(|| StateError::BlockNotFound(id.to_string()))?;
        let Some(stored) = inner.coinstakes.get(&id) else {
            return Ok(None);
        };
        let prev = position.prev.ok_or_else(|| {
            StateError::InvalidTransition("Proof-of-stake block without predecessor".to_string())
        })?;

        let proof = check_proof_of_stake(
            &inner.index,
            &inner.outputs.at(&inner.index, Some(prev)),
            &self.params,
            prev,
            &stored.tx,
            stored.n_bits,
            position.time,
        )?;
        if proof != position.hash_proof_of_stake {
            return Err(StateError::ProofMismatch {
                id,
                recorded: position.hash_proof_of_stake,
                replayed: proof,
            });
        }
        Ok(Some(proof))
    }

    /// Search `from..=to` for a timestamp at which `outpoint` stakes on top
    /// of the best tip, with the modifier in force at `from`.
    pub fn search_kernel(
        &self,
        outpoint: &OutPoint,
        n_bits: u32,
        from: u32,
        to: u32,
    ) -> StateResult<Option<(u32, Hash256)>> {
        let inner = self.inner.read();
        let tip = inner
            .index
            .best_tip()
            .ok_or_else(|| StateError::BlockNotFound("best tip".to_string()))?;
        let source = inner
            .outputs
            .at(&inner.index, Some(tip))
            .resolve_output(outpoint)?
            .ok_or(StateError::MissingInput(*outpoint))?;
        let modifier = kernel_stake_modifier(&inner.index, &self.params, tip, &source.block, from)?;
        Ok(search_kernel(&self.params, modifier, n_bits, &source, from, to))
    }
}

mod digest_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(digest: &Option<[u8; 20]>, serializer: S) -> Result<S::Ok, S::Error> {
        match digest {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<[u8; 20]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let digest: [u8; 20] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature digest must be 20 bytes"))?;
        Ok(Some(digest))
    }
}
