//! Chain positions, coinstake views and the collaborator traits the kernel
//! reads chain state through.

use crate::error::{ConsensusError, ConsensusResult};
use crate::hash::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable arena index of a chain position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u32);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-position flag bits. The numeric values are hashed into the modifier
/// checksum and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockFlags(pub u32);

impl BlockFlags {
    /// The block is proof-of-stake.
    pub const PROOF_OF_STAKE: u32 = 1 << 0;
    /// The block's entropy bit is set.
    pub const STAKE_ENTROPY: u32 = 1 << 1;
    /// A new stake modifier was generated at this block.
    pub const STAKE_MODIFIER: u32 = 1 << 2;

    pub fn new(proof_of_stake: bool, entropy_bit: u8, generated_modifier: bool) -> Self {
        let mut bits = 0;
        if proof_of_stake {
            bits |= Self::PROOF_OF_STAKE;
        }
        if entropy_bit & 1 == 1 {
            bits |= Self::STAKE_ENTROPY;
        }
        if generated_modifier {
            bits |= Self::STAKE_MODIFIER;
        }
        Self(bits)
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.0 & Self::PROOF_OF_STAKE != 0
    }

    pub fn entropy_bit(&self) -> u8 {
        u8::from(self.0 & Self::STAKE_ENTROPY != 0)
    }

    pub fn generated_stake_modifier(&self) -> bool {
        self.0 & Self::STAKE_MODIFIER != 0
    }
}

/// A block accepted into the index.
///
/// Positions only link backwards. Once inserted into an index they are never
/// mutated; the modifier and its checksum are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPosition {
    /// Predecessor, `None` for genesis.
    pub prev: Option<PositionId>,
    /// Block height.
    pub height: u32,
    /// Block timestamp in seconds.
    pub time: u32,
    /// Block version.
    pub version: i32,
    /// Block hash.
    pub hash: Hash256,
    /// Proof-of-stake, entropy and modifier flags.
    pub flags: BlockFlags,
    /// Stake modifier in effect at this block.
    pub stake_modifier: u64,
    /// Chained checksum of the stake modifier.
    pub stake_modifier_checksum: u32,
    /// Kernel proof hash (zero for proof-of-work blocks).
    pub hash_proof_of_stake: Hash256,
}

impl ChainPosition {
    pub fn is_proof_of_stake(&self) -> bool {
        self.flags.is_proof_of_stake()
    }

    pub fn entropy_bit(&self) -> u8 {
        self.flags.entropy_bit()
    }

    pub fn generated_stake_modifier(&self) -> bool {
        self.flags.generated_stake_modifier()
    }

    /// Hash used when this block is a modifier selection candidate.
    pub fn selection_proof_hash(&self) -> Hash256 {
        if self.is_proof_of_stake() {
            self.hash_proof_of_stake
        } else {
            self.hash
        }
    }
}

/// Read-only view of the block index.
pub trait ChainView {
    /// Resolve a position by id.
    fn position(&self, id: PositionId) -> Option<&ChainPosition>;

    /// Resolve a position id by block hash.
    fn lookup(&self, hash: &Hash256) -> Option<PositionId>;

    /// Ancestor of `id` at `height` on the same branch.
    fn ancestor(&self, id: PositionId, height: u32) -> Option<PositionId> {
        let mut current = id;
        loop {
            let position = self.position(current)?;
            if position.height == height {
                return Some(current);
            }
            if position.height < height {
                return None;
            }
            current = position.prev?;
        }
    }
}

/// Resolve a position or report index corruption.
pub(crate) fn resolve<C: ChainView + ?Sized>(chain: &C, id: PositionId) -> ConsensusResult<&ChainPosition> {
    chain.position(id).ok_or(ConsensusError::MissingPosition(id))
}

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    /// The null outpoint used by coinbase inputs.
    pub const NULL: OutPoint = OutPoint {
        txid: Hash256::ZERO,
        vout: u32::MAX,
    };

    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in base units.
    pub value: i64,
    /// Locking script.
    #[serde(default, with = "hex_bytes")]
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// The marker output that opens every coinstake.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// Transaction input. Scripts and signatures are not evaluated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
}

/// The parts of a transaction the kernel needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: Hash256,
    /// Transaction timestamp; absent for transaction formats without one.
    #[serde(default)]
    pub time: Option<u32>,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Serialized size in bytes, used to derive byte offsets within a block.
    pub serialized_size: u32,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// First input spends a real output, and the first of at least two
    /// outputs is the empty marker.
    pub fn is_coinstake(&self) -> bool {
        match (self.inputs.first(), self.outputs.first()) {
            (Some(kernel), Some(marker)) => {
                !kernel.prevout.is_null() && self.outputs.len() >= 2 && marker.is_empty()
            }
            _ => false,
        }
    }

    /// The kernel input's previous output, for coinstakes.
    pub fn kernel_prevout(&self) -> Option<OutPoint> {
        if self.is_coinstake() {
            self.inputs.first().map(|input| input.prevout)
        } else {
            None
        }
    }
}

/// Header fields of the block containing a staked output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub hash: Hash256,
    pub height: u32,
    pub time: u32,
}

/// A resolved previous output together with its containing transaction and block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSource {
    pub outpoint: OutPoint,
    pub output: TxOut,
    /// Time of the containing transaction, if its format carries one.
    pub tx_time: Option<u32>,
    /// Block containing the transaction.
    pub block: SourceBlock,
    /// Byte offset of the transaction from the start of the serialized block.
    pub tx_offset: u32,
}

impl StakeSource {
    /// Transaction time, falling back to the block time.
    pub fn effective_tx_time(&self) -> u32 {
        self.tx_time.unwrap_or(self.block.time)
    }
}

/// Read-only view of the output set.
pub trait OutputView {
    /// Resolve an unspent output.
    ///
    /// `Ok(None)` means the output does not exist or is spent. `Err` means the
    /// view knows the output but failed to load it.
    fn resolve_output(&self, outpoint: &OutPoint) -> ConsensusResult<Option<StakeSource>>;
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
