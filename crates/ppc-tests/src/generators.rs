//! Deterministic block and transaction generators.
//!
//! Every hash is derived from a tag, a branch number and a height, so the
//! same call always yields the same chain and fixture values stay frozen.

use ppc_consensus::{sha256d, Hash256, OutPoint, Transaction, TxIn, TxOut};
use ppc_state::CandidateBlock;

/// Easy compact target, about 2^240.
pub const EASY_BITS: u32 = 0x1f00ffff;

/// Start of regtest fixture chains, aligned to the 60 s modifier interval.
pub const FIXTURE_GENESIS_TIME: u32 = 1_700_000_040;

/// Pay-to-anything script used for every generated output.
pub const TEST_SCRIPT: [u8; 1] = [0x51];

fn tagged(tag: &[u8], branch: u8, height: u32) -> Hash256 {
    sha256d(&[tag, &[branch], &height.to_le_bytes()].concat())
}

/// Hash of the proof-of-work block at `height` on `branch`.
pub fn block_hash(branch: u8, height: u32) -> Hash256 {
    tagged(b"ppc-test-block", branch, height)
}

/// Coinbase paying `value` (nothing when zero).
pub fn coinbase(txid: Hash256, value: i64) -> Transaction {
    let output = if value == 0 {
        TxOut::empty()
    } else {
        TxOut::new(value, TEST_SCRIPT.to_vec())
    };
    Transaction {
        txid,
        time: None,
        inputs: vec![TxIn {
            prevout: OutPoint::NULL,
        }],
        outputs: vec![output],
        serialized_size: 120,
    }
}

/// Coinstake spending `prevout` and paying `value` back.
pub fn coinstake(prevout: OutPoint, value: i64, time: u32) -> Transaction {
    let txid = sha256d(
        &[
            b"ppc-test-coinstake".as_slice(),
            prevout.txid.as_bytes(),
            &prevout.vout.to_le_bytes(),
            &time.to_le_bytes(),
        ]
        .concat(),
    );
    Transaction {
        txid,
        time: None,
        inputs: vec![TxIn { prevout }],
        outputs: vec![TxOut::empty(), TxOut::new(value, TEST_SCRIPT.to_vec())],
        serialized_size: 180,
    }
}

/// Proof-of-work block whose coinbase pays `reward`.
pub fn work_block(
    branch: u8,
    height: u32,
    prev: Option<Hash256>,
    time: u32,
    reward: i64,
) -> CandidateBlock {
    CandidateBlock {
        hash: block_hash(branch, height),
        prev_hash: prev,
        time,
        version: 1,
        n_bits: EASY_BITS,
        transactions: vec![coinbase(tagged(b"ppc-test-coinbase", branch, height), reward)],
        signature_digest: None,
    }
}

/// Proof-of-stake block on `prev` staking `prevout` worth `value` at `time`.
pub fn stake_block(
    prev: Hash256,
    time: u32,
    n_bits: u32,
    prevout: OutPoint,
    value: i64,
) -> CandidateBlock {
    let hash = sha256d(
        &[
            b"ppc-test-stake".as_slice(),
            prev.as_bytes(),
            &time.to_le_bytes(),
        ]
        .concat(),
    );
    CandidateBlock {
        hash,
        prev_hash: Some(prev),
        time,
        version: 2,
        n_bits,
        transactions: vec![
            coinbase(sha256d(&[b"ppc-test-stake-coinbase".as_slice(), hash.as_bytes()].concat()), 0),
            coinstake(prevout, value, time),
        ],
        signature_digest: None,
    }
}

/// Round `time` up to a multiple of `granularity`.
pub fn align_up(time: u32, granularity: u32) -> u32 {
    time.div_ceil(granularity) * granularity
}
