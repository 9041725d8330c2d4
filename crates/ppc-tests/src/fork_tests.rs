//! Output visibility across competing branches.

use crate::generators::{block_hash, work_block, FIXTURE_GENESIS_TIME, TEST_SCRIPT};
use crate::harness::{TestChain, BLOCK_REWARD};
use ppc_consensus::{sha256d, OutPoint, Transaction, TxIn, TxOut};
use ppc_state::{CandidateBlock, StateError};

const STAKE_VALUE: i64 = 100_000 * 1_000_000;

fn spend(tag: &[u8], prevout: OutPoint, value: i64) -> Transaction {
    Transaction {
        txid: sha256d(tag),
        time: None,
        inputs: vec![TxIn { prevout }],
        outputs: vec![TxOut::new(value, TEST_SCRIPT.to_vec())],
        serialized_size: 100,
    }
}

fn with_spend(mut block: CandidateBlock, tx: Transaction) -> CandidateBlock {
    block.transactions.push(tx);
    block
}

#[test]
fn test_sibling_stake_blocks_validate_independently() {
    let mut chain = TestChain::regtest();
    chain.mine_at(&[FIXTURE_GENESIS_TIME]);
    chain.mine(3, 600);
    let outpoint = chain.fund(STAKE_VALUE, 600);
    chain.mine(12, 600);

    let first = chain.find_stake(outpoint, STAKE_VALUE).expect("kernel within max age");
    let sibling = CandidateBlock {
        hash: sha256d(b"sibling-stake"),
        ..first.clone()
    };
    let before = chain.state.check_block(&sibling).unwrap();
    assert!(before.proof_hash.is_some());

    chain.submit(first.clone()).unwrap();

    // Spending the output on `first`'s branch does not spend it for its sibling.
    let after = chain.state.check_block(&sibling).unwrap();
    assert_eq!(after.proof_hash, before.proof_hash);
    let accepted = chain.state.accept_block(&sibling).unwrap();
    assert_eq!(chain.state.revalidate(accepted.id).unwrap(), before.proof_hash);

    // On top of either branch the output is gone.
    let again = work_block(0, 18, Some(first.hash), first.time + 600, BLOCK_REWARD);
    let again = with_spend(again, spend(b"again", outpoint, 1));
    assert!(matches!(
        chain.state.check_block(&again),
        Err(StateError::MissingInput(spent)) if spent == outpoint
    ));
}

#[test]
fn test_output_of_other_branch_cannot_be_spent() {
    let mut chain = TestChain::regtest();
    chain.mine_at(&[FIXTURE_GENESIS_TIME]);
    chain.mine(5, 600);
    let genesis = chain.blocks[0].clone();

    let side = work_block(1, 1, Some(genesis.hash), genesis.time + 300, STAKE_VALUE);
    let side_output = OutPoint::new(side.transactions[0].txid, 0);
    chain.submit(side).unwrap();
    assert_eq!(chain.tip().height, 5);

    let tip = chain.tip();
    let main = with_spend(
        work_block(0, 6, Some(tip.hash), tip.time + 600, BLOCK_REWARD),
        spend(b"cross-branch", side_output, 1),
    );
    assert!(matches!(
        chain.state.accept_block(&main),
        Err(StateError::MissingInput(missing)) if missing == side_output
    ));
    assert_eq!(chain.tip().height, 5);

    // The side branch itself may spend it.
    let side_child = with_spend(
        work_block(1, 2, Some(block_hash(1, 1)), genesis.time + 900, BLOCK_REWARD),
        spend(b"same-branch", side_output, 1),
    );
    chain.submit(side_child).unwrap();
}

#[test]
fn test_shared_output_spent_on_both_branches() {
    let mut chain = TestChain::regtest();
    chain.mine_at(&[FIXTURE_GENESIS_TIME]);
    chain.mine(2, 600);
    let genesis = chain.blocks[0].clone();
    let shared = OutPoint::new(genesis.transactions[0].txid, 0);

    let tip = chain.tip();
    let main = with_spend(
        work_block(0, 3, Some(tip.hash), tip.time + 600, BLOCK_REWARD),
        spend(b"main-spend", shared, 1),
    );
    chain.submit(main).unwrap();

    let side = with_spend(
        work_block(2, 1, Some(genesis.hash), genesis.time + 300, BLOCK_REWARD),
        spend(b"side-spend", shared, 1),
    );
    chain.submit(side).unwrap();
    assert_eq!(chain.state.len(), 5);
}
