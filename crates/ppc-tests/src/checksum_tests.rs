//! Checksum chaining and checkpoint enforcement.

use crate::generators::FIXTURE_GENESIS_TIME;
use crate::harness::TestChain;
use ppc_consensus::{
    check_stake_modifier_checkpoints, sha256d, stake_modifier_checksum, BlockFlags, Hash256,
    NetworkParameters, RejectKind,
};
use ppc_state::ChainState;
use std::collections::BTreeMap;

fn checksum_chain(modifiers: &[u64]) -> Vec<u32> {
    let mut prev = None;
    modifiers
        .iter()
        .enumerate()
        .map(|(i, modifier)| {
            let flags = BlockFlags::new(i % 3 == 0, (i % 2) as u8, i % 4 == 0);
            let proof = if i % 3 == 0 {
                sha256d(&(i as u32).to_le_bytes())
            } else {
                Hash256::ZERO
            };
            let checksum = stake_modifier_checksum(prev, flags, &proof, *modifier);
            prev = Some(checksum);
            checksum
        })
        .collect()
}

#[test]
fn test_single_bit_flip_changes_all_descendants() {
    let modifiers: Vec<u64> = (0..24u64)
        .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .collect();
    let base = checksum_chain(&modifiers);

    let mut flipped_bits = 0u64;
    let mut comparisons = 0u64;
    for position in [0usize, 5, 11, 23] {
        for bit in 0..64 {
            let mut forged = modifiers.clone();
            forged[position] ^= 1 << bit;
            let forged = checksum_chain(&forged);

            assert_eq!(base[..position], forged[..position]);
            for (a, b) in base[position..].iter().zip(&forged[position..]) {
                assert_ne!(a, b, "position {} bit {}", position, bit);
                flipped_bits += u64::from((a ^ b).count_ones());
                comparisons += 1;
            }
        }
    }

    // About half of the 32 checksum bits flip on average.
    let mean = flipped_bits as f64 / comparisons as f64;
    assert!((14.0..18.0).contains(&mean), "mean flipped bits {}", mean);
}

#[test]
fn test_forged_modifier_fails_checkpoint() {
    let params = NetworkParameters::mainnet();
    let genuine = stake_modifier_checksum(None, BlockFlags::new(false, 1, true), &Hash256::ZERO, 0);
    assert!(check_stake_modifier_checkpoints(&params, 0, genuine));

    for bit in 0..64 {
        let forged =
            stake_modifier_checksum(None, BlockFlags::new(false, 1, true), &Hash256::ZERO, 1 << bit);
        assert!(!check_stake_modifier_checkpoints(&params, 0, forged));
    }
}

fn reference_chain() -> TestChain {
    let t0 = FIXTURE_GENESIS_TIME;
    let times: Vec<u32> = (0..20).map(|h| t0 + 50 * h).collect();
    let mut chain = TestChain::regtest();
    chain.mine_at(&times);
    chain
}

#[test]
fn test_checkpoint_enforced_during_acceptance() {
    let reference = reference_chain();
    let positions = reference.state.positions();
    let at = 12usize;
    let genuine = positions[at].1.stake_modifier_checksum;

    // Correct checkpoint: every block accepted.
    let table = BTreeMap::from([(at as u32, genuine)]);
    let state = ChainState::new(NetworkParameters::regtest().with_checkpoints(table));
    for block in &reference.blocks {
        state.accept_block(block).unwrap();
    }

    // Forged checkpoint: rejected exactly at the checkpointed height.
    let table = BTreeMap::from([(at as u32, genuine ^ 0x0100_0000)]);
    let state = ChainState::new(NetworkParameters::regtest().with_checkpoints(table));
    for (height, block) in reference.blocks.iter().enumerate() {
        let result = state.accept_block(block);
        if height < at {
            result.unwrap();
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.reject_reason().map(|r| r.kind()), Some(RejectKind::Checkpoint));
            break;
        }
    }
    assert_eq!(state.len(), at);
}

#[test]
fn test_heights_without_checkpoint_never_reject() {
    let reference = reference_chain();
    let params = NetworkParameters::regtest();
    for (_, position) in reference.state.positions() {
        assert!(check_stake_modifier_checkpoints(
            &params,
            position.height,
            position.stake_modifier_checksum ^ 0xffff_ffff
        ));
    }
}
