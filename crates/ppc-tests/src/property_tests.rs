//! Property-based tests using proptest.

use ppc_consensus::kernel::{check_stake_kernel_hash, stake_time_weight};
use ppc_consensus::protocol::{is_active, is_protocol_v03, ProtocolFeature};
use ppc_consensus::{
    get_coin_age, sha256d, stake_weighted_target, ConsensusResult, KernelModifier,
    NetworkParameters, OutPoint, OutputView, SourceBlock, StakeSource, Transaction, TxIn, TxOut,
};
use proptest::prelude::*;

fn arb_params() -> impl Strategy<Value = NetworkParameters> {
    prop_oneof![
        Just(NetworkParameters::mainnet()),
        Just(NetworkParameters::testnet()),
        Just(NetworkParameters::regtest()),
    ]
}

fn arb_feature() -> impl Strategy<Value = ProtocolFeature> {
    prop::sample::select(ProtocolFeature::ALL.to_vec())
}

/// Compact targets between 2^199 and 2^224, so weighting never wraps.
fn arb_nbits() -> impl Strategy<Value = u32> {
    (0x1a00_8000u32..=0x1a7f_ffff, 0u32..=2).prop_map(|(bits, shift)| bits + (shift << 24))
}

struct SingleOutput(StakeSource);

impl OutputView for SingleOutput {
    fn resolve_output(&self, outpoint: &OutPoint) -> ConsensusResult<Option<StakeSource>> {
        Ok((outpoint == &self.0.outpoint).then(|| self.0.clone()))
    }
}

fn source(value: i64, block_time: u32) -> StakeSource {
    StakeSource {
        outpoint: OutPoint::new(sha256d(b"prop-funding"), 0),
        output: TxOut::new(value, vec![0x51]),
        tx_time: None,
        block: SourceBlock {
            hash: sha256d(b"prop-block"),
            height: 1,
            time: block_time,
        },
        tx_offset: 81,
    }
}

fn spend(outpoint: OutPoint) -> Transaction {
    Transaction {
        txid: sha256d(b"prop-spend"),
        time: None,
        inputs: vec![TxIn { prevout: outpoint }],
        outputs: vec![TxOut::new(1, vec![0x51])],
        serialized_size: 100,
    }
}

fn coin_age_of(params: &NetworkParameters, value: i64, block_time: u32, time: u32) -> u64 {
    let view = SingleOutput(source(value, block_time));
    get_coin_age(&view, params, &spend(view.0.outpoint), time).unwrap()
}

proptest! {
    #[test]
    fn gates_are_monotonic(
        params in arb_params(),
        feature in arb_feature(),
        time in any::<u32>(),
        later in any::<u32>(),
    ) {
        let later = time.saturating_add(later);
        if is_active(&params, feature, time) {
            prop_assert!(is_active(&params, feature, later));
        }
    }

    #[test]
    fn coin_age_monotonic_in_value(
        value in 0i64..=1_000_000_000_000_000,
        extra in 0i64..=1_000_000_000_000,
        age in 0u32..=400_000_000,
    ) {
        let params = NetworkParameters::regtest();
        let base = coin_age_of(&params, value, 1_000, 1_000 + age);
        let more = coin_age_of(&params, value + extra, 1_000, 1_000 + age);
        prop_assert!(more >= base);
    }

    #[test]
    fn coin_age_monotonic_in_time(
        value in 0i64..=1_000_000_000_000_000,
        age in 0u32..=400_000_000,
        extra in 0u32..=400_000_000,
    ) {
        let params = NetworkParameters::regtest();
        let base = coin_age_of(&params, value, 1_000, 1_000 + age);
        let later = coin_age_of(&params, value, 1_000, 1_000 + age + extra);
        prop_assert!(later >= base);
    }

    #[test]
    fn doubling_value_doubles_target(
        params in arb_params(),
        bits in arb_nbits(),
        coins in 1i64..=1_000_000,
        days in 0u32..=200,
    ) {
        // Whole coins held for whole days, so the coin-day division is exact.
        let mut params = params;
        params.stake_max_age = u32::MAX;
        let time_tx = 1_800_000_000u32;
        let held = days * 86_400 + if is_protocol_v03(&params, time_tx) { params.stake_min_age } else { 0 };
        let time_prev = time_tx - held;
        prop_assert_eq!(stake_time_weight(&params, time_prev, time_tx), days as i64 * 86_400);

        let value = coins * params.coin;
        let single = stake_weighted_target(&params, bits, value, time_prev, time_tx);
        let double = stake_weighted_target(&params, bits, 2 * value, time_prev, time_tx);
        prop_assert_eq!(double, single * 2u32);
    }

    #[test]
    fn larger_value_never_lowers_target(
        bits in arb_nbits(),
        value in 0i64..=1_000_000_000_000,
        extra in 0i64..=1_000_000_000_000,
        age in 0u32..=10_800,
    ) {
        let params = NetworkParameters::regtest();
        let small = stake_weighted_target(&params, bits, value, 0, age);
        let large = stake_weighted_target(&params, bits, value + extra, 0, age);
        prop_assert!(large >= small);
    }

    #[test]
    fn kernel_check_is_deterministic(
        modifier in any::<u64>(),
        value in 1i64..=1_000_000_000_000_000,
        block_time in 0u32..=1_000_000,
        delay in 0u32..=20_000,
    ) {
        let params = NetworkParameters::regtest();
        let src = source(value, block_time);
        let time = block_time + delay;
        let first = check_stake_kernel_hash(&params, KernelModifier::Modifier(modifier), 0x1f00ffff, &src, time);
        let second = check_stake_kernel_hash(&params, KernelModifier::Modifier(modifier), 0x1f00ffff, &src, time);
        prop_assert_eq!(first, second);
    }
}
