//! Coin age consumed by a transaction.
//!
//! Coin age is value times holding time, counted in coin-days. Intermediate
//! sums are kept in cent-seconds so that small inputs still contribute.

use crate::chain::{OutputView, Transaction};
use crate::error::{ConsensusResult, RejectReason};
use crate::kernel::SECONDS_PER_DAY;
use crate::network::NetworkParameters;
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::trace;

/// Coin-days consumed by `tx` at `time_tx`.
///
/// Inputs below the minimum stake age are ignored. A coinbase consumes no
/// coin age. Results above 64 bits keep their low 64 bits.
pub fn get_coin_age<O: OutputView + ?Sized>(
    outputs: &O,
    params: &NetworkParameters,
    tx: &Transaction,
    time_tx: u32,
) -> ConsensusResult<u64> {
    if tx.is_coinbase() {
        return Ok(0);
    }

    let mut cent_seconds = BigUint::zero();
    for input in &tx.inputs {
        let source = outputs
            .resolve_output(&input.prevout)?
            .ok_or(RejectReason::PrevoutNotFound(input.prevout))?;

        let prev_time = source.effective_tx_time();
        if time_tx < prev_time {
            return Err(RejectReason::TxTimeViolation {
                tx_time: time_tx,
                prev_time,
            }
            .into());
        }
        if source.block.time as u64 + params.stake_min_age as u64 > time_tx as u64 {
            continue;
        }

        let value = source.output.value.max(0) as u64;
        let held = (time_tx - prev_time) as u64;
        cent_seconds += BigUint::from(value) * BigUint::from(held) / BigUint::from(params.cent as u64);

        trace!(outpoint = %input.prevout, value, held, "Coin age input");
    }

    let coin_days = cent_seconds * BigUint::from(params.cent as u64)
        / BigUint::from(params.coin as u64)
        / BigUint::from(SECONDS_PER_DAY as u64);
    Ok(coin_days.iter_u64_digits().next().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{OutPoint, SourceBlock, StakeSource, TxIn, TxOut};
    use crate::error::ConsensusError;
    use crate::hash::{sha256d, Hash256};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Outputs(HashMap<OutPoint, StakeSource>);

    impl Outputs {
        fn add(&mut self, tag: &[u8], value: i64, block_time: u32) -> OutPoint {
            let outpoint = OutPoint::new(sha256d(tag), 0);
            self.0.insert(
                outpoint,
                StakeSource {
                    outpoint,
                    output: TxOut::new(value, vec![0x51]),
                    tx_time: None,
                    block: SourceBlock {
                        hash: sha256d(b"block"),
                        height: 1,
                        time: block_time,
                    },
                    tx_offset: 81,
                },
            );
            outpoint
        }
    }

    impl OutputView for Outputs {
        fn resolve_output(&self, outpoint: &OutPoint) -> ConsensusResult<Option<StakeSource>> {
            Ok(self.0.get(outpoint).cloned())
        }
    }

    fn spend(prevouts: &[OutPoint]) -> Transaction {
        Transaction {
            txid: sha256d(b"spend"),
            time: None,
            inputs: prevouts.iter().map(|prevout| TxIn { prevout: *prevout }).collect(),
            outputs: vec![TxOut::new(1, vec![0x51])],
            serialized_size: 100,
        }
    }

    #[test]
    fn test_coinbase_has_no_age() {
        let params = NetworkParameters::regtest();
        let tx = spend(&[OutPoint::NULL]);
        assert_eq!(get_coin_age(&Outputs::default(), &params, &tx, 1_000_000).unwrap(), 0);
    }

    #[test]
    fn test_one_coin_for_one_day() {
        let params = NetworkParameters::regtest();
        let mut outputs = Outputs::default();
        let a = outputs.add(b"a", params.coin, 0);
        let age = get_coin_age(&outputs, &params, &spend(&[a]), SECONDS_PER_DAY as u32).unwrap();
        assert_eq!(age, 1);

        let b = outputs.add(b"b", 10 * params.coin, 0);
        let age = get_coin_age(&outputs, &params, &spend(&[a, b]), 3 * SECONDS_PER_DAY as u32).unwrap();
        assert_eq!(age, 33);
    }

    #[test]
    fn test_immature_inputs_skipped() {
        let params = NetworkParameters::regtest();
        let mut outputs = Outputs::default();
        let young = outputs.add(b"young", 1000 * params.coin, 10_000);
        let time = 10_000 + params.stake_min_age - 1;
        assert_eq!(get_coin_age(&outputs, &params, &spend(&[young]), time).unwrap(), 0);
    }

    #[test]
    fn test_unknown_input_rejects() {
        let params = NetworkParameters::regtest();
        let missing = OutPoint::new(Hash256::ZERO, 3);
        let err = get_coin_age(&Outputs::default(), &params, &spend(&[missing]), 1000).unwrap_err();
        assert_eq!(err, ConsensusError::Rejected(RejectReason::PrevoutNotFound(missing)));
    }

    #[test]
    fn test_time_before_prev_rejects() {
        let params = NetworkParameters::regtest();
        let mut outputs = Outputs::default();
        let a = outputs.add(b"a", params.coin, 5000);
        let err = get_coin_age(&outputs, &params, &spend(&[a]), 4999).unwrap_err();
        assert!(matches!(
            err.reject_reason(),
            Some(RejectReason::TxTimeViolation { .. })
        ));
    }
}
