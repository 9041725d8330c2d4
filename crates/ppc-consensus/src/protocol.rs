//! Protocol version gate.
//!
//! Maps a timestamp (or, for v0.6, the predecessor position) to the kernel
//! rules in force. Every timestamp-gated feature is active iff the timestamp
//! is at or after its switch time on the given network.

use crate::chain::{resolve, ChainView, PositionId};
use crate::error::ConsensusResult;
use crate::network::NetworkParameters;
use std::fmt;

/// Timestamp-gated protocol features, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolFeature {
    /// Stake modifier in the kernel, min-age-relative time weight, coinstake time equals block time.
    V03,
    /// Entropy bit taken from the block hash.
    V04,
    /// Kernel uses the predecessor's stake modifier.
    V05,
    V07,
    /// BIPs adopted from bitcoin 0.16.
    Btc16Bips,
    /// Coinstake time granularity.
    V09,
    /// Transactions no longer carry a timestamp.
    V10,
    V12,
}

impl ProtocolFeature {
    /// All timestamp-gated features, in activation order.
    pub const ALL: [ProtocolFeature; 8] = [
        ProtocolFeature::V03,
        ProtocolFeature::V04,
        ProtocolFeature::V05,
        ProtocolFeature::V07,
        ProtocolFeature::Btc16Bips,
        ProtocolFeature::V09,
        ProtocolFeature::V10,
        ProtocolFeature::V12,
    ];

    /// Activation timestamp on the given network.
    pub fn switch_time(&self, params: &NetworkParameters) -> u32 {
        let s = &params.switches;
        match self {
            ProtocolFeature::V03 => s.v03,
            ProtocolFeature::V04 => s.v04,
            ProtocolFeature::V05 => s.v05,
            ProtocolFeature::V07 => s.v07,
            ProtocolFeature::Btc16Bips => s.btc16_bips,
            ProtocolFeature::V09 => s.v09,
            ProtocolFeature::V10 => s.v10,
            ProtocolFeature::V12 => s.v12,
        }
    }
}

impl fmt::Display for ProtocolFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolFeature::V03 => "v0.3",
            ProtocolFeature::V04 => "v0.4",
            ProtocolFeature::V05 => "v0.5",
            ProtocolFeature::V07 => "v0.7",
            ProtocolFeature::Btc16Bips => "btc-0.16-bips",
            ProtocolFeature::V09 => "v0.9",
            ProtocolFeature::V10 => "v10",
            ProtocolFeature::V12 => "v12",
        };
        f.write_str(name)
    }
}

/// Whether `feature` is active at `time`.
pub fn is_active(params: &NetworkParameters, feature: ProtocolFeature, time: u32) -> bool {
    time >= feature.switch_time(params)
}

/// Whether a coinstake at `time` follows the v0.3 kernel protocol.
pub fn is_protocol_v03(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V03, time)
}

/// Whether a block at `time` follows the v0.4 protocol.
pub fn is_protocol_v04(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V04, time)
}

/// Whether a transaction at `time` follows the v0.5 protocol.
pub fn is_protocol_v05(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V05, time)
}

/// Whether a transaction at `time` follows the v0.7 protocol.
pub fn is_protocol_v07(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V07, time)
}

/// Whether a transaction at `time` is subject to the BIPs adopted from bitcoin 0.16.
pub fn is_btc16_bips_enabled(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::Btc16Bips, time)
}

/// Whether `time` follows the v0.9 protocol.
pub fn is_protocol_v09(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V09, time)
}

/// Whether `time` follows the v10 protocol.
pub fn is_protocol_v10(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V10, time)
}

/// Whether `time` follows the v12 protocol.
pub fn is_protocol_v12(params: &NetworkParameters, time: u32) -> bool {
    is_active(params, ProtocolFeature::V12, time)
}

/// Whether the block after `prev` follows the v0.6 protocol.
///
/// Tested against the predecessor, which always exists once the chain has a
/// block. Requires the predecessor's time to be past the switch time and a
/// version supermajority among recent proof-of-stake blocks.
pub fn is_protocol_v06<C: ChainView + ?Sized>(
    chain: &C,
    params: &NetworkParameters,
    prev: PositionId,
) -> ConsensusResult<bool> {
    let position = resolve(chain, prev)?;
    if position.time < params.switches.v06 {
        return Ok(false);
    }
    let rule = params.v06_super_majority;
    is_super_majority(chain, rule.min_version, prev, rule.required, rule.window)
}

/// Whether at least `required` of the last `to_check` proof-of-stake blocks,
/// walking back from `start`, have version `>= min_version`.
///
/// Proof-of-work blocks are skipped and do not count towards `to_check`.
pub fn is_super_majority<C: ChainView + ?Sized>(
    chain: &C,
    min_version: i32,
    start: PositionId,
    required: u32,
    to_check: u32,
) -> ConsensusResult<bool> {
    let mut found = 0u32;
    let mut checked = 0u32;
    let mut cursor = Some(start);

    while let Some(id) = cursor {
        if checked >= to_check || found >= required {
            break;
        }
        let position = resolve(chain, id)?;
        if position.is_proof_of_stake() {
            if position.version >= min_version {
                found += 1;
            }
            checked += 1;
        }
        cursor = position.prev;
    }

    Ok(found >= required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlockFlags, ChainPosition};
    use crate::hash::{sha256d, Hash256};
    use std::collections::HashMap;

    struct VecChain(Vec<ChainPosition>);

    impl ChainView for VecChain {
        fn position(&self, id: PositionId) -> Option<&ChainPosition> {
            self.0.get(id.0 as usize)
        }

        fn lookup(&self, hash: &Hash256) -> Option<PositionId> {
            let map: HashMap<_, _> = self
                .0
                .iter()
                .enumerate()
                .map(|(i, p)| (p.hash, PositionId(i as u32)))
                .collect();
            map.get(hash).copied()
        }
    }

    fn chain_of(versions: &[(i32, bool)], time: u32) -> VecChain {
        let positions = versions
            .iter()
            .enumerate()
            .map(|(i, (version, pos))| ChainPosition {
                prev: i.checked_sub(1).map(|p| PositionId(p as u32)),
                height: i as u32,
                time: time + i as u32,
                version: *version,
                hash: sha256d(&(i as u32).to_le_bytes()),
                flags: BlockFlags::new(*pos, 0, false),
                stake_modifier: 0,
                stake_modifier_checksum: 0,
                hash_proof_of_stake: Hash256::ZERO,
            })
            .collect();
        VecChain(positions)
    }

    #[test]
    fn test_switch_boundaries() {
        let params = NetworkParameters::mainnet();
        for feature in ProtocolFeature::ALL {
            let at = feature.switch_time(&params);
            assert!(!is_active(&params, feature, at - 1), "{}", feature);
            assert!(is_active(&params, feature, at), "{}", feature);
            assert!(is_active(&params, feature, u32::MAX), "{}", feature);
        }
    }

    #[test]
    fn test_named_predicates_follow_table() {
        let params = NetworkParameters::testnet();
        let t = params.switches.v05;
        assert!(is_protocol_v03(&params, t));
        assert!(is_protocol_v04(&params, t));
        assert!(is_protocol_v05(&params, t));
        assert!(!is_protocol_v07(&params, t));
        assert!(!is_btc16_bips_enabled(&params, t));
        assert!(!is_protocol_v09(&params, t));
        assert!(!is_protocol_v10(&params, t));
        assert!(!is_protocol_v12(&params, t));
    }

    #[test]
    fn test_super_majority_counts_only_proof_of_stake() {
        // 5 PoS blocks at version 2, interleaved with PoW blocks at version 1.
        let mut layout = Vec::new();
        for _ in 0..5 {
            layout.push((1, false));
            layout.push((2, true));
        }
        let chain = chain_of(&layout, 1000);
        let tip = PositionId(layout.len() as u32 - 1);
        assert!(is_super_majority(&chain, 2, tip, 5, 5).unwrap());
        assert!(!is_super_majority(&chain, 2, tip, 6, 10).unwrap());
        assert!(!is_super_majority(&chain, 3, tip, 1, 5).unwrap());
    }

    #[test]
    fn test_v06_needs_time_and_majority() {
        let mut params = NetworkParameters::regtest();
        params.v06_super_majority.required = 3;
        params.v06_super_majority.window = 4;
        params.switches.v06 = 1000;

        let upgraded = chain_of(&[(2, true); 4], 1000);
        assert!(is_protocol_v06(&upgraded, &params, PositionId(3)).unwrap());

        let old = chain_of(&[(1, true), (1, true), (2, true), (2, true)], 1000);
        assert!(!is_protocol_v06(&old, &params, PositionId(3)).unwrap());

        let early = chain_of(&[(2, true); 4], 900);
        assert!(!is_protocol_v06(&early, &params, PositionId(3)).unwrap());
    }

    #[test]
    fn test_v06_missing_position_is_internal() {
        let params = NetworkParameters::regtest();
        let chain = VecChain(Vec::new());
        let err = is_protocol_v06(&chain, &params, PositionId(0)).unwrap_err();
        assert!(!err.is_rejection());
    }
}
