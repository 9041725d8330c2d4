//! Network parameters for the proof-of-stake kernel.
//!
//! `NetworkParameters` is built once at startup and passed explicitly to
//! every gate and validator call:
//! - `NetworkParameters::mainnet()` / `testnet()` / `regtest()` for the built-in networks
//! - `NetworkParameters::from_config()` for private networks loaded from TOML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which chain the parameters describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Parse a network name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Activation timestamps of the kernel protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSwitchTable {
    pub v03: u32,
    pub v04: u32,
    pub v05: u32,
    /// Earliest time of the supermajority-gated v0.6 fork.
    pub v06: u32,
    pub v07: u32,
    pub btc16_bips: u32,
    pub v09: u32,
    pub v10: u32,
    pub v12: u32,
}

impl ProtocolSwitchTable {
    /// Every version active from the first block.
    pub const fn all_active() -> Self {
        Self {
            v03: 0,
            v04: 0,
            v05: 0,
            v06: 0,
            v07: 0,
            btc16_bips: 0,
            v09: 0,
            v10: 0,
            v12: 0,
        }
    }
}

/// Version supermajority required by the v0.6 fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperMajorityRule {
    pub min_version: i32,
    pub required: u32,
    pub window: u32,
}

/// Error when constructing `NetworkParameters` from configuration.
#[derive(Debug, Clone)]
pub struct NetworkParamsError {
    /// The field that is missing or invalid.
    pub field: &'static str,
    /// Description of the error.
    pub message: String,
}

impl fmt::Display for NetworkParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkParameters error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for NetworkParamsError {}

/// Configuration for loading `NetworkParameters` from TOML.
///
/// Every field is optional. Missing fields fall back to the `base` network's
/// values, so a private network only lists what it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkParamsConfig {
    /// Built-in network to start from (default regtest).
    pub base: Option<String>,
    pub switches: Option<ProtocolSwitchTable>,
    pub v06_super_majority: Option<SuperMajorityRule>,
    pub modifier_interval: Option<u32>,
    pub stake_min_age: Option<u32>,
    pub stake_max_age: Option<u32>,
    pub stake_min_depth: Option<u32>,
    pub max_clock_drift: Option<u32>,
    pub stake_timestamp_mask: Option<u32>,
    pub coin: Option<i64>,
    pub cent: Option<i64>,
    /// Height to hex checksum, e.g. `"0" = "0x0e00670b"`.
    pub checkpoints: Option<BTreeMap<String, String>>,
}

/// Network-specific kernel parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParameters {
    pub network: Network,
    /// Protocol version activation times.
    pub switches: ProtocolSwitchTable,
    /// Supermajority rule gating the v0.6 fork.
    pub v06_super_majority: SuperMajorityRule,
    /// Seconds between stake modifier generations.
    pub modifier_interval: u32,
    /// Minimum age in seconds before an output may stake.
    pub stake_min_age: u32,
    /// Age in seconds after which the kernel time weight stops growing.
    pub stake_max_age: u32,
    /// Confirmations a staked output needs at the candidate height.
    pub stake_min_depth: u32,
    /// Allowed lead of the block time over a pre-v0.3 coinstake time.
    pub max_clock_drift: u32,
    /// Coinstake times under v0.9 must have these low bits clear.
    pub stake_timestamp_mask: u32,
    /// Base units per coin.
    pub coin: i64,
    /// Base units per cent.
    pub cent: i64,
    /// Stake modifier checksum checkpoints by height.
    checkpoints: BTreeMap<u32, u32>,
}

impl NetworkParameters {
    /// Mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            switches: ProtocolSwitchTable {
                v03: 1_363_800_000,
                v04: 1_399_300_000,
                v05: 1_461_700_000,
                v06: 1_513_050_000,        // Tue 12 Dec 2017 03:40 UTC
                v07: 1_552_392_000,        // Tue 12 Mar 2019 12:00 UTC
                btc16_bips: 1_569_931_200, // Tue 01 Oct 2019 12:00 UTC
                v09: 1_591_617_600,        // Mon 08 Jun 2020 12:00 UTC
                v10: 1_635_768_000,        // Mon 01 Nov 2021 12:00 UTC
                v12: 1_681_732_800,        // Mon 17 Apr 2023 12:00 UTC
            },
            v06_super_majority: SuperMajorityRule {
                min_version: 2,
                required: 900,
                window: 1000,
            },
            modifier_interval: 6 * 60 * 60,
            stake_min_age: 60 * 60 * 24 * 30,
            stake_max_age: 60 * 60 * 24 * 90,
            stake_min_depth: 500,
            max_clock_drift: 2 * 60 * 60,
            stake_timestamp_mask: 15,
            coin: 1_000_000,
            cent: 10_000,
            checkpoints: mainnet_checkpoints(),
        }
    }

    /// Testnet parameters.
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            switches: ProtocolSwitchTable {
                v03: 1_359_781_000,
                v04: 1_395_700_000,
                v05: 1_447_700_000,
                v06: 1_508_198_400,        // Tue 17 Oct 2017 00:00 UTC
                v07: 1_541_505_600,        // Tue 06 Nov 2018 12:00 UTC
                btc16_bips: 1_554_811_200, // Tue 09 Apr 2019 12:00 UTC
                v09: 1_581_940_800,        // Mon 17 Feb 2020 12:00 UTC
                v10: 1_625_140_800,        // Thu 01 Jul 2021 12:00 UTC
                v12: 1_669_636_800,        // Mon 28 Nov 2022 12:00 UTC
            },
            v06_super_majority: SuperMajorityRule {
                min_version: 2,
                required: 90,
                window: 100,
            },
            modifier_interval: 20 * 60,
            stake_min_age: 60 * 60 * 24,
            stake_max_age: 60 * 60 * 24 * 90,
            stake_min_depth: 60,
            max_clock_drift: 2 * 60 * 60,
            stake_timestamp_mask: 15,
            coin: 1_000_000,
            cent: 10_000,
            checkpoints: testnet_checkpoints(),
        }
    }

    /// Local test network: every protocol version active, short intervals,
    /// no checkpoints.
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            switches: ProtocolSwitchTable::all_active(),
            v06_super_majority: SuperMajorityRule {
                min_version: 2,
                required: 90,
                window: 100,
            },
            modifier_interval: 60,
            stake_min_age: 60 * 60,
            stake_max_age: 3 * 60 * 60,
            stake_min_depth: 10,
            max_clock_drift: 2 * 60 * 60,
            stake_timestamp_mask: 15,
            coin: 1_000_000,
            cent: 10_000,
            checkpoints: BTreeMap::new(),
        }
    }

    /// Built-in parameters for a network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Create parameters from configuration.
    ///
    /// Returns an error naming the specific field if any field is invalid.
    pub fn from_config(config: &NetworkParamsConfig) -> Result<Self, NetworkParamsError> {
        let base = match config.base.as_deref() {
            None => Network::Regtest,
            Some(name) => Network::from_name(name).ok_or_else(|| NetworkParamsError {
                field: "base",
                message: format!("unknown network '{}'", name),
            })?,
        };
        let mut params = Self::for_network(base);

        if let Some(switches) = config.switches {
            params.switches = switches;
        }
        if let Some(rule) = config.v06_super_majority {
            if rule.required > rule.window {
                return Err(NetworkParamsError {
                    field: "v06_super_majority",
                    message: format!("required {} exceeds window {}", rule.required, rule.window),
                });
            }
            params.v06_super_majority = rule;
        }
        if let Some(interval) = config.modifier_interval {
            if interval == 0 {
                return Err(NetworkParamsError {
                    field: "modifier_interval",
                    message: "must be greater than zero".to_string(),
                });
            }
            params.modifier_interval = interval;
        }
        if let Some(age) = config.stake_min_age {
            params.stake_min_age = age;
        }
        if let Some(age) = config.stake_max_age {
            params.stake_max_age = age;
        }
        if params.stake_max_age < params.stake_min_age {
            return Err(NetworkParamsError {
                field: "stake_max_age",
                message: format!(
                    "{} is below stake_min_age {}",
                    params.stake_max_age, params.stake_min_age
                ),
            });
        }
        if let Some(depth) = config.stake_min_depth {
            params.stake_min_depth = depth;
        }
        if let Some(drift) = config.max_clock_drift {
            params.max_clock_drift = drift;
        }
        if let Some(mask) = config.stake_timestamp_mask {
            if mask.wrapping_add(1) & mask != 0 {
                return Err(NetworkParamsError {
                    field: "stake_timestamp_mask",
                    message: format!("{:#x} is not of the form 2^n - 1", mask),
                });
            }
            params.stake_timestamp_mask = mask;
        }
        if let Some(coin) = config.coin {
            if coin <= 0 {
                return Err(NetworkParamsError {
                    field: "coin",
                    message: "must be positive".to_string(),
                });
            }
            params.coin = coin;
        }
        if let Some(cent) = config.cent {
            if cent <= 0 || params.coin % cent != 0 {
                return Err(NetworkParamsError {
                    field: "cent",
                    message: format!("{} must be positive and divide coin {}", cent, params.coin),
                });
            }
            params.cent = cent;
        }
        if let Some(entries) = &config.checkpoints {
            params.checkpoints = parse_checkpoints(entries)?;
        }

        Ok(params)
    }

    /// Expected modifier checksum at `height`, if checkpointed.
    pub fn checkpoint(&self, height: u32) -> Option<u32> {
        self.checkpoints.get(&height).copied()
    }

    /// All modifier checkpoints, ascending by height.
    pub fn checkpoints(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.checkpoints.iter().map(|(h, c)| (*h, *c))
    }

    /// Replace the checkpoint table.
    pub fn with_checkpoints(mut self, checkpoints: BTreeMap<u32, u32>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Required granularity of coinstake times under v0.9, in seconds.
    pub fn stake_timestamp_granularity(&self) -> u32 {
        self.stake_timestamp_mask.wrapping_add(1)
    }
}

fn parse_checkpoints(
    entries: &BTreeMap<String, String>,
) -> Result<BTreeMap<u32, u32>, NetworkParamsError> {
    let mut parsed = BTreeMap::new();
    for (height, checksum) in entries {
        let height: u32 = height.trim().parse().map_err(|_| NetworkParamsError {
            field: "checkpoints",
            message: format!("invalid height '{}'", height),
        })?;
        let hex = checksum.trim();
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        let checksum = u32::from_str_radix(hex, 16).map_err(|_| NetworkParamsError {
            field: "checkpoints",
            message: format!("invalid checksum '{}' at height {}", checksum, height),
        })?;
        parsed.insert(height, checksum);
    }
    Ok(parsed)
}

fn mainnet_checkpoints() -> BTreeMap<u32, u32> {
    BTreeMap::from([
        (0, 0x0e00_670b),
        (19_080, 0xad4e_4d29),
        (30_583, 0xdc7b_f136),
        (99_999, 0xf555_cfd2),
        (219_999, 0x91b7_444d),
        (336_000, 0x6c3c_8048),
        (371_850, 0x9b85_0bdf),
        (407_813, 0x46fe_50b5),
    ])
}

fn testnet_checkpoints() -> BTreeMap<u32, u32> {
    BTreeMap::from([
        (0, 0x0e00_670b),
        (19_080, 0x3711_dc3a),
        (30_583, 0xb480_fade),
        (99_999, 0x9a62_eaec),
        (219_999, 0xeafe_96c3),
        (336_000, 0x8330_dc09),
        (372_751, 0xafb9_4e2f),
        (382_019, 0x7f5c_f5eb),
        (408_500, 0x68ca_dee2),
        (412_691, 0x9313_8e67),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_networks_differ() {
        let main = NetworkParameters::mainnet();
        let test = NetworkParameters::testnet();
        assert_ne!(main.switches, test.switches);
        assert_eq!(main.checkpoint(0), Some(0x0e00670b));
        assert_eq!(test.checkpoint(0), Some(0x0e00670b));
        assert_ne!(main.checkpoint(19_080), test.checkpoint(19_080));
    }

    #[test]
    fn test_switches_are_ordered() {
        for params in [NetworkParameters::mainnet(), NetworkParameters::testnet()] {
            let s = params.switches;
            let ladder = [s.v03, s.v04, s.v05, s.v06, s.v07, s.btc16_bips, s.v09, s.v10, s.v12];
            assert!(ladder.windows(2).all(|w| w[0] < w[1]), "{}", params.network);
        }
    }

    #[test]
    fn test_from_config_defaults_to_regtest() {
        let params = NetworkParameters::from_config(&NetworkParamsConfig::default()).unwrap();
        assert_eq!(params, NetworkParameters::regtest());
    }

    #[test]
    fn test_from_config_overrides() {
        let config = NetworkParamsConfig {
            base: Some("testnet".to_string()),
            modifier_interval: Some(600),
            checkpoints: Some(BTreeMap::from([("5".to_string(), "0xdeadbeef".to_string())])),
            ..Default::default()
        };
        let params = NetworkParameters::from_config(&config).unwrap();
        assert_eq!(params.network, Network::Testnet);
        assert_eq!(params.modifier_interval, 600);
        assert_eq!(params.checkpoint(5), Some(0xdeadbeef));
        assert_eq!(params.checkpoint(0), None);
    }

    #[test]
    fn test_from_config_rejects_bad_fields() {
        let bad_base = NetworkParamsConfig {
            base: Some("moonnet".to_string()),
            ..Default::default()
        };
        assert_eq!(NetworkParameters::from_config(&bad_base).unwrap_err().field, "base");

        let bad_mask = NetworkParamsConfig {
            stake_timestamp_mask: Some(10),
            ..Default::default()
        };
        assert_eq!(
            NetworkParameters::from_config(&bad_mask).unwrap_err().field,
            "stake_timestamp_mask"
        );

        let bad_ages = NetworkParamsConfig {
            stake_min_age: Some(100),
            stake_max_age: Some(50),
            ..Default::default()
        };
        assert_eq!(
            NetworkParameters::from_config(&bad_ages).unwrap_err().field,
            "stake_max_age"
        );

        let bad_checkpoint = NetworkParamsConfig {
            checkpoints: Some(BTreeMap::from([("x".to_string(), "0x1".to_string())])),
            ..Default::default()
        };
        assert_eq!(
            NetworkParameters::from_config(&bad_checkpoint).unwrap_err().field,
            "checkpoints"
        );
    }

    #[test]
    fn test_granularity() {
        assert_eq!(NetworkParameters::mainnet().stake_timestamp_granularity(), 16);
    }
}
