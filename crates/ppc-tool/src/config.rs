//! Network parameter selection.
//!
//! Precedence: a `--params` TOML file, then `--network`, then the network
//! named by the fixture.

use anyhow::{anyhow, Context, Result};
use ppc_consensus::{Network, NetworkParameters, NetworkParamsConfig};
use std::path::Path;

/// Read a `NetworkParamsConfig` TOML file and build parameters from it.
pub fn load_params_file(path: &Path) -> Result<NetworkParameters> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read params file {}", path.display()))?;
    let config: NetworkParamsConfig =
        toml::from_str(&content).context("Failed to parse params file")?;
    NetworkParameters::from_config(&config).context("Invalid network parameters")
}

/// Resolve the parameters to validate with.
pub fn resolve_params(
    params_path: Option<&Path>,
    network: Option<&str>,
    fixture_network: Network,
) -> Result<NetworkParameters> {
    if let Some(path) = params_path {
        return load_params_file(path);
    }
    match network {
        Some(name) => {
            let network =
                Network::from_name(name).ok_or_else(|| anyhow!("Unknown network '{}'", name))?;
            Ok(NetworkParameters::for_network(network))
        }
        None => Ok(NetworkParameters::for_network(fixture_network)),
    }
}
