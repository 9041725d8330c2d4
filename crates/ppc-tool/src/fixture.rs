//! JSON chain fixtures.

use anyhow::{Context, Result};
use ppc_consensus::Network;
use ppc_state::CandidateBlock;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Blocks to replay, genesis first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFixture {
    pub network: Network,
    pub blocks: Vec<CandidateBlock>,
}

impl ChainFixture {
    /// Load a fixture from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// Write the fixture as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write fixture {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_has_context() {
        let dir = TempDir::new().unwrap();
        let err = ChainFixture::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read fixture"));
    }

    #[test]
    fn test_empty_fixture_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.json");
        let fixture = ChainFixture {
            network: Network::Regtest,
            blocks: Vec::new(),
        };
        fixture.save(&path).unwrap();
        assert_eq!(ChainFixture::load(&path).unwrap(), fixture);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"regtest\""));
    }
}
