//! Append-only chain index.
//!
//! Positions live in an arena and are addressed by [`PositionId`]. Links only
//! point backwards, so the index never holds a cycle and any number of
//! readers may walk it at once.

use crate::{StateError, StateResult};
use ppc_consensus::{ChainPosition, ChainView, Hash256, PositionId};
use std::collections::HashMap;
use tracing::debug;

/// Arena of accepted chain positions.
#[derive(Debug, Default)]
pub struct ChainIndex {
    positions: Vec<ChainPosition>,
    by_hash: HashMap<Hash256, PositionId>,
    best: Option<PositionId>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Highest position seen so far; the first one wins on equal height.
    pub fn best_tip(&self) -> Option<PositionId> {
        self.best
    }

    /// Height of the best tip.
    pub fn best_height(&self) -> Option<u32> {
        self.best
            .and_then(|id| self.position(id))
            .map(|position| position.height)
    }

    /// Positions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PositionId, &ChainPosition)> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, position)| (PositionId(i as u32), position))
    }

    /// Append a position. Its predecessor must already be indexed.
    pub fn insert(&mut self, position: ChainPosition) -> StateResult<PositionId> {
        if self.by_hash.contains_key(&position.hash) {
            return Err(StateError::DuplicateBlock(position.hash));
        }

        match position.prev {
            Some(prev) => {
                let parent = self.position(prev).ok_or_else(|| {
                    StateError::InvalidTransition(format!("Predecessor {} not indexed", prev))
                })?;
                if position.height != parent.height + 1 {
                    return Err(StateError::InvalidTransition(format!(
                        "Expected height {}, got {}",
                        parent.height + 1,
                        position.height
                    )));
                }
            }
            None => {
                if !self.positions.is_empty() {
                    return Err(StateError::GenesisExists(position.hash));
                }
                if position.height != 0 {
                    return Err(StateError::InvalidTransition(format!(
                        "Genesis at height {}",
                        position.height
                    )));
                }
            }
        }

        let id = PositionId(self.positions.len() as u32);
        self.by_hash.insert(position.hash, id);

        let better = match self.best_height() {
            Some(height) => position.height > height,
            None => true,
        };
        if better {
            self.best = Some(id);
        }

        debug!(%id, height = position.height, hash = %position.hash, "Position indexed");
        self.positions.push(position);
        Ok(id)
    }
}

#[cfg(test)]
impl ChainIndex {
    pub(crate) fn position_mut(&mut self, id: PositionId) -> Option<&mut ChainPosition> {
        self.positions.get_mut(id.0 as usize)
    }
}

impl ChainView for ChainIndex {
    fn position(&self, id: PositionId) -> Option<&ChainPosition> {
        self.positions.get(id.0 as usize)
    }

    fn lookup(&self, hash: &Hash256) -> Option<PositionId> {
        self.by_hash.get(hash).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppc_consensus::{sha256d, BlockFlags};

    fn position(prev: Option<PositionId>, height: u32, tag: &[u8]) -> ChainPosition {
        ChainPosition {
            prev,
            height,
            time: 1000 + height * 60,
            version: 1,
            hash: sha256d(tag),
            flags: BlockFlags::new(false, 0, height == 0),
            stake_modifier: 0,
            stake_modifier_checksum: 0,
            hash_proof_of_stake: Hash256::ZERO,
        }
    }

    #[test]
    fn test_insert_and_walk() {
        let mut index = ChainIndex::new();
        let g = index.insert(position(None, 0, b"g")).unwrap();
        let a = index.insert(position(Some(g), 1, b"a")).unwrap();
        let b = index.insert(position(Some(a), 2, b"b")).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.best_tip(), Some(b));
        assert_eq!(index.lookup(&sha256d(b"a")), Some(a));
        assert_eq!(index.ancestor(b, 0), Some(g));
        assert_eq!(index.ancestor(a, 2), None);
    }

    #[test]
    fn test_fork_keeps_first_tip() {
        let mut index = ChainIndex::new();
        let g = index.insert(position(None, 0, b"g")).unwrap();
        let a = index.insert(position(Some(g), 1, b"a")).unwrap();
        let alt = index.insert(position(Some(g), 1, b"alt")).unwrap();
        assert_eq!(index.best_tip(), Some(a));
        let longer = index.insert(position(Some(alt), 2, b"alt2")).unwrap();
        assert_eq!(index.best_tip(), Some(longer));
        assert_eq!(index.ancestor(longer, 1), Some(alt));
    }

    #[test]
    fn test_rejects_bad_links() {
        let mut index = ChainIndex::new();
        let g = index.insert(position(None, 0, b"g")).unwrap();

        assert!(matches!(
            index.insert(position(None, 0, b"g2")),
            Err(StateError::GenesisExists(_))
        ));
        assert!(matches!(
            index.insert(position(Some(g), 0, b"g")),
            Err(StateError::DuplicateBlock(_))
        ));
        assert!(matches!(
            index.insert(position(Some(g), 5, b"x")),
            Err(StateError::InvalidTransition(_))
        ));
        assert!(matches!(
            index.insert(position(Some(PositionId(9)), 1, b"y")),
            Err(StateError::InvalidTransition(_))
        ));
    }
}
