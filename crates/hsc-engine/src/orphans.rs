//! Orphan-block pool: blocks whose predecessor hasn't been seen yet.
//! Capped at `max_orphans`; entries past the one-hour floor are the only
//! ones eligible for eviction when the pool is over its cap, so a burst of
//! orphans doesn't starve ones that might still resolve imminently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use hsc_consensus::{Block, Hash};

const EVICTION_FLOOR: Duration = Duration::from_secs(60 * 60);

struct OrphanEntry {
    block: Block,
    inserted: Instant,
}

#[derive(Default)]
pub struct OrphanPool {
    entries: HashMap<Hash, OrphanEntry>,
    /// Insertion order, oldest first, for LRU eviction.
    order: Vec<Hash>,
    max_orphans: usize,
}

impl OrphanPool {
    pub fn new(max_orphans: usize) -> Self {
        OrphanPool {
            entries: HashMap::new(),
            order: Vec::new(),
            max_orphans,
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Block> {
        self.entries.get(hash).map(|e| &e.block)
    }

    /// Every orphan whose `header.prev_block` matches `parent`, removing
    /// them from the pool so the caller can retry connecting them.
    pub fn take_children(&mut self, parent: &Hash) -> Vec<Block> {
        let matching: Vec<Hash> = self
            .entries
            .iter()
            .filter(|(_, e)| &e.block.header.prev_block == parent)
            .map(|(h, _)| *h)
            .collect();
        matching
            .into_iter()
            .filter_map(|h| self.remove(&h))
            .collect()
    }

    pub fn insert(&mut self, hash: Hash, block: Block) {
        if self.entries.contains_key(&hash) {
            return;
        }
        self.evict_expired();
        while self.entries.len() >= self.max_orphans {
            if !self.evict_oldest_past_floor() {
                break;
            }
        }
        self.entries.insert(
            hash,
            OrphanEntry {
                block,
                inserted: Instant::now(),
            },
        );
        self.order.push(hash);
    }

    fn remove(&mut self, hash: &Hash) -> Option<Block> {
        self.order.retain(|h| h != hash);
        self.entries.remove(hash).map(|e| e.block)
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<Hash> = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.inserted) >= EVICTION_FLOOR)
            .map(|(h, _)| *h)
            .collect();
        for hash in expired {
            self.remove(&hash);
        }
    }

    /// Evicts the oldest entry if it has crossed the eviction floor;
    /// returns whether anything was evicted.
    fn evict_oldest_past_floor(&mut self) -> bool {
        let Some(&oldest) = self.order.first() else {
            return false;
        };
        let past_floor = self
            .entries
            .get(&oldest)
            .map(|e| Instant::now().duration_since(e.inserted) >= EVICTION_FLOOR)
            .unwrap_or(false);
        if past_floor {
            self.remove(&oldest);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::BlockHeader;

    fn block(prev: Hash) -> Block {
        Block {
            header: BlockHeader {
                nonce: 0,
                time: 0,
                prev_block: prev,
                tree_root: [0u8; 32],
                extra_nonce: [0u8; 24],
                reserved_root: [0u8; 32],
                witness_root: [0u8; 32],
                merkle_root: [0u8; 32],
                version: 0,
                bits: 0,
                mask: [0u8; 32],
            },
            txs: vec![],
        }
    }

    #[test]
    fn inserts_and_finds_children() {
        let mut pool = OrphanPool::new(10);
        pool.insert([1u8; 32], block([0u8; 32]));
        pool.insert([2u8; 32], block([0u8; 32]));
        pool.insert([3u8; 32], block([9u8; 32]));
        assert_eq!(pool.len(), 3);

        let children = pool.take_children(&[0u8; 32]);
        assert_eq!(children.len(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut pool = OrphanPool::new(10);
        pool.insert([1u8; 32], block([0u8; 32]));
        pool.insert([1u8; 32], block([5u8; 32]));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&[1u8; 32]).unwrap().header.prev_block, [0u8; 32]);
    }
}
