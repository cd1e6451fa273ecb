//! Block/undo pruning: deletes raw block and undo data below the retention
//! window once it is no longer needed for reorg or rescan.
//!
//! Incremental pruning (`on_connect`) is driven by the engine each time a
//! new block connects; retroactive `prune()` lets an already-synced node
//! turn pruning on after the fact.

use crate::db::Store;
use crate::error::{StoreError, StoreResult};
use crate::flags::Flags;

/// Called by the engine immediately after connecting the block at `height`.
/// Deletes the raw block and undo record for `height - keep_blocks`, if
/// pruning is enabled and that height is past the configured floor.
pub fn on_connect(store: &Store, flags: &Flags, height: u32) -> StoreResult<()> {
    if !flags.prune {
        return Ok(());
    }
    let target = match height.checked_sub(flags.keep_blocks) {
        Some(h) if h > flags.prune_after_height => h,
        _ => return Ok(()),
    };
    prune_height(store, target)
}

/// Retroactively prunes every height in `(prune_after_height, tip -
/// keep_blocks]`. Fails if the chain is too short for the requested window
/// or if that range has already been pruned.
pub fn prune(store: &Store, keep_blocks: u32) -> StoreResult<()> {
    let state = store.chain_state()?;
    let tip_height = store
        .get_height(&state.tip)?
        .ok_or(StoreError::MissingEntry(state.tip))?;

    let mut flags = store.flags()?;
    if tip_height < keep_blocks {
        return Err(StoreError::ChainTooShort);
    }
    let target_tip = tip_height - keep_blocks;
    if flags.prune && target_tip <= flags.prune_after_height {
        return Err(StoreError::AlreadyPruned);
    }

    let floor = if flags.prune { flags.prune_after_height } else { 0 };
    for height in (floor + 1)..=target_tip {
        prune_height(store, height)?;
    }

    flags.prune = true;
    flags.keep_blocks = keep_blocks;
    flags.prune_after_height = target_tip;
    let wb = store.begin_write()?;
    wb.put_flags(&flags)?;
    wb.commit()
}

fn prune_height(store: &Store, height: u32) -> StoreResult<()> {
    let Some(hash) = store.get_hash_at_height(height)? else {
        return Ok(());
    };
    let wb = store.begin_write()?;
    wb.delete_block(&hash)?;
    wb.delete_undo(&hash)?;
    wb.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{BlockHeader, ChainEntry, ChainState};

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let store = Store::open(&path).unwrap();
        (dir, store)
    }

    fn header() -> BlockHeader {
        BlockHeader {
            nonce: 0,
            time: 0,
            prev_block: [0u8; 32],
            tree_root: [0u8; 32],
            extra_nonce: [0u8; 24],
            reserved_root: [0u8; 32],
            witness_root: [0u8; 32],
            merkle_root: [0u8; 32],
            version: 0,
            bits: 0,
            mask: [0u8; 32],
        }
    }

    fn seed_chain(store: &Store, heights: u32) -> [u8; 32] {
        let mut tip = [0u8; 32];
        for h in 0..heights {
            let mut hash = [0u8; 32];
            hash[0..4].copy_from_slice(&h.to_le_bytes());
            let entry = ChainEntry {
                hash,
                header: header(),
                height: h,
                chainwork: [0u8; 32],
            };
            let wb = store.begin_write().unwrap();
            wb.put_entry(&entry).unwrap();
            wb.put_height(&hash, h).unwrap();
            wb.put_hash_at_height(h, &hash).unwrap();
            wb.put_block(&hash, b"block").unwrap();
            wb.put_undo(
                &hash,
                &crate::codec::UndoRecord::default(),
            )
            .unwrap();
            wb.commit().unwrap();
            tip = hash;
        }
        let wb = store.begin_write().unwrap();
        wb.put_chain_state(&ChainState {
            tip,
            tx: 0,
            coin: 0,
            value: 0,
            burned: 0,
            committed: true,
        })
        .unwrap();
        wb.commit().unwrap();
        tip
    }

    #[test]
    fn on_connect_deletes_behind_the_window() {
        let (_dir, store) = open_temp();
        seed_chain(&store, 10);
        let mut flags = Flags::default();
        flags.prune = true;
        flags.keep_blocks = 3;
        on_connect(&store, &flags, 9).unwrap();

        let hash_h6 = store.get_hash_at_height(6).unwrap().unwrap();
        assert_eq!(store.get_block(&hash_h6).unwrap(), None);
        let hash_h7 = store.get_hash_at_height(7).unwrap().unwrap();
        assert!(store.get_block(&hash_h7).unwrap().is_some());
    }

    #[test]
    fn retroactive_prune_rejects_short_chain() {
        let (_dir, store) = open_temp();
        seed_chain(&store, 5);
        assert!(matches!(prune(&store, 10), Err(StoreError::ChainTooShort)));
    }

    #[test]
    fn retroactive_prune_then_reject_double_prune() {
        let (_dir, store) = open_temp();
        seed_chain(&store, 20);
        prune(&store, 5).unwrap();
        let hash_h0 = store.get_hash_at_height(0).unwrap().unwrap();
        assert_eq!(store.get_block(&hash_h0).unwrap(), None);
        assert!(matches!(prune(&store, 5), Err(StoreError::AlreadyPruned)));
    }
}
