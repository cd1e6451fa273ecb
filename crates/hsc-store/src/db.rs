//! redb-backed persistent storage for every key-space in §4.1: chain
//! entries, the height/hash indexes, tips, raw blocks, undo streams, the
//! UTXO set, deployment-state cache, the name-undo journal, and the
//! persisted `ChainState`/trie-root/bitfield singletons.
//!
//! Mirrors the teacher's `Store`/`WriteBatch` split: reads go straight
//! through a fresh `redb::ReadTransaction`, writes are staged on a single
//! open `WriteTransaction` wrapped by `WriteBatch` and applied atomically
//! on `commit`. Unlike the teacher, there is no separate JSON manifest file
//! — `ChainState` lives in the `R` table and `WriteTransaction::commit` is
//! the only atomicity boundary a crash can observe.

use std::path::Path;

use redb::{Database, ReadableTable, ReadableTableMetadata};

use hsc_consensus::{BitField, ChainEntry, ChainState, CoinEntry, NameState, Outpoint};

use crate::codec::{self, NameUndoEntry, UndoRecord};
use crate::error::{StoreError, StoreResult};
use crate::flags::Flags;
use crate::tables::*;
use crate::trie::TRIE_NODES;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub struct Store {
    db: Database,
}

impl Store {
    /// Opens (creating if absent) the database at `path` and ensures every
    /// table exists, so a fresh store never hits a missing-table error on
    /// first read.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path)?;
        let tx = db.begin_write()?;
        for table in ALL_TABLES {
            tx.open_table(*table)?;
        }
        tx.open_table(TRIE_NODES)?;

        let found = {
            let table = tx.open_table(SCHEMA_VERSION)?;
            match table.get(SINGLETON_KEY)? {
                Some(v) => Some(u32::from_le_bytes(v.value().try_into().map_err(|_| {
                    StoreError::CorruptRecord {
                        table: "V",
                        detail: "bad length".into(),
                    }
                })?)),
                None => None,
            }
        };
        match found {
            Some(version) if version > CURRENT_SCHEMA_VERSION => {
                return Err(StoreError::SchemaTooNew {
                    found: version,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
            Some(_) => {}
            None => {
                let mut table = tx.open_table(SCHEMA_VERSION)?;
                table.insert(SINGLETON_KEY, CURRENT_SCHEMA_VERSION.to_le_bytes().as_slice())?;
            }
        }
        tx.commit()?;
        Ok(Store { db })
    }

    pub fn begin_write(&self) -> StoreResult<WriteBatch> {
        Ok(WriteBatch {
            tx: self.db.begin_write()?,
        })
    }

    pub fn begin_read(&self) -> StoreResult<redb::ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    // ── Singletons ──────────────────────────────────────────────────────

    pub fn schema_version(&self) -> StoreResult<u32> {
        let tx = self.begin_read()?;
        let table = tx.open_table(SCHEMA_VERSION)?;
        match table.get(SINGLETON_KEY)? {
            Some(v) => Ok(u32::from_le_bytes(v.value().try_into().map_err(|_| {
                StoreError::CorruptRecord {
                    table: "V",
                    detail: "bad length".into(),
                }
            })?)),
            None => Ok(0),
        }
    }

    pub fn flags(&self) -> StoreResult<Flags> {
        let tx = self.begin_read()?;
        let table = tx.open_table(FLAGS)?;
        match table.get(SINGLETON_KEY)? {
            Some(v) => Flags::decode(v.value()),
            None => Ok(Flags::default()),
        }
    }

    pub fn chain_state(&self) -> StoreResult<ChainState> {
        let tx = self.begin_read()?;
        let table = tx.open_table(CHAIN_STATE)?;
        match table.get(SINGLETON_KEY)? {
            Some(v) => codec::decode_chain_state(v.value()),
            None => Ok(ChainState::default()),
        }
    }

    pub fn trie_root(&self) -> StoreResult<[u8; 32]> {
        let tx = self.begin_read()?;
        let table = tx.open_table(TRIE_ROOT)?;
        match table.get(SINGLETON_KEY)? {
            Some(v) => {
                let mut root = [0u8; 32];
                root.copy_from_slice(v.value());
                Ok(root)
            }
            None => Ok(crate::trie::EMPTY_ROOT),
        }
    }

    pub fn bitfield(&self) -> StoreResult<BitField> {
        let tx = self.begin_read()?;
        crate::bitfield::load(&tx)
    }

    pub fn migrated(&self) -> StoreResult<bool> {
        let tx = self.begin_read()?;
        let table = tx.open_table(MIGRATION)?;
        Ok(table.get(SINGLETON_KEY)?.is_some())
    }

    // ── Chain entries / indexes ─────────────────────────────────────────

    pub fn get_entry(&self, hash: &[u8; 32]) -> StoreResult<Option<ChainEntry>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(ENTRY)?;
        match table.get(hash.as_slice())? {
            Some(v) => Ok(Some(codec::decode_entry(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_height(&self, hash: &[u8; 32]) -> StoreResult<Option<u32>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(HEIGHT_BY_HASH)?;
        match table.get(hash.as_slice())? {
            Some(v) => Ok(Some(u32::from_le_bytes(v.value().try_into().map_err(
                |_| StoreError::CorruptRecord {
                    table: "h",
                    detail: "bad length".into(),
                },
            )?))),
            None => Ok(None),
        }
    }

    pub fn get_hash_at_height(&self, height: u32) -> StoreResult<Option<[u8; 32]>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(HASH_BY_HEIGHT)?;
        match table.get(height_key(height).as_slice())? {
            Some(v) => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(v.value());
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    pub fn get_next_hash(&self, hash: &[u8; 32]) -> StoreResult<Option<[u8; 32]>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(NEXT_HASH)?;
        match table.get(hash.as_slice())? {
            Some(v) => {
                let mut next = [0u8; 32];
                next.copy_from_slice(v.value());
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    pub fn is_tip(&self, hash: &[u8; 32]) -> StoreResult<bool> {
        let tx = self.begin_read()?;
        let table = tx.open_table(TIP_SET)?;
        Ok(table.get(hash.as_slice())?.is_some())
    }

    pub fn tips(&self) -> StoreResult<Vec<[u8; 32]>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(TIP_SET)?;
        let mut out = Vec::new();
        for result in table.iter()? {
            let (k, _) = result?;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(k.value());
            out.push(hash);
        }
        Ok(out)
    }

    // ── Blocks / undo ───────────────────────────────────────────────────

    pub fn get_block(&self, hash: &[u8; 32]) -> StoreResult<Option<Vec<u8>>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(BLOCK)?;
        Ok(table.get(hash.as_slice())?.map(|v| v.value().to_vec()))
    }

    pub fn get_undo(&self, hash: &[u8; 32]) -> StoreResult<Option<UndoRecord>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(UNDO)?;
        match table.get(hash.as_slice())? {
            Some(v) => Ok(Some(codec::decode_undo_record(v.value())?)),
            None => Ok(None),
        }
    }

    // ── UTXO / coin set ──────────────────────────────────────────────────

    pub fn get_coin(&self, outpoint: &Outpoint) -> StoreResult<Option<CoinEntry>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(COIN)?;
        match table.get(coin_key(outpoint).as_slice())? {
            Some(v) => Ok(Some(codec::decode_coin(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn coin_count(&self) -> StoreResult<u64> {
        let tx = self.begin_read()?;
        let table = tx.open_table(COIN)?;
        Ok(table.len()?)
    }

    /// Iterates the coin set in key (lexicographic outpoint) order.
    pub fn iter_coins<F>(&self, mut f: F) -> StoreResult<()>
    where
        F: FnMut(&Outpoint, &CoinEntry) -> StoreResult<()>,
    {
        let tx = self.begin_read()?;
        let table = tx.open_table(COIN)?;
        for result in table.iter()? {
            let (k, v) = result?;
            let key = k.value();
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&key[0..32]);
            let index = u32::from_le_bytes(key[32..36].try_into().unwrap());
            let outpoint = Outpoint::new(hash, index);
            let coin = codec::decode_coin(v.value())?;
            f(&outpoint, &coin)?;
        }
        Ok(())
    }

    // ── Name-undo journal / deployment state ────────────────────────────

    pub fn get_name_undo(&self, height: u32) -> StoreResult<Option<Vec<NameUndoEntry>>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(NAME_UNDO)?;
        match table.get(height_key(height).as_slice())? {
            Some(v) => Ok(Some(codec::decode_name_undo(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_deployment_state(&self, bit: u8, hash: &[u8; 32]) -> StoreResult<Option<u8>> {
        let tx = self.begin_read()?;
        let table = tx.open_table(DEPLOYMENT_STATE)?;
        Ok(table
            .get(deployment_state_key(bit, hash).as_slice())?
            .map(|v| v.value()[0]))
    }
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

pub struct WriteBatch {
    tx: redb::WriteTransaction,
}

impl WriteBatch {
    pub fn put_schema_version(&self, version: u32) -> StoreResult<()> {
        let mut table = self.tx.open_table(SCHEMA_VERSION)?;
        table.insert(SINGLETON_KEY, version.to_le_bytes().as_slice())?;
        Ok(())
    }

    pub fn put_flags(&self, flags: &Flags) -> StoreResult<()> {
        let mut table = self.tx.open_table(FLAGS)?;
        table.insert(SINGLETON_KEY, flags.encode().as_slice())?;
        Ok(())
    }

    pub fn put_chain_state(&self, state: &ChainState) -> StoreResult<()> {
        let mut table = self.tx.open_table(CHAIN_STATE)?;
        table.insert(SINGLETON_KEY, codec::encode_chain_state(state).as_slice())?;
        Ok(())
    }

    pub fn put_trie_root(&self, root: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(TRIE_ROOT)?;
        table.insert(SINGLETON_KEY, root.as_slice())?;
        Ok(())
    }

    pub fn put_bitfield(&self, bits: &BitField) -> StoreResult<()> {
        crate::bitfield::store(&self.tx, bits)
    }

    pub fn put_migration_marker(&self) -> StoreResult<()> {
        let mut table = self.tx.open_table(MIGRATION)?;
        table.insert(SINGLETON_KEY, [1u8].as_slice())?;
        Ok(())
    }

    pub fn put_entry(&self, entry: &ChainEntry) -> StoreResult<()> {
        let mut table = self.tx.open_table(ENTRY)?;
        table.insert(entry.hash.as_slice(), codec::encode_entry(entry).as_slice())?;
        Ok(())
    }

    pub fn put_height(&self, hash: &[u8; 32], height: u32) -> StoreResult<()> {
        let mut table = self.tx.open_table(HEIGHT_BY_HASH)?;
        table.insert(hash.as_slice(), height.to_le_bytes().as_slice())?;
        Ok(())
    }

    pub fn put_hash_at_height(&self, height: u32, hash: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(HASH_BY_HEIGHT)?;
        table.insert(height_key(height).as_slice(), hash.as_slice())?;
        Ok(())
    }

    pub fn delete_hash_at_height(&self, height: u32) -> StoreResult<()> {
        let mut table = self.tx.open_table(HASH_BY_HEIGHT)?;
        table.remove(height_key(height).as_slice())?;
        Ok(())
    }

    pub fn put_next_hash(&self, prev: &[u8; 32], next: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(NEXT_HASH)?;
        table.insert(prev.as_slice(), next.as_slice())?;
        Ok(())
    }

    pub fn delete_next_hash(&self, prev: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(NEXT_HASH)?;
        table.remove(prev.as_slice())?;
        Ok(())
    }

    pub fn add_tip(&self, hash: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(TIP_SET)?;
        table.insert(hash.as_slice(), [].as_slice())?;
        Ok(())
    }

    pub fn remove_tip(&self, hash: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(TIP_SET)?;
        table.remove(hash.as_slice())?;
        Ok(())
    }

    pub fn put_block(&self, hash: &[u8; 32], bytes: &[u8]) -> StoreResult<()> {
        let mut table = self.tx.open_table(BLOCK)?;
        table.insert(hash.as_slice(), bytes)?;
        Ok(())
    }

    pub fn delete_block(&self, hash: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(BLOCK)?;
        table.remove(hash.as_slice())?;
        Ok(())
    }

    pub fn put_undo(&self, hash: &[u8; 32], record: &UndoRecord) -> StoreResult<()> {
        let mut table = self.tx.open_table(UNDO)?;
        table.insert(hash.as_slice(), codec::encode_undo_record(record).as_slice())?;
        Ok(())
    }

    pub fn delete_undo(&self, hash: &[u8; 32]) -> StoreResult<()> {
        let mut table = self.tx.open_table(UNDO)?;
        table.remove(hash.as_slice())?;
        Ok(())
    }

    pub fn put_coin(&self, outpoint: &Outpoint, coin: &CoinEntry) -> StoreResult<()> {
        let mut table = self.tx.open_table(COIN)?;
        table.insert(coin_key(outpoint).as_slice(), codec::encode_coin(coin).as_slice())?;
        Ok(())
    }

    pub fn delete_coin(&self, outpoint: &Outpoint) -> StoreResult<()> {
        let mut table = self.tx.open_table(COIN)?;
        table.remove(coin_key(outpoint).as_slice())?;
        Ok(())
    }

    pub fn put_name_undo(&self, height: u32, entries: &[NameUndoEntry]) -> StoreResult<()> {
        let mut table = self.tx.open_table(NAME_UNDO)?;
        table.insert(
            height_key(height).as_slice(),
            codec::encode_name_undo(entries).as_slice(),
        )?;
        Ok(())
    }

    pub fn delete_name_undo(&self, height: u32) -> StoreResult<()> {
        let mut table = self.tx.open_table(NAME_UNDO)?;
        table.remove(height_key(height).as_slice())?;
        Ok(())
    }

    pub fn put_deployment_state(&self, bit: u8, hash: &[u8; 32], state: u8) -> StoreResult<()> {
        let mut table = self.tx.open_table(DEPLOYMENT_STATE)?;
        table.insert(deployment_state_key(bit, hash).as_slice(), [state].as_slice())?;
        Ok(())
    }

    /// Flushes a trie transaction's overlay nodes and advances the
    /// committed trie root. The caller only invokes this at a
    /// `treeInterval` boundary; between boundaries the virtual root is
    /// tracked off-disk by the `TrieTx` itself.
    pub fn flush_trie(&self, trie_tx: &crate::trie::TrieTx) -> StoreResult<[u8; 32]> {
        let root = trie_tx.flush(&self.tx)?;
        self.put_trie_root(&root)?;
        Ok(root)
    }

    /// Repoints the committed trie root without writing any node — used
    /// when disconnecting a tree-interval-boundary block (the reorg
    /// invariant in §4.2.2): nodes are immutable and content-addressed, so
    /// a historical root is always still reachable.
    pub fn inject_trie_root(&self, root: [u8; 32]) -> StoreResult<()> {
        self.put_trie_root(&root)
    }

    pub fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{Address, BlockHeader, Covenant};

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let store = Store::open(&path).unwrap();
        (dir, store)
    }

    fn sample_header() -> BlockHeader {
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

    #[test]
    fn entry_and_index_roundtrip() {
        let (_dir, store) = open_temp();
        let entry = ChainEntry {
            hash: [1u8; 32],
            header: sample_header(),
            height: 0,
            chainwork: [0u8; 32],
        };
        let wb = store.begin_write().unwrap();
        wb.put_entry(&entry).unwrap();
        wb.put_height(&entry.hash, 0).unwrap();
        wb.put_hash_at_height(0, &entry.hash).unwrap();
        wb.add_tip(&entry.hash).unwrap();
        wb.commit().unwrap();

        assert_eq!(store.get_entry(&entry.hash).unwrap(), Some(entry.clone()));
        assert_eq!(store.get_height(&entry.hash).unwrap(), Some(0));
        assert_eq!(store.get_hash_at_height(0).unwrap(), Some(entry.hash));
        assert!(store.is_tip(&entry.hash).unwrap());
    }

    #[test]
    fn coin_set_roundtrip() {
        let (_dir, store) = open_temp();
        let outpoint = Outpoint::new([2u8; 32], 0);
        let coin = CoinEntry {
            version: 1,
            height: 1,
            coinbase: true,
            value: 5_000_000,
            address: Address::from_program(0, &[9u8; 20]),
            covenant: Covenant::none(),
        };
        let wb = store.begin_write().unwrap();
        wb.put_coin(&outpoint, &coin).unwrap();
        wb.commit().unwrap();

        assert_eq!(store.get_coin(&outpoint).unwrap(), Some(coin));
        assert_eq!(store.coin_count().unwrap(), 1);

        let wb = store.begin_write().unwrap();
        wb.delete_coin(&outpoint).unwrap();
        wb.commit().unwrap();
        assert_eq!(store.get_coin(&outpoint).unwrap(), None);
    }

    #[test]
    fn chain_state_and_trie_root_persist() {
        let (_dir, store) = open_temp();
        let state = ChainState {
            tip: [3u8; 32],
            tx: 1,
            coin: 2,
            value: 3,
            burned: 0,
            committed: true,
        };
        let wb = store.begin_write().unwrap();
        wb.put_chain_state(&state).unwrap();
        wb.put_trie_root(&[4u8; 32]).unwrap();
        wb.commit().unwrap();

        let loaded = store.chain_state().unwrap();
        assert_eq!(loaded.tip, state.tip);
        assert_eq!(store.trie_root().unwrap(), [4u8; 32]);
    }

    #[test]
    fn trie_transaction_flushes_through_write_batch() {
        let (_dir, store) = open_temp();
        let provider = hsc_crypto::DefaultCryptoProvider;
        let rtxn = store.begin_read().unwrap();
        let mut trie_tx = crate::trie::TrieTx::new(store.trie_root().unwrap());
        trie_tx
            .insert(&provider, &rtxn, [5u8; 32], b"value".to_vec())
            .unwrap();
        drop(rtxn);

        let wb = store.begin_write().unwrap();
        let root = wb.flush_trie(&trie_tx).unwrap();
        wb.commit().unwrap();

        assert_eq!(store.trie_root().unwrap(), root);
        let rtxn2 = store.begin_read().unwrap();
        let snap = crate::trie::TrieSnapshot::new(&rtxn2, root);
        assert_eq!(snap.get(&[5u8; 32]).unwrap(), Some(b"value".to_vec()));
    }
}
