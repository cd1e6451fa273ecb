//! A coin/name-state view layered over the live store the way
//! `hsc-engine`'s `CoinView` layers a block's overlay over it — except the
//! overlay here is every currently-pooled transaction's outputs and spends,
//! not one block's.

use std::collections::HashMap;

use hsc_consensus::{CoinEntry, NameState, NameHash, Outpoint};
use hsc_store::codec::decode_name_state;
use hsc_store::trie::TrieTx;
use hsc_store::{Store, StoreResult};

pub struct PoolView<'a> {
    store: &'a Store,
    created: &'a HashMap<Outpoint, CoinEntry>,
    spent: &'a HashMap<Outpoint, Hash32>,
}

type Hash32 = [u8; 32];

impl<'a> PoolView<'a> {
    pub fn new(
        store: &'a Store,
        created: &'a HashMap<Outpoint, CoinEntry>,
        spent: &'a HashMap<Outpoint, Hash32>,
    ) -> Self {
        PoolView { store, created, spent }
    }

    /// Resolves a coin the same way contextual block verification would,
    /// consulting unconfirmed pool outputs before the committed UTXO set.
    pub fn get_coin(&self, outpoint: &Outpoint) -> StoreResult<Option<CoinEntry>> {
        if self.spent.contains_key(outpoint) {
            return Ok(None);
        }
        if let Some(coin) = self.created.get(outpoint) {
            return Ok(Some(coin.clone()));
        }
        self.store.get_coin(outpoint)
    }

    /// Whether `outpoint` is already claimed by a pooled transaction, and if
    /// so, which one — the conflict-detection half of `get_coin`.
    pub fn spender_of(&self, outpoint: &Outpoint) -> Option<Hash32> {
        self.spent.get(outpoint).copied()
    }

    /// The committed name-trie state only; pending covenant edits still
    /// sitting in the pool are deliberately invisible here; see the module
    /// doc on `ClaimEntry` for why covenant chaining across unconfirmed
    /// transactions isn't modeled.
    pub fn name_state(&self, name_hash: &NameHash) -> StoreResult<Option<NameState>> {
        let root = self.store.trie_root()?;
        let txn = self.store.begin_read()?;
        let trie = TrieTx::new(root);
        match trie.get(&txn, name_hash)? {
            Some(bytes) => Ok(Some(decode_name_state(&bytes)?)),
            None => Ok(None),
        }
    }
}
