//! Layered UTXO view: an in-memory overlay over the committed `ChainStore`
//! coin set. Contextual verification spends and creates coins against the
//! overlay only; a successful block's overlay is flushed into a
//! `WriteBatch` together with the `UndoRecord` it built along the way.

use std::collections::HashMap;

use hsc_consensus::constants::COVENANT_REVOKE;
use hsc_consensus::{CoinEntry, Outpoint};
use hsc_store::codec::{SpentCoin, UndoRecord};
use hsc_store::{Store, StoreResult, WriteBatch};

enum Entry {
    Created(CoinEntry),
    Spent,
}

/// A working UTXO set for one block's verification. `spent` and `created`
/// mirror exactly what will become the block's `UndoRecord` on success.
pub struct CoinView<'a> {
    store: &'a Store,
    overlay: HashMap<Outpoint, Entry>,
    undo: UndoRecord,
}

impl<'a> CoinView<'a> {
    pub fn new(store: &'a Store) -> Self {
        CoinView {
            store,
            overlay: HashMap::new(),
            undo: UndoRecord::default(),
        }
    }

    /// Looks up a coin, consulting the overlay (other transactions already
    /// applied in this block) before falling back to the committed store.
    pub fn get(&self, outpoint: &Outpoint) -> StoreResult<Option<CoinEntry>> {
        match self.overlay.get(outpoint) {
            Some(Entry::Created(coin)) => Ok(Some(coin.clone())),
            Some(Entry::Spent) => Ok(None),
            None => self.store.get_coin(outpoint),
        }
    }

    /// Removes a coin from the view, recording it in the undo list. Returns
    /// the coin that was spent, or `None` if it was already gone (a
    /// double-spend the caller must reject).
    pub fn spend(&mut self, outpoint: &Outpoint) -> StoreResult<Option<CoinEntry>> {
        let coin = self.get(outpoint)?;
        if let Some(ref coin) = coin {
            self.undo.spent.push(SpentCoin {
                outpoint: *outpoint,
                coin: coin.clone(),
            });
            self.overlay.insert(*outpoint, Entry::Spent);
        }
        Ok(coin)
    }

    pub fn create(&mut self, outpoint: Outpoint, coin: CoinEntry) {
        self.overlay.insert(outpoint, Entry::Created(coin));
        self.undo.created.push(outpoint);
    }

    pub fn into_undo(self) -> UndoRecord {
        self.undo
    }

    /// Writes every overlay change into `wb`, and deletes the coins the
    /// undo record created so a later disconnect can find exactly what it
    /// needs to remove.
    pub fn apply(&self, wb: &WriteBatch) -> StoreResult<()> {
        for spent in &self.undo.spent {
            wb.delete_coin(&spent.outpoint)?;
        }
        for outpoint in &self.undo.created {
            if let Some(Entry::Created(coin)) = self.overlay.get(outpoint) {
                wb.put_coin(outpoint, coin)?;
            }
        }
        Ok(())
    }
}

/// Reverses an `UndoRecord` against a `WriteBatch`: deletes what the block
/// created and restores what it spent.
pub fn disconnect(wb: &WriteBatch, undo: &UndoRecord) -> StoreResult<()> {
    for outpoint in &undo.created {
        wb.delete_coin(outpoint)?;
    }
    for spent in &undo.spent {
        wb.put_coin(&spent.outpoint, &spent.coin)?;
    }
    Ok(())
}

/// The `(coin, value, burned)` counter deltas a block's connect step
/// applied, recomputed from its `UndoRecord` before the coins it created
/// are deleted. `disconnect_block` negates these against `ChainState`.
pub fn connect_deltas(store: &Store, undo: &UndoRecord) -> StoreResult<(i64, i64, i64)> {
    let mut coin_delta = 0i64;
    let mut value_delta = 0i64;
    let mut burned_delta = 0i64;

    for spent in &undo.spent {
        coin_delta -= 1;
        if spent.coin.covenant.kind == COVENANT_REVOKE {
            burned_delta -= spent.coin.value as i64;
        } else if !spent.coin.coinbase {
            value_delta -= spent.coin.value as i64;
        }
    }
    for outpoint in &undo.created {
        let Some(coin) = store.get_coin(outpoint)? else {
            continue;
        };
        coin_delta += 1;
        if coin.covenant.kind == COVENANT_REVOKE {
            burned_delta += coin.value as i64;
        } else if !coin.coinbase {
            value_delta += coin.value as i64;
        }
    }
    Ok((coin_delta, value_delta, burned_delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{Address, Covenant};

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        (dir, store)
    }

    fn coin(value: u64) -> CoinEntry {
        CoinEntry {
            version: 0,
            height: 0,
            coinbase: false,
            value,
            address: Address::from_program(0, &[1u8; 20]),
            covenant: Covenant::none(),
        }
    }

    #[test]
    fn spend_then_create_round_trips_through_apply_and_disconnect() {
        let (_dir, store) = open_temp();
        let existing = Outpoint::new([1u8; 32], 0);
        let wb = store.begin_write().unwrap();
        wb.put_coin(&existing, &coin(100)).unwrap();
        wb.commit().unwrap();

        let mut view = CoinView::new(&store);
        let spent = view.spend(&existing).unwrap();
        assert_eq!(spent, Some(coin(100)));
        let new_outpoint = Outpoint::new([2u8; 32], 0);
        view.create(new_outpoint, coin(90));

        let wb = store.begin_write().unwrap();
        view.apply(&wb).unwrap();
        wb.commit().unwrap();

        assert_eq!(store.get_coin(&existing).unwrap(), None);
        assert_eq!(store.get_coin(&new_outpoint).unwrap(), Some(coin(90)));

        let undo = view.into_undo();
        let wb = store.begin_write().unwrap();
        disconnect(&wb, &undo).unwrap();
        wb.commit().unwrap();

        assert_eq!(store.get_coin(&existing).unwrap(), Some(coin(100)));
        assert_eq!(store.get_coin(&new_outpoint).unwrap(), None);
    }

    #[test]
    fn double_spend_in_same_view_is_visible_as_already_gone() {
        let (_dir, store) = open_temp();
        let existing = Outpoint::new([3u8; 32], 0);
        let wb = store.begin_write().unwrap();
        wb.put_coin(&existing, &coin(10)).unwrap();
        wb.commit().unwrap();

        let mut view = CoinView::new(&store);
        assert!(view.spend(&existing).unwrap().is_some());
        assert!(view.spend(&existing).unwrap().is_none());
    }
}
