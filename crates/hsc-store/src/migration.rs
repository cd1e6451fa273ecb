//! Startup migration: recomputes the `coin`/`value`/`burned` counters in
//! `ChainState` by resumming the persisted UTXO set, rather than trusting
//! whatever an interrupted prior run left behind. Runs once, gated by the
//! `M` marker.
//!
//! Counter recomputation stays inside the UTXO set itself rather than
//! replaying blocks through covenant application — that pipeline belongs to
//! the engine, not the store. A coin entry with covenant kind `REVOKE`
//! marks a bond that left the spendable set permanently; its value is
//! counted as burned rather than spendable.

use hsc_consensus::constants::COVENANT_REVOKE;

use crate::db::Store;
use crate::error::StoreResult;

/// Runs the migration if it hasn't already run, returning whether it ran.
pub fn migrate_if_needed(store: &Store) -> StoreResult<bool> {
    if store.migrated()? {
        return Ok(false);
    }
    run(store)?;
    Ok(true)
}

fn run(store: &Store) -> StoreResult<()> {
    let mut coin_count = 0u64;
    let mut value = 0u64;
    let mut burned = 0u64;

    store.iter_coins(|_outpoint, coin| {
        coin_count += 1;
        if coin.covenant.kind == COVENANT_REVOKE {
            burned += coin.value;
        } else if !coin.coinbase {
            value += coin.value;
        }
        Ok(())
    })?;

    let prior = store.chain_state()?;

    let recomputed = hsc_consensus::ChainState {
        tip: prior.tip,
        tx: prior.tx,
        coin: coin_count,
        value,
        burned,
        committed: true,
    };

    let wb = store.begin_write()?;
    wb.put_chain_state(&recomputed)?;
    wb.put_migration_marker()?;
    wb.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{Address, ChainState, Covenant, CoinEntry, Outpoint};

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let store = Store::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn recomputes_from_live_coin_set_and_marks_done() {
        let (_dir, store) = open_temp();
        let wb = store.begin_write().unwrap();
        wb.put_chain_state(&ChainState {
            tip: [1u8; 32],
            tx: 7,
            coin: 0,
            value: 0,
            burned: 0,
            committed: true,
        })
        .unwrap();
        wb.put_coin(
            &Outpoint::new([2u8; 32], 0),
            &CoinEntry {
                version: 1,
                height: 1,
                coinbase: false,
                value: 100,
                address: Address::from_program(0, &[3u8; 20]),
                covenant: Covenant::none(),
            },
        )
        .unwrap();
        wb.put_coin(
            &Outpoint::new([4u8; 32], 0),
            &CoinEntry {
                version: 1,
                height: 1,
                coinbase: false,
                value: 50,
                address: Address::from_program(0, &[5u8; 20]),
                covenant: Covenant {
                    kind: COVENANT_REVOKE,
                    items: vec![],
                },
            },
        )
        .unwrap();
        wb.commit().unwrap();

        assert!(migrate_if_needed(&store).unwrap());
        assert!(!migrate_if_needed(&store).unwrap());

        let state = store.chain_state().unwrap();
        assert_eq!(state.coin, 2);
        assert_eq!(state.value, 100);
        assert_eq!(state.burned, 50);
        assert_eq!(state.tx, 7);
    }
}
