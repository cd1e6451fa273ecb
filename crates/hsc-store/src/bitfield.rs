//! Persistence of the airdrop-position `BitField` singleton (`f` table).

use redb::ReadableTable;

use hsc_consensus::BitField;

use crate::error::StoreResult;
use crate::tables::{BITFIELD, SINGLETON_KEY};

pub fn load(txn: &redb::ReadTransaction) -> StoreResult<BitField> {
    let table = txn.open_table(BITFIELD)?;
    match table.get(SINGLETON_KEY)? {
        Some(v) => Ok(BitField::from_bytes(v.value().to_vec())),
        None => Ok(BitField::new()),
    }
}

pub fn store(wtxn: &redb::WriteTransaction, bits: &BitField) -> StoreResult<()> {
    let mut table = wtxn.open_table(BITFIELD)?;
    table.insert(SINGLETON_KEY, bits.as_bytes())?;
    Ok(())
}
