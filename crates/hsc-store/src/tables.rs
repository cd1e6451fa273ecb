//! redb table definitions for every logical key-space. Each row of the
//! key-space table is a separate redb table; the "prefix" letter in the
//! design doc is the table's name, not a literal byte in the key.

use redb::TableDefinition;

/// Fixed key used by every singleton (prefix-only) logical table.
pub const SINGLETON_KEY: &[u8] = b"_";

pub const SCHEMA_VERSION: TableDefinition<&[u8], &[u8]> = TableDefinition::new("V");
pub const FLAGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("O");
pub const CHAIN_STATE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("R");
pub const TRIE_ROOT: TableDefinition<&[u8], &[u8]> = TableDefinition::new("s");
pub const BITFIELD: TableDefinition<&[u8], &[u8]> = TableDefinition::new("f");
pub const DEPLOYMENT_PARAMS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("D");
pub const MIGRATION: TableDefinition<&[u8], &[u8]> = TableDefinition::new("M");

/// block hash -> encoded `ChainEntry`
pub const ENTRY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("e");
/// block hash -> height (u32 LE)
pub const HEIGHT_BY_HASH: TableDefinition<&[u8], &[u8]> = TableDefinition::new("h");
/// height (u32 BE) -> block hash
pub const HASH_BY_HEIGHT: TableDefinition<&[u8], &[u8]> = TableDefinition::new("H");
/// prev hash -> next-in-main-chain hash
pub const NEXT_HASH: TableDefinition<&[u8], &[u8]> = TableDefinition::new("n");
/// tip hash -> unit (tip set membership)
pub const TIP_SET: TableDefinition<&[u8], &[u8]> = TableDefinition::new("p");
/// block hash -> raw block bytes
pub const BLOCK: TableDefinition<&[u8], &[u8]> = TableDefinition::new("b");
/// block hash -> undo-coin stream
pub const UNDO: TableDefinition<&[u8], &[u8]> = TableDefinition::new("u");
/// outpoint bytes -> encoded `CoinEntry`
pub const COIN: TableDefinition<&[u8], &[u8]> = TableDefinition::new("c");
/// (deployment bit, block hash) -> threshold state byte
pub const DEPLOYMENT_STATE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("v");
/// height (u32 BE) -> name-undo journal
pub const NAME_UNDO: TableDefinition<&[u8], &[u8]> = TableDefinition::new("w");
/// tx hash -> TXMeta (only populated if indexTX)
pub const TX_META: TableDefinition<&[u8], &[u8]> = TableDefinition::new("t");
/// (address, tx hash) -> unit (only populated if indexAddress)
pub const ADDR_TX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("T");
/// (address, outpoint) -> unit (only populated if indexAddress)
pub const ADDR_COIN: TableDefinition<&[u8], &[u8]> = TableDefinition::new("C");

/// Every table opened eagerly on `Store::open` so a fresh database has all
/// of them present before the first write batch begins.
pub const ALL_TABLES: &[TableDefinition<&[u8], &[u8]>] = &[
    SCHEMA_VERSION,
    FLAGS,
    CHAIN_STATE,
    TRIE_ROOT,
    BITFIELD,
    DEPLOYMENT_PARAMS,
    MIGRATION,
    ENTRY,
    HEIGHT_BY_HASH,
    HASH_BY_HEIGHT,
    NEXT_HASH,
    TIP_SET,
    BLOCK,
    UNDO,
    COIN,
    DEPLOYMENT_STATE,
    NAME_UNDO,
    TX_META,
    ADDR_TX,
    ADDR_COIN,
];

pub fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

pub fn deployment_state_key(bit: u8, hash: &[u8; 32]) -> [u8; 33] {
    let mut out = [0u8; 33];
    out[0] = bit;
    out[1..33].copy_from_slice(hash);
    out
}

pub fn coin_key(outpoint: &hsc_consensus::Outpoint) -> [u8; 36] {
    let mut out = [0u8; 36];
    out[0..32].copy_from_slice(&outpoint.hash);
    out[32..36].copy_from_slice(&outpoint.index.to_le_bytes());
    out
}

pub fn addr_tx_key(address_program: &[u8], txid: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(address_program.len() + 32);
    out.extend_from_slice(address_program);
    out.extend_from_slice(txid);
    out
}

pub fn addr_coin_key(address_program: &[u8], outpoint: &hsc_consensus::Outpoint) -> Vec<u8> {
    let mut out = Vec::with_capacity(address_program.len() + 36);
    out.extend_from_slice(address_program);
    out.extend_from_slice(&coin_key(outpoint));
    out
}
