//! Fatal storage errors — I/O, schema, and invariant failures. Never scored
//! or cached as rejects; these abort the operation in flight.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("a write batch is already open")]
    BatchAlreadyOpen,

    #[error("no write batch is open")]
    NoBatchOpen,

    #[error("corrupt record in table {table}: {detail}")]
    CorruptRecord { table: &'static str, detail: String },

    #[error("schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("block {0:?} not found")]
    MissingBlock([u8; 32]),

    #[error("undo record for block {0:?} not found")]
    MissingUndo([u8; 32]),

    #[error("chain entry for block {0:?} not found")]
    MissingEntry([u8; 32]),

    #[error("consensus encoding error: {0}")]
    Wire(#[from] hsc_consensus::VerifyError),

    #[error("store is already pruned past the requested height")]
    AlreadyPruned,

    #[error("chain too short to prune")]
    ChainTooShort,

    #[error("trie root {0:?} has no known snapshot")]
    UnknownTrieRoot([u8; 32]),
}

pub type StoreResult<T> = Result<T, StoreError>;
