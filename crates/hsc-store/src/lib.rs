//! `hsc-store` — persistent storage for the consensus-critical core: a
//! redb-backed key-value store with canonical on-disk byte layouts, an
//! authenticated name-state radix trie, startup counter migration, and
//! block/undo pruning.
//!
//! Deliberately scoped to persistence alone. Block acceptance, contextual
//! verification, and reorg driving live in the engine crate; this crate
//! only guarantees that whatever root or entry it hands back is exactly
//! what was last committed.

pub mod bitfield;
pub mod codec;
pub mod db;
pub mod error;
pub mod flags;
pub mod migration;
pub mod pruning;
pub mod tables;
pub mod trie;

pub use db::{Store, WriteBatch, CURRENT_SCHEMA_VERSION};
pub use error::{StoreError, StoreResult};
pub use flags::Flags;
pub use trie::{TrieProof, TrieSnapshot, TrieTx};
