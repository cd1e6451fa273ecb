//! Authenticated radix trie over 256-bit name hashes (an "urkel"-style
//! binary Merkle trie). Nodes are content-addressed by their blake2b-256
//! hash and, once written, are immutable — a historical root is always a
//! valid read-only view as long as its nodes haven't been pruned, which
//! makes `inject(root)` during a reorg a matter of repointing the
//! committed-root pointer rather than rewriting any node.
//!
//! A `TrieTx` batches `insert`/`remove` calls entirely off-disk; its
//! `virtual_root()` advances on every call but nothing is written to the
//! `TRIE_NODES` table until `flush`, which the caller only invokes at a
//! `treeInterval` height boundary (see the header `treeRoot` commitment
//! invariant in the consensus core).

use std::collections::HashMap;

use redb::{ReadableTable, TableDefinition};

use hsc_crypto::CryptoProvider;

use crate::error::{StoreError, StoreResult};

pub const TRIE_NODES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("trie_nodes");

pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

const LEAF_TAG: u8 = 0x01;
const INTERNAL_TAG: u8 = 0x00;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Leaf { key: [u8; 32], value: Vec<u8> },
    Internal { left: [u8; 32], right: [u8; 32] },
}

fn node_hash(provider: &dyn CryptoProvider, node: &Node) -> [u8; 32] {
    match node {
        Node::Leaf { key, value } => {
            let value_hash = provider.blake2b_256(value);
            let mut preimage = Vec::with_capacity(1 + 32 + 32);
            preimage.push(LEAF_TAG);
            preimage.extend_from_slice(key);
            preimage.extend_from_slice(&value_hash);
            provider.blake2b_256(&preimage)
        }
        Node::Internal { left, right } => {
            let mut preimage = Vec::with_capacity(1 + 64);
            preimage.push(INTERNAL_TAG);
            preimage.extend_from_slice(left);
            preimage.extend_from_slice(right);
            provider.blake2b_256(&preimage)
        }
    }
}

fn encode_node(node: &Node) -> Vec<u8> {
    match node {
        Node::Leaf { key, value } => {
            let mut out = Vec::with_capacity(1 + 32 + value.len());
            out.push(LEAF_TAG);
            out.extend_from_slice(key);
            out.extend_from_slice(value);
            out
        }
        Node::Internal { left, right } => {
            let mut out = Vec::with_capacity(1 + 64);
            out.push(INTERNAL_TAG);
            out.extend_from_slice(left);
            out.extend_from_slice(right);
            out
        }
    }
}

fn decode_node(bytes: &[u8]) -> StoreResult<Node> {
    match bytes.first() {
        Some(&LEAF_TAG) => {
            if bytes.len() < 33 {
                return Err(StoreError::CorruptRecord {
                    table: "trie_nodes",
                    detail: "truncated leaf".into(),
                });
            }
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes[1..33]);
            Ok(Node::Leaf {
                key,
                value: bytes[33..].to_vec(),
            })
        }
        Some(&INTERNAL_TAG) => {
            if bytes.len() != 65 {
                return Err(StoreError::CorruptRecord {
                    table: "trie_nodes",
                    detail: "bad internal node length".into(),
                });
            }
            let mut left = [0u8; 32];
            left.copy_from_slice(&bytes[1..33]);
            let mut right = [0u8; 32];
            right.copy_from_slice(&bytes[33..65]);
            Ok(Node::Internal { left, right })
        }
        _ => Err(StoreError::CorruptRecord {
            table: "trie_nodes",
            detail: "unknown node tag".into(),
        }),
    }
}

fn bit_at(key: &[u8; 32], depth: usize) -> bool {
    let byte = key[depth / 8];
    (byte >> (7 - (depth % 8))) & 1 == 1
}

/// Fetches a node by hash straight from the database, bypassing any overlay.
fn load_from_db(
    table: &redb::ReadOnlyTable<&[u8], &[u8]>,
    hash: &[u8; 32],
) -> StoreResult<Option<Node>> {
    if *hash == EMPTY_ROOT {
        return Ok(None);
    }
    match table.get(hash.as_slice())? {
        Some(v) => Ok(Some(decode_node(v.value())?)),
        None => Err(StoreError::CorruptRecord {
            table: "trie_nodes",
            detail: format!("missing node {hash:?}"),
        }),
    }
}

/// Walks from `root` down to the leaf for `key`, reading through an
/// optional in-memory overlay first (used by a live `TrieTx`) and falling
/// back to the database.
fn get_with_overlay(
    table: &redb::ReadOnlyTable<&[u8], &[u8]>,
    overlay: &HashMap<[u8; 32], Node>,
    root: [u8; 32],
    key: &[u8; 32],
) -> StoreResult<Option<Vec<u8>>> {
    let mut cur = root;
    let mut depth = 0usize;
    loop {
        if cur == EMPTY_ROOT {
            return Ok(None);
        }
        let node = if let Some(n) = overlay.get(&cur) {
            n.clone()
        } else {
            match load_from_db(table, &cur)? {
                Some(n) => n,
                None => return Ok(None),
            }
        };
        match node {
            Node::Leaf { key: leaf_key, value } => {
                return Ok(if leaf_key == *key { Some(value) } else { None });
            }
            Node::Internal { left, right } => {
                cur = if bit_at(key, depth) { right } else { left };
                depth += 1;
                if depth > 256 {
                    return Err(StoreError::CorruptRecord {
                        table: "trie_nodes",
                        detail: "trie depth exceeded 256".into(),
                    });
                }
            }
        }
    }
}

/// A proof that `key` maps to a value (or is absent) under `root`: the
/// sibling hash at every internal node walked, root-to-leaf order, plus the
/// terminal node encountered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieProof {
    pub siblings: Vec<[u8; 32]>,
    pub leaf: Option<(Vec<u8> /* key */, Vec<u8> /* value */)>,
}

fn prove_with_overlay(
    table: &redb::ReadOnlyTable<&[u8], &[u8]>,
    overlay: &HashMap<[u8; 32], Node>,
    root: [u8; 32],
    key: &[u8; 32],
) -> StoreResult<TrieProof> {
    let mut cur = root;
    let mut depth = 0usize;
    let mut siblings = Vec::new();
    loop {
        if cur == EMPTY_ROOT {
            return Ok(TrieProof {
                siblings,
                leaf: None,
            });
        }
        let node = if let Some(n) = overlay.get(&cur) {
            n.clone()
        } else {
            match load_from_db(table, &cur)? {
                Some(n) => n,
                None => {
                    return Ok(TrieProof {
                        siblings,
                        leaf: None,
                    })
                }
            }
        };
        match node {
            Node::Leaf { key: leaf_key, value } => {
                return Ok(TrieProof {
                    siblings,
                    leaf: Some((leaf_key.to_vec(), value)),
                });
            }
            Node::Internal { left, right } => {
                let (next, sibling) = if bit_at(key, depth) {
                    (right, left)
                } else {
                    (left, right)
                };
                siblings.push(sibling);
                cur = next;
                depth += 1;
            }
        }
    }
}

/// An off-disk batch of trie mutations rooted at some starting root. Mutates
/// entirely in an overlay; nothing touches the database until `flush`.
pub struct TrieTx {
    root: [u8; 32],
    overlay: HashMap<[u8; 32], Node>,
}

impl TrieTx {
    pub fn new(root: [u8; 32]) -> Self {
        TrieTx {
            root,
            overlay: HashMap::new(),
        }
    }

    pub fn virtual_root(&self) -> [u8; 32] {
        self.root
    }

    /// Looks up `key`, consulting the overlay before the database.
    pub fn get(
        &self,
        txn: &redb::ReadTransaction,
        key: &[u8; 32],
    ) -> StoreResult<Option<Vec<u8>>> {
        let table = txn.open_table(TRIE_NODES)?;
        get_with_overlay(&table, &self.overlay, self.root, key)
    }

    /// Inserts or replaces `key`, rewriting the path from root to leaf.
    pub fn insert(
        &mut self,
        provider: &dyn CryptoProvider,
        txn: &redb::ReadTransaction,
        key: [u8; 32],
        value: Vec<u8>,
    ) -> StoreResult<()> {
        let table = txn.open_table(TRIE_NODES)?;
        self.root = self.insert_at(provider, &table, self.root, 0, key, value)?;
        Ok(())
    }

    fn insert_at(
        &mut self,
        provider: &dyn CryptoProvider,
        table: &redb::ReadOnlyTable<&[u8], &[u8]>,
        node_hash_at: [u8; 32],
        depth: usize,
        key: [u8; 32],
        value: Vec<u8>,
    ) -> StoreResult<[u8; 32]> {
        if node_hash_at == EMPTY_ROOT {
            let leaf = Node::Leaf { key, value };
            let h = node_hash(provider, &leaf);
            self.overlay.insert(h, leaf);
            return Ok(h);
        }
        let node = if let Some(n) = self.overlay.get(&node_hash_at) {
            n.clone()
        } else {
            load_from_db(table, &node_hash_at)?.ok_or(StoreError::UnknownTrieRoot(node_hash_at))?
        };
        match node {
            Node::Leaf {
                key: leaf_key,
                value: leaf_value,
            } => {
                if leaf_key == key {
                    let leaf = Node::Leaf { key, value };
                    let h = node_hash(provider, &leaf);
                    self.overlay.insert(h, leaf);
                    return Ok(h);
                }
                // Split: reinsert the existing leaf alongside the new one,
                // descending until their bit paths diverge.
                let existing = Node::Leaf {
                    key: leaf_key,
                    value: leaf_value,
                };
                let existing_hash = node_hash(provider, &existing);
                self.overlay.insert(existing_hash, existing);
                let mut new_root = existing_hash;
                new_root = self.insert_at(provider, table, new_root, depth, key, value)?;
                Ok(new_root)
            }
            Node::Internal { left, right } => {
                let (new_left, new_right) = if bit_at(&key, depth) {
                    (left, self.insert_at(provider, table, right, depth + 1, key, value)?)
                } else {
                    (self.insert_at(provider, table, left, depth + 1, key, value)?, right)
                };
                let internal = Node::Internal {
                    left: new_left,
                    right: new_right,
                };
                let h = node_hash(provider, &internal);
                self.overlay.insert(h, internal);
                Ok(h)
            }
        }
    }

    /// Removes `key` if present; a no-op if it is absent. Collapsing empty
    /// subtrees back to `EMPTY_ROOT` is left to the next insert — an
    /// internal node pointing at two empty children simply never arises
    /// because `insert_at` always replaces a leaf in place.
    pub fn remove(
        &mut self,
        provider: &dyn CryptoProvider,
        txn: &redb::ReadTransaction,
        key: &[u8; 32],
    ) -> StoreResult<()> {
        let table = txn.open_table(TRIE_NODES)?;
        if let Some((new_root, removed)) =
            self.remove_at(provider, &table, self.root, 0, key)?
        {
            if removed {
                self.root = new_root;
            }
        }
        Ok(())
    }

    fn remove_at(
        &mut self,
        provider: &dyn CryptoProvider,
        table: &redb::ReadOnlyTable<&[u8], &[u8]>,
        node_hash_at: [u8; 32],
        depth: usize,
        key: &[u8; 32],
    ) -> StoreResult<Option<([u8; 32], bool)>> {
        if node_hash_at == EMPTY_ROOT {
            return Ok(Some((EMPTY_ROOT, false)));
        }
        let node = if let Some(n) = self.overlay.get(&node_hash_at) {
            n.clone()
        } else {
            load_from_db(table, &node_hash_at)?.ok_or(StoreError::UnknownTrieRoot(node_hash_at))?
        };
        match node {
            Node::Leaf { key: leaf_key, .. } => {
                if leaf_key == *key {
                    Ok(Some((EMPTY_ROOT, true)))
                } else {
                    Ok(Some((node_hash_at, false)))
                }
            }
            Node::Internal { left, right } => {
                let (child, other, went_right) = if bit_at(key, depth) {
                    (right, left, true)
                } else {
                    (left, right, false)
                };
                match self.remove_at(provider, table, child, depth + 1, key)? {
                    Some((new_child, true)) => {
                        if new_child == EMPTY_ROOT && other == EMPTY_ROOT {
                            return Ok(Some((EMPTY_ROOT, true)));
                        }
                        let internal = if went_right {
                            Node::Internal {
                                left: other,
                                right: new_child,
                            }
                        } else {
                            Node::Internal {
                                left: new_child,
                                right: other,
                            }
                        };
                        let h = node_hash(provider, &internal);
                        self.overlay.insert(h, internal);
                        Ok(Some((h, true)))
                    }
                    _ => Ok(Some((node_hash_at, false))),
                }
            }
        }
    }

    /// Writes every overlay node into `TRIE_NODES` inside the given write
    /// transaction's table, without committing the transaction — the caller
    /// commits as part of its own batch. Returns the flushed root.
    pub fn flush(&self, wtxn: &redb::WriteTransaction) -> StoreResult<[u8; 32]> {
        let mut table = wtxn.open_table(TRIE_NODES)?;
        for (hash, node) in &self.overlay {
            table.insert(hash.as_slice(), encode_node(node).as_slice())?;
        }
        Ok(self.root)
    }
}

/// A read-only, proof-capable view rooted at a specific (possibly
/// historical) trie root.
pub struct TrieSnapshot<'a> {
    txn: &'a redb::ReadTransaction,
    root: [u8; 32],
}

impl<'a> TrieSnapshot<'a> {
    pub fn new(txn: &'a redb::ReadTransaction, root: [u8; 32]) -> Self {
        TrieSnapshot { txn, root }
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    pub fn get(&self, key: &[u8; 32]) -> StoreResult<Option<Vec<u8>>> {
        let table = self.txn.open_table(TRIE_NODES)?;
        get_with_overlay(&table, &HashMap::new(), self.root, key)
    }

    pub fn prove(&self, key: &[u8; 32]) -> StoreResult<TrieProof> {
        let table = self.txn.open_table(TRIE_NODES)?;
        prove_with_overlay(&table, &HashMap::new(), self.root, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_crypto::DefaultCryptoProvider;

    fn open_mem() -> redb::Database {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trie.redb");
        std::mem::forget(dir);
        redb::Database::create(path).unwrap()
    }

    #[test]
    fn insert_get_roundtrip() {
        let db = open_mem();
        {
            let wtxn = db.begin_write().unwrap();
            wtxn.open_table(TRIE_NODES).unwrap();
            wtxn.commit().unwrap();
        }
        let provider = DefaultCryptoProvider;
        let rtxn = db.begin_read().unwrap();
        let mut tx = TrieTx::new(EMPTY_ROOT);
        let key_a = [1u8; 32];
        let key_b = [2u8; 32];
        tx.insert(&provider, &rtxn, key_a, b"alpha".to_vec()).unwrap();
        tx.insert(&provider, &rtxn, key_b, b"beta".to_vec()).unwrap();
        assert_eq!(tx.get(&rtxn, &key_a).unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(tx.get(&rtxn, &key_b).unwrap(), Some(b"beta".to_vec()));

        let root = {
            let wtxn = db.begin_write().unwrap();
            let root = tx.flush(&wtxn).unwrap();
            wtxn.commit().unwrap();
            root
        };
        assert_ne!(root, EMPTY_ROOT);

        let rtxn2 = db.begin_read().unwrap();
        let snap = TrieSnapshot::new(&rtxn2, root);
        assert_eq!(snap.get(&key_a).unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(snap.get(&[9u8; 32]).unwrap(), None);
    }

    #[test]
    fn remove_then_absent() {
        let db = open_mem();
        {
            let wtxn = db.begin_write().unwrap();
            wtxn.open_table(TRIE_NODES).unwrap();
            wtxn.commit().unwrap();
        }
        let provider = DefaultCryptoProvider;
        let rtxn = db.begin_read().unwrap();
        let mut tx = TrieTx::new(EMPTY_ROOT);
        let key = [5u8; 32];
        tx.insert(&provider, &rtxn, key, b"x".to_vec()).unwrap();
        assert!(tx.get(&rtxn, &key).unwrap().is_some());
        tx.remove(&provider, &rtxn, &key).unwrap();
        assert!(tx.get(&rtxn, &key).unwrap().is_none());
        assert_eq!(tx.virtual_root(), EMPTY_ROOT);
    }

    #[test]
    fn inject_repoints_without_rewriting_nodes() {
        // Historical roots stay valid because nodes are content-addressed
        // and immutable: committing a second root doesn't invalidate the
        // first one's view.
        let db = open_mem();
        {
            let wtxn = db.begin_write().unwrap();
            wtxn.open_table(TRIE_NODES).unwrap();
            wtxn.commit().unwrap();
        }
        let provider = DefaultCryptoProvider;
        let rtxn = db.begin_read().unwrap();
        let mut tx = TrieTx::new(EMPTY_ROOT);
        let key = [7u8; 32];
        tx.insert(&provider, &rtxn, key, b"v1".to_vec()).unwrap();
        let root1 = {
            let wtxn = db.begin_write().unwrap();
            let r = tx.flush(&wtxn).unwrap();
            wtxn.commit().unwrap();
            r
        };

        let rtxn2 = db.begin_read().unwrap();
        let mut tx2 = TrieTx::new(root1);
        tx2.insert(&provider, &rtxn2, key, b"v2".to_vec()).unwrap();
        let root2 = {
            let wtxn = db.begin_write().unwrap();
            let r = tx2.flush(&wtxn).unwrap();
            wtxn.commit().unwrap();
            r
        };
        assert_ne!(root1, root2);

        let rtxn3 = db.begin_read().unwrap();
        assert_eq!(
            TrieSnapshot::new(&rtxn3, root1).get(&key).unwrap(),
            Some(b"v1".to_vec())
        );
        assert_eq!(
            TrieSnapshot::new(&rtxn3, root2).get(&key).unwrap(),
            Some(b"v2".to_vec())
        );
    }
}
