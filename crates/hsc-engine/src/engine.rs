//! The chain engine: takes candidate blocks, runs them through contextual
//! verification, and keeps the store's best chain, UTXO set, name trie, and
//! `ChainState` counters consistent across connects, competitor branches,
//! and reorganizations.

use hsc_consensus::featurebits::{Deployment, ThresholdState};
use hsc_consensus::wire;
use hsc_consensus::{Block, ChainEntry, ChainState, Hash, NetworkParams};
use hsc_crypto::CryptoProvider;
use hsc_store::Store;

use crate::coinview;
use crate::deployment;
use crate::error::{EngineError, EngineResult};
use crate::lock::ChainLock;
use crate::orphans::OrphanPool;
use crate::verify::{self, VerifiedBlock};
use hsc_store::trie::TrieTx;

/// The "hardening" flag is the one deployment this chain currently tracks;
/// more bits can be added here without touching the walk/memoization logic.
pub fn deployments(params: &NetworkParams) -> Vec<Deployment> {
    vec![Deployment {
        bit: 0,
        start_time: 0,
        timeout: u64::MAX,
        threshold: params.deployment_threshold,
        window: params.deployment_window,
    }]
}

/// Outcome of a successful `add`.
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The block extended or became the new best chain.
    Connected { height: u32 },
    /// The block was valid but didn't overtake the best chain's work.
    Competitor { height: u32 },
    /// The block's predecessor hasn't been seen; it's parked in the orphan
    /// pool awaiting `add` of its parent.
    Orphan,
}

pub struct ChainEngine {
    store: Store,
    params: NetworkParams,
    provider: Box<dyn CryptoProvider>,
    lock: ChainLock,
    orphans: std::sync::Mutex<OrphanPool>,
    /// Name-trie edits accumulated since the last tree-interval boundary
    /// flush. `None` means the next block should start from the store's
    /// committed root; `Some` carries forward an in-progress interval so
    /// mid-interval blocks' covenant edits aren't lost between connects.
    pending_trie: std::sync::Mutex<Option<TrieTx>>,
}

impl ChainEngine {
    pub fn new(store: Store, params: NetworkParams, provider: Box<dyn CryptoProvider>) -> Self {
        let max_orphans = params.max_orphan_blocks as usize;
        ChainEngine {
            store,
            params,
            provider,
            lock: ChainLock::new(),
            orphans: std::sync::Mutex::new(OrphanPool::new(max_orphans)),
            pending_trie: std::sync::Mutex::new(None),
        }
    }

    fn take_pending_trie(&self) -> EngineResult<TrieTx> {
        match self.pending_trie.lock().unwrap().take() {
            Some(tx) => Ok(tx),
            None => Ok(TrieTx::new(self.store.trie_root()?)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Entry point for a freshly received block. Runs PoW and predecessor
    /// checks under the block's hash lock, then either connects it as a
    /// competitor/best-chain extension or parks it as an orphan.
    pub fn add(&self, block: Block) -> EngineResult<AddOutcome> {
        let hash = hsc_consensus::hash::block_header_hash(self.provider.as_ref(), &block.header);
        self.lock.with_hash_lock(&hash, || self.add_locked(hash, block))?
    }

    fn add_locked(&self, hash: Hash, block: Block) -> EngineResult<AddOutcome> {
        if self.store.get_entry(&hash)?.is_some() {
            return Err(EngineError::Verify(hsc_consensus::VerifyError::duplicate(
                "duplicate-block",
            )));
        }
        if self.orphans.lock().unwrap().contains(&hash) {
            return Err(EngineError::Verify(hsc_consensus::VerifyError::duplicate(
                "duplicate-orphan",
            )));
        }

        let Some(prev) = self.store.get_entry(&block.header.prev_block)? else {
            tracing::debug!(hash = ?hash, "parking orphan block");
            self.orphans.lock().unwrap().insert(hash, block);
            return Ok(AddOutcome::Orphan);
        };

        let outcome = self.connect(&prev, block)?;
        self.drain_orphans(&hash)?;
        Ok(outcome)
    }

    /// Connects children of `parent` that were waiting in the orphan pool,
    /// recursively draining any further descendants they unlock.
    fn drain_orphans(&self, parent: &Hash) -> EngineResult<()> {
        let children = self.orphans.lock().unwrap().take_children(parent);
        for child in children {
            let child_hash =
                hsc_consensus::hash::block_header_hash(self.provider.as_ref(), &child.header);
            let Some(prev) = self.store.get_entry(&child.header.prev_block)? else {
                continue;
            };
            match self.connect(&prev, child) {
                Ok(_) => self.drain_orphans(&child_hash)?,
                Err(err) => {
                    tracing::warn!(hash = ?child_hash, error = %err, "orphan failed to connect")
                }
            }
        }
        Ok(())
    }

    /// Computes the candidate entry extending `prev` and routes it to
    /// either the competitor path or the best-chain path, reorganizing
    /// first if the candidate doesn't extend the current tip directly.
    fn connect(&self, prev: &ChainEntry, block: Block) -> EngineResult<AddOutcome> {
        let entry = verify::compute_entry(
            self.provider.as_ref(),
            &self.store,
            &self.params,
            prev,
            &block,
        )?;

        let state = self.store.chain_state()?;
        let tip = self
            .store
            .get_entry(&state.tip)?
            .ok_or(EngineError::NoTip)?;

        if entry.chainwork.as_slice() <= tip.chainwork.as_slice() {
            self.save_competitor(prev, &entry, &block)?;
            tracing::info!(height = entry.height, hash = ?entry.hash, "saved competitor block");
            return Ok(AddOutcome::Competitor {
                height: entry.height,
            });
        }

        if entry.header.prev_block != tip.hash {
            self.reorganize(&tip, prev)?;
        }

        let now = crate::now_unix();
        let read_txn = self.store.begin_read()?;
        let trie_tx = self.take_pending_trie()?;
        let verified = verify::verify_context(
            self.provider.as_ref(),
            &self.store,
            &read_txn,
            &self.params,
            prev,
            &entry,
            &block,
            now,
            trie_tx,
        )?;
        drop(read_txn);

        self.save(&entry, &block, verified)?;
        tracing::info!(height = entry.height, hash = ?entry.hash, "connected block");
        Ok(AddOutcome::Connected {
            height: entry.height,
        })
    }

    /// Persists a block that is valid but does not overtake the current
    /// tip's chainwork: the header/body and chain entry are saved so it can
    /// later win a reorg, but no UTXO/trie/ChainState mutation happens.
    fn save_competitor(
        &self,
        _prev: &ChainEntry,
        entry: &ChainEntry,
        block: &Block,
    ) -> EngineResult<()> {
        let bytes = wire::encode_block(block)?;
        let wb = self.store.begin_write()?;
        wb.put_entry(entry)?;
        wb.put_height(&entry.hash, entry.height)?;
        wb.put_block(&entry.hash, &bytes)?;
        wb.add_tip(&entry.hash)?;
        wb.commit()?;
        Ok(())
    }

    /// Commits a fully verified best-chain extension: flushes the coin
    /// view, advances (or repoints) the trie root, records the name-undo
    /// journal, applies the incremental `ChainState` deltas, and updates
    /// the height/hash/tip indexes.
    fn save(&self, entry: &ChainEntry, block: &Block, verified: VerifiedBlock) -> EngineResult<()> {
        let VerifiedBlock {
            view,
            name_undo,
            trie_tx,
            tx_count,
            coin_delta,
            value_delta,
            burned_delta,
            bitfield,
        } = verified;

        let bytes = wire::encode_block(block)?;

        let wb = self.store.begin_write()?;
        view.apply(&wb)?;
        let undo_record = view.into_undo();
        wb.put_entry(entry)?;
        wb.put_height(&entry.hash, entry.height)?;
        wb.put_hash_at_height(entry.height, &entry.hash)?;
        wb.put_next_hash(&entry.header.prev_block, &entry.hash)?;
        wb.put_block(&entry.hash, &bytes)?;
        wb.put_undo(&entry.hash, &undo_record)?;
        if !name_undo.is_empty() {
            wb.put_name_undo(entry.height, &name_undo)?;
        }
        wb.put_bitfield(&bitfield)?;

        if entry.height % self.params.tree_interval == 0 {
            wb.flush_trie(&trie_tx)?;
            *self.pending_trie.lock().unwrap() = None;
        } else {
            *self.pending_trie.lock().unwrap() = Some(trie_tx);
        }

        let mut state = self.store.chain_state()?;
        state.tip = entry.hash;
        state.tx += tx_count;
        state.coin = apply_delta(state.coin, coin_delta);
        state.value = apply_delta(state.value, value_delta);
        state.burned = apply_delta(state.burned, burned_delta);
        state.committed = true;
        wb.put_chain_state(&state)?;

        wb.remove_tip(&entry.header.prev_block)?;
        wb.add_tip(&entry.hash)?;
        wb.commit()?;

        let flags = self.store.flags()?;
        if flags.prune {
            hsc_store::pruning::on_connect(&self.store, &flags, entry.height)?;
        }

        for dep in deployments(&self.params) {
            let _ = deployment::state_at(&self.store, &dep, entry)?;
        }

        Ok(())
    }

    /// Rewinds the store from `current_tip` down to the fork point shared
    /// with `new_branch_prev`, then replays the competing branch (every
    /// block from the fork point up to, but not including, the already
    /// separately-connected candidate) back onto the main chain.
    fn reorganize(&self, current_tip: &ChainEntry, new_branch_prev: &ChainEntry) -> EngineResult<()> {
        let fork = self.find_fork(current_tip, new_branch_prev)?;
        tracing::info!(fork_height = fork.height, "reorganizing");

        let mut disconnect_chain = Vec::new();
        let mut cur = current_tip.clone();
        while cur.hash != fork.hash {
            disconnect_chain.push(cur.clone());
            let Some(next) = self.store.get_entry(&cur.header.prev_block)? else {
                break;
            };
            cur = next;
        }

        for entry in &disconnect_chain {
            self.disconnect_block(entry)?;
        }

        let mut reconnect_chain = Vec::new();
        let mut cur = new_branch_prev.clone();
        while cur.hash != fork.hash {
            reconnect_chain.push(cur.clone());
            let Some(next) = self.store.get_entry(&cur.header.prev_block)? else {
                break;
            };
            cur = next;
        }
        reconnect_chain.reverse();

        for entry in &reconnect_chain {
            let Some(bytes) = self.store.get_block(&entry.hash)? else {
                return Err(EngineError::Store(hsc_store::StoreError::MissingBlock(
                    entry.hash,
                )));
            };
            let block = wire::decode_block(&bytes)?;
            let prev = self
                .store
                .get_entry(&entry.header.prev_block)?
                .ok_or(EngineError::UnknownPrev(entry.header.prev_block))?;
            let now = crate::now_unix();
            let read_txn = self.store.begin_read()?;
            let trie_tx = self.take_pending_trie()?;
            let verified = verify::verify_context(
                self.provider.as_ref(),
                &self.store,
                &read_txn,
                &self.params,
                &prev,
                entry,
                &block,
                now,
                trie_tx,
            )?;
            drop(read_txn);
            self.save(entry, &block, verified)?;
        }

        Ok(())
    }

    /// Reverses one block's effect on the coin set, name trie, and
    /// `ChainState`, leaving the store positioned at its predecessor.
    fn disconnect_block(&self, entry: &ChainEntry) -> EngineResult<()> {
        let undo = self
            .store
            .get_undo(&entry.hash)?
            .ok_or(EngineError::Store(hsc_store::StoreError::MissingUndo(
                entry.hash,
            )))?;
        let (coin_delta, value_delta, burned_delta) =
            coinview::connect_deltas(&self.store, &undo)?;
        let block = match self.store.get_block(&entry.hash)? {
            Some(bytes) => Some(wire::decode_block(&bytes)?),
            None => None,
        };
        let tx_count = block.as_ref().map(|b| b.txs.len() as u64).unwrap_or(0);

        let mut bitfield = self.store.bitfield()?;
        if let Some(block) = &block {
            for position in verify::coinbase_airdrop_positions(block) {
                bitfield.clear(position);
            }
        }

        let name_undo = self.store.get_name_undo(entry.height)?.unwrap_or_default();
        // Trie nodes are immutable and content-addressed. `entry` only
        // advanced the committed root if it sat on a tree-interval boundary
        // (the only point `save` flushes); when it did, `entry.header.tree_root`
        // is exactly the pre-flush root to repoint back to, since it commits
        // to the root as of the *previous* boundary, one interval behind the
        // live one `entry` itself closed out.
        let is_boundary = entry.height % self.params.tree_interval == 0;
        let repoint_root = if is_boundary && !name_undo.is_empty() {
            Some(entry.header.tree_root)
        } else {
            None
        };
        // Any edits staged in-memory since the last flush belonged to the
        // branch being torn down; the store's committed root already
        // reflects everything before this block regardless.
        *self.pending_trie.lock().unwrap() = None;

        let wb = self.store.begin_write()?;
        coinview::disconnect(&wb, &undo)?;
        if let Some(root) = repoint_root {
            wb.inject_trie_root(root)?;
        }
        wb.delete_undo(&entry.hash)?;
        wb.delete_name_undo(entry.height)?;
        wb.delete_hash_at_height(entry.height)?;
        wb.delete_next_hash(&entry.header.prev_block)?;
        wb.put_bitfield(&bitfield)?;

        let mut state = self.store.chain_state()?;
        state.tip = entry.header.prev_block;
        state.tx = state.tx.saturating_sub(tx_count);
        state.coin = apply_delta(state.coin, -coin_delta);
        state.value = apply_delta(state.value, -value_delta);
        state.burned = apply_delta(state.burned, -burned_delta);
        state.committed = true;
        wb.put_chain_state(&state)?;

        wb.remove_tip(&entry.hash)?;
        wb.add_tip(&entry.header.prev_block)?;
        wb.commit()?;
        Ok(())
    }

    fn find_fork(&self, a: &ChainEntry, b: &ChainEntry) -> EngineResult<ChainEntry> {
        let mut a = a.clone();
        let mut b = b.clone();
        while a.height > b.height {
            a = self
                .store
                .get_entry(&a.header.prev_block)?
                .ok_or(EngineError::NoForkPoint(a.hash, b.hash))?;
        }
        while b.height > a.height {
            b = self
                .store
                .get_entry(&b.header.prev_block)?
                .ok_or(EngineError::NoForkPoint(a.hash, b.hash))?;
        }
        while a.hash != b.hash {
            a = self
                .store
                .get_entry(&a.header.prev_block)?
                .ok_or(EngineError::NoForkPoint(a.hash, b.hash))?;
            b = self
                .store
                .get_entry(&b.header.prev_block)?
                .ok_or(EngineError::NoForkPoint(a.hash, b.hash))?;
        }
        Ok(a)
    }

    /// Prunes block/undo/coin history older than `keep_blocks`, delegating
    /// to the store's retention policy.
    pub fn prune(&self) -> EngineResult<()> {
        self.lock.with_global_lock(|| {
            let flags = self.store.flags()?;
            hsc_store::pruning::prune(&self.store, flags.keep_blocks)?;
            Ok(())
        })?
    }

    /// Builds a block locator (a sparse set of ancestor hashes, dense near
    /// the tip and exponentially thinning out) for peer sync negotiation.
    pub fn get_locator(&self) -> EngineResult<Vec<Hash>> {
        self.lock.with_global_lock(|| {
            let state = self.store.chain_state()?;
            let mut hashes = Vec::new();
            let Some(mut entry) = self.store.get_entry(&state.tip)? else {
                return Ok(hashes);
            };
            let mut step = 1u32;
            loop {
                hashes.push(entry.hash);
                if entry.height == 0 {
                    break;
                }
                let back = step.min(entry.height);
                let mut cur = entry.clone();
                for _ in 0..back {
                    let Some(prev) = self.store.get_entry(&cur.header.prev_block)? else {
                        break;
                    };
                    cur = prev;
                }
                entry = cur;
                if hashes.len() >= 10 {
                    step = step.saturating_mul(2);
                }
            }
            Ok(hashes)
        })?
    }

    /// The deployment state as of the current tip, for every tracked bit.
    pub fn deployment_states(&self) -> EngineResult<Vec<(u8, ThresholdState)>> {
        self.lock.with_global_lock(|| {
            let state = self.store.chain_state()?;
            let Some(tip) = self.store.get_entry(&state.tip)? else {
                return Ok(Vec::new());
            };
            deployments(&self.params)
                .into_iter()
                .map(|dep| Ok((dep.bit, deployment::state_at(&self.store, &dep, &tip)?)))
                .collect()
        })?
    }

    pub fn chain_state(&self) -> EngineResult<ChainState> {
        Ok(self.store.chain_state()?)
    }
}

fn apply_delta(counter: u64, delta: i64) -> u64 {
    if delta >= 0 {
        counter.saturating_add(delta as u64)
    } else {
        counter.saturating_sub((-delta) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::BlockHeader;
    use hsc_crypto::DefaultCryptoProvider;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        (dir, store)
    }

    fn genesis_entry() -> ChainEntry {
        ChainEntry {
            hash: [0u8; 32],
            header: BlockHeader {
                nonce: 0,
                time: 0,
                prev_block: [0xffu8; 32],
                tree_root: [0u8; 32],
                extra_nonce: [0u8; 24],
                reserved_root: [0u8; 32],
                witness_root: [0u8; 32],
                merkle_root: [0u8; 32],
                version: 0,
                bits: hsc_consensus::chainwork::target_to_bits(
                    &NetworkParams::regtest().pow_limit,
                ),
                mask: [0u8; 32],
            },
            height: 0,
            chainwork: [0u8; 32],
        }
    }

    #[test]
    fn locator_on_genesis_only_chain_returns_single_hash() {
        let (_dir, store) = open_temp();
        let entry = genesis_entry();
        let wb = store.begin_write().unwrap();
        wb.put_entry(&entry).unwrap();
        wb.put_hash_at_height(0, &entry.hash).unwrap();
        let mut state = ChainState::default();
        state.tip = entry.hash;
        state.committed = true;
        wb.put_chain_state(&state).unwrap();
        wb.commit().unwrap();

        let engine = ChainEngine::new(
            store,
            NetworkParams::regtest(),
            Box::new(DefaultCryptoProvider),
        );
        let locator = engine.get_locator().unwrap();
        assert_eq!(locator, vec![entry.hash]);
    }

    #[test]
    fn deployments_lists_the_hardening_bit() {
        let deps = deployments(&NetworkParams::regtest());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].bit, 0);
    }
}
