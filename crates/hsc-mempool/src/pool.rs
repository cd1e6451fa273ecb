//! The mempool itself: admission, conflict/ancestor bookkeeping, orphan
//! resolution, and the block-connect/disconnect/reorg notifications that
//! keep it consistent with whatever the engine currently calls the tip.

use std::collections::{HashMap, HashSet};

use hsc_consensus::airdrop::CoinbaseProof;
use hsc_consensus::constants::{COVENANT_CLAIM, COVENANT_NONE};
use hsc_consensus::covenant::{apply_covenant, CovenantContext};
use hsc_consensus::sighash::verify_standard_input;
use hsc_consensus::validate::{check_sequence_lock, check_tx_sanity, is_final};
use hsc_consensus::{Block, CoinEntry, Hash, NameHash, NetworkParams, Outpoint, Tx, VerifyError};
use hsc_crypto::CryptoProvider;
use hsc_store::Store;

use crate::entry::{AirdropEntry, ClaimEntry, MempoolEntry, OrphanEntry};
use crate::error::{MempoolError, MempoolResult};
use crate::reject::RejectFilter;
use crate::view::PoolView;

/// What admitting a transaction accomplished.
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Accepted { fee: u64, vsize: u64 },
    Orphan,
}

/// A decaying token bucket for policy-free ("free") relay: transactions
/// below `min_relay_fee_rate` are still let in as long as their size fits
/// inside a budget that refills over time and caps at
/// `mempool_limit_free_relay`.
struct FreeRelayBudget {
    remaining: f64,
    cap: f64,
    last_refill: u64,
}

impl FreeRelayBudget {
    fn new(cap: u64) -> Self {
        FreeRelayBudget { remaining: cap as f64, cap: cap as f64, last_refill: 0 }
    }

    /// Refills at `cap` bytes per 600 seconds, matching the standard
    /// ten-minute decay window for free-relay policy.
    fn refill(&mut self, now: u64) {
        if self.last_refill == 0 {
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_sub(self.last_refill) as f64;
        self.remaining = (self.remaining + elapsed * (self.cap / 600.0)).min(self.cap);
        self.last_refill = now;
    }

    fn try_spend(&mut self, vsize: u64) -> bool {
        if self.remaining >= vsize as f64 {
            self.remaining -= vsize as f64;
            true
        } else {
            false
        }
    }
}

struct Inner {
    entries: HashMap<Hash, MempoolEntry>,
    /// outpoint -> txid of the pooled transaction spending it.
    spent: HashMap<Outpoint, Hash>,
    /// outpoint -> coin, for every output a still-pooled transaction created.
    created: HashMap<Outpoint, CoinEntry>,
    /// name_hash -> txid, one pending OPEN/BID/.../CLAIM entry per name.
    names: HashMap<NameHash, ClaimEntry>,
    /// position -> entry, airdrop payouts reinserted here after a reorg
    /// disconnects the block that confirmed them.
    airdrops: HashMap<u32, AirdropEntry>,
    orphans: HashMap<Hash, OrphanEntry>,
    orphans_by_missing: HashMap<Outpoint, HashSet<Hash>>,
    reject: RejectFilter,
    free_relay: FreeRelayBudget,
    total_vsize: u64,
}

pub struct Mempool {
    store: Store,
    params: NetworkParams,
    provider: Box<dyn CryptoProvider>,
    inner: std::sync::Mutex<Inner>,
}

impl Mempool {
    pub fn new(store: Store, params: NetworkParams, provider: Box<dyn CryptoProvider>) -> Self {
        let max_orphans = params.mempool_max_orphans as usize;
        let free_relay_cap = params.mempool_limit_free_relay;
        Mempool {
            store,
            params,
            provider,
            inner: std::sync::Mutex::new(Inner {
                entries: HashMap::new(),
                spent: HashMap::new(),
                created: HashMap::new(),
                names: HashMap::new(),
                airdrops: HashMap::new(),
                orphans: HashMap::with_capacity(max_orphans),
                orphans_by_missing: HashMap::new(),
                reject: RejectFilter::new(10_000),
                free_relay: FreeRelayBudget::new(free_relay_cap),
                total_vsize: 0,
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.inner.lock().unwrap().entries.contains_key(txid)
    }

    /// Every pooled entry, highest fee rate first — the order a block
    /// template would take them in.
    pub fn by_fee_rate(&self) -> Vec<MempoolEntry> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<_> = inner.entries.values().cloned().collect();
        entries.sort_unstable_by(|a, b| b.fee_rate().cmp(&a.fee_rate()));
        entries
    }

    /// Admits `tx` if it's valid against the tip-plus-one context, or parks
    /// it as an orphan if it spends outputs this pool can't yet resolve.
    pub fn add_tx(&self, tx: Tx, now: u64) -> MempoolResult<AddOutcome> {
        let txid = hsc_consensus::hash::txid(self.provider.as_ref(), &tx)?;

        {
            let inner = self.inner.lock().unwrap();
            if inner.entries.contains_key(&txid) {
                return Err(MempoolError::AlreadyInPool(txid));
            }
            if inner.reject.contains(&txid) {
                return Err(VerifyError::already_known("recently-rejected").into());
            }
        }

        check_tx_sanity(&tx, &self.params)?;
        if tx.is_coinbase() {
            return Err(VerifyError::invalid("bad-tx-coinbase-in-pool").into());
        }

        let state = self.store.chain_state()?;
        let tip = self
            .store
            .get_entry(&state.tip)?
            .ok_or_else(|| VerifyError::invalid("no-tip"))?;
        let spend_height = tip.height + 1;
        if spend_height < self.params.tx_start_height {
            return Err(VerifyError::invalid("tx-before-start-height").into());
        }
        let mtp = tip.header.time;

        if !is_final(&tx, spend_height, mtp) {
            return Err(VerifyError::invalid("bad-txns-nonfinal").into());
        }

        let mut inner = self.inner.lock().unwrap();

        // Resolve every input. A conflict with an already-pooled spend is a
        // hard rejection (no replace-by-fee modeled); a coin this pool
        // cannot find anywhere is a missing parent, which parks the whole
        // transaction as an orphan rather than rejecting it outright.
        let view = PoolView::new(&self.store, &inner.created, &inner.spent);
        let mut coins = Vec::with_capacity(tx.inputs.len());
        let mut missing = Vec::new();
        let mut parents = Vec::new();
        for input in &tx.inputs {
            if let Some(spender) = view.spender_of(&input.prevout) {
                if spender != txid {
                    return Err(MempoolError::Conflict(txid));
                }
            }
            match view.get_coin(&input.prevout)? {
                Some(coin) => {
                    if inner.created.contains_key(&input.prevout) {
                        parents.push(input.prevout.hash);
                    }
                    coins.push(coin);
                }
                None => missing.push(input.prevout),
            }
        }

        if !missing.is_empty() {
            return self.park_orphan(&mut inner, tx, missing, now);
        }

        let coinbase_height = coins
            .iter()
            .filter(|c| c.coinbase)
            .map(|c| c.height)
            .max();
        if let Some(coinbase_height) = coinbase_height {
            if spend_height < coinbase_height + self.params.coinbase_maturity {
                return Err(VerifyError::invalid("bad-txns-premature-spend-of-coinbase").into());
            }
        }

        let input_total: u64 = coins.iter().try_fold(0u64, |acc, c| acc.checked_add(c.value))
            .ok_or_else(|| VerifyError::invalid("bad-txns-inputvalues-outofrange"))?;
        let output_total: u64 = tx.outputs.iter().map(|o| o.value).sum();
        let fee = input_total
            .checked_sub(output_total)
            .ok_or_else(|| VerifyError::invalid("bad-txns-in-belowout"))?;

        let vsize = estimated_vsize(&tx);

        for (input, coin) in tx.inputs.iter().zip(coins.iter()) {
            // Unconfirmed parents are treated as spendable as of the next
            // block, matching the usual mempool convention for relative
            // locktimes against not-yet-mined coins.
            let (coin_height, coin_mtp) = if inner.created.contains_key(&input.prevout) {
                (spend_height, now)
            } else {
                (coin.height, mtp)
            };
            check_sequence_lock(input.sequence, tx.version, coin_height, coin_mtp, spend_height, mtp)?;
        }

        for (index, (input, coin)) in tx.inputs.iter().zip(coins.iter()).enumerate() {
            verify_standard_input(
                self.provider.as_ref(),
                &tx,
                index,
                coin.address.version,
                coin.address.program(),
                coin.value,
            )?;
        }

        if (tx.inputs.len() as u64) * 2 > self.params.max_tx_sigops {
            return Err(VerifyError::invalid("bad-txns-too-many-sigops").into());
        }

        let ancestor_count = count_ancestors(&inner.entries, &parents, self.params.mempool_max_ancestors);
        if ancestor_count > self.params.mempool_max_ancestors {
            return Err(VerifyError::invalid("too-long-mempool-chain").into());
        }

        let mut reserved_name = None;
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.covenant.kind == COVENANT_NONE {
                continue;
            }
            let Some(name_hash) = output.covenant.name_hash() else {
                return Err(VerifyError::invalid("bad-covenant-namehash").into());
            };
            if let Some(existing) = inner.names.get(&name_hash) {
                if existing.txid != txid {
                    return Err(MempoolError::NameReserved);
                }
            }
            let prior = view.name_state(&name_hash)?;
            let ctx = CovenantContext {
                height: spend_height,
                params: &self.params,
                owner: Outpoint::new(txid, index as u32),
                output_value: output.value,
                is_vulnerable: &hsc_consensus::covenant::never_vulnerable,
                weak: false,
            };
            apply_covenant(prior, &output.covenant, &ctx)?;
            if output.covenant.kind == COVENANT_CLAIM {
                tracing::debug!(txid = ?txid, name_hash = ?name_hash, "claim reserved in pool");
            }
            reserved_name = Some(name_hash);
        }
        drop(view);

        let fee_rate = fee / vsize.max(1);
        if fee_rate < self.params.min_relay_fee_rate {
            inner.free_relay.refill(now);
            if !inner.free_relay.try_spend(vsize) {
                return Err(VerifyError::new(hsc_consensus::ErrorKind::InsufficientFee, "insufficient-priority-fee", 0).into());
            }
        }
        let absurd_fee = self.params.min_relay_fee_rate.saturating_mul(vsize).saturating_mul(10_000);
        if fee > absurd_fee.max(1) {
            return Err(VerifyError::new(hsc_consensus::ErrorKind::HighFee, "absurdly-high-fee", 0).into());
        }

        if self.would_exceed_capacity(&inner, vsize) {
            self.evict_to_capacity(&mut inner, fee_rate);
            if self.would_exceed_capacity(&inner, vsize) {
                return Err(MempoolError::PoolFull);
            }
        }

        for input in &tx.inputs {
            inner.spent.insert(input.prevout, txid);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            inner.created.insert(
                Outpoint::new(txid, index as u32),
                CoinEntry {
                    version: tx.version,
                    height: spend_height,
                    coinbase: false,
                    value: output.value,
                    address: output.address,
                    covenant: output.covenant.clone(),
                },
            );
        }
        if let Some(name_hash) = reserved_name {
            inner
                .names
                .insert(name_hash, ClaimEntry { name_hash, txid, height: spend_height });
        }
        inner.total_vsize += vsize;
        inner.entries.insert(
            txid,
            MempoolEntry {
                tx,
                txid,
                fee,
                vsize,
                time: now,
                height: spend_height,
                parents,
                coinbase_height,
            },
        );

        drop(inner);
        self.resolve_orphans(txid, now);

        Ok(AddOutcome::Accepted { fee, vsize })
    }

    fn park_orphan(
        &self,
        inner: &mut Inner,
        tx: Tx,
        missing: Vec<Outpoint>,
        now: u64,
    ) -> MempoolResult<AddOutcome> {
        if inner.orphans.len() >= self.params.mempool_max_orphans as usize {
            return Err(MempoolError::OrphanPoolFull);
        }
        let txid = hsc_consensus::hash::txid(self.provider.as_ref(), &tx)?;
        for outpoint in &missing {
            inner.orphans_by_missing.entry(*outpoint).or_default().insert(txid);
        }
        inner.orphans.insert(txid, OrphanEntry { tx, missing, time: now });
        Ok(AddOutcome::Orphan)
    }

    /// Re-tries every orphan waiting on an output `tx_hash` just produced.
    /// Resolution is best-effort: a re-try that still fails (for any reason,
    /// including a still-missing second parent) is simply dropped back into
    /// the orphan pool's bookkeeping or discarded, never treated as a ban.
    fn resolve_orphans(&self, tx_hash: Hash, now: u64) {
        let candidates: Vec<Hash> = {
            let inner = self.inner.lock().unwrap();
            inner
                .orphans_by_missing
                .iter()
                .filter(|(outpoint, _)| outpoint.hash == tx_hash)
                .flat_map(|(_, waiters)| waiters.iter().copied())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        for candidate in candidates {
            let orphan = {
                let mut inner = self.inner.lock().unwrap();
                inner.orphans.remove(&candidate)
            };
            let Some(orphan) = orphan else { continue };
            {
                let mut inner = self.inner.lock().unwrap();
                for outpoint in &orphan.missing {
                    if let Some(set) = inner.orphans_by_missing.get_mut(outpoint) {
                        set.remove(&candidate);
                        if set.is_empty() {
                            inner.orphans_by_missing.remove(outpoint);
                        }
                    }
                }
            }
            let _ = self.add_tx(orphan.tx, now);
        }
    }

    fn would_exceed_capacity(&self, inner: &Inner, incoming_vsize: u64) -> bool {
        inner.total_vsize + incoming_vsize > self.params.mempool_max_size
    }

    /// Evicts lowest-fee-rate entries (and anything spending from them, so
    /// the pool never holds a transaction whose parent got evicted) until
    /// usage drops to `maxSize - maxSize/10`, or until the incoming
    /// candidate's own fee rate would no longer clear the new floor.
    fn evict_to_capacity(&self, inner: &mut Inner, incoming_fee_rate: u64) {
        let floor = self.params.mempool_max_size - self.params.mempool_max_size / 10;
        let mut by_rate: Vec<Hash> = inner.entries.keys().copied().collect();
        by_rate.sort_unstable_by_key(|h| inner.entries[h].fee_rate());

        for txid in by_rate {
            if inner.total_vsize <= floor {
                break;
            }
            let Some(entry) = inner.entries.get(&txid) else { continue };
            if entry.fee_rate() >= incoming_fee_rate {
                continue;
            }
            self.evict_one(inner, txid);
        }
    }

    fn evict_one(&self, inner: &mut Inner, txid: Hash) {
        let Some(entry) = inner.entries.remove(&txid) else { return };
        inner.total_vsize = inner.total_vsize.saturating_sub(entry.vsize);
        for input in &entry.tx.inputs {
            inner.spent.remove(&input.prevout);
        }
        for index in 0..entry.tx.outputs.len() {
            inner.created.remove(&Outpoint::new(txid, index as u32));
        }
        inner.names.retain(|_, claim| claim.txid != txid);

        // Anything spending this entry's now-gone outputs is no longer
        // valid either; evict transitively.
        let dependents: Vec<Hash> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.tx.inputs.iter().any(|i| i.prevout.hash == txid))
            .map(|(h, _)| *h)
            .collect();
        for dependent in dependents {
            self.evict_one(inner, dependent);
        }
    }

    pub fn remove(&self, txid: &Hash) {
        let mut inner = self.inner.lock().unwrap();
        self.evict_one(&mut inner, *txid);
    }

    /// A block just connected: drop every transaction it confirmed, evict
    /// anything that now double-spends against the new UTXO set, invalidate
    /// pooled covenant entries on any name the block itself just settled
    /// (via an ordinary covenant output or a coinbase CLAIM proof), resolve
    /// orphans against its outputs, and reset the reject filter since its
    /// causes may no longer apply.
    pub fn add_block(&self, block: &Block) -> MempoolResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let mut touched_names: HashSet<NameHash> = HashSet::new();
        for tx in &block.txs {
            let txid = hsc_consensus::hash::txid(self.provider.as_ref(), tx)?;
            if inner.entries.remove(&txid).is_some() {
                self.evict_one(&mut inner, txid);
                tracing::debug!(txid = ?txid, "confirmed, removed from pool");
            }
            for input in &tx.inputs {
                if let Some(spender) = inner.spent.get(&input.prevout).copied() {
                    if spender != txid {
                        self.evict_one(&mut inner, spender);
                    }
                }
            }
            for output in &tx.outputs {
                if let Some(name_hash) = output.covenant.name_hash() {
                    touched_names.insert(name_hash);
                }
            }
            if tx.is_coinbase() {
                for proof in &tx.coinbase_proofs {
                    if let CoinbaseProof::Claim(p) = proof {
                        touched_names.insert(p.name_hash);
                    }
                }
            }
        }

        // Any pooled covenant tx reserving a name the block itself just
        // settled is validated against the trie state this block just
        // superseded; drop it so the submitter can resubmit against the
        // post-block name state.
        let stale: Vec<Hash> = inner
            .names
            .iter()
            .filter(|(name_hash, _)| touched_names.contains(*name_hash))
            .map(|(_, claim)| claim.txid)
            .collect();
        for txid in stale {
            self.evict_one(&mut inner, txid);
        }

        inner.reject.reset();
        drop(inner);

        let hashes: Vec<Hash> = block
            .txs
            .iter()
            .map(|tx| hsc_consensus::hash::txid(self.provider.as_ref(), tx))
            .collect::<Result<_, _>>()?;
        for hash in hashes {
            self.resolve_orphans(hash, crate::now_unix());
        }
        Ok(())
    }

    /// A block at `height` was disconnected: best-effort reinsert of its
    /// non-coinbase transactions so a reorg doesn't silently drop relayed
    /// transactions, and reinsert any coinbase CLAIM/airdrop reservations it
    /// had settled — at `height - 1`, since that's the last height they were
    /// actually confirmed at on the chain now being unwound.
    pub fn remove_block(&self, block: &Block, height: u32, now: u64) {
        for tx in block.txs.iter().skip(1) {
            let _ = self.add_tx(tx.clone(), now);
        }
        let Some(coinbase) = block.txs.first() else { return };
        if !coinbase.is_coinbase() || coinbase.coinbase_proofs.is_empty() {
            return;
        }
        let Ok(txid) = hsc_consensus::hash::txid(self.provider.as_ref(), coinbase) else {
            return;
        };
        let reinsert_height = height.saturating_sub(1);
        let mut inner = self.inner.lock().unwrap();
        for proof in &coinbase.coinbase_proofs {
            match proof {
                CoinbaseProof::Claim(p) => {
                    inner.names.insert(
                        p.name_hash,
                        ClaimEntry { name_hash: p.name_hash, txid, height: reinsert_height },
                    );
                }
                CoinbaseProof::Airdrop(p) => {
                    inner.airdrops.insert(
                        p.position,
                        AirdropEntry { position: p.position, txid, height: reinsert_height },
                    );
                }
            }
        }
    }

    /// Post-reorg sweep: re-checks finality, coinbase maturity, sequence
    /// locks, input resolvability, and covenant validity for every surviving
    /// entry against the new tip, and re-validates pending name claims
    /// against the tip's time/height, dropping anything the reorg
    /// invalidated.
    pub fn handle_reorg(&self, now: u64) -> MempoolResult<()> {
        let state = self.store.chain_state()?;
        let tip = self
            .store
            .get_entry(&state.tip)?
            .ok_or_else(|| VerifyError::invalid("no-tip"))?;
        let spend_height = tip.height + 1;
        let mtp = tip.header.time;

        let txids: Vec<Hash> = {
            let inner = self.inner.lock().unwrap();
            inner.entries.keys().copied().collect()
        };

        for txid in txids {
            let entry = {
                let inner = self.inner.lock().unwrap();
                inner.entries.get(&txid).cloned()
            };
            let Some(entry) = entry else { continue };
            if !is_final(&entry.tx, spend_height, mtp) {
                self.remove(&txid);
                continue;
            }
            if let Some(coinbase_height) = entry.coinbase_height {
                if spend_height < coinbase_height + self.params.coinbase_maturity {
                    self.remove(&txid);
                    continue;
                }
            }

            let coins = {
                let inner = self.inner.lock().unwrap();
                let view = PoolView::new(&self.store, &inner.created, &inner.spent);
                let mut coins = Vec::with_capacity(entry.tx.inputs.len());
                for input in &entry.tx.inputs {
                    match view.get_coin(&input.prevout).ok().flatten() {
                        Some(coin) => coins.push(coin),
                        None => {
                            coins.clear();
                            break;
                        }
                    }
                }
                coins
            };
            if coins.len() != entry.tx.inputs.len() {
                self.remove(&txid);
                continue;
            }

            let sequence_ok = entry.tx.inputs.iter().zip(coins.iter()).all(|(input, coin)| {
                check_sequence_lock(input.sequence, entry.tx.version, coin.height, now, spend_height, mtp).is_ok()
            });
            if !sequence_ok {
                self.remove(&txid);
                continue;
            }

            let covenants_ok = {
                let inner = self.inner.lock().unwrap();
                let view = PoolView::new(&self.store, &inner.created, &inner.spent);
                entry.tx.outputs.iter().enumerate().all(|(index, output)| {
                    if output.covenant.kind == COVENANT_NONE {
                        return true;
                    }
                    let Some(name_hash) = output.covenant.name_hash() else {
                        return false;
                    };
                    let Ok(prior) = view.name_state(&name_hash) else {
                        return false;
                    };
                    let ctx = CovenantContext {
                        height: spend_height,
                        params: &self.params,
                        owner: Outpoint::new(txid, index as u32),
                        output_value: output.value,
                        is_vulnerable: &hsc_consensus::covenant::never_vulnerable,
                        weak: false,
                    };
                    apply_covenant(prior, &output.covenant, &ctx).is_ok()
                })
            };
            if !covenants_ok {
                self.remove(&txid);
            }
        }

        // A reservation whose backing transaction didn't survive the sweep
        // above is stale and must not keep blocking resubmission.
        let mut inner = self.inner.lock().unwrap();
        let live_txids = inner.entries.keys().copied().collect::<HashSet<_>>();
        inner
            .names
            .retain(|_, claim| live_txids.contains(&claim.txid) && claim.height <= spend_height);
        Ok(())
    }
}

fn count_ancestors(entries: &HashMap<Hash, MempoolEntry>, parents: &[Hash], cap: u64) -> u64 {
    let mut seen = HashSet::new();
    let mut stack: Vec<Hash> = parents.to_vec();
    let mut count = 0u64;
    while let Some(hash) = stack.pop() {
        if !seen.insert(hash) {
            continue;
        }
        count += 1;
        if count > cap {
            return count;
        }
        if let Some(parent_entry) = entries.get(&hash) {
            stack.extend(parent_entry.parents.iter().copied());
        }
    }
    count
}

/// Virtual size: no witness-discount model is defined for this wire format,
/// so size stands in directly for weight.
fn estimated_vsize(tx: &Tx) -> u64 {
    let base = 10 + tx.inputs.len() * 41 + tx.outputs.len() * 40;
    let witness: usize = tx
        .witnesses
        .iter()
        .map(|w| w.iter().map(|item| item.len() + 1).sum::<usize>())
        .sum();
    (base + witness) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{Address, Covenant, TxInput, TxOutput};
    use hsc_crypto::DefaultCryptoProvider;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        (dir, store)
    }

    fn seed_tip(store: &Store) {
        let entry = hsc_consensus::ChainEntry {
            hash: [0u8; 32],
            header: hsc_consensus::BlockHeader {
                nonce: 0, time: 0, prev_block: [0xffu8; 32], tree_root: [0u8; 32],
                extra_nonce: [0u8; 24], reserved_root: [0u8; 32], witness_root: [0u8; 32],
                merkle_root: [0u8; 32], version: 0, bits: 0, mask: [0u8; 32],
            },
            height: 0,
            chainwork: [0u8; 32],
        };
        let wb = store.begin_write().unwrap();
        wb.put_entry(&entry).unwrap();
        let mut state = hsc_consensus::ChainState::default();
        state.tip = entry.hash;
        state.committed = true;
        wb.put_chain_state(&state).unwrap();
        wb.commit().unwrap();
    }

    fn make_pool() -> (tempfile::TempDir, Mempool) {
        let (dir, store) = open_temp();
        seed_tip(&store);
        let pool = Mempool::new(store, NetworkParams::regtest(), Box::new(DefaultCryptoProvider));
        (dir, pool)
    }

    #[test]
    fn missing_input_parks_as_orphan() {
        let (_dir, pool) = make_pool();
        let tx = Tx {
            version: 2,
            inputs: vec![TxInput { prevout: Outpoint::new([9u8; 32], 0), sequence: 0xffff_ffff }],
            outputs: vec![TxOutput { value: 10, address: Address::from_program(0, &[1u8; 20]), covenant: Covenant::none() }],
            locktime: 0,
            witnesses: vec![vec![]],
            coinbase_proofs: vec![],
        };
        let outcome = pool.add_tx(tx, 1000).unwrap();
        assert_eq!(outcome, AddOutcome::Orphan);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn coinbase_transactions_are_rejected() {
        let (_dir, pool) = make_pool();
        let tx = Tx {
            version: 2,
            inputs: vec![TxInput {
                prevout: Outpoint::new([0u8; 32], hsc_consensus::constants::TX_COINBASE_PREVOUT_INDEX),
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput { value: 10, address: Address::from_program(0, &[1u8; 20]), covenant: Covenant::none() }],
            locktime: 0,
            witnesses: vec![vec![]],
            coinbase_proofs: vec![],
        };
        assert!(pool.add_tx(tx, 1000).is_err());
    }

    #[test]
    fn resubmitting_the_same_orphan_stays_idempotent() {
        let (_dir, pool) = make_pool();
        let tx = Tx {
            version: 2,
            inputs: vec![TxInput { prevout: Outpoint::new([9u8; 32], 0), sequence: 0xffff_ffff }],
            outputs: vec![TxOutput { value: 10, address: Address::from_program(0, &[1u8; 20]), covenant: Covenant::none() }],
            locktime: 0,
            witnesses: vec![vec![]],
            coinbase_proofs: vec![],
        };
        assert_eq!(pool.add_tx(tx.clone(), 1000).unwrap(), AddOutcome::Orphan);
        assert_eq!(pool.add_tx(tx, 1000).unwrap(), AddOutcome::Orphan);
        assert_eq!(pool.len(), 0);
    }
}
