//! Contextual block verification: everything `hsc_consensus::validate`
//! leaves to storage and chain history. Assembles the stateless checks,
//! the covenant state machine, sequence locks, the reward equality, and
//! fans out standard-input script verification across a `rayon` pool.

use rayon::prelude::*;

use hsc_consensus::airdrop::{self, CoinbaseProof};
use hsc_consensus::constants::COVENANT_REVOKE;
use hsc_consensus::covenant::{apply_covenant, CovenantContext};
use hsc_consensus::sighash::verify_standard_input;
use hsc_consensus::validate::{
    check_block_body, check_name_caps, check_sequence_lock, check_tx_sanity, is_final,
};
use hsc_consensus::subsidy::block_subsidy;
use hsc_consensus::{
    BitField, Block, ChainEntry, CoinEntry, Covenant, NetworkParams, Outpoint, VerifyError,
};
use hsc_crypto::CryptoProvider;
use hsc_store::codec::{decode_name_state, encode_name_state, NameUndoEntry};
use hsc_store::trie::TrieTx;
use hsc_store::Store;

use crate::coinview::CoinView;
use crate::error::{EngineError, EngineResult};
use crate::retarget;

/// Median of up to the last 11 ancestor timestamps, the standard
/// median-time-past used for both finality and the "monotonic time" rule.
pub fn median_time_past(store: &Store, prev_hash: &[u8; 32]) -> EngineResult<u64> {
    let mut times = Vec::with_capacity(11);
    let mut cur = *prev_hash;
    for _ in 0..11 {
        let Some(entry) = store.get_entry(&cur)? else {
            break;
        };
        times.push(entry.header.time);
        cur = entry.header.prev_block;
    }
    if times.is_empty() {
        return Ok(0);
    }
    times.sort_unstable();
    Ok(times[times.len() / 2])
}

/// Collects the `pow_target_window + 1` ancestor ending at `prev`
/// (inclusive), oldest first, for `retarget::next_bits`.
fn collect_retarget_window(
    store: &Store,
    prev: &ChainEntry,
    window: u32,
) -> EngineResult<(Vec<u64>, Vec<u32>)> {
    let mut entries = Vec::with_capacity(window as usize + 1);
    let mut cur = prev.clone();
    entries.push(cur.clone());
    for _ in 0..window {
        let Some(next) = store.get_entry(&cur.header.prev_block)? else {
            break;
        };
        cur = next;
        entries.push(cur.clone());
    }
    entries.reverse();
    let times = entries.iter().map(|e| e.header.time).collect();
    let bits = entries.iter().map(|e| e.header.bits).collect();
    Ok((times, bits))
}

/// Computes the candidate `ChainEntry` for `block` extending `prev`:
/// verifies PoW against the expected target and accumulates chainwork.
pub fn compute_entry(
    provider: &dyn CryptoProvider,
    store: &Store,
    params: &NetworkParams,
    prev: &ChainEntry,
    block: &Block,
) -> EngineResult<ChainEntry> {
    if block.header.prev_block != prev.hash {
        return Err(EngineError::UnknownPrev(block.header.prev_block));
    }
    let (times, bits) = collect_retarget_window(store, prev, params.pow_target_window as u32)?;
    let expected_bits = retarget::next_bits(params, &times, &bits)?;
    if block.header.bits != expected_bits {
        return Err(VerifyError::invalid("bad-diffbits").into());
    }

    let target = hsc_consensus::chainwork::bits_to_target(block.header.bits)?;
    let hash = hsc_consensus::hash::block_header_hash(provider, &block.header);
    if hash.as_slice() > target.as_slice() {
        return Err(VerifyError::invalid("high-hash").into());
    }

    let height = prev.height + 1;
    if let Some(expected) = params.checkpoint_hash(height) {
        if hash != expected {
            return Err(VerifyError::checkpoint("checkpoint-mismatch").into());
        }
    }

    let chainwork = hsc_consensus::chainwork::add_work(&prev.chainwork, block.header.bits)?;
    Ok(ChainEntry {
        hash,
        header: block.header.clone(),
        height,
        chainwork,
    })
}

/// The per-block outcome of full contextual verification: the mutated coin
/// view (not yet committed), the name-undo journal for this height, and the
/// trie transaction carrying whatever name-state edits were made.
pub struct VerifiedBlock<'a> {
    pub view: CoinView<'a>,
    pub name_undo: Vec<NameUndoEntry>,
    pub trie_tx: TrieTx,
    pub tx_count: u64,
    pub coin_delta: i64,
    pub value_delta: i64,
    pub burned_delta: i64,
    pub bitfield: BitField,
}

/// Runs every check in §4.2's `verify`/`verifyInputs` against a block that
/// is extending `prev` as the new best chain (or as a reorg replay).
/// `now_unix` is threaded in rather than read from the wall clock so the
/// check stays deterministic and testable.
#[allow(clippy::too_many_arguments)]
pub fn verify_context<'a>(
    provider: &dyn CryptoProvider,
    store: &'a Store,
    read_txn: &redb::ReadTransaction,
    params: &NetworkParams,
    prev: &ChainEntry,
    entry: &ChainEntry,
    block: &Block,
    now_unix: u64,
    mut trie_tx: TrieTx,
) -> EngineResult<VerifiedBlock<'a>> {
    check_block_body(provider, block)?;

    // `tree_root` commits to the trie's committed root as of the previous
    // tree-interval boundary; between boundaries the store's committed
    // root doesn't move, so this is always the value a conforming block
    // must carry regardless of how far into the interval it falls.
    if block.header.tree_root != store.trie_root()? {
        return Err(VerifyError::invalid("bad-tree-root").into());
    }

    let mtp = median_time_past(store, &prev.hash)?;
    if (block.header.time as u64) <= mtp {
        return Err(VerifyError::invalid("time-too-old").into());
    }
    if (block.header.time as u64) > now_unix + params.max_future_drift {
        return Err(VerifyError::invalid("time-too-new").into());
    }

    let names = block
        .txs
        .iter()
        .flat_map(|tx| tx.outputs.iter())
        .filter(|out| out.covenant.is_name())
        .filter_map(|out| out.covenant.name_hash().map(|h| (out.covenant.kind, h)));
    check_name_caps(names, params)?;

    // Below the highest configured checkpoint this chain's history is
    // already anchored by hash; sequence locks, the reward/fee equality
    // check, and script verification are redundant there and are skipped.
    let historical = is_historical(params, entry.height);

    for tx in &block.txs[1..] {
        check_tx_sanity(tx, params)?;
        if !is_final(tx, entry.height, mtp) {
            return Err(VerifyError::invalid("bad-txns-nonfinal").into());
        }
    }

    let mut view = CoinView::new(store);
    let mut name_undo = Vec::new();
    let mut total_fees: u64 = 0;
    let mut sigops: u64 = 0;
    let mut script_jobs: Vec<(usize, usize, u8, Vec<u8>, u64)> = Vec::new();
    let mut coin_delta: i64 = 0;
    let mut value_delta: i64 = 0;
    let mut burned_delta: i64 = 0;
    let mut bitfield = store.bitfield()?;

    for (tx_index, tx) in block.txs.iter().enumerate() {
        if tx.is_coinbase() {
            for (output_index, output) in tx.outputs.iter().enumerate() {
                let outpoint = Outpoint::new(
                    hsc_consensus::hash::txid(provider, tx)?,
                    output_index as u32,
                );
                let proof = tx
                    .coinbase_proofs
                    .iter()
                    .find(|p| p.input_index() == output_index);
                let mut weak = false;
                if let Some(proof) = proof {
                    airdrop::validate_coinbase_proof(proof, prev.header.time, entry.height, params)
                        .map_err(EngineError::from)?;
                    match proof {
                        CoinbaseProof::Claim(p) => weak = p.weak,
                        CoinbaseProof::Airdrop(p) => {
                            if !bitfield.set(p.position) {
                                return Err(VerifyError::invalid("bad-airdrop-already-spent").into());
                            }
                        }
                    }
                }
                if output.covenant.is_name() {
                    apply_name_covenant(
                        provider,
                        &mut trie_tx,
                        read_txn,
                        params,
                        entry.height,
                        &outpoint,
                        &output.covenant,
                        output.value,
                        weak,
                        &mut name_undo,
                    )?;
                }
                // Coinbase-origin value is excluded from the circulating-value
                // counter; only the coin count tracks it.
                coin_delta += 1;
                view.create(
                    outpoint,
                    CoinEntry {
                        version: tx.version,
                        height: entry.height,
                        coinbase: true,
                        value: output.value,
                        address: output.address,
                        covenant: output.covenant.clone(),
                    },
                );
            }
            continue;
        }
        let mut input_total: u64 = 0;
        let mut tx_sigops: u64 = 0;
        for (input_index, input) in tx.inputs.iter().enumerate() {
            let coin = view
                .spend(&input.prevout)?
                .ok_or_else(|| VerifyError::invalid("bad-txns-inputs-missingorspent"))?;
            if !historical {
                if coin.coinbase && entry.height < coin.height + params.coinbase_maturity {
                    return Err(VerifyError::invalid("bad-txns-premature-spend-of-coinbase").into());
                }
                check_sequence_lock(
                    input.sequence,
                    tx.version,
                    coin.height,
                    0,
                    entry.height,
                    mtp,
                )?;
            }
            input_total = input_total
                .checked_add(coin.value)
                .ok_or_else(|| VerifyError::invalid("bad-txns-inputvalues-outofrange"))?;
            coin_delta -= 1;
            if coin.covenant.kind == COVENANT_REVOKE {
                burned_delta -= coin.value as i64;
            } else if !coin.coinbase {
                value_delta -= coin.value as i64;
            }
            tx_sigops += 1;
            if !historical {
                script_jobs.push((
                    tx_index,
                    input_index,
                    coin.address.version,
                    coin.address.program().to_vec(),
                    coin.value,
                ));
            }
        }
        if tx_sigops > params.max_tx_sigops {
            return Err(VerifyError::invalid("bad-txn-sigops").into());
        }
        sigops += tx_sigops;

        let output_total: u64 = tx.outputs.iter().map(|o| o.value).sum();
        let fee = input_total
            .checked_sub(output_total)
            .ok_or_else(|| VerifyError::invalid("bad-txns-in-belowout"))?;
        total_fees = total_fees
            .checked_add(fee)
            .ok_or_else(|| VerifyError::invalid("bad-txns-fee-outofrange"))?;

        for (output_index, output) in tx.outputs.iter().enumerate() {
            let outpoint = Outpoint::new(
                hsc_consensus::hash::txid(provider, tx)?,
                output_index as u32,
            );
            if output.covenant.is_name() {
                apply_name_covenant(
                    provider,
                    &mut trie_tx,
                    read_txn,
                    params,
                    entry.height,
                    &outpoint,
                    &output.covenant,
                    output.value,
                    false,
                    &mut name_undo,
                )?;
            }
            coin_delta += 1;
            if output.covenant.kind == COVENANT_REVOKE {
                burned_delta += output.value as i64;
            } else {
                value_delta += output.value as i64;
            }
            view.create(
                outpoint,
                CoinEntry {
                    version: tx.version,
                    height: entry.height,
                    coinbase: false,
                    value: output.value,
                    address: output.address,
                    covenant: output.covenant.clone(),
                },
            );
        }
    }

    if sigops > params.max_block_sigops {
        return Err(VerifyError::invalid("bad-blk-sigops").into());
    }

    if !historical {
        let subsidy = block_subsidy(entry.height, params);
        let claimed: u64 = block.txs[0].outputs.iter().map(|o| o.value).sum();
        if total_fees
            .checked_add(subsidy)
            .map(|available| available < claimed)
            .unwrap_or(true)
        {
            return Err(VerifyError::invalid("bad-cb-amount").into());
        }

        script_jobs
            .par_iter()
            .try_for_each(|(tx_index, input_index, version, program, value)| {
                verify_standard_input(
                    provider,
                    &block.txs[*tx_index],
                    *input_index,
                    *version,
                    program,
                    *value,
                )
            })
            .map_err(EngineError::from)?;
    }

    Ok(VerifiedBlock {
        view,
        name_undo,
        trie_tx,
        tx_count: block.txs.len() as u64,
        coin_delta,
        value_delta,
        burned_delta,
        bitfield,
    })
}

/// Applies one name-bearing output's covenant against the trie-backed
/// `NameState`, recording the prior value (or its absence) in the
/// per-height name-undo journal for disconnect.
#[allow(clippy::too_many_arguments)]
fn apply_name_covenant(
    provider: &dyn CryptoProvider,
    trie_tx: &mut TrieTx,
    read_txn: &redb::ReadTransaction,
    params: &NetworkParams,
    height: u32,
    owner: &Outpoint,
    covenant: &Covenant,
    output_value: u64,
    weak: bool,
    name_undo: &mut Vec<NameUndoEntry>,
) -> EngineResult<()> {
    let name_hash = covenant
        .name_hash()
        .ok_or_else(|| EngineError::Verify(VerifyError::invalid("bad-covenant-namehash")))?;

    let prior_bytes = trie_tx.get(read_txn, &name_hash)?;
    let prior = prior_bytes
        .as_deref()
        .map(decode_name_state)
        .transpose()?;

    name_undo.push(NameUndoEntry {
        name_hash,
        prior: prior.clone(),
    });

    let ctx = CovenantContext {
        height,
        params,
        owner: *owner,
        output_value,
        is_vulnerable: &hsc_consensus::covenant::never_vulnerable,
        weak,
    };
    let next = apply_covenant(prior, covenant, &ctx)?;
    let encoded = encode_name_state(&next);
    trie_tx.insert(provider, read_txn, name_hash, encoded)?;
    Ok(())
}

/// Reverts a block's name-state edits by writing each entry's prior value
/// (or removing the key if it had none) back into a fresh trie transaction
/// rooted at the pre-block root.
pub fn revert_name_undo(
    trie_tx: &mut TrieTx,
    read_txn: &redb::ReadTransaction,
    entries: &[NameUndoEntry],
) -> EngineResult<()> {
    let provider = hsc_crypto::DefaultCryptoProvider;
    for entry in entries.iter().rev() {
        match &entry.prior {
            Some(state) => {
                trie_tx.insert(&provider, read_txn, entry.name_hash, encode_name_state(state))?;
            }
            None => {
                trie_tx.remove(&provider, read_txn, &entry.name_hash)?;
            }
        }
    }
    Ok(())
}

/// Whether `height` sits at or below the highest configured checkpoint,
/// enabling the fast historical path: sequence locks, the reward/fee
/// equality check, and script verification are skipped, while covenant
/// state transitions and coin-view updates still apply in full. Disabled
/// entirely (always `false`) on networks with no checkpoints configured.
pub fn is_historical(params: &NetworkParams, height: u32) -> bool {
    !params.checkpoints.is_empty() && height <= params.last_checkpoint_height()
}

/// The airdrop `BitField` positions a coinbase transaction's extra inputs
/// spent, for clearing on disconnect. Mirrors the pairing `verify_context`
/// uses when applying the proofs: each `AirdropProof` targets the output at
/// its own `input_index`.
pub fn coinbase_airdrop_positions(block: &Block) -> Vec<u32> {
    let Some(coinbase) = block.txs.first() else {
        return Vec::new();
    };
    coinbase
        .coinbase_proofs
        .iter()
        .filter_map(|p| match p {
            CoinbaseProof::Airdrop(a) => Some(a.position),
            CoinbaseProof::Claim(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::BlockHeader;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        (dir, store)
    }

    fn header(time: u64, prev: [u8; 32]) -> BlockHeader {
        BlockHeader {
            nonce: 0,
            time,
            prev_block: prev,
            tree_root: [0u8; 32],
            extra_nonce: [0u8; 24],
            reserved_root: [0u8; 32],
            witness_root: [0u8; 32],
            merkle_root: [0u8; 32],
            version: 0,
            bits: 0,
            mask: [0u8; 32],
        }
    }

    #[test]
    fn median_time_past_is_median_of_available_ancestors() {
        let (_dir, store) = open_temp();
        let mut prev_hash = [0u8; 32];
        for (i, time) in [100u64, 200, 150].into_iter().enumerate() {
            let hash = [i as u8 + 1; 32];
            let entry = ChainEntry {
                hash,
                header: header(time, prev_hash),
                height: i as u32,
                chainwork: [0u8; 32],
            };
            let wb = store.begin_write().unwrap();
            wb.put_entry(&entry).unwrap();
            wb.commit().unwrap();
            prev_hash = hash;
        }
        let mtp = median_time_past(&store, &prev_hash).unwrap();
        assert_eq!(mtp, 150);
    }

    #[test]
    fn is_historical_requires_configured_checkpoints() {
        let mut params = NetworkParams::regtest();
        assert!(!is_historical(&params, 10));
        params.checkpoints = vec![(100, [1u8; 32])];
        assert!(is_historical(&params, 100));
        assert!(is_historical(&params, 50));
        assert!(!is_historical(&params, 101));
    }

    #[test]
    fn coinbase_airdrop_positions_collects_only_airdrop_proofs() {
        use hsc_consensus::airdrop::{AirdropProof, ClaimProof};
        use hsc_consensus::{Address, Covenant, Outpoint, Tx, TxInput, TxOutput};

        let coinbase = Tx {
            version: 0,
            inputs: vec![
                TxInput { prevout: Outpoint::new([0u8; 32], u32::MAX), sequence: 0 },
                TxInput { prevout: Outpoint::new([0u8; 32], 1), sequence: 0 },
                TxInput { prevout: Outpoint::new([0u8; 32], 2), sequence: 0 },
            ],
            outputs: vec![
                TxOutput { value: 0, address: Address::from_program(0, &[0u8; 20]), covenant: Covenant::none() },
                TxOutput { value: 0, address: Address::from_program(0, &[0u8; 20]), covenant: Covenant::none() },
                TxOutput { value: 0, address: Address::from_program(0, &[0u8; 20]), covenant: Covenant::none() },
            ],
            locktime: 0,
            witnesses: vec![vec![], vec![], vec![]],
            coinbase_proofs: vec![
                CoinbaseProof::Airdrop(AirdropProof { input_index: 1, position: 7, weak: false, goosig: false }),
                CoinbaseProof::Claim(ClaimProof {
                    input_index: 2,
                    name_hash: [1u8; 32],
                    commit_height: 0,
                    signature_time: 0,
                    weak: false,
                }),
            ],
        };
        let block = Block { header: header(0, [0u8; 32]), txs: vec![coinbase] };
        assert_eq!(coinbase_airdrop_positions(&block), vec![7]);
    }
}
