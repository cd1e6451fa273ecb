//! Stateless sanity, standardness, and finality checks shared by block and
//! mempool validation. Anything requiring a UTXO view, the name trie, or
//! chain history lives in `hsc-engine` instead — this module only checks
//! what a transaction or block can prove about itself.

use std::collections::HashSet;

use hsc_crypto::CryptoProvider;

use crate::constants::*;
use crate::error::VerifyError;
use crate::params::NetworkParams;
use crate::{merkle, wire, Block, NameHash, Outpoint, Tx};

/// Structural checks independent of height or the UTXO set.
pub fn check_tx_sanity(tx: &Tx, params: &NetworkParams) -> Result<(), VerifyError> {
    if tx.inputs.is_empty() {
        return Err(VerifyError::invalid("bad-tx-no-inputs"));
    }
    if tx.outputs.is_empty() {
        return Err(VerifyError::invalid("bad-tx-no-outputs"));
    }
    if tx.inputs.len() > MAX_TX_INPUTS || tx.outputs.len() > MAX_TX_OUTPUTS {
        return Err(VerifyError::invalid("bad-tx-too-many-ios"));
    }
    if tx.witnesses.len() != tx.inputs.len() {
        return Err(VerifyError::malformed("bad-tx-witness-count"));
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !tx.is_coinbase() && input.prevout.is_null() {
            return Err(VerifyError::invalid("bad-tx-null-prevout"));
        }
        if !seen.insert(input.prevout) {
            return Err(VerifyError::invalid("bad-tx-duplicate-prevout"));
        }
    }

    let mut total: u64 = 0;
    for output in &tx.outputs {
        if output.value > params.max_money {
            return Err(VerifyError::invalid("bad-tx-output-value"));
        }
        total = total
            .checked_add(output.value)
            .ok_or_else(|| VerifyError::invalid("bad-tx-output-total"))?;
        if total > params.max_money {
            return Err(VerifyError::invalid("bad-tx-output-total"));
        }
    }

    if tx.is_coinbase() && tx.inputs[0].prevout.index != TX_COINBASE_PREVOUT_INDEX {
        return Err(VerifyError::invalid("bad-cb-prevout"));
    }
    if !tx.is_coinbase() {
        for input in &tx.inputs {
            if input.prevout.is_null() {
                return Err(VerifyError::invalid("bad-txns-prevout-null"));
            }
        }
    }

    Ok(())
}

/// BIP-68/112-style finality: a locktime is satisfied once `height` meets or
/// exceeds it (height-based) or `mtp` does (timestamp-based, threshold
/// `500_000_000`), and every non-final-sequence input is itself final.
pub fn is_final(tx: &Tx, height: u32, mtp: u64) -> bool {
    const LOCKTIME_THRESHOLD: u32 = 500_000_000;
    if tx.locktime == 0 {
        return true;
    }
    let satisfied = if tx.locktime < LOCKTIME_THRESHOLD {
        (height as u32) >= tx.locktime
    } else {
        mtp >= tx.locktime as u64
    };
    if !satisfied {
        return false;
    }
    tx.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL)
}

/// Checks a relative-locktime sequence against the spending height/mtp and
/// the coin's creation height/mtp, per the BIP-68 encoding in `sequence`.
pub fn check_sequence_lock(
    sequence: u32,
    tx_version: u32,
    coin_height: u32,
    coin_mtp: u64,
    spend_height: u32,
    spend_mtp: u64,
) -> Result<(), VerifyError> {
    if tx_version < 2 || sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Ok(());
    }
    if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
        let required = coin_mtp + ((sequence & SEQUENCE_LOCKTIME_MASK) as u64 * 512);
        if spend_mtp < required {
            return Err(VerifyError::invalid("bad-txns-nonfinal-sequencelock"));
        }
    } else {
        let required = coin_height + (sequence & SEQUENCE_LOCKTIME_MASK);
        if spend_height < required {
            return Err(VerifyError::invalid("bad-txns-nonfinal-sequencelock"));
        }
    }
    Ok(())
}

/// Checks the parts of block-body sanity that don't need the UTXO set:
/// exactly one coinbase in slot zero, merkle/witness roots, and size.
pub fn check_block_body(
    provider: &dyn CryptoProvider,
    block: &Block,
) -> Result<(), VerifyError> {
    if block.txs.is_empty() {
        return Err(VerifyError::invalid("bad-cb-missing"));
    }
    if !block.txs[0].is_coinbase() {
        return Err(VerifyError::invalid("bad-cb-missing"));
    }
    for tx in &block.txs[1..] {
        if tx.is_coinbase() {
            return Err(VerifyError::invalid("bad-cb-multiple"));
        }
    }

    let encoded = wire::encode_block(block)?;
    if encoded.len() > MAX_BLOCK_SERIALIZED_BYTES {
        return Err(VerifyError::invalid("bad-blk-length"));
    }

    let txids: Result<Vec<_>, _> = block.txs.iter().map(|tx| crate::hash::txid(provider, tx)).collect();
    let txids = txids?;
    let merkle_root = merkle::merkle_root(provider, &txids);
    if merkle_root != block.header.merkle_root {
        tracing::debug!(expected = ?block.header.merkle_root, got = ?merkle_root, "merkle root mismatch");
        return Err(VerifyError::invalid("bad-txnmrklroot"));
    }

    let wtxids: Result<Vec<_>, _> = block
        .txs
        .iter()
        .map(|tx| crate::hash::wtxid(provider, tx))
        .collect();
    let wtxids = wtxids?;
    let witness_root = merkle::merkle_root(provider, &wtxids);
    if witness_root != block.header.witness_root {
        return Err(VerifyError::invalid("bad-witnessmrklroot"));
    }

    Ok(())
}

/// Block-level name-DoS caps: at most N opens/updates/renewals per block and
/// no name touched by more than one transaction. `names` yields, for every
/// name-bearing covenant in the block in tx order, `(kind, name_hash)`.
pub fn check_name_caps(
    names: impl Iterator<Item = (u8, NameHash)>,
    params: &NetworkParams,
) -> Result<(), VerifyError> {
    let mut opens = 0u32;
    let mut updates = 0u32;
    let mut renewals = 0u32;
    let mut touched: HashSet<NameHash> = HashSet::new();
    for (kind, name_hash) in names {
        if !touched.insert(name_hash) {
            return Err(VerifyError::invalid("bad-name-multiple-per-block"));
        }
        match kind {
            COVENANT_OPEN => opens += 1,
            COVENANT_UPDATE | COVENANT_REGISTER => updates += 1,
            COVENANT_RENEW => renewals += 1,
            _ => {}
        }
    }
    if opens > params.max_block_opens {
        return Err(VerifyError::invalid("bad-block-too-many-opens"));
    }
    if updates > params.max_block_updates {
        return Err(VerifyError::invalid("bad-block-too-many-updates"));
    }
    if renewals > params.max_block_renewals {
        return Err(VerifyError::invalid("bad-block-too-many-renewals"));
    }
    Ok(())
}

/// A coin's outpoint paired with the height/mtp needed for sequence locks —
/// a thin view the engine assembles per block from its working `CoinView`.
#[derive(Clone, Copy, Debug)]
pub struct SpentCoinContext {
    pub outpoint: Outpoint,
    pub coin_height: u32,
    pub coin_mtp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Covenant, TxInput, TxOutput};

    fn coinbase() -> Tx {
        Tx {
            version: 0,
            inputs: vec![TxInput {
                prevout: Outpoint::new([0u8; 32], TX_COINBASE_PREVOUT_INDEX),
                sequence: 0,
            }],
            outputs: vec![TxOutput {
                value: 100,
                address: Address::from_program(0, &[1u8; 20]),
                covenant: Covenant::none(),
            }],
            locktime: 0,
            witnesses: vec![vec![]],
            coinbase_proofs: vec![],
        }
    }

    #[test]
    fn sanity_accepts_coinbase() {
        let params = NetworkParams::regtest();
        assert!(check_tx_sanity(&coinbase(), &params).is_ok());
    }

    #[test]
    fn sanity_rejects_duplicate_prevout() {
        let params = NetworkParams::regtest();
        let mut tx = coinbase();
        tx.inputs[0].prevout = Outpoint::new([1u8; 32], 0);
        tx.inputs.push(TxInput {
            prevout: Outpoint::new([1u8; 32], 0),
            sequence: 0,
        });
        tx.witnesses.push(vec![]);
        let err = check_tx_sanity(&tx, &params).unwrap_err();
        assert_eq!(err.reason, "bad-tx-duplicate-prevout");
    }

    #[test]
    fn finality_respects_height_locktime() {
        let mut tx = coinbase();
        tx.locktime = 100;
        tx.inputs[0].sequence = 0;
        assert!(!is_final(&tx, 50, 0));
        assert!(is_final(&tx, 150, 0));
    }

    #[test]
    fn name_caps_reject_duplicate_name_in_block() {
        let params = NetworkParams::regtest();
        let name = [9u8; 32];
        let names = vec![(COVENANT_OPEN, name), (COVENANT_BID, name)];
        let err = check_name_caps(names.into_iter(), &params).unwrap_err();
        assert_eq!(err.reason, "bad-name-multiple-per-block");
    }
}
