//! Fixed-layout header encoding and the variable-length tx/block encoding.

use crate::airdrop::{AirdropProof, ClaimProof, CoinbaseProof};
use crate::compactsize;
use crate::constants::*;
use crate::error::VerifyError;
use crate::{Address, Block, BlockHeader, Covenant, Outpoint, Tx, TxInput, TxOutput};

/// The portion of the header that precedes the nonce-independent subheader:
/// `nonce(4) time(8) prevBlock(32) treeRoot(32)`.
pub fn encode_preheader(h: &BlockHeader) -> [u8; 76] {
    let mut out = [0u8; 76];
    out[0..4].copy_from_slice(&h.nonce.to_le_bytes());
    out[4..12].copy_from_slice(&h.time.to_le_bytes());
    out[12..44].copy_from_slice(&h.prev_block);
    out[44..76].copy_from_slice(&h.tree_root);
    out
}

/// `extraNonce(24) reservedRoot(32) witnessRoot(32) merkleRoot(32)
/// version(4) bits(4)`.
pub fn encode_subheader(h: &BlockHeader) -> [u8; 128] {
    let mut out = [0u8; 128];
    out[0..24].copy_from_slice(&h.extra_nonce);
    out[24..56].copy_from_slice(&h.reserved_root);
    out[56..88].copy_from_slice(&h.witness_root);
    out[88..120].copy_from_slice(&h.merkle_root);
    out[120..124].copy_from_slice(&h.version.to_le_bytes());
    out[124..128].copy_from_slice(&h.bits.to_le_bytes());
    out
}

pub fn encode_header(h: &BlockHeader) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0..76].copy_from_slice(&encode_preheader(h));
    out[76..204].copy_from_slice(&encode_subheader(h));
    out[204..236].copy_from_slice(&h.mask);
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<BlockHeader, VerifyError> {
    if bytes.len() != HEADER_SIZE {
        return Err(VerifyError::malformed("header-bad-length"));
    }
    let mut nonce = [0u8; 4];
    nonce.copy_from_slice(&bytes[0..4]);
    let mut time = [0u8; 8];
    time.copy_from_slice(&bytes[4..12]);
    let mut prev_block = [0u8; 32];
    prev_block.copy_from_slice(&bytes[12..44]);
    let mut tree_root = [0u8; 32];
    tree_root.copy_from_slice(&bytes[44..76]);

    let mut extra_nonce = [0u8; 24];
    extra_nonce.copy_from_slice(&bytes[76..100]);
    let mut reserved_root = [0u8; 32];
    reserved_root.copy_from_slice(&bytes[100..132]);
    let mut witness_root = [0u8; 32];
    witness_root.copy_from_slice(&bytes[132..164]);
    let mut merkle_root = [0u8; 32];
    merkle_root.copy_from_slice(&bytes[164..196]);
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[196..200]);
    let mut bits = [0u8; 4];
    bits.copy_from_slice(&bytes[200..204]);

    let mut mask = [0u8; 32];
    mask.copy_from_slice(&bytes[204..236]);

    Ok(BlockHeader {
        nonce: u32::from_le_bytes(nonce),
        time: u64::from_le_bytes(time),
        prev_block,
        tree_root,
        extra_nonce,
        reserved_root,
        witness_root,
        merkle_root,
        version: u32::from_le_bytes(version),
        bits: u32::from_le_bytes(bits),
        mask,
    })
}

fn encode_covenant(out: &mut Vec<u8>, cov: &Covenant) {
    out.push(cov.kind);
    out.extend_from_slice(&compactsize::encode(cov.items.len() as u64));
    for item in &cov.items {
        out.extend_from_slice(&compactsize::encode(item.len() as u64));
        out.extend_from_slice(item);
    }
}

fn decode_covenant(bytes: &[u8], pos: &mut usize) -> Result<Covenant, VerifyError> {
    let kind = *bytes
        .get(*pos)
        .ok_or_else(|| VerifyError::malformed("covenant-truncated"))?;
    *pos += 1;
    let (count, used) = compactsize::decode(&bytes[*pos..])?;
    *pos += used;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, used) = compactsize::decode(&bytes[*pos..])?;
        *pos += used;
        let len = len as usize;
        let item = bytes
            .get(*pos..*pos + len)
            .ok_or_else(|| VerifyError::malformed("covenant-item-truncated"))?
            .to_vec();
        *pos += len;
        items.push(item);
    }
    Ok(Covenant { kind, items })
}

fn encode_output(out: &mut Vec<u8>, o: &TxOutput) {
    out.extend_from_slice(&o.value.to_le_bytes());
    out.push(o.address.version);
    out.push(o.address.hash_len);
    out.extend_from_slice(o.address.program());
    encode_covenant(out, &o.covenant);
}

fn decode_output(bytes: &[u8], pos: &mut usize) -> Result<TxOutput, VerifyError> {
    let value_bytes = bytes
        .get(*pos..*pos + 8)
        .ok_or_else(|| VerifyError::malformed("output-truncated"))?;
    let value = u64::from_le_bytes(value_bytes.try_into().unwrap());
    *pos += 8;
    let version = *bytes
        .get(*pos)
        .ok_or_else(|| VerifyError::malformed("output-truncated"))?;
    *pos += 1;
    let hash_len = *bytes
        .get(*pos)
        .ok_or_else(|| VerifyError::malformed("output-truncated"))?;
    *pos += 1;
    if hash_len as usize > 32 {
        return Err(VerifyError::malformed("output-program-too-long"));
    }
    let program = bytes
        .get(*pos..*pos + hash_len as usize)
        .ok_or_else(|| VerifyError::malformed("output-truncated"))?;
    let address = Address::from_program(version, program);
    *pos += hash_len as usize;
    let covenant = decode_covenant(bytes, pos)?;
    Ok(TxOutput {
        value,
        address,
        covenant,
    })
}

/// Tags a `CoinbaseProof` on the wire.
const COINBASE_PROOF_CLAIM: u8 = 0;
const COINBASE_PROOF_AIRDROP: u8 = 1;

fn encode_coinbase_proofs(out: &mut Vec<u8>, proofs: &[CoinbaseProof]) {
    out.extend_from_slice(&compactsize::encode(proofs.len() as u64));
    for proof in proofs {
        out.extend_from_slice(&compactsize::encode(proof.input_index() as u64));
        match proof {
            CoinbaseProof::Claim(p) => {
                out.push(COINBASE_PROOF_CLAIM);
                out.extend_from_slice(&p.name_hash);
                out.extend_from_slice(&p.commit_height.to_le_bytes());
                out.extend_from_slice(&p.signature_time.to_le_bytes());
                out.push(p.weak as u8);
            }
            CoinbaseProof::Airdrop(p) => {
                out.push(COINBASE_PROOF_AIRDROP);
                out.extend_from_slice(&p.position.to_le_bytes());
                out.push(p.weak as u8);
                out.push(p.goosig as u8);
            }
        }
    }
}

fn decode_coinbase_proofs(bytes: &[u8], pos: &mut usize) -> Result<Vec<CoinbaseProof>, VerifyError> {
    let (count, used) = compactsize::decode(&bytes[*pos..])?;
    *pos += used;
    let mut proofs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (input_index, used) = compactsize::decode(&bytes[*pos..])?;
        *pos += used;
        let tag = *bytes
            .get(*pos)
            .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?;
        *pos += 1;
        let proof = match tag {
            COINBASE_PROOF_CLAIM => {
                let name_hash: [u8; 32] = bytes
                    .get(*pos..*pos + 32)
                    .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                    .try_into()
                    .unwrap();
                *pos += 32;
                let commit_height = u32::from_le_bytes(
                    bytes
                        .get(*pos..*pos + 4)
                        .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                        .try_into()
                        .unwrap(),
                );
                *pos += 4;
                let signature_time = u64::from_le_bytes(
                    bytes
                        .get(*pos..*pos + 8)
                        .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                        .try_into()
                        .unwrap(),
                );
                *pos += 8;
                let weak = *bytes
                    .get(*pos)
                    .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                    != 0;
                *pos += 1;
                CoinbaseProof::Claim(ClaimProof {
                    input_index: input_index as usize,
                    name_hash,
                    commit_height,
                    signature_time,
                    weak,
                })
            }
            COINBASE_PROOF_AIRDROP => {
                let position = u32::from_le_bytes(
                    bytes
                        .get(*pos..*pos + 4)
                        .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                        .try_into()
                        .unwrap(),
                );
                *pos += 4;
                let weak = *bytes
                    .get(*pos)
                    .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                    != 0;
                *pos += 1;
                let goosig = *bytes
                    .get(*pos)
                    .ok_or_else(|| VerifyError::malformed("cb-proof-truncated"))?
                    != 0;
                *pos += 1;
                CoinbaseProof::Airdrop(AirdropProof {
                    input_index: input_index as usize,
                    position,
                    weak,
                    goosig,
                })
            }
            _ => return Err(VerifyError::malformed("bad-cb-proof-tag")),
        };
        proofs.push(proof);
    }
    Ok(proofs)
}

/// Encodes a tx. `include_witness` controls whether the witness stacks are
/// appended — the txid commits to the non-witness form, the wtxid (and the
/// witness merkle root) to the full form. Coinbase proofs are consensus data
/// and are always included, regardless of `include_witness`.
pub fn encode_tx(tx: &Tx, include_witness: bool) -> Result<Vec<u8>, VerifyError> {
    if tx.inputs.len() > MAX_TX_INPUTS || tx.outputs.len() > MAX_TX_OUTPUTS {
        return Err(VerifyError::malformed("tx-too-many-ios"));
    }
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    out.extend_from_slice(&compactsize::encode(tx.inputs.len() as u64));
    for input in &tx.inputs {
        out.extend_from_slice(&input.prevout.hash);
        out.extend_from_slice(&input.prevout.index.to_le_bytes());
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }
    out.extend_from_slice(&compactsize::encode(tx.outputs.len() as u64));
    for output in &tx.outputs {
        encode_output(&mut out, output);
    }
    out.extend_from_slice(&tx.locktime.to_le_bytes());
    if tx.is_coinbase() {
        encode_coinbase_proofs(&mut out, &tx.coinbase_proofs);
    }
    if include_witness {
        for witness in &tx.witnesses {
            out.extend_from_slice(&compactsize::encode(witness.len() as u64));
            for item in witness {
                if item.len() > MAX_WITNESS_ITEM_BYTES {
                    return Err(VerifyError::malformed("witness-item-too-large"));
                }
                out.extend_from_slice(&compactsize::encode(item.len() as u64));
                out.extend_from_slice(item);
            }
        }
    }
    Ok(out)
}

pub fn decode_tx(bytes: &[u8]) -> Result<Tx, VerifyError> {
    let mut pos = 0usize;
    let version_bytes = bytes
        .get(0..4)
        .ok_or_else(|| VerifyError::malformed("tx-truncated"))?;
    let version = u32::from_le_bytes(version_bytes.try_into().unwrap());
    pos += 4;

    let (n_inputs, used) = compactsize::decode(&bytes[pos..])?;
    pos += used;
    if n_inputs as usize > MAX_TX_INPUTS {
        return Err(VerifyError::malformed("tx-too-many-inputs"));
    }
    let mut inputs = Vec::with_capacity(n_inputs as usize);
    for _ in 0..n_inputs {
        let hash: [u8; 32] = bytes
            .get(pos..pos + 32)
            .ok_or_else(|| VerifyError::malformed("tx-truncated"))?
            .try_into()
            .unwrap();
        pos += 32;
        let index = u32::from_le_bytes(
            bytes
                .get(pos..pos + 4)
                .ok_or_else(|| VerifyError::malformed("tx-truncated"))?
                .try_into()
                .unwrap(),
        );
        pos += 4;
        let sequence = u32::from_le_bytes(
            bytes
                .get(pos..pos + 4)
                .ok_or_else(|| VerifyError::malformed("tx-truncated"))?
                .try_into()
                .unwrap(),
        );
        pos += 4;
        inputs.push(TxInput {
            prevout: Outpoint::new(hash, index),
            sequence,
        });
    }

    let (n_outputs, used) = compactsize::decode(&bytes[pos..])?;
    pos += used;
    if n_outputs as usize > MAX_TX_OUTPUTS {
        return Err(VerifyError::malformed("tx-too-many-outputs"));
    }
    let mut outputs = Vec::with_capacity(n_outputs as usize);
    for _ in 0..n_outputs {
        outputs.push(decode_output(bytes, &mut pos)?);
    }

    let locktime = u32::from_le_bytes(
        bytes
            .get(pos..pos + 4)
            .ok_or_else(|| VerifyError::malformed("tx-truncated"))?
            .try_into()
            .unwrap(),
    );
    pos += 4;

    let is_coinbase = inputs
        .first()
        .map(|i| i.prevout.is_null())
        .unwrap_or(false);
    let coinbase_proofs = if is_coinbase {
        decode_coinbase_proofs(bytes, &mut pos)?
    } else {
        Vec::new()
    };

    let mut witnesses = Vec::with_capacity(inputs.len());
    for _ in 0..inputs.len() {
        let (n_items, used) = compactsize::decode(&bytes[pos..])?;
        pos += used;
        if n_items as usize > MAX_WITNESS_ITEMS {
            return Err(VerifyError::malformed("witness-too-many-items"));
        }
        let mut items = Vec::with_capacity(n_items as usize);
        for _ in 0..n_items {
            let (len, used) = compactsize::decode(&bytes[pos..])?;
            pos += used;
            let len = len as usize;
            if len > MAX_WITNESS_ITEM_BYTES {
                return Err(VerifyError::malformed("witness-item-too-large"));
            }
            let item = bytes
                .get(pos..pos + len)
                .ok_or_else(|| VerifyError::malformed("witness-truncated"))?
                .to_vec();
            pos += len;
            items.push(item);
        }
        witnesses.push(items);
    }

    Ok(Tx {
        version,
        inputs,
        outputs,
        locktime,
        witnesses,
        coinbase_proofs,
    })
}

pub fn encode_block(block: &Block) -> Result<Vec<u8>, VerifyError> {
    let mut out = Vec::new();
    out.extend_from_slice(&encode_header(&block.header));
    out.extend_from_slice(&compactsize::encode(block.txs.len() as u64));
    for tx in &block.txs {
        let encoded = encode_tx(tx, true)?;
        out.extend_from_slice(&compactsize::encode(encoded.len() as u64));
        out.extend_from_slice(&encoded);
    }
    if out.len() > MAX_BLOCK_SERIALIZED_BYTES {
        return Err(VerifyError::malformed("block-too-large"));
    }
    Ok(out)
}

pub fn decode_block(bytes: &[u8]) -> Result<Block, VerifyError> {
    if bytes.len() > MAX_BLOCK_SERIALIZED_BYTES {
        return Err(VerifyError::malformed("block-too-large"));
    }
    let header = decode_header(
        bytes
            .get(0..HEADER_SIZE)
            .ok_or_else(|| VerifyError::malformed("block-truncated"))?,
    )?;
    let mut pos = HEADER_SIZE;
    let (n_txs, used) = compactsize::decode(&bytes[pos..])?;
    pos += used;
    let mut txs = Vec::with_capacity(n_txs as usize);
    for _ in 0..n_txs {
        let (len, used) = compactsize::decode(&bytes[pos..])?;
        pos += used;
        let len = len as usize;
        let raw = bytes
            .get(pos..pos + len)
            .ok_or_else(|| VerifyError::malformed("block-tx-truncated"))?;
        pos += len;
        txs.push(decode_tx(raw)?);
    }
    Ok(Block { header, txs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            nonce: 42,
            time: 1_700_000_000,
            prev_block: [1u8; 32],
            tree_root: [2u8; 32],
            extra_nonce: [3u8; 24],
            reserved_root: [4u8; 32],
            witness_root: [5u8; 32],
            merkle_root: [6u8; 32],
            version: 0,
            bits: 0x207f_ffff,
            mask: [7u8; 32],
        }
    }

    #[test]
    fn header_roundtrip() {
        let h = sample_header();
        let enc = encode_header(&h);
        assert_eq!(enc.len(), HEADER_SIZE);
        let dec = decode_header(&enc).unwrap();
        assert_eq!(dec, h);
    }

    fn sample_tx() -> Tx {
        Tx {
            version: 0,
            inputs: vec![TxInput {
                prevout: Outpoint::new([9u8; 32], 0),
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput {
                value: 5000,
                address: Address::from_program(0, &[1u8; 20]),
                covenant: Covenant::none(),
            }],
            locktime: 0,
            witnesses: vec![vec![vec![1, 2, 3]]],
            coinbase_proofs: vec![],
        }
    }

    #[test]
    fn tx_roundtrip_with_witness() {
        let tx = sample_tx();
        let enc = encode_tx(&tx, true).unwrap();
        let dec = decode_tx(&enc).unwrap();
        assert_eq!(dec, tx);
    }

    #[test]
    fn coinbase_tx_roundtrips_proofs() {
        let mut tx = sample_tx();
        tx.inputs = vec![
            TxInput {
                prevout: Outpoint::new([0u8; 32], u32::MAX),
                sequence: 0,
            },
            TxInput {
                prevout: Outpoint::new([0u8; 32], 1),
                sequence: 0,
            },
        ];
        tx.witnesses = vec![vec![], vec![]];
        tx.coinbase_proofs = vec![CoinbaseProof::Claim(ClaimProof {
            input_index: 1,
            name_hash: [8u8; 32],
            commit_height: 100,
            signature_time: 1_700_000_000,
            weak: false,
        })];
        assert!(tx.is_coinbase());
        let enc = encode_tx(&tx, true).unwrap();
        let dec = decode_tx(&enc).unwrap();
        assert_eq!(dec, tx);
    }

    #[test]
    fn tx_without_witness_differs_from_with() {
        let tx = sample_tx();
        let no_wit = encode_tx(&tx, false).unwrap();
        let with_wit = encode_tx(&tx, true).unwrap();
        assert_ne!(no_wit, with_wit);
    }

    #[test]
    fn block_roundtrip() {
        let block = Block {
            header: sample_header(),
            txs: vec![sample_tx()],
        };
        let enc = encode_block(&block).unwrap();
        let dec = decode_block(&enc).unwrap();
        assert_eq!(dec, block);
    }
}
