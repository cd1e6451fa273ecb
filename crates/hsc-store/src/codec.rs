//! Canonical byte encodings for everything persisted in the KV tables.
//! Distinct from `hsc_consensus::wire`, which encodes the network/hash
//! wire format — these are on-disk record layouts private to this store.

use hsc_consensus::compactsize;
use hsc_consensus::{Address, ChainEntry, ChainState, CoinEntry, Covenant, NameState, Outpoint};

use crate::error::{StoreError, StoreResult};

fn corrupt(table: &'static str, detail: impl Into<String>) -> StoreError {
    StoreError::CorruptRecord {
        table,
        detail: detail.into(),
    }
}

fn encode_address(out: &mut Vec<u8>, addr: &Address) {
    out.push(addr.version);
    out.push(addr.hash_len);
    out.extend_from_slice(addr.program());
}

fn decode_address(bytes: &[u8], pos: &mut usize) -> StoreResult<Address> {
    let version = *bytes
        .get(*pos)
        .ok_or_else(|| corrupt("address", "truncated version"))?;
    *pos += 1;
    let hash_len = *bytes
        .get(*pos)
        .ok_or_else(|| corrupt("address", "truncated hash_len"))?;
    *pos += 1;
    if hash_len as usize > 32 {
        return Err(corrupt("address", "hash_len > 32"));
    }
    let program = bytes
        .get(*pos..*pos + hash_len as usize)
        .ok_or_else(|| corrupt("address", "truncated program"))?;
    *pos += hash_len as usize;
    Ok(Address::from_program(version, program))
}

fn encode_covenant(out: &mut Vec<u8>, cov: &Covenant) {
    out.push(cov.kind);
    out.extend_from_slice(&compactsize::encode(cov.items.len() as u64));
    for item in &cov.items {
        out.extend_from_slice(&compactsize::encode(item.len() as u64));
        out.extend_from_slice(item);
    }
}

fn decode_covenant(bytes: &[u8], pos: &mut usize) -> StoreResult<Covenant> {
    let kind = *bytes
        .get(*pos)
        .ok_or_else(|| corrupt("covenant", "truncated kind"))?;
    *pos += 1;
    let (count, used) =
        compactsize::decode(&bytes[*pos..]).map_err(|e| corrupt("covenant", e.reason))?;
    *pos += used;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, used) =
            compactsize::decode(&bytes[*pos..]).map_err(|e| corrupt("covenant", e.reason))?;
        *pos += used;
        let len = len as usize;
        let item = bytes
            .get(*pos..*pos + len)
            .ok_or_else(|| corrupt("covenant", "truncated item"))?
            .to_vec();
        *pos += len;
        items.push(item);
    }
    Ok(Covenant { kind, items })
}

// ---------------------------------------------------------------------------
// ChainEntry: hash[32] || header[236] || height[4] || chainwork[32]
// ---------------------------------------------------------------------------

pub fn encode_entry(entry: &ChainEntry) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + 236 + 4 + 32);
    out.extend_from_slice(&entry.hash);
    out.extend_from_slice(&hsc_consensus::wire::encode_header(&entry.header));
    out.extend_from_slice(&entry.height.to_le_bytes());
    out.extend_from_slice(&entry.chainwork);
    out
}

pub fn decode_entry(bytes: &[u8]) -> StoreResult<ChainEntry> {
    if bytes.len() != 304 {
        return Err(corrupt("e", format!("expected 304 bytes, got {}", bytes.len())));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes[0..32]);
    let header = hsc_consensus::wire::decode_header(&bytes[32..268])?;
    let height = u32::from_le_bytes(bytes[268..272].try_into().unwrap());
    let mut chainwork = [0u8; 32];
    chainwork.copy_from_slice(&bytes[272..304]);
    Ok(ChainEntry {
        hash,
        header,
        height,
        chainwork,
    })
}

// ---------------------------------------------------------------------------
// CoinEntry: version[4] height[4] coinbase[1] value[8] address[var] covenant[var]
// ---------------------------------------------------------------------------

pub fn encode_coin(coin: &CoinEntry) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    out.extend_from_slice(&coin.version.to_le_bytes());
    out.extend_from_slice(&coin.height.to_le_bytes());
    out.push(if coin.coinbase { 1 } else { 0 });
    out.extend_from_slice(&coin.value.to_le_bytes());
    encode_address(&mut out, &coin.address);
    encode_covenant(&mut out, &coin.covenant);
    out
}

pub fn decode_coin(bytes: &[u8]) -> StoreResult<CoinEntry> {
    if bytes.len() < 17 {
        return Err(corrupt("c", "truncated coin entry"));
    }
    let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let height = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let coinbase = bytes[8] != 0;
    let value = u64::from_le_bytes(bytes[9..17].try_into().unwrap());
    let mut pos = 17;
    let address = decode_address(bytes, &mut pos)?;
    let covenant = decode_covenant(bytes, &mut pos)?;
    Ok(CoinEntry {
        version,
        height,
        coinbase,
        value,
        address,
        covenant,
    })
}

// ---------------------------------------------------------------------------
// NameState: name_hash[32] height[4] renewal[4] renewals[4] owner(outpoint,36)
//            value[8] highest[8] data[var, compactsize-prefixed] transfer[4]
//            revoked[4] flags[1] = claimed|registered<<1|weak<<2
// ---------------------------------------------------------------------------

pub fn encode_name_state(ns: &NameState) -> Vec<u8> {
    let mut out = Vec::with_capacity(96 + ns.data.len());
    out.extend_from_slice(&ns.name_hash);
    out.extend_from_slice(&ns.height.to_le_bytes());
    out.extend_from_slice(&ns.renewal.to_le_bytes());
    out.extend_from_slice(&ns.renewals.to_le_bytes());
    out.extend_from_slice(&ns.owner.hash);
    out.extend_from_slice(&ns.owner.index.to_le_bytes());
    out.extend_from_slice(&ns.value.to_le_bytes());
    out.extend_from_slice(&ns.highest.to_le_bytes());
    out.extend_from_slice(&compactsize::encode(ns.data.len() as u64));
    out.extend_from_slice(&ns.data);
    out.extend_from_slice(&ns.transfer.to_le_bytes());
    out.extend_from_slice(&ns.revoked.to_le_bytes());
    let flags = (ns.claimed as u8) | ((ns.registered as u8) << 1) | ((ns.weak as u8) << 2);
    out.push(flags);
    out
}

pub fn decode_name_state(bytes: &[u8]) -> StoreResult<NameState> {
    if bytes.len() < 88 {
        return Err(corrupt("name_state", "truncated"));
    }
    let mut name_hash = [0u8; 32];
    name_hash.copy_from_slice(&bytes[0..32]);
    let height = u32::from_le_bytes(bytes[32..36].try_into().unwrap());
    let renewal = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
    let renewals = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
    let mut owner_hash = [0u8; 32];
    owner_hash.copy_from_slice(&bytes[44..76]);
    let owner_index = u32::from_le_bytes(bytes[76..80].try_into().unwrap());
    let value = u64::from_le_bytes(bytes[80..88].try_into().unwrap());
    let mut pos = 88;
    let highest_bytes = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| corrupt("name_state", "truncated highest"))?;
    let highest = u64::from_le_bytes(highest_bytes.try_into().unwrap());
    pos += 8;
    let (data_len, used) =
        compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("name_state", e.reason))?;
    pos += used;
    let data = bytes
        .get(pos..pos + data_len as usize)
        .ok_or_else(|| corrupt("name_state", "truncated data"))?
        .to_vec();
    pos += data_len as usize;
    let transfer = u32::from_le_bytes(
        bytes
            .get(pos..pos + 4)
            .ok_or_else(|| corrupt("name_state", "truncated transfer"))?
            .try_into()
            .unwrap(),
    );
    pos += 4;
    let revoked = u32::from_le_bytes(
        bytes
            .get(pos..pos + 4)
            .ok_or_else(|| corrupt("name_state", "truncated revoked"))?
            .try_into()
            .unwrap(),
    );
    pos += 4;
    let flags = *bytes
        .get(pos)
        .ok_or_else(|| corrupt("name_state", "truncated flags"))?;
    Ok(NameState {
        name_hash,
        height,
        renewal,
        renewals,
        owner: Outpoint::new(owner_hash, owner_index),
        value,
        highest,
        data,
        transfer,
        revoked,
        claimed: flags & 1 != 0,
        registered: flags & 2 != 0,
        weak: flags & 4 != 0,
    })
}

// ---------------------------------------------------------------------------
// ChainState: tip[32] tx[8] coin[8] value[8] burned[8] = 64 bytes.
// `committed` is scratch-only and never persisted.
// ---------------------------------------------------------------------------

pub fn encode_chain_state(cs: &ChainState) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[0..32].copy_from_slice(&cs.tip);
    out[32..40].copy_from_slice(&cs.tx.to_le_bytes());
    out[40..48].copy_from_slice(&cs.coin.to_le_bytes());
    out[48..56].copy_from_slice(&cs.value.to_le_bytes());
    out[56..64].copy_from_slice(&cs.burned.to_le_bytes());
    out
}

pub fn decode_chain_state(bytes: &[u8]) -> StoreResult<ChainState> {
    if bytes.len() != 64 {
        return Err(corrupt("R", format!("expected 64 bytes, got {}", bytes.len())));
    }
    let mut tip = [0u8; 32];
    tip.copy_from_slice(&bytes[0..32]);
    Ok(ChainState {
        tip,
        tx: u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
        coin: u64::from_le_bytes(bytes[40..48].try_into().unwrap()),
        value: u64::from_le_bytes(bytes[48..56].try_into().unwrap()),
        burned: u64::from_le_bytes(bytes[56..64].try_into().unwrap()),
        committed: true,
    })
}

// ---------------------------------------------------------------------------
// Undo record: what a block's connect step changed, so disconnect can
// reverse it exactly. compactsize(n_spent) || [outpoint(36) coin(var)]* ||
// compactsize(n_created) || [outpoint(36)]*
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpentCoin {
    pub outpoint: Outpoint,
    pub coin: CoinEntry,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndoRecord {
    pub spent: Vec<SpentCoin>,
    pub created: Vec<Outpoint>,
}

fn encode_outpoint(out: &mut Vec<u8>, op: &Outpoint) {
    out.extend_from_slice(&op.hash);
    out.extend_from_slice(&op.index.to_le_bytes());
}

fn decode_outpoint(bytes: &[u8], pos: &mut usize) -> StoreResult<Outpoint> {
    let hash_bytes = bytes
        .get(*pos..*pos + 32)
        .ok_or_else(|| corrupt("outpoint", "truncated hash"))?;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(hash_bytes);
    *pos += 32;
    let index_bytes = bytes
        .get(*pos..*pos + 4)
        .ok_or_else(|| corrupt("outpoint", "truncated index"))?;
    let index = u32::from_le_bytes(index_bytes.try_into().unwrap());
    *pos += 4;
    Ok(Outpoint::new(hash, index))
}

pub fn encode_undo_record(record: &UndoRecord) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&compactsize::encode(record.spent.len() as u64));
    for item in &record.spent {
        encode_outpoint(&mut out, &item.outpoint);
        let coin_bytes = encode_coin(&item.coin);
        out.extend_from_slice(&compactsize::encode(coin_bytes.len() as u64));
        out.extend_from_slice(&coin_bytes);
    }
    out.extend_from_slice(&compactsize::encode(record.created.len() as u64));
    for outpoint in &record.created {
        encode_outpoint(&mut out, outpoint);
    }
    out
}

pub fn decode_undo_record(bytes: &[u8]) -> StoreResult<UndoRecord> {
    let mut pos = 0;
    let (n_spent, used) =
        compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("undo", e.reason))?;
    pos += used;
    let mut spent = Vec::with_capacity(n_spent as usize);
    for _ in 0..n_spent {
        let outpoint = decode_outpoint(bytes, &mut pos)?;
        let (len, used) =
            compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("undo", e.reason))?;
        pos += used;
        let coin_bytes = bytes
            .get(pos..pos + len as usize)
            .ok_or_else(|| corrupt("undo", "truncated coin"))?;
        let coin = decode_coin(coin_bytes)?;
        pos += len as usize;
        spent.push(SpentCoin { outpoint, coin });
    }
    let (n_created, used) =
        compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("undo", e.reason))?;
    pos += used;
    let mut created = Vec::with_capacity(n_created as usize);
    for _ in 0..n_created {
        created.push(decode_outpoint(bytes, &mut pos)?);
    }
    Ok(UndoRecord { spent, created })
}

// ---------------------------------------------------------------------------
// Name-undo journal: per-height record of the prior `NameState` (or its
// absence) for every name touched while connecting that height's block,
// consulted when disconnecting between tree-interval boundaries.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameUndoEntry {
    pub name_hash: [u8; 32],
    pub prior: Option<NameState>,
}

pub fn encode_name_undo(entries: &[NameUndoEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&compactsize::encode(entries.len() as u64));
    for entry in entries {
        out.extend_from_slice(&entry.name_hash);
        match &entry.prior {
            None => out.push(0),
            Some(ns) => {
                out.push(1);
                let ns_bytes = encode_name_state(ns);
                out.extend_from_slice(&compactsize::encode(ns_bytes.len() as u64));
                out.extend_from_slice(&ns_bytes);
            }
        }
    }
    out
}

pub fn decode_name_undo(bytes: &[u8]) -> StoreResult<Vec<NameUndoEntry>> {
    let mut pos = 0;
    let (count, used) =
        compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("name_undo", e.reason))?;
    pos += used;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_hash_bytes = bytes
            .get(pos..pos + 32)
            .ok_or_else(|| corrupt("name_undo", "truncated name_hash"))?;
        let mut name_hash = [0u8; 32];
        name_hash.copy_from_slice(name_hash_bytes);
        pos += 32;
        let tag = *bytes
            .get(pos)
            .ok_or_else(|| corrupt("name_undo", "truncated tag"))?;
        pos += 1;
        let prior = if tag == 0 {
            None
        } else {
            let (len, used) =
                compactsize::decode(&bytes[pos..]).map_err(|e| corrupt("name_undo", e.reason))?;
            pos += used;
            let ns_bytes = bytes
                .get(pos..pos + len as usize)
                .ok_or_else(|| corrupt("name_undo", "truncated name_state"))?;
            pos += len as usize;
            Some(decode_name_state(ns_bytes)?)
        };
        entries.push(NameUndoEntry { name_hash, prior });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsc_consensus::{BlockHeader, Outpoint};

    fn sample_header() -> BlockHeader {
        BlockHeader {
            nonce: 1,
            time: 2,
            prev_block: [3u8; 32],
            tree_root: [4u8; 32],
            extra_nonce: [5u8; 24],
            reserved_root: [6u8; 32],
            witness_root: [7u8; 32],
            merkle_root: [8u8; 32],
            version: 9,
            bits: 10,
            mask: [11u8; 32],
        }
    }

    #[test]
    fn entry_roundtrip() {
        let entry = ChainEntry {
            hash: [1u8; 32],
            header: sample_header(),
            height: 42,
            chainwork: [2u8; 32],
        };
        let bytes = encode_entry(&entry);
        assert_eq!(decode_entry(&bytes).unwrap(), entry);
    }

    #[test]
    fn coin_roundtrip() {
        let coin = CoinEntry {
            version: 1,
            height: 10,
            coinbase: true,
            value: 5000,
            address: Address::from_program(0, &[9u8; 20]),
            covenant: Covenant {
                kind: 2,
                items: vec![vec![1, 2, 3], vec![]],
            },
        };
        let bytes = encode_coin(&coin);
        assert_eq!(decode_coin(&bytes).unwrap(), coin);
    }

    #[test]
    fn name_state_roundtrip() {
        let ns = NameState {
            name_hash: [7u8; 32],
            height: 100,
            renewal: 50,
            renewals: 2,
            owner: Outpoint::new([8u8; 32], 1),
            value: 900,
            highest: 1000,
            data: vec![1, 2, 3, 4],
            transfer: 0,
            revoked: 0,
            claimed: true,
            registered: false,
            weak: true,
        };
        let bytes = encode_name_state(&ns);
        assert_eq!(decode_name_state(&bytes).unwrap(), ns);
    }

    #[test]
    fn chain_state_roundtrip() {
        let cs = ChainState {
            tip: [9u8; 32],
            tx: 1,
            coin: 2,
            value: 3,
            burned: 4,
            committed: false,
        };
        let bytes = encode_chain_state(&cs);
        let decoded = decode_chain_state(&bytes).unwrap();
        assert_eq!(decoded.tip, cs.tip);
        assert_eq!(decoded.tx, cs.tx);
        assert_eq!(decoded.coin, cs.coin);
        assert_eq!(decoded.value, cs.value);
        assert_eq!(decoded.burned, cs.burned);
    }

    #[test]
    fn undo_record_roundtrip() {
        let record = UndoRecord {
            spent: vec![SpentCoin {
                outpoint: Outpoint::new([1u8; 32], 0),
                coin: CoinEntry {
                    version: 1,
                    height: 5,
                    coinbase: false,
                    value: 100,
                    address: Address::from_program(0, &[2u8; 20]),
                    covenant: Covenant::none(),
                },
            }],
            created: vec![Outpoint::new([3u8; 32], 1)],
        };
        let bytes = encode_undo_record(&record);
        assert_eq!(decode_undo_record(&bytes).unwrap(), record);
    }

    #[test]
    fn name_undo_roundtrip() {
        let entries = vec![
            NameUndoEntry {
                name_hash: [1u8; 32],
                prior: None,
            },
            NameUndoEntry {
                name_hash: [2u8; 32],
                prior: Some(NameState::fresh([2u8; 32], 10)),
            },
        ];
        let bytes = encode_name_undo(&entries);
        assert_eq!(decode_name_undo(&bytes).unwrap(), entries);
    }
}
