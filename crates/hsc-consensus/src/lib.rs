//! Consensus-critical types and pure validation logic for the chain core.
//!
//! This crate owns the wire format, the block/tx data model, proof-of-work
//! and difficulty retargeting, the versionbits-style deployment state
//! machine, and the per-output covenant (name auction) state machine. It
//! never touches a database or the network — `hsc-store` persists what this
//! crate defines, and `hsc-engine` drives it against a live chain.

pub mod airdrop;
pub mod chainwork;
pub mod compactsize;
pub mod constants;
pub mod covenant;
pub mod error;
pub mod featurebits;
pub mod hash;
pub mod merkle;
pub mod params;
pub mod pow;
pub mod sighash;
pub mod subsidy;
pub mod validate;
pub mod wire;

pub use airdrop::{AirdropProof, ClaimProof, CoinbaseProof};
pub use covenant::{Covenant, NameState, NameStatus};
pub use error::{ErrorKind, VerifyError};
pub use params::{Network, NetworkParams};

/// A 32-byte digest: block hash, tx hash, merkle node, or trie node hash.
pub type Hash = [u8; 32];

/// 32-byte key into the name trie — `blake2b256(lowercase(name))`.
pub type NameHash = [u8; 32];

pub const ZERO_HASH: Hash = [0u8; 32];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outpoint {
    pub hash: Hash,
    pub index: u32,
}

impl Outpoint {
    pub const fn new(hash: Hash, index: u32) -> Self {
        Outpoint { hash, index }
    }

    pub fn is_null(&self) -> bool {
        self.hash == ZERO_HASH && self.index == constants::TX_COINBASE_PREVOUT_INDEX
    }
}

/// Fixed preheader + subheader + mask, `HEADER_SIZE` bytes on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    // preheader
    pub nonce: u32,
    pub time: u64,
    pub prev_block: Hash,
    /// Commits to the name trie root *as of the previous tree-interval
    /// boundary*, never the live root (see the reorg invariant in §4.2.2).
    pub tree_root: Hash,
    // subheader
    pub extra_nonce: [u8; 24],
    pub reserved_root: Hash,
    pub witness_root: Hash,
    pub merkle_root: Hash,
    pub version: u32,
    pub bits: u32,
    // mask
    pub mask: Hash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Tx>,
}

/// A cached, validated chain position: a header plus the two quantities
/// that are expensive to recompute — height and accumulated chainwork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEntry {
    pub hash: Hash,
    pub header: BlockHeader,
    pub height: u32,
    /// 256-bit accumulated work, big-endian. `chainwork = prev.chainwork +
    /// proof(bits)`.
    pub chainwork: [u8; 32],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address {
    pub version: u8,
    pub hash: [u8; 32],
    pub hash_len: u8,
}

impl Address {
    pub fn from_program(version: u8, program: &[u8]) -> Self {
        let mut hash = [0u8; 32];
        let len = program.len().min(32);
        hash[..len].copy_from_slice(&program[..len]);
        Address {
            version,
            hash,
            hash_len: len as u8,
        }
    }

    pub fn program(&self) -> &[u8] {
        &self.hash[..self.hash_len as usize]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub prevout: Outpoint,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub address: Address,
    pub covenant: Covenant,
}

/// Per-input witness stack (segwit-style push-only items).
pub type Witness = Vec<Vec<u8>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tx {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
    pub witnesses: Vec<Witness>,
    /// One entry per extra coinbase input (index `i >= 1`), each backing
    /// either a DNSSEC name claim or an airdrop payout on the paired
    /// output. Always empty on a non-coinbase transaction.
    pub coinbase_proofs: Vec<CoinbaseProof>,
}

impl Tx {
    /// A coinbase transaction's first input always carries the null
    /// prevout; it may carry further inputs beyond index 0, each a proof
    /// carrier rather than a real spend.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.first().map(|i| i.prevout.is_null()).unwrap_or(false)
    }
}

/// A UTXO-set entry: everything needed to spend or revalidate an output
/// without re-fetching its parent transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinEntry {
    pub version: u32,
    pub height: u32,
    pub coinbase: bool,
    pub value: u64,
    pub address: Address,
    pub covenant: Covenant,
}

/// Append-only bitmap of spent airdrop positions, one bit per position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitField {
    bits: Vec<u8>,
}

impl BitField {
    pub fn new() -> Self {
        BitField::default()
    }

    pub fn from_bytes(bits: Vec<u8>) -> Self {
        BitField { bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn has(&self, position: u32) -> bool {
        let (byte, mask) = Self::locate(position);
        self.bits.get(byte).map(|b| b & mask != 0).unwrap_or(false)
    }

    /// Sets the bit, returning `false` if it was already set (the caller
    /// must treat that as a double-spend of the airdrop position).
    pub fn set(&mut self, position: u32) -> bool {
        let (byte, mask) = Self::locate(position);
        if self.bits.len() <= byte {
            self.bits.resize(byte + 1, 0);
        }
        let was_set = self.bits[byte] & mask != 0;
        self.bits[byte] |= mask;
        !was_set
    }

    pub fn clear(&mut self, position: u32) {
        let (byte, mask) = Self::locate(position);
        if let Some(b) = self.bits.get_mut(byte) {
            *b &= !mask;
        }
    }

    fn locate(position: u32) -> (usize, u8) {
        ((position / 8) as usize, 1u8 << (position % 8))
    }
}

/// Aggregate counters maintained incrementally as blocks connect/disconnect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainState {
    pub tip: Hash,
    pub tx: u64,
    pub coin: u64,
    pub value: u64,
    pub burned: u64,
    /// Set only in the in-flight scratch copy during a batch; the persisted
    /// record is always logically committed.
    pub committed: bool,
}
