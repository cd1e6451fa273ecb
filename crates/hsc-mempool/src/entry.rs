use hsc_consensus::{Hash, NameHash, Tx};

/// A pooled transaction, admitted against the tip-plus-one context at
/// `height`/`time`. `parents` are the txids of in-pool transactions this
/// entry itself spends from, kept so ancestor-count and descendant-fee
/// bookkeeping doesn't have to re-walk `tx.inputs` against the whole pool.
#[derive(Clone, Debug)]
pub struct MempoolEntry {
    pub tx: Tx,
    pub txid: Hash,
    pub fee: u64,
    pub vsize: u64,
    pub time: u64,
    pub height: u32,
    pub parents: Vec<Hash>,
    /// Height of the highest coinbase coin this entry spends, if any —
    /// the height maturity is measured from. `None` if none of its inputs
    /// spend a coinbase output.
    pub coinbase_height: Option<u32>,
}

impl MempoolEntry {
    pub fn fee_rate(&self) -> u64 {
        self.fee / self.vsize.max(1)
    }
}

/// A pending name covenant (OPEN, BID, ... or CLAIM) tracked only for the
/// one-entry-per-name uniqueness invariant; the full covenant state machine
/// itself is re-run against the live name trie on every admission, so this
/// is a reservation, not a cache of any derived state.
///
/// Genesis-snapshot "airdrop" claims use the same `COVENANT_CLAIM` shape as
/// an ordinary reclaimed name in this wire format — there is no separate
/// position index distinguishing the two — so both are tracked in the one
/// per-name-hash map the pool keeps for claims.
#[derive(Clone, Debug)]
pub struct ClaimEntry {
    pub name_hash: NameHash,
    pub txid: Hash,
    pub height: u32,
}

/// A coinbase airdrop payout confirmed-then-disconnected, reinserted at
/// `height - 1` so the position's brief reorg window is still visible to
/// anything inspecting the pool, mirroring `ClaimEntry`'s name reservation.
#[derive(Clone, Debug)]
pub struct AirdropEntry {
    pub position: u32,
    pub txid: Hash,
    pub height: u32,
}

/// A transaction parked awaiting inputs it couldn't yet resolve, plus the
/// exact outpoints it's waiting on so it can be requeued the moment one of
/// them is produced by a newly-admitted entry.
#[derive(Clone, Debug)]
pub struct OrphanEntry {
    pub tx: Tx,
    pub missing: Vec<hsc_consensus::Outpoint>,
    pub time: u64,
}
