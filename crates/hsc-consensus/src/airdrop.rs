//! Coinbase proof carriers: the extra `(input, output)` pairs beyond index 0
//! on a coinbase transaction, each backing either a DNSSEC-verified name
//! claim or a pre-provisioned airdrop payout. The name-state side of a claim
//! still runs through `covenant::apply_claim` like any other covenant; this
//! module only validates the proof metadata that covenant application
//! itself has no way to see (signature timing, weak-algorithm and
//! goosig flag-day gating).

use crate::error::VerifyError;
use crate::params::NetworkParams;
use crate::NameHash;

/// A DNSSEC ownership proof reclaiming a name via the coinbase, paired with
/// extra input/output index `input_index`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimProof {
    pub input_index: usize,
    pub name_hash: NameHash,
    pub commit_height: u32,
    /// Timestamp the DNSSEC signature was produced at; must not postdate
    /// the previous block, the same bound `check_block_body` applies to
    /// header times.
    pub signature_time: u64,
    pub weak: bool,
}

/// A pre-provisioned claimable coin, identified by a unique `position`
/// spent exactly once via the chain's `BitField`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirdropProof {
    pub input_index: usize,
    pub position: u32,
    pub weak: bool,
    pub goosig: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoinbaseProof {
    Claim(ClaimProof),
    Airdrop(AirdropProof),
}

impl CoinbaseProof {
    pub fn input_index(&self) -> usize {
        match self {
            CoinbaseProof::Claim(p) => p.input_index,
            CoinbaseProof::Airdrop(p) => p.input_index,
        }
    }
}

/// Validates the parts of an extra coinbase input's proof that aren't the
/// name-covenant state machine: claim signature timing, and the airdrop
/// hardening/goosig flag-day gates.
pub fn validate_coinbase_proof(
    proof: &CoinbaseProof,
    prev_time: u64,
    height: u32,
    params: &NetworkParams,
) -> Result<(), VerifyError> {
    match proof {
        CoinbaseProof::Claim(p) => {
            if p.signature_time > prev_time {
                return Err(VerifyError::invalid("bad-claim-sigtime"));
            }
            Ok(())
        }
        CoinbaseProof::Airdrop(p) => {
            if height >= params.hardening_height && p.weak {
                return Err(VerifyError::invalid("bad-airdrop-weak"));
            }
            if height >= params.goosig_stop_height && p.goosig {
                return Err(VerifyError::invalid("bad-airdrop-goosig"));
            }
            Ok(())
        }
    }
}
