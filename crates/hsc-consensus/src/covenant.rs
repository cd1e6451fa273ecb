//! The per-output covenant state machine that drives name auctions.
//!
//! A covenant is typed pushdata attached to an output; depending on its
//! `kind` it opens, bids on, reveals, registers, renews, transfers, or
//! revokes a name. `apply_covenant` is a pure function of `(NameState,
//! height, covenant)` — it never touches storage, matching the determinism
//! invariant that the same inputs always produce the same transition or the
//! same rejection.

use crate::constants::*;
use crate::error::VerifyError;
use crate::params::NetworkParams;
use crate::{NameHash, Outpoint};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameStatus {
    Locked,
    Opening,
    Bidding,
    Reveal,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Covenant {
    pub kind: u8,
    pub items: Vec<Vec<u8>>,
}

impl Covenant {
    pub fn none() -> Self {
        Covenant {
            kind: COVENANT_NONE,
            items: Vec::new(),
        }
    }

    pub fn is_name(&self) -> bool {
        self.kind != COVENANT_NONE
    }

    pub fn name_hash(&self) -> Option<NameHash> {
        let raw = self.items.first()?;
        let mut out = [0u8; 32];
        if raw.len() != 32 {
            return None;
        }
        out.copy_from_slice(raw);
        Some(out)
    }

    fn item_u32(&self, idx: usize) -> Option<u32> {
        let raw = self.items.get(idx)?;
        if raw.len() != 4 {
            return None;
        }
        Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn item_bytes(&self, idx: usize) -> Option<&[u8]> {
        self.items.get(idx).map(|v| v.as_slice())
    }
}

/// Per-name record. `None` means the name has never been observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameState {
    pub name_hash: NameHash,
    /// Height at which the name entered its current auction (the height of
    /// the OPEN, or of the CLAIM/REGISTER that most recently settled it).
    pub height: u32,
    pub renewal: u32,
    pub renewals: u32,
    pub owner: Outpoint,
    pub value: u64,
    pub highest: u64,
    pub data: Vec<u8>,
    pub transfer: u32,
    pub revoked: u32,
    pub claimed: bool,
    pub registered: bool,
    pub weak: bool,
}

impl NameState {
    pub fn fresh(name_hash: NameHash, height: u32) -> Self {
        NameState {
            name_hash,
            height,
            renewal: 0,
            renewals: 0,
            owner: Outpoint::new([0u8; 32], TX_COINBASE_PREVOUT_INDEX),
            value: 0,
            highest: 0,
            data: Vec::new(),
            transfer: 0,
            revoked: 0,
            claimed: false,
            registered: false,
            weak: false,
        }
    }

    pub fn status(&self, height: u32, params: &NetworkParams) -> NameStatus {
        if self.revoked != 0 {
            return NameStatus::Closed;
        }
        if self.registered {
            return NameStatus::Closed;
        }
        let elapsed = height.saturating_sub(self.height);
        if elapsed < params.bidding_period {
            NameStatus::Bidding
        } else if elapsed < params.bidding_period + params.reveal_period {
            NameStatus::Reveal
        } else {
            NameStatus::Closed
        }
    }
}

/// Absent-name status: a name never opened is always a valid OPEN/CLAIM
/// target, i.e. `Locked`, unless the caller has already determined the
/// name's rollout week has not yet arrived (tracked externally — this crate
/// treats an absent `NameState` uniformly since the rollout schedule is not
/// consensus-critical data this layer owns).
pub fn status_of(ns: Option<&NameState>, height: u32, params: &NetworkParams) -> NameStatus {
    match ns {
        None => NameStatus::Locked,
        Some(ns) => ns.status(height, params),
    }
}

/// Hook for future-extensible rejection of names registered with a known
/// vulnerable signing key. The default implementation never flags a key;
/// callers may supply a stricter predicate.
pub fn never_vulnerable(_ns: &NameState) -> bool {
    false
}

pub struct CovenantContext<'a> {
    pub height: u32,
    pub params: &'a NetworkParams,
    pub owner: Outpoint,
    pub output_value: u64,
    pub is_vulnerable: &'a dyn Fn(&NameState) -> bool,
    /// Set from `ClaimProof::weak` for the coinbase CLAIM this covenant
    /// belongs to; `false` for every other covenant kind.
    pub weak: bool,
}

/// Applies one covenant against the current `NameState` (absent if the name
/// has never been observed), returning the new state. Every distinct
/// `(status, kind)` pair not explicitly allowed below is a rejection of the
/// same code, keeping the transition relation total and deterministic.
pub fn apply_covenant(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
) -> Result<NameState, VerifyError> {
    let status = status_of(ns.as_ref(), ctx.height, ctx.params);
    let result = match cov.kind {
        COVENANT_NONE => ns.ok_or_else(|| VerifyError::invalid("bad-none-no-name")),
        COVENANT_CLAIM => apply_claim(ns, cov, ctx, status),
        COVENANT_OPEN => apply_open(ns, cov, ctx, status),
        COVENANT_BID => apply_bid(ns, cov, ctx, status),
        COVENANT_REVEAL => apply_reveal(ns, cov, ctx, status),
        COVENANT_REDEEM => apply_redeem(ns, ctx, status),
        COVENANT_REGISTER => apply_register(ns, cov, ctx, status),
        COVENANT_UPDATE => apply_update(ns, cov, ctx, status),
        COVENANT_RENEW => apply_renew(ns, ctx, status),
        COVENANT_TRANSFER => apply_transfer(ns, cov, ctx, status),
        COVENANT_FINALIZE => apply_finalize(ns, cov, ctx, status),
        COVENANT_REVOKE => apply_revoke(ns, ctx, status),
        _ => Err(VerifyError::invalid("bad-covenant-type")),
    };
    if let Err(ref e) = result {
        tracing::debug!(kind = cov.kind, height = ctx.height, reason = e.reason, "covenant rejected");
    }
    result
}

fn apply_claim(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    let allowed = matches!(status, NameStatus::Opening | NameStatus::Locked)
        || (status == NameStatus::Closed && !ns.as_ref().map(|n| n.registered).unwrap_or(false));
    if !allowed {
        return Err(VerifyError::invalid("bad-claim-state"));
    }
    let name_hash = cov.name_hash().ok_or_else(|| VerifyError::invalid("bad-claim-namehash"))?;
    let commit_height = cov
        .item_u32(1)
        .ok_or_else(|| VerifyError::invalid("bad-claim-commit-height"))?;
    if commit_height != ctx.height {
        return Err(VerifyError::invalid("bad-claim-commit-height"));
    }
    let mut next = ns.unwrap_or_else(|| NameState::fresh(name_hash, ctx.height));
    if (ctx.is_vulnerable)(&next) {
        return Err(VerifyError::invalid("bad-claim-vulnerable-key"));
    }
    if ctx.weak && ctx.height >= ctx.params.hardening_height {
        return Err(VerifyError::invalid("bad-claim-weak"));
    }
    next.height = ctx.height;
    next.owner = ctx.owner;
    next.value = 0;
    next.highest = 0;
    next.claimed = true;
    next.registered = true;
    next.renewal = ctx.height;
    next.weak = ctx.weak;
    Ok(next)
}

fn apply_open(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    let reopenable = status == NameStatus::Closed
        && !ns.as_ref().map(|n| n.registered).unwrap_or(false);
    if !(status == NameStatus::Locked || reopenable) {
        return Err(VerifyError::invalid("bad-open-state"));
    }
    let name_hash = cov.name_hash().ok_or_else(|| VerifyError::invalid("bad-open-namehash"))?;
    let mut next = NameState::fresh(name_hash, ctx.height);
    if let Some(prev) = ns {
        next.renewals = prev.renewals;
    }
    Ok(next)
}

fn apply_bid(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Bidding {
        return Err(VerifyError::invalid("bad-bid-state"));
    }
    let next = ns.ok_or_else(|| VerifyError::invalid("bad-bid-no-name"))?;
    let start = cov
        .item_u32(1)
        .ok_or_else(|| VerifyError::invalid("bad-bid-start"))?;
    if start != next.height {
        return Err(VerifyError::invalid("bad-bid-start"));
    }
    Ok(next)
}

fn apply_reveal(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Reveal {
        return Err(VerifyError::invalid("bad-reveal-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-reveal-no-name"))?;
    let start = cov
        .item_u32(1)
        .ok_or_else(|| VerifyError::invalid("bad-reveal-start"))?;
    if start != next.height {
        return Err(VerifyError::invalid("bad-reveal-start"));
    }
    let bid = ctx.output_value;
    if bid > next.highest {
        next.value = next.highest;
        next.highest = bid;
        next.owner = ctx.owner;
    } else if bid > next.value {
        next.value = bid;
    }
    Ok(next)
}

fn apply_redeem(
    ns: Option<NameState>,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    let next = ns.ok_or_else(|| VerifyError::invalid("bad-redeem-no-name"))?;
    if status == NameStatus::Bidding || status == NameStatus::Reveal {
        return Err(VerifyError::invalid("bad-redeem-state"));
    }
    if next.owner == ctx.owner {
        return Err(VerifyError::invalid("bad-redeem-owner"));
    }
    Ok(next)
}

fn apply_register(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-register-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-register-no-name"))?;
    if next.registered {
        return Err(VerifyError::invalid("bad-register-already"));
    }
    if next.owner != ctx.owner {
        return Err(VerifyError::invalid("bad-register-owner"));
    }
    if ctx.output_value != next.value {
        return Err(VerifyError::invalid("bad-register-value"));
    }
    let data = cov
        .item_bytes(2)
        .ok_or_else(|| VerifyError::invalid("bad-register-data"))?;
    if (ctx.is_vulnerable)(&next) {
        return Err(VerifyError::invalid("bad-register-vulnerable-key"));
    }
    next.registered = true;
    next.data = data.to_vec();
    next.renewal = ctx.height;
    next.renewals += 1;
    Ok(next)
}

fn apply_update(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-update-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-update-no-name"))?;
    if !next.registered || next.owner != ctx.owner {
        return Err(VerifyError::invalid("bad-update-owner"));
    }
    let data = cov
        .item_bytes(2)
        .ok_or_else(|| VerifyError::invalid("bad-update-data"))?;
    next.data = data.to_vec();
    Ok(next)
}

fn apply_renew(
    ns: Option<NameState>,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-renew-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-renew-no-name"))?;
    if !next.registered || next.owner != ctx.owner {
        return Err(VerifyError::invalid("bad-renew-owner"));
    }
    if ctx.height < next.renewal + ctx.params.tree_interval {
        return Err(VerifyError::invalid("bad-renew-premature"));
    }
    next.renewal = ctx.height;
    next.renewals += 1;
    Ok(next)
}

fn apply_transfer(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-transfer-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-transfer-no-name"))?;
    if !next.registered || next.owner != ctx.owner {
        return Err(VerifyError::invalid("bad-transfer-owner"));
    }
    if next.transfer != 0 {
        return Err(VerifyError::invalid("bad-transfer-already"));
    }
    cov.item_bytes(2)
        .ok_or_else(|| VerifyError::invalid("bad-transfer-address"))?;
    next.transfer = ctx.height;
    Ok(next)
}

fn apply_finalize(
    ns: Option<NameState>,
    cov: &Covenant,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-finalize-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-finalize-no-name"))?;
    if !next.registered || next.transfer == 0 {
        return Err(VerifyError::invalid("bad-finalize-not-transferring"));
    }
    if ctx.height < next.transfer + ctx.params.transfer_lockup {
        return Err(VerifyError::invalid("bad-finalize-premature"));
    }
    let claimed = cov.item_u32(4).ok_or_else(|| VerifyError::invalid("bad-finalize-claimed"))? != 0;
    let renewals = cov
        .item_u32(5)
        .ok_or_else(|| VerifyError::invalid("bad-finalize-renewals"))?;
    if claimed != next.claimed || renewals != next.renewals {
        return Err(VerifyError::invalid("bad-finalize-mismatch"));
    }
    next.owner = ctx.owner;
    next.transfer = 0;
    Ok(next)
}

fn apply_revoke(
    ns: Option<NameState>,
    ctx: &CovenantContext,
    status: NameStatus,
) -> Result<NameState, VerifyError> {
    if status != NameStatus::Closed {
        return Err(VerifyError::invalid("bad-revoke-state"));
    }
    let mut next = ns.ok_or_else(|| VerifyError::invalid("bad-revoke-no-name"))?;
    if !next.registered || next.owner != ctx.owner {
        return Err(VerifyError::invalid("bad-revoke-owner"));
    }
    next.revoked = ctx.height;
    next.registered = false;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::NetworkParams;

    fn ctx(params: &NetworkParams, height: u32, owner: Outpoint, value: u64) -> CovenantContext<'_> {
        CovenantContext {
            height,
            params,
            owner,
            output_value: value,
            is_vulnerable: &never_vulnerable,
            weak: false,
        }
    }

    fn outpoint(seed: u8) -> Outpoint {
        Outpoint::new([seed; 32], 0)
    }

    #[test]
    fn open_then_second_price_auction() {
        let params = NetworkParams::regtest();
        let name_hash = [7u8; 32];
        let open_cov = Covenant {
            kind: COVENANT_OPEN,
            items: vec![name_hash.to_vec()],
        };
        let c0 = ctx(&params, 100, outpoint(1), 0);
        let ns = apply_covenant(None, &open_cov, &c0).expect("open");
        assert_eq!(ns.height, 100);

        let bid_cov = |h: u32| Covenant {
            kind: COVENANT_BID,
            items: vec![name_hash.to_vec(), h.to_le_bytes().to_vec()],
        };
        let c_bid = ctx(&params, 100, outpoint(1), 0);
        let ns = apply_covenant(Some(ns), &bid_cov(100), &c_bid).expect("bid");

        let reveal_cov = Covenant {
            kind: COVENANT_REVEAL,
            items: vec![name_hash.to_vec(), 100u32.to_le_bytes().to_vec()],
        };
        let reveal_height = 100 + params.bidding_period;

        let c_rev_a = ctx(&params, reveal_height, outpoint(2), 200);
        let ns = apply_covenant(Some(ns), &reveal_cov, &c_rev_a).expect("reveal 200");
        assert_eq!(ns.highest, 200);
        assert_eq!(ns.value, 0);

        let c_rev_b = ctx(&params, reveal_height, outpoint(1), 100);
        let ns = apply_covenant(Some(ns), &reveal_cov, &c_rev_b).expect("reveal 100");
        assert_eq!(ns.highest, 200);
        assert_eq!(ns.value, 100);

        let c_rev_c = ctx(&params, reveal_height, outpoint(3), 300);
        let ns = apply_covenant(Some(ns), &reveal_cov, &c_rev_c).expect("reveal 300");
        assert_eq!(ns.owner, outpoint(3));
        assert_eq!(ns.highest, 300);
        assert_eq!(ns.value, 200);
    }

    #[test]
    fn register_rejects_wrong_owner() {
        let params = NetworkParams::regtest();
        let mut ns = NameState::fresh([1u8; 32], 0);
        ns.height = 0;
        ns.owner = outpoint(1);
        ns.value = 50;
        let closed_height = params.bidding_period + params.reveal_period + 1;
        let register_cov = Covenant {
            kind: COVENANT_REGISTER,
            items: vec![ns.name_hash.to_vec(), 0u32.to_le_bytes().to_vec(), vec![1, 2, 3]],
        };
        let c = ctx(&params, closed_height, outpoint(9), 50);
        let err = apply_covenant(Some(ns), &register_cov, &c).unwrap_err();
        assert_eq!(err.reason, "bad-register-owner");
    }

    #[test]
    fn revoke_then_reopen_is_allowed() {
        let params = NetworkParams::regtest();
        let mut ns = NameState::fresh([2u8; 32], 0);
        ns.owner = outpoint(1);
        ns.registered = true;
        ns.value = 10;
        let closed_height = params.bidding_period + params.reveal_period + 1;
        let revoke = Covenant {
            kind: COVENANT_REVOKE,
            items: vec![ns.name_hash.to_vec(), 0u32.to_le_bytes().to_vec()],
        };
        let c = ctx(&params, closed_height, outpoint(1), 0);
        let ns = apply_covenant(Some(ns), &revoke, &c).expect("revoke");
        assert!(!ns.registered);
        assert_ne!(ns.revoked, 0);

        let open = Covenant {
            kind: COVENANT_OPEN,
            items: vec![ns.name_hash.to_vec()],
        };
        let c2 = ctx(&params, closed_height + 1, outpoint(5), 0);
        let reopened = apply_covenant(Some(ns), &open, &c2).expect("reopen");
        assert_eq!(reopened.height, closed_height + 1);
    }

    #[test]
    fn claim_rejects_weak_proof_past_hardening_height() {
        let params = NetworkParams::regtest();
        let name_hash = [3u8; 32];
        let claim_cov = Covenant {
            kind: COVENANT_CLAIM,
            items: vec![name_hash.to_vec(), params.hardening_height.to_le_bytes().to_vec()],
        };
        let mut c = ctx(&params, params.hardening_height, outpoint(1), 0);
        c.weak = true;
        let err = apply_covenant(None, &claim_cov, &c).unwrap_err();
        assert_eq!(err.reason, "bad-claim-weak");
    }

    #[test]
    fn claim_records_weak_flag_on_name_state() {
        let params = NetworkParams::mainnet();
        let name_hash = [4u8; 32];
        let claim_cov = Covenant {
            kind: COVENANT_CLAIM,
            items: vec![name_hash.to_vec(), 10u32.to_le_bytes().to_vec()],
        };
        let mut c = ctx(&params, 10, outpoint(1), 0);
        c.weak = true;
        let ns = apply_covenant(None, &claim_cov, &c).expect("weak claim allowed pre-hardening");
        assert!(ns.weak);
    }
}
