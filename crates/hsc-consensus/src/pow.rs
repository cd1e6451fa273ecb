//! Proof-of-work check and difficulty retargeting.

use hsc_crypto::CryptoProvider;
use num_bigint::BigUint;
use num_traits::One;

use crate::chainwork::{bits_to_target, chainwork_to_biguint, target_to_bits};
use crate::error::VerifyError;
use crate::params::NetworkParams;
use crate::{hash, ChainEntry, Hash};

/// Checks that a header's hash is below its claimed target.
pub fn check_pow(provider: &dyn CryptoProvider, header: &crate::BlockHeader) -> Result<(), VerifyError> {
    let target = bits_to_target(header.bits)?;
    if target == [0u8; 32] {
        return Err(VerifyError::invalid("bad-diffbits"));
    }
    let h = hash::block_header_hash(provider, header);
    if BigUint::from_bytes_be(&h) >= BigUint::from_bytes_be(&target) {
        return Err(VerifyError::invalid("high-hash"));
    }
    Ok(())
}

/// Returns the entry among `{e, e's parent, e's grandparent}` with the
/// median timestamp — the "three-entry sort network" used to make retarget
/// boundaries resistant to single-block timestamp manipulation.
fn suitable(
    get_ancestor: &dyn Fn(&Hash, u32) -> Option<ChainEntry>,
    e: &ChainEntry,
) -> Result<ChainEntry, VerifyError> {
    let p1 = get_ancestor(&e.hash, 1).ok_or_else(|| VerifyError::invalid("retarget-missing-ancestor"))?;
    let p2 = get_ancestor(&e.hash, 2).ok_or_else(|| VerifyError::invalid("retarget-missing-ancestor"))?;
    let mut trio = [e.clone(), p1, p2];
    trio.sort_by_key(|entry| entry.header.time);
    Ok(trio[1].clone())
}

/// Median time past: the median timestamp of the previous 11 entries
/// (inclusive of `prev`).
pub fn median_time_past(
    get_ancestor: &dyn Fn(&Hash, u32) -> Option<ChainEntry>,
    prev: &ChainEntry,
) -> u64 {
    let mut times = vec![prev.header.time];
    for back in 1..crate::constants::MTP_ANCESTORS as u32 {
        if let Some(e) = get_ancestor(&prev.hash, back) {
            times.push(e.header.time);
        }
    }
    times.sort_unstable();
    times[times.len() / 2]
}

/// Computes the target bits for a block extending `prev`. `get_ancestor(h,
/// n)` must return the entry `n` blocks behind the entry with hash `h`.
pub fn get_target(
    params: &NetworkParams,
    time: u64,
    prev: Option<&ChainEntry>,
    get_ancestor: &dyn Fn(&Hash, u32) -> Option<ChainEntry>,
) -> Result<u32, VerifyError> {
    let prev = match prev {
        None => return Ok(target_to_bits(&params.pow_limit)),
        Some(p) => p,
    };

    if params.pow_no_retargeting {
        return Ok(target_to_bits(&params.pow_limit));
    }

    if params.network == crate::Network::Testnet
        && time > prev.header.time + 2 * params.pow_target_spacing
    {
        return Ok(target_to_bits(&params.pow_limit));
    }

    if (prev.height + 1) % (params.pow_target_window as u32) != 0 {
        return Ok(prev.header.bits);
    }

    let window = params.pow_average_window as u32;
    if prev.height + 1 < window {
        return Ok(target_to_bits(&params.pow_limit));
    }

    let first_raw = get_ancestor(&prev.hash, window)
        .ok_or_else(|| VerifyError::invalid("retarget-missing-window"))?;
    let first = suitable(get_ancestor, &first_raw)?;
    let last = suitable(get_ancestor, prev)?;

    let work = chainwork_to_biguint(&last.chainwork) - chainwork_to_biguint(&first.chainwork);
    let work = work * params.pow_target_spacing;

    let raw_span = last.header.time.saturating_sub(first.header.time);
    let expected_span = window as u64 * params.pow_target_spacing;
    let min_span = expected_span / params.pow_min_actual_timespan_div;
    let max_span = expected_span * params.pow_max_actual_timespan_mul;
    let actual_span = raw_span.clamp(min_span, max_span);

    let divided = work / BigUint::from(actual_span.max(1));
    if divided == num_traits::Zero::zero() {
        return Ok(target_to_bits(&params.pow_limit));
    }
    let two256 = BigUint::one() << 256usize;
    let mut target = two256 / divided;
    if target > BigUint::one() {
        target -= BigUint::one();
    }

    let limit = BigUint::from_bytes_be(&params.pow_limit);
    if target > limit {
        target = limit;
    }
    let target_bytes = crate::chainwork::biguint_to_bytes32(&target)?;
    Ok(target_to_bits(&target_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainwork::add_work;
    use crate::BlockHeader;
    use std::collections::HashMap;

    fn make_chain(n: u32, spacing: u64, bits: u32) -> HashMap<u32, ChainEntry> {
        let mut chain = HashMap::new();
        let mut chainwork = [0u8; 32];
        let mut prev_hash = [0u8; 32];
        for height in 0..n {
            chainwork = add_work(&chainwork, bits).unwrap();
            let mut hash = [0u8; 32];
            hash[0..4].copy_from_slice(&height.to_le_bytes());
            let header = BlockHeader {
                nonce: 0,
                time: height as u64 * spacing,
                prev_block: prev_hash,
                tree_root: [0u8; 32],
                extra_nonce: [0u8; 24],
                reserved_root: [0u8; 32],
                witness_root: [0u8; 32],
                merkle_root: [0u8; 32],
                version: 0,
                bits,
                mask: [0u8; 32],
            };
            chain.insert(
                height,
                ChainEntry {
                    hash,
                    header,
                    height,
                    chainwork,
                },
            );
            prev_hash = hash;
        }
        chain
    }

    #[test]
    fn non_boundary_height_keeps_parent_bits() {
        let params = NetworkParams::mainnet();
        let chain = make_chain(5, params.pow_target_spacing, 0x1d00_ffff);
        let prev = chain.get(&4).unwrap();
        let by_height: HashMap<u32, ChainEntry> = chain.clone();
        let get_ancestor = |hash: &Hash, back: u32| -> Option<ChainEntry> {
            let height = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
            by_height.get(&(height.checked_sub(back)?)).cloned()
        };
        let target = get_target(&params, prev.header.time + 1, Some(prev), &get_ancestor).unwrap();
        assert_eq!(target, prev.header.bits);
    }

    #[test]
    fn no_retargeting_always_returns_pow_limit() {
        let params = NetworkParams::regtest();
        let chain = make_chain(200, params.pow_target_spacing, 0x207f_ffff);
        let prev = chain.get(&199).unwrap();
        let by_height = chain.clone();
        let get_ancestor = |hash: &Hash, back: u32| -> Option<ChainEntry> {
            let height = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
            by_height.get(&(height.checked_sub(back)?)).cloned()
        };
        let target = get_target(&params, prev.header.time + 1, Some(prev), &get_ancestor).unwrap();
        assert_eq!(target, target_to_bits(&params.pow_limit));
    }
}
