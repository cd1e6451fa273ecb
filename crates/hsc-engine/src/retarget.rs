//! Windowed-average difficulty retarget. Every block's target is derived
//! from the actual time spent producing the last `pow_target_window`
//! blocks against the expected time, damped so a single outlier timestamp
//! can't swing difficulty by more than the configured bounds.

use num_bigint::BigUint;
use num_traits::Zero;

use hsc_consensus::chainwork::{bits_to_target, target_to_bits};
use hsc_consensus::params::NetworkParams;
use hsc_consensus::VerifyError;

/// Computes the `bits` value for the block following a window of ancestor
/// timestamps and targets, oldest first, ending at the current tip
/// (inclusive). Requires at least `pow_target_window + 1` entries; callers
/// below that (near genesis) should keep `pow_limit`.
pub fn next_bits(
    params: &NetworkParams,
    window_times: &[u64],
    window_bits: &[u32],
) -> Result<u32, VerifyError> {
    if params.pow_no_retargeting {
        return Ok(target_to_bits(&params.pow_limit));
    }
    let window = params.pow_target_window as usize;
    if window_times.len() < window + 1 || window_bits.len() < window {
        return Ok(target_to_bits(&params.pow_limit));
    }

    let actual_timespan = window_times[window].saturating_sub(window_times[0]);
    let target_timespan = params.pow_target_spacing * params.pow_average_window;
    let min_timespan = target_timespan / params.pow_max_actual_timespan_mul;
    let max_timespan = target_timespan * params.pow_max_actual_timespan_mul
        / params.pow_min_actual_timespan_div.max(1);
    let clamped = actual_timespan.clamp(min_timespan, max_timespan);

    let mut sum = BigUint::zero();
    for &bits in &window_bits[window_bits.len() - window..] {
        let target = bits_to_target(bits)?;
        sum += BigUint::from_bytes_be(&target);
    }
    let avg_target = sum / BigUint::from(window as u64);

    let new_target = avg_target * BigUint::from(clamped) / BigUint::from(target_timespan.max(1));
    let limit = BigUint::from_bytes_be(&params.pow_limit);
    let new_target = new_target.min(limit);

    let mut bytes = new_target.to_bytes_be();
    if bytes.len() > 32 {
        return Err(VerifyError::invalid("bad-diffbits-overflow"));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    bytes.clear();
    Ok(target_to_bits(&out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_timespan_keeps_difficulty_roughly_flat() {
        let params = NetworkParams::mainnet();
        let window = params.pow_target_window as usize;
        let spacing = params.pow_target_spacing;
        let times: Vec<u64> = (0..=window as u64).map(|i| i * spacing).collect();
        let bits = vec![target_to_bits(&params.pow_limit); window];
        let next = next_bits(&params, &times, &bits).unwrap();
        assert_eq!(next, target_to_bits(&params.pow_limit));
    }

    #[test]
    fn no_retargeting_network_always_returns_limit() {
        let params = NetworkParams::regtest();
        let next = next_bits(&params, &[], &[]).unwrap();
        assert_eq!(next, target_to_bits(&params.pow_limit));
    }
}
