//! 256-bit chainwork arithmetic and compact-bits <-> target conversion.
//!
//! All of this must be deterministic and float-free; `num-bigint` gives us
//! an arbitrary-precision integer without reaching for a fixed-width crate
//! this codebase otherwise has no use for.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::VerifyError;

/// Decodes Bitcoin-style "compact" difficulty bits into a 256-bit target.
pub fn bits_to_target(bits: u32) -> Result<[u8; 32], VerifyError> {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0;
    if negative || mantissa == 0 {
        return Ok([0u8; 32]);
    }
    let value = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3))
    };
    biguint_to_bytes32(&value)
}

/// Encodes a 256-bit target into compact bits, matching the canonical
/// (non-negative, minimal-mantissa) form.
pub fn target_to_bits(target: &[u8; 32]) -> u32 {
    let bytes = target
        .iter()
        .position(|&b| b != 0)
        .map(|first_nonzero| &target[first_nonzero..])
        .unwrap_or(&target[32..]);
    if bytes.is_empty() {
        return 0;
    }
    let mut size = bytes.len() as u32;
    let mut mantissa: u32 = if bytes.len() >= 3 {
        ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
    } else {
        let mut padded = [0u8; 3];
        padded[3 - bytes.len()..].copy_from_slice(bytes);
        ((padded[0] as u32) << 16) | ((padded[1] as u32) << 8) | padded[2] as u32
    };
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        size += 1;
    }
    (size << 24) | mantissa
}

/// `proof(bits) = floor(2^256 / (target + 1))`, the per-block work
/// contribution. Saturates to zero for a malformed (all-ones) target.
pub fn proof_from_bits(bits: u32) -> Result<BigUint, VerifyError> {
    let target = bits_to_target(bits)?;
    let t = BigUint::from_bytes_be(&target) + BigUint::one();
    if t.is_zero() {
        return Ok(BigUint::zero());
    }
    let two256 = BigUint::one() << 256usize;
    Ok(two256 / t)
}

pub fn add_work(prev_chainwork: &[u8; 32], bits: u32) -> Result<[u8; 32], VerifyError> {
    let prev = BigUint::from_bytes_be(prev_chainwork);
    let work = prev + proof_from_bits(bits)?;
    biguint_to_bytes32(&work)
}

pub fn chainwork_to_biguint(chainwork: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_be(chainwork)
}

pub fn biguint_to_bytes32(x: &BigUint) -> Result<[u8; 32], VerifyError> {
    let b = x.to_bytes_be();
    if b.len() > 32 {
        return Err(VerifyError::invalid("chainwork-overflow"));
    }
    let mut out = [0u8; 32];
    out[32 - b.len()..].copy_from_slice(&b);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_target_roundtrip() {
        for bits in [0x1d00_ffffu32, 0x207f_ffff, 0x1b00_4000] {
            let target = bits_to_target(bits).unwrap();
            let back = target_to_bits(&target);
            assert_eq!(back, bits, "bits {bits:#x} -> target -> {back:#x}");
        }
    }

    #[test]
    fn lower_target_means_more_work() {
        let easy = proof_from_bits(0x207f_ffff).unwrap();
        let hard = proof_from_bits(0x1d00_ffff).unwrap();
        assert!(hard > easy);
    }

    #[test]
    fn chainwork_accumulates_monotonically() {
        let zero = [0u8; 32];
        let bits = 0x207f_ffff;
        let w1 = add_work(&zero, bits).unwrap();
        let w2 = add_work(&w1, bits).unwrap();
        assert!(chainwork_to_biguint(&w2) > chainwork_to_biguint(&w1));
        assert!(chainwork_to_biguint(&w1) > chainwork_to_biguint(&zero));
    }
}
