//! Versionbits-style per-bit deployment state machine.
//!
//! State only changes at window boundaries (`(height+1) % window == 0`).
//! Callers walk back along window-aligned ancestors until they hit a cached
//! state, then replay forward — this module only implements the pure
//! per-window transition; the walk/memoization lives in the engine, which
//! owns the `v` key-space cache.

use crate::error::VerifyError;
use crate::ChainEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub bit: u8,
    pub start_time: u64,
    pub timeout: u64,
    pub threshold: u32,
    pub window: u32,
}

/// Computes the state at the window boundary *containing* `entry`, given
/// the state as of the previous window boundary and a source of bit-1
/// signaling counts over the just-completed window.
pub fn transition(
    dep: &Deployment,
    prev_state: ThresholdState,
    window_start_mtp: u64,
    window_end_mtp: u64,
    signaling_count: u32,
) -> ThresholdState {
    match prev_state {
        ThresholdState::Defined => {
            if window_start_mtp >= dep.timeout {
                ThresholdState::Failed
            } else if window_start_mtp >= dep.start_time {
                ThresholdState::Started
            } else {
                ThresholdState::Defined
            }
        }
        ThresholdState::Started => {
            if window_end_mtp >= dep.timeout {
                ThresholdState::Failed
            } else if signaling_count >= dep.threshold {
                ThresholdState::LockedIn
            } else {
                ThresholdState::Started
            }
        }
        ThresholdState::LockedIn => ThresholdState::Active,
        ThresholdState::Active => ThresholdState::Active,
        ThresholdState::Failed => ThresholdState::Failed,
    }
}

/// Counts, over the `window` entries ending at (and including) `last`, how
/// many headers signal `bit` in their version field (bit i+29 convention:
/// top three bits `001` mark a versionbits header).
pub fn count_signaling(
    get_ancestor: &dyn Fn(&crate::Hash, u32) -> Option<ChainEntry>,
    last: &ChainEntry,
    window: u32,
    bit: u8,
) -> u32 {
    let mut count = 0;
    for back in 0..window {
        let entry = if back == 0 {
            Some(last.clone())
        } else {
            get_ancestor(&last.hash, back)
        };
        let Some(entry) = entry else { break };
        if signals(entry.header.version, bit) {
            count += 1;
        }
    }
    count
}

pub fn signals(version: u32, bit: u8) -> bool {
    const TOP_MASK: u32 = 0xe000_0000;
    const TOP_BITS: u32 = 0x2000_0000;
    version & TOP_MASK == TOP_BITS && version & (1 << bit) != 0
}

pub fn validate_window(window: u32) -> Result<(), VerifyError> {
    if window == 0 {
        return Err(VerifyError::invalid("bad-deployment-window"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_to_started_to_locked_in_to_active() {
        let dep = Deployment {
            bit: 1,
            start_time: 0,
            timeout: u64::MAX,
            threshold: 108,
            window: 144,
        };
        let s = transition(&dep, ThresholdState::Defined, 100, 200, 0);
        assert_eq!(s, ThresholdState::Started);
        let s = transition(&dep, ThresholdState::Started, 100, 200, 50);
        assert_eq!(s, ThresholdState::Started);
        let s = transition(&dep, ThresholdState::Started, 100, 200, 144);
        assert_eq!(s, ThresholdState::LockedIn);
        let s = transition(&dep, ThresholdState::LockedIn, 200, 300, 0);
        assert_eq!(s, ThresholdState::Active);
    }

    #[test]
    fn timeout_forces_failed_from_started() {
        let dep = Deployment {
            bit: 2,
            start_time: 0,
            timeout: 500,
            threshold: 108,
            window: 144,
        };
        let s = transition(&dep, ThresholdState::Started, 400, 600, 0);
        assert_eq!(s, ThresholdState::Failed);
    }

    #[test]
    fn signals_requires_top_bits_and_bit_set() {
        assert!(signals(0x2000_0002, 1));
        assert!(!signals(0x2000_0002, 0));
        assert!(!signals(0x1000_0002, 1));
    }
}
