//! Versionbits ancestor-walk and memoization, driving
//! `hsc_consensus::featurebits`'s pure per-window transition against the
//! `v` key-space cache that `hsc-store` owns.

use hsc_consensus::featurebits::{count_signaling, transition, Deployment, ThresholdState};
use hsc_consensus::{ChainEntry, Hash};
use hsc_store::Store;

use crate::error::EngineResult;

fn encode_state(state: ThresholdState) -> u8 {
    match state {
        ThresholdState::Defined => 0,
        ThresholdState::Started => 1,
        ThresholdState::LockedIn => 2,
        ThresholdState::Active => 3,
        ThresholdState::Failed => 4,
    }
}

fn decode_state(byte: u8) -> ThresholdState {
    match byte {
        1 => ThresholdState::Started,
        2 => ThresholdState::LockedIn,
        3 => ThresholdState::Active,
        4 => ThresholdState::Failed,
        _ => ThresholdState::Defined,
    }
}

/// Height of the window boundary at or before `height`: the highest `h` no
/// greater than `height` with `(h + 1) % window == 0`.
fn window_boundary(height: u32, window: u32) -> Option<u32> {
    if window == 0 {
        return None;
    }
    let completed = (height + 1) / window;
    if completed == 0 {
        None
    } else {
        Some(completed * window - 1)
    }
}

/// Looks up an ancestor `back` blocks behind `entry`, returning `None` once
/// walking past genesis.
fn ancestor_at_height(
    store: &Store,
    entry: &ChainEntry,
    target_height: u32,
) -> EngineResult<Option<ChainEntry>> {
    if target_height > entry.height {
        return Ok(None);
    }
    let mut cur = entry.clone();
    while cur.height > target_height {
        let Some(prev) = store.get_entry(&cur.header.prev_block)? else {
            return Ok(None);
        };
        cur = prev;
    }
    Ok(Some(cur))
}

/// The deployment's threshold state as of `entry`, memoizing every window
/// boundary it walks through along the way.
pub fn state_at(
    store: &Store,
    dep: &Deployment,
    entry: &ChainEntry,
) -> EngineResult<ThresholdState> {
    let Some(boundary_height) = window_boundary(entry.height, dep.window) else {
        return Ok(ThresholdState::Defined);
    };
    let Some(boundary) = ancestor_at_height(store, entry, boundary_height)? else {
        return Ok(ThresholdState::Defined);
    };
    walk_from(store, dep, &boundary)
}

/// Walks backward from `boundary` (itself a window-boundary entry) along
/// cached states until one is found, then replays every intervening window
/// forward, writing each newly computed state back into the cache.
fn walk_from(
    store: &Store,
    dep: &Deployment,
    boundary: &ChainEntry,
) -> EngineResult<ThresholdState> {
    if let Some(cached) = store.get_deployment_state(dep.bit, &boundary.hash)? {
        return Ok(decode_state(cached));
    }

    let prev_boundary_height = boundary.height.checked_sub(dep.window);
    let prev_state = match prev_boundary_height {
        Some(h) => match ancestor_at_height(store, boundary, h)? {
            Some(prev_entry) => walk_from(store, dep, &prev_entry)?,
            None => ThresholdState::Defined,
        },
        None => ThresholdState::Defined,
    };

    let window_start = ancestor_at_height(
        store,
        boundary,
        boundary.height.saturating_sub(dep.window.saturating_sub(1)),
    )?;
    let window_start_mtp = window_start.map(|e| e.header.time).unwrap_or(0);
    let window_end_mtp = boundary.header.time;

    let signaling = count_signaling(
        &|hash: &Hash, back: u32| -> Option<ChainEntry> {
            ancestor_backwards(store, hash, back)
        },
        boundary,
        dep.window,
        dep.bit,
    );

    let state = transition(dep, prev_state, window_start_mtp, window_end_mtp, signaling);

    let wb = store.begin_write()?;
    wb.put_deployment_state(dep.bit, &boundary.hash, encode_state(state))?;
    wb.commit()?;

    Ok(state)
}

fn ancestor_backwards(store: &Store, from_hash: &Hash, back: u32) -> Option<ChainEntry> {
    let mut cur = store.get_entry(from_hash).ok()??;
    for _ in 0..back {
        cur = store.get_entry(&cur.header.prev_block).ok()??;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_boundary_lands_on_last_block_of_a_completed_window() {
        assert_eq!(window_boundary(143, 144), Some(143));
        assert_eq!(window_boundary(144, 144), Some(143));
        assert_eq!(window_boundary(287, 144), Some(287));
        assert_eq!(window_boundary(10, 144), None);
    }
}
