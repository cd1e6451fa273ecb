//! `hsc-engine` — the stateful chain verifier. Drives candidate blocks
//! through contextual verification against a `hsc-store::Store`, keeping
//! the best-chain index, UTXO set, name trie, and `ChainState` counters
//! consistent across straight extensions, competitor branches, and
//! reorganizations.
//!
//! Mirrors the teacher's split between a pure verification layer and a
//! stateful chain driver: `verify` and `retarget` hold everything that only
//! needs read access to the store, `engine` owns the connect/reorg
//! pipeline and the locking discipline around it.

pub mod coinview;
pub mod deployment;
pub mod engine;
pub mod error;
pub mod lock;
pub mod orphans;
pub mod retarget;
pub mod verify;

pub use engine::{deployments, AddOutcome, ChainEngine};
pub use error::{EngineError, EngineResult};
pub use lock::ChainLock;
pub use orphans::OrphanPool;

/// Current wall-clock time as Unix seconds, threaded into contextual
/// verification's time checks. Kept as a single crate-level seam so
/// `verify_context` itself stays a pure function of its arguments.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
