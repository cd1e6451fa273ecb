//! `hsc-mempool` — the pending-transaction pool: a bounded, fee-sorted set
//! of transactions valid against the tip-plus-one context, kept consistent
//! with the live chain as blocks connect, disconnect, and reorganize.
//!
//! Mirrors `hsc-engine`'s split between pure verification
//! (`hsc_consensus::validate`/`covenant`) and a stateful driver that layers
//! its own working set over the committed store (`view::PoolView`, the
//! mempool's analogue of `hsc-engine`'s `CoinView`).

pub mod entry;
pub mod error;
pub mod pool;
pub mod reject;
pub mod view;

pub use entry::{ClaimEntry, MempoolEntry, OrphanEntry};
pub use error::{MempoolError, MempoolResult};
pub use pool::{AddOutcome, Mempool};
pub use reject::RejectFilter;

/// Current wall-clock time as Unix seconds. Kept as a crate-level seam, the
/// same way `hsc-engine` threads `now_unix()` into contextual verification,
/// so admission logic stays a function of its arguments in tests.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
