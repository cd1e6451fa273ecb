//! Engine-level errors. A `Verify` failure is attacker-controlled and
//! carries a ban score; every other variant is fatal to the operation in
//! flight and never scored.

use thiserror::Error;

use hsc_consensus::VerifyError;
use hsc_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no chain tip is set")]
    NoTip,

    #[error("unknown previous block {0:?}")]
    UnknownPrev([u8; 32]),

    #[error("fork point not found between {0:?} and {1:?}")]
    NoForkPoint([u8; 32], [u8; 32]),

    #[error("a chain lock was poisoned by a panic in another thread")]
    LockPoisoned,
}

pub type EngineResult<T> = Result<T, EngineError>;
