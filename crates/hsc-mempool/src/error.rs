use hsc_consensus::{Hash, VerifyError};
use hsc_store::StoreError;

/// Every way a candidate transaction can fail to enter (or stay in) the
/// pool. Wraps `VerifyError` for anything the consensus core itself would
/// reject; the pool-specific variants are its own admission policy.
#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transaction {0:?} already in the pool")]
    AlreadyInPool(Hash),

    #[error("transaction {0:?} conflicts with an already-pooled spend")]
    Conflict(Hash),

    #[error("name already has a pending entry in the pool")]
    NameReserved,

    #[error("orphan pool is full")]
    OrphanPoolFull,

    #[error("pool is at capacity and this transaction's fee rate doesn't clear the eviction floor")]
    PoolFull,

    #[error("lock poisoned")]
    LockPoisoned,
}

pub type MempoolResult<T> = Result<T, MempoolError>;
