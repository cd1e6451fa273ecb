use core::fmt;

/// Broad classification of a verification failure. `Invalid` failures that
/// are not `malleated` get their block hash cached in an LRU invalid-set so
/// descendants are rejected without revalidation; `Duplicate`/`AlreadyKnown`
/// are expected outcomes and are never cached as rejects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Invalid,
    Checkpoint,
    Duplicate,
    AlreadyKnown,
    Nonstandard,
    InsufficientFee,
    HighFee,
    Malformed,
}

/// A single typed verification failure, carrying a machine-readable reason
/// code and the ban-score increment a caller should apply to the peer that
/// supplied the offending block or transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyError {
    pub kind: ErrorKind,
    pub reason: &'static str,
    pub score: u8,
    /// Set when the failure could be an artifact of transaction malleability
    /// rather than genuine invalidity — such failures must not be cached in
    /// the invalid-block set.
    pub malleated: bool,
}

impl VerifyError {
    pub const fn new(kind: ErrorKind, reason: &'static str, score: u8) -> Self {
        VerifyError {
            kind,
            reason,
            score,
            malleated: false,
        }
    }

    pub const fn malleated(kind: ErrorKind, reason: &'static str, score: u8) -> Self {
        VerifyError {
            kind,
            reason,
            score,
            malleated: true,
        }
    }

    pub const fn invalid(reason: &'static str) -> Self {
        Self::new(ErrorKind::Invalid, reason, 100)
    }

    pub const fn duplicate(reason: &'static str) -> Self {
        Self::new(ErrorKind::Duplicate, reason, 0)
    }

    /// A block conflicts with a hardcoded checkpoint hash, or falls at or
    /// below a checkpoint height without matching it.
    pub const fn checkpoint(reason: &'static str) -> Self {
        Self::new(ErrorKind::Checkpoint, reason, 100)
    }

    pub const fn already_known(reason: &'static str) -> Self {
        Self::new(ErrorKind::AlreadyKnown, reason, 0)
    }

    pub const fn nonstandard(reason: &'static str) -> Self {
        Self::new(ErrorKind::Nonstandard, reason, 0)
    }

    pub const fn malformed(reason: &'static str) -> Self {
        Self::new(ErrorKind::Malformed, reason, 100)
    }

    /// Should this failure be remembered so descendants skip revalidation?
    pub fn cacheable(&self) -> bool {
        matches!(self.kind, ErrorKind::Invalid) && !self.malleated
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {} (score {})", self.kind, self.reason, self.score)
    }
}

impl std::error::Error for VerifyError {}
