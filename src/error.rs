//! Error classification shared by every layer.

use std::fmt;

/// Coarse classification of a failure, independent of the layer that raised it.
///
/// Callers branch on the kind ("does not exist" vs "storage failure" vs
/// "ambiguous prefix") without matching every concrete error enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input field
    Validation,
    /// Name, ID or prefix has no live match
    NotFound,
    /// Prefix matches more than one live object
    Ambiguous,
    /// Write collides with an existing unique key or name
    Conflict,
    /// Backend I/O or encoding failure
    Storage,
    /// Caller-initiated cancellation or an expired deadline
    Cancelled,
    /// Bounded generation loop ran out of attempts
    Exhausted,
    /// Runtime supervisor refused or failed an operation
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::NotFound => "not found",
            Self::Ambiguous => "ambiguous",
            Self::Conflict => "conflict",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::Exhausted => "exhausted",
            Self::Runtime => "runtime",
        };
        f.write_str(name)
    }
}
