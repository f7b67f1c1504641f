use std::fmt;

/// An error produced by a [`Map`](crate::Map) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The id's index would exceed [`MAX_OBJECTS`](crate::MAX_OBJECTS), or the
    /// backing storage could not grow any further.
    NoSpace,
    /// The request was ill-formed: a non-contiguous `insert_at`, a `reserve_new`
    /// for the wrong side, or a `reserve_new` on a slot that is not free.
    Invalid,
    /// The id named a slot beyond the end of the table.
    OutOfRange,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::NoSpace => write!(f, "object id space exhausted"),
            MapError::Invalid => write!(f, "invalid object id map request"),
            MapError::OutOfRange => write!(f, "object id out of range"),
        }
    }
}

impl std::error::Error for MapError {}
