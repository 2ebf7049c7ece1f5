use crate::extent::Extent;

/// All errors that can occur within weft.
///
/// Shape, axis, and size violations are contract failures detected eagerly at
/// the API boundary — they are reported as typed errors before any shared
/// storage is touched. Deserialization of malformed bytes is handled
/// separately (see [`crate::serialize::deserialize`]) and degrades to `None`
/// instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation is undefined for this shape/type combination
    /// (e.g., taking a window of an already rank-reduced tensor).
    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    /// Two tensors expected to conform in shape do not.
    /// Carries both shapes for diagnostics.
    #[error("size mismatch: {lhs} vs {rhs}")]
    SizeMismatch { lhs: Extent, rhs: Extent },

    /// Axis argument outside `[0, rank)`.
    #[error("illegal axis: {axis} for tensor with {rank} dimensions")]
    IllegalAxis { axis: usize, rank: usize },

    /// Element count mismatch when building a tensor from a flat array.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Extent,
        expected: usize,
        got: usize,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout weft.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
