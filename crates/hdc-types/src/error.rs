use thiserror::Error;

/// Errors from dtype resolution.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The data is an empty sized collection and no descriptor was given.
    #[error("cannot determine type for empty data")]
    EmptyData,

    /// Neither a descriptor nor sample data was provided.
    #[error("cannot determine type: no dtype and no sample data")]
    NoSample,

    /// Compound records carry no field names, so they cannot be introspected.
    #[error("compound values require an explicit dtype")]
    CompoundWithoutDtype,

    /// A dtype name did not match any known primitive or reference alias.
    #[error("unknown dtype name: {0}")]
    UnknownName(String),
}

/// Result alias for dtype resolution.
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors from shape inference and validation.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// Nested input whose leaf count does not match its inferred shape.
    #[error("ragged nested data: shape {shape:?} implies {expected} elements, found {found}")]
    Ragged {
        shape: Vec<u64>,
        expected: u64,
        found: u64,
    },

    /// One or more axis-equality checks failed. The message lists every
    /// offending pair, not just the first.
    #[error("shape mismatch:\n{0}")]
    Mismatch(String),
}
