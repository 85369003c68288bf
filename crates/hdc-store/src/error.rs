use thiserror::Error;

/// Errors from storage backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The addressed node does not exist.
    #[error("node not found: {path}")]
    NotFound { path: String },

    /// A node already exists at the target path.
    #[error("node already exists: {path}")]
    AlreadyExists { path: String },

    /// The parent of the target path does not exist.
    #[error("parent group not found for {path}")]
    MissingParent { path: String },

    /// The addressed node is not a group.
    #[error("{path} is not a group")]
    NotAGroup { path: String },

    /// The addressed node is not a dataset.
    #[error("{path} is not a dataset")]
    NotADataset { path: String },

    /// A reference value points at a path with no node behind it.
    #[error("reference target does not exist: {path}")]
    DanglingReference { path: String },

    /// A selection addresses cells beyond the dataset's current extent.
    #[error(
        "selection out of bounds for {path}: axis {axis} requires extent {required}, have {extent}"
    )]
    OutOfBounds {
        path: String,
        axis: usize,
        required: u64,
        extent: u64,
    },

    /// A resize would exceed the declared maximum shape.
    #[error("dataset {path} cannot grow beyond its maximum extent on axis {axis}")]
    MaxShapeExceeded { path: String, axis: usize },

    /// Extents only grow; shrinking is not supported.
    #[error("cannot shrink dataset {path} on axis {axis} from {from} to {to}")]
    ShrinkNotAllowed {
        path: String,
        axis: usize,
        from: u64,
        to: u64,
    },

    /// A shape or selection has the wrong number of dimensions.
    #[error("dimension mismatch for {path}: expected {expected} dimensions, got {actual}")]
    DimensionMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    /// The number of supplied values disagrees with the selection size.
    #[error("value count mismatch for {path}: selection addresses {expected} cells, got {actual}")]
    CountMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// I/O error from an underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
