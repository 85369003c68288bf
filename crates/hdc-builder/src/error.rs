use thiserror::Error;

/// Errors from builder tree construction.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A sibling with this name already exists under the parent.
    #[error("name collision: '{name}' already exists in {parent_path}")]
    NameCollision { name: String, parent_path: String },

    /// A region reference was constructed against a non-dataset node.
    #[error("region reference target {path} is not a dataset")]
    InvalidRegionTarget { path: String },

    /// A child was added to a node that is not a group.
    #[error("{path} is not a group")]
    NotAGroup { path: String },
}

/// Result alias for builder tree operations.
pub type BuilderResult<T> = Result<T, BuilderError>;
