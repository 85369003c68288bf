use thiserror::Error;

use hdc_builder::BuilderError;
use hdc_map::MapError;
use hdc_store::StorageError;
use hdc_types::{ShapeError, TypeError};

/// Errors surfaced by a read or write session.
#[derive(Debug, Error)]
pub enum IoError {
    /// An underlying create/write call failed; the offending node name
    /// and parent path are attached, the original cause preserved.
    #[error("could not write '{name}' in {parent_path}: {source}")]
    Storage {
        name: String,
        parent_path: String,
        #[source]
        source: StorageError,
    },

    /// A link target can not be addressed: it has no known source and
    /// does not belong to the tree being written.
    #[error("cannot create link to {path}: target has no source")]
    LinkTarget { path: String },

    /// A cross-file link target's file is not attached to this session.
    #[error("external file {file} is not attached to this session")]
    ExternalFileUnavailable { file: String },

    /// The builder handed to `write_builder` is not a group.
    #[error("the root builder must be a group")]
    RootNotAGroup,

    /// The schema cache side table is malformed.
    #[error("schema cache error: {0}")]
    SchemaCache(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Store(#[from] StorageError),
}

impl IoError {
    /// Wrap a storage failure with the offending name and parent path.
    pub(crate) fn storage(name: &str, parent_path: &str, source: StorageError) -> Self {
        IoError::Storage {
            name: name.to_string(),
            parent_path: parent_path.to_string(),
            source,
        }
    }
}

/// Result alias for session operations.
pub type IoResult<T> = Result<T, IoError>;
