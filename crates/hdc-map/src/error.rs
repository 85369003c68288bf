use thiserror::Error;

use hdc_builder::BuilderError;

/// Errors from the object/builder mapping layer.
#[derive(Debug, Error)]
pub enum MapError {
    /// A domain object needed materializing but no mapper is registered.
    #[error("no object mapper is registered with this build manager")]
    MapperMissing,

    /// The schema-layer mapper failed to build or construct an object.
    #[error("object mapper failed: {0}")]
    Mapper(String),

    /// Tree construction failed while materializing an object.
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

/// Result alias for mapping operations.
pub type MapResult<T> = Result<T, MapError>;
