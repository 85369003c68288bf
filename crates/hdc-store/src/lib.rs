//! Hierarchical storage boundary for the HDC container.
//!
//! This crate models the physical store abstractly: named child groups,
//! named child datasets with a declared element type / shape / maximum
//! shape / chunk shape, attributes on groups and datasets, same-file soft
//! links, cross-file external links, and the two reference value kinds
//! (whole-object and sub-region).
//!
//! All backends implement the [`Storage`] trait:
//!
//! - [`MemoryStore`] -- map-based store for tests and embedding
//! - `FileStore` (in `hdc-file`) -- single-file binary container
//!
//! # Design rules
//!
//! 1. Creating a node whose name collides with an existing sibling is an
//!    error, never a silent overwrite.
//! 2. Reference values are validated at write time: the target path must
//!    already exist, and a region reference target must be a dataset.
//! 3. Extent growth is monotonic and bounded by the declared maximum
//!    shape.
//! 4. All errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod meta;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use meta::{basename, join_path, parent_path, DatasetMeta, EntryKind};
pub use traits::Storage;
