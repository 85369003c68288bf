//! Format-agnostic builder tree for the HDC container.
//!
//! The builder tree is the intermediate representation that decouples the
//! domain object model from the physical storage format. The schema layer
//! populates a tree of named nodes -- groups, typed n-dimensional datasets
//! and links -- and hands its root to the persistence engine; the read-side
//! walker produces the same representation from a physical store.
//!
//! # Arena
//!
//! Nodes live in a session-scoped [`BuilderTree`] arena and are addressed
//! by copyable [`BuilderId`] handles. A node's `parent` is a plain id
//! back-reference, never an owning pointer, so ownership stays strictly
//! top-down while paths remain computable from any node. One arena may hold
//! several roots (one per physical file seen in a session), which is what
//! makes cross-file links representable.
//!
//! # Invariants
//!
//! - Sibling names are unique across a group's sub-groups, datasets and
//!   links; collisions fail with the offending name and parent path.
//! - Links and references are non-owning: a node referenced from many
//!   places is owned by exactly one group.
//! - A region reference target must be a dataset node.

pub mod chunk;
pub mod container;
pub mod data;
pub mod error;
pub mod tree;

pub use chunk::{BufferedValueSource, ChunkSource, DataChunk};
pub use container::{Container, ContainerKey};
pub use data::{CellValue, DatasetValue, RefTarget, StoredHandle};
pub use error::{BuilderError, BuilderResult};
pub use tree::{
    BuilderId, BuilderNode, BuilderPayload, BuilderTree, DatasetNode, GroupNode, LinkNode,
    ROOT_NAME,
};
