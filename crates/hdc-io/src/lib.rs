//! Persistence engine for the HDC container.
//!
//! [`ContainerSession`] walks a builder tree into a physical hierarchical
//! store (write) or a physical store into a builder tree (read). One
//! session owns one primary backend, one
//! [`BuildManager`](hdc_map::BuildManager) and the deferred reference
//! queue for the duration of a read or write pass.
//!
//! # Write ordering
//!
//! Within one write session, structural writes (groups, datasets, links,
//! attributes) happen before any deferred reference write; the queue is
//! drained strictly after the structural pass. No ordering is guaranteed
//! between sibling nodes, and each deferred action is self-contained --
//! it never depends on another queued action having run.
//!
//! # Failure semantics
//!
//! A failed write leaves the store partially written; the engine does not
//! roll back. Callers needing atomicity write to a temporary location and
//! swap (the file backend's `persist` does exactly this).

pub mod error;
pub mod reader;
pub mod refqueue;
pub mod schema_cache;
pub mod session;
pub mod writer;

pub use error::{IoError, IoResult};
pub use schema_cache::{DEFAULT_SCHEMA_GROUP, NAMESPACE_DATASET, SCHEMA_LOC_ATTR};
pub use session::ContainerSession;
