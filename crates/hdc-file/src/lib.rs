//! Single-file binary container backend for the HDC format.
//!
//! A container file is a flat sequence of node records framed the same way
//! as a pack file:
//!
//! - Header: magic `HDCF`, format version, record count.
//! - One record per node, in path order: a type byte, the varint-framed
//!   absolute path, varint-framed bincode metadata (attributes, dataset
//!   dtype/shape, link targets), and for datasets a zstd-compressed,
//!   CRC32-protected payload of the row-major cell values.
//! - Trailer: BLAKE3 checksum of every preceding byte, verified on open.
//!
//! [`FileStore`] keeps the session state in an in-memory store and
//! persists atomically: the encoded bytes go to a temporary file which is
//! then renamed over the target path, so readers never observe a
//! half-written container.

pub mod error;
pub mod format;
pub mod store;

pub use error::{FileError, FileResult};
pub use format::{decode_store, encode_store, FORMAT_VERSION, MAGIC};
pub use store::FileStore;
