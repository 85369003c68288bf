use serde::{Deserialize, Serialize};

use hdc_types::{Dtype, MaxShape, Shape};

/// The kind of a stored child entry, as seen during enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Group,
    Dataset,
    /// Same-file symbolic link by absolute path.
    SoftLink { target: String },
    /// Cross-file link by (file identifier, absolute path).
    ExternalLink { file: String, target: String },
}

/// Declared metadata of a stored dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub dtype: Dtype,
    pub shape: Shape,
    pub maxshape: MaxShape,
    pub chunk_shape: Option<Shape>,
}

/// Join an absolute parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// The parent of an absolute path; the root's parent is the root itself.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// The final component of an absolute path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
