use std::collections::BTreeMap;

use hdc_types::{AttributeValue, Dtype, MaxShape, Selection, Shape, Value};

use crate::error::StorageResult;
use crate::meta::{DatasetMeta, EntryKind};

/// A physical hierarchical container.
///
/// All implementations must satisfy these invariants:
/// - Paths are absolute, `/`-separated, and unique; creating a node over
///   an existing sibling fails, never overwrites.
/// - Reference values (`Value::ObjectRef` / `Value::RegionRef`) are only
///   accepted once their target path physically exists; a region
///   reference target must be a dataset.
/// - Dataset extents grow monotonically, bounded by the declared maximum
///   shape; unwritten cells read as the dtype's fill value.
/// - Links are not followed implicitly: enumeration reports them as link
///   entries and the caller resolves targets.
/// - All errors are propagated, never silently ignored.
pub trait Storage {
    /// Identifier of this physical file/container (the `source` recorded
    /// on builders read from it).
    fn file_id(&self) -> &str;

    // -- write side ---------------------------------------------------------

    /// Create an empty group.
    fn create_group(&mut self, path: &str) -> StorageResult<()>;

    /// Create the group if missing; succeed if it already is a group.
    fn ensure_group(&mut self, path: &str) -> StorageResult<()>;

    /// Create a dataset with a declared element type and extent.
    fn create_dataset(
        &mut self,
        path: &str,
        dtype: Dtype,
        shape: &Shape,
        maxshape: Option<&MaxShape>,
        chunk_shape: Option<&Shape>,
    ) -> StorageResult<()>;

    /// Write the value of a zero-dimensional dataset.
    fn write_scalar(&mut self, path: &str, value: Value) -> StorageResult<()>;

    /// Write row-major values into a selection of the dataset's extent.
    fn write_selection(
        &mut self,
        path: &str,
        selection: &Selection,
        values: &[Value],
    ) -> StorageResult<()>;

    /// Grow the dataset's extent. Shrinking is an error.
    fn resize(&mut self, path: &str, new_shape: &Shape) -> StorageResult<()>;

    /// Set an attribute on a group or dataset.
    fn set_attribute(
        &mut self,
        path: &str,
        name: &str,
        value: AttributeValue,
    ) -> StorageResult<()>;

    /// Create a same-file symbolic link.
    fn create_soft_link(&mut self, path: &str, target_path: &str) -> StorageResult<()>;

    /// Create a cross-file link addressed by file identifier plus path.
    fn create_external_link(
        &mut self,
        path: &str,
        file: &str,
        target_path: &str,
    ) -> StorageResult<()>;

    // -- read side ----------------------------------------------------------

    /// Whether a node exists at the path.
    fn exists(&self, path: &str) -> bool;

    /// The kind of the node at the path.
    fn kind(&self, path: &str) -> StorageResult<EntryKind>;

    /// Named children of a group, with their kinds.
    fn children(&self, path: &str) -> StorageResult<Vec<(String, EntryKind)>>;

    /// All attributes of a node.
    fn attributes(&self, path: &str) -> StorageResult<BTreeMap<String, AttributeValue>>;

    /// Declared metadata of a dataset.
    fn dataset_meta(&self, path: &str) -> StorageResult<DatasetMeta>;

    /// Read the value of a zero-dimensional dataset.
    fn read_scalar(&self, path: &str) -> StorageResult<Value>;

    /// Read row-major values from a selection of the dataset's extent.
    fn read_selection(&self, path: &str, selection: &Selection) -> StorageResult<Vec<Value>>;
}
