use std::sync::Arc;

use hdc_types::{Dtype, MaxShape, Nested, Selection, Shape, ShapeError, Value};

use crate::chunk::ChunkSource;
use crate::container::Container;
use crate::tree::BuilderId;

/// The target of an object or region reference held in a builder tree.
#[derive(Clone, Debug)]
pub enum RefTarget {
    /// A node already materialized in the builder tree.
    Node(BuilderId),
    /// A domain object to be materialized through the build manager when
    /// the reference is finally written.
    Object(Arc<dyn Container>),
}

impl From<BuilderId> for RefTarget {
    fn from(id: BuilderId) -> Self {
        RefTarget::Node(id)
    }
}

/// A handle to a dataset that already exists in physical storage.
///
/// Handing a stored dataset to a second builder produces a link to the
/// existing bytes rather than a copy.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredHandle {
    /// Identifier of the physical file the dataset lives in.
    pub source: String,
    /// Absolute path of the dataset within that file.
    pub path: String,
    pub dtype: Dtype,
    pub shape: Shape,
    pub maxshape: Option<MaxShape>,
}

/// One cell of a compound row: a plain value or an unresolved reference.
#[derive(Clone, Debug)]
pub enum CellValue {
    Plain(Value),
    Ref(RefTarget),
}

impl From<Value> for CellValue {
    fn from(v: Value) -> Self {
        CellValue::Plain(v)
    }
}

/// The payload of a dataset builder.
///
/// One variant per write-dispatch case; the persistence engine matches on
/// this exactly once per dataset rather than re-inspecting the data at
/// each call site.
#[derive(Debug)]
pub enum DatasetValue {
    /// A single scalar, stored zero-dimensional.
    Scalar(Value),
    /// An in-memory sized sequence, row-major.
    Array { values: Vec<Value>, shape: Shape },
    /// A lazily-pulled chunk source for data too large or streaming to
    /// hold in memory at once.
    Chunked(Box<dyn ChunkSource>),
    /// A dataset that already exists in physical storage; written as a
    /// link, never copied.
    Stored(StoredHandle),
    /// A scalar object reference to another node.
    ObjectRef(RefTarget),
    /// A scalar region reference into another dataset's extent.
    Region {
        target: RefTarget,
        selection: Selection,
    },
    /// Compound rows whose cells may mix plain values and references.
    CompoundRows(Vec<Vec<CellValue>>),
}

impl DatasetValue {
    /// Build an in-memory array payload from nested input, inferring the
    /// shape and flattening to row-major order.
    pub fn from_nested(nested: Nested) -> Result<Self, ShapeError> {
        let (values, shape) = hdc_types::flatten(nested)?;
        Ok(DatasetValue::Array { values, shape })
    }

    /// One-dimensional array payload from a value list.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let shape = Shape(vec![values.len() as u64]);
        DatasetValue::Array { values, shape }
    }

    /// Returns `true` for the variants that must be deferred to the
    /// reference queue.
    pub fn is_reference_bearing(&self) -> bool {
        match self {
            DatasetValue::ObjectRef(_) | DatasetValue::Region { .. } => true,
            DatasetValue::CompoundRows(rows) => rows
                .iter()
                .any(|row| row.iter().any(|cell| matches!(cell, CellValue::Ref(_)))),
            _ => false,
        }
    }
}
