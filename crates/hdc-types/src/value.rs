use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selection::Selection;

/// A stored pointer-by-path to an entire group or dataset elsewhere in the
/// same container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Absolute path of the referenced node.
    pub path: String,
}

impl ObjectRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref:{}", self.path)
    }
}

/// A stored pointer-by-path plus index selection into a sub-region of a
/// dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRef {
    /// Absolute path of the referenced dataset.
    pub path: String,
    /// The selected sub-region of the dataset's extent.
    pub selection: Selection,
}

impl RegionRef {
    pub fn new(path: impl Into<String>, selection: Selection) -> Self {
        Self {
            path: path.into(),
            selection,
        }
    }
}

/// A single stored cell.
///
/// `Value` is the unit the storage boundary traffics in: dataset cells,
/// scalar datasets and attribute payloads are all values. Compound records
/// hold their cells in field order; the field names live in the dataset's
/// [`Dtype`](crate::Dtype), not in the value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw ASCII / byte-string data.
    Bytes(Vec<u8>),
    /// Whole-object reference.
    ObjectRef(ObjectRef),
    /// Sub-region reference.
    RegionRef(RegionRef),
    /// Compound record cells, in field order.
    Compound(Vec<Value>),
}

impl Value {
    /// Returns `true` for object and region reference values.
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::ObjectRef(_) | Value::RegionRef(_))
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt8(_) => "uint8",
            Value::UInt16(_) => "uint16",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::ObjectRef(_) => "object-ref",
            Value::RegionRef(_) => "region-ref",
            Value::Compound(_) => "compound",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Nested scalar-or-sequence input, as handed over by the schema layer.
///
/// Shape inference and dtype introspection walk this tree; see
/// [`infer_shape`](crate::infer_shape) and
/// [`resolve_dtype`](crate::resolve_dtype).
#[derive(Clone, Debug, PartialEq)]
pub enum Nested {
    Scalar(Value),
    Seq(Vec<Nested>),
}

impl Nested {
    /// Convenience constructor for a flat sequence of scalars.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Nested::Seq(
            values
                .into_iter()
                .map(|v| Nested::Scalar(v.into()))
                .collect(),
        )
    }
}
