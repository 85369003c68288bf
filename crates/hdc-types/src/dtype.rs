use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::value::{Nested, Value};

/// Fixed set of primitive storage types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Variable-length UTF-8 text.
    Utf8,
    /// Variable-length ASCII / byte strings.
    Ascii,
}

/// The two reference kinds a dataset cell can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    /// Whole-dataset/group object reference.
    Object,
    /// Sub-region reference (dataset + index selection).
    Region,
}

/// One named sub-field of a compound descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtypeField {
    pub name: String,
    pub spec: DtypeSpec,
}

impl DtypeField {
    pub fn new(name: impl Into<String>, spec: DtypeSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Abstract type descriptor: a primitive tag, a reference-kind tag, or an
/// ordered list of named sub-fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtypeSpec {
    Primitive(PrimitiveType),
    Ref(RefKind),
    Compound(Vec<DtypeField>),
}

impl DtypeSpec {
    /// Parse a descriptor from a spec-layer name.
    ///
    /// Accepts the historical aliases: `float` is 32-bit, `double` is
    /// 64-bit, `long` is a 64-bit integer, `int` a 32-bit one, and the
    /// text/ascii/reference spellings all collapse onto their canonical
    /// tags.
    pub fn parse(name: &str) -> TypeResult<Self> {
        let spec = match name {
            "float" | "float32" => DtypeSpec::Primitive(PrimitiveType::Float32),
            "double" | "float64" => DtypeSpec::Primitive(PrimitiveType::Float64),
            "long" | "int64" => DtypeSpec::Primitive(PrimitiveType::Int64),
            "int" | "int32" => DtypeSpec::Primitive(PrimitiveType::Int32),
            "int16" => DtypeSpec::Primitive(PrimitiveType::Int16),
            "int8" => DtypeSpec::Primitive(PrimitiveType::Int8),
            "uint64" => DtypeSpec::Primitive(PrimitiveType::UInt64),
            "uint32" => DtypeSpec::Primitive(PrimitiveType::UInt32),
            "uint16" => DtypeSpec::Primitive(PrimitiveType::UInt16),
            "uint8" => DtypeSpec::Primitive(PrimitiveType::UInt8),
            "text" | "utf" | "utf8" | "utf-8" => DtypeSpec::Primitive(PrimitiveType::Utf8),
            "ascii" | "str" => DtypeSpec::Primitive(PrimitiveType::Ascii),
            "ref" | "reference" | "object" => DtypeSpec::Ref(RefKind::Object),
            "region" => DtypeSpec::Ref(RefKind::Region),
            other => return Err(TypeError::UnknownName(other.to_string())),
        };
        Ok(spec)
    }

    /// Returns `true` if this descriptor is (or contains, for compounds) a
    /// reference type.
    pub fn has_refs(&self) -> bool {
        match self {
            DtypeSpec::Primitive(_) => false,
            DtypeSpec::Ref(_) => true,
            DtypeSpec::Compound(fields) => fields.iter().any(|f| f.spec.has_refs()),
        }
    }
}

/// One named sub-field of a concrete compound type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: Dtype,
}

/// A concrete storage type, as declared to the physical store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Ascii,
    ObjectRef,
    RegionRef,
    Compound(Vec<Field>),
}

impl Dtype {
    /// Returns `true` for the two reference types.
    pub fn is_ref(&self) -> bool {
        matches!(self, Dtype::ObjectRef | Dtype::RegionRef)
    }

    /// The fill value for cells that were grown into existence but never
    /// written.
    pub fn fill_value(&self) -> Value {
        match self {
            Dtype::Int8 => Value::Int8(0),
            Dtype::Int16 => Value::Int16(0),
            Dtype::Int32 => Value::Int32(0),
            Dtype::Int64 => Value::Int64(0),
            Dtype::UInt8 => Value::UInt8(0),
            Dtype::UInt16 => Value::UInt16(0),
            Dtype::UInt32 => Value::UInt32(0),
            Dtype::UInt64 => Value::UInt64(0),
            Dtype::Float32 => Value::Float32(0.0),
            Dtype::Float64 => Value::Float64(0.0),
            Dtype::Utf8 => Value::Text(String::new()),
            Dtype::Ascii => Value::Bytes(Vec::new()),
            Dtype::ObjectRef => Value::ObjectRef(crate::value::ObjectRef::new("")),
            Dtype::RegionRef => Value::RegionRef(crate::value::RegionRef::new(
                "",
                crate::selection::Selection::All,
            )),
            Dtype::Compound(fields) => {
                Value::Compound(fields.iter().map(|f| f.dtype.fill_value()).collect())
            }
        }
    }
}

impl From<PrimitiveType> for Dtype {
    fn from(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Int8 => Dtype::Int8,
            PrimitiveType::Int16 => Dtype::Int16,
            PrimitiveType::Int32 => Dtype::Int32,
            PrimitiveType::Int64 => Dtype::Int64,
            PrimitiveType::UInt8 => Dtype::UInt8,
            PrimitiveType::UInt16 => Dtype::UInt16,
            PrimitiveType::UInt32 => Dtype::UInt32,
            PrimitiveType::UInt64 => Dtype::UInt64,
            PrimitiveType::Float32 => Dtype::Float32,
            PrimitiveType::Float64 => Dtype::Float64,
            PrimitiveType::Utf8 => Dtype::Utf8,
            PrimitiveType::Ascii => Dtype::Ascii,
        }
    }
}

impl From<RefKind> for Dtype {
    fn from(r: RefKind) -> Self {
        match r {
            RefKind::Object => Dtype::ObjectRef,
            RefKind::Region => Dtype::RegionRef,
        }
    }
}

/// Resolve an abstract descriptor plus sample data into a concrete type.
///
/// The explicit descriptor always wins; only when it is absent is the
/// sample introspected: text maps to [`Dtype::Utf8`], sequences recurse
/// into their first element until a scalar is reached, and an empty sized
/// collection fails with [`TypeError::EmptyData`].
pub fn resolve_dtype(spec: Option<&DtypeSpec>, sample: Option<&Nested>) -> TypeResult<Dtype> {
    match spec {
        Some(spec) => Ok(concretize(spec)),
        None => match sample {
            Some(sample) => introspect(sample),
            None => Err(TypeError::NoSample),
        },
    }
}

fn concretize(spec: &DtypeSpec) -> Dtype {
    match spec {
        DtypeSpec::Primitive(p) => (*p).into(),
        DtypeSpec::Ref(r) => (*r).into(),
        DtypeSpec::Compound(fields) => Dtype::Compound(
            fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    dtype: concretize(&f.spec),
                })
                .collect(),
        ),
    }
}

fn introspect(sample: &Nested) -> TypeResult<Dtype> {
    match sample {
        Nested::Scalar(v) => scalar_dtype(v),
        Nested::Seq(items) => match items.first() {
            Some(first) => introspect(first),
            None => Err(TypeError::EmptyData),
        },
    }
}

fn scalar_dtype(v: &Value) -> TypeResult<Dtype> {
    let dtype = match v {
        Value::Int8(_) => Dtype::Int8,
        Value::Int16(_) => Dtype::Int16,
        Value::Int32(_) => Dtype::Int32,
        Value::Int64(_) => Dtype::Int64,
        Value::UInt8(_) => Dtype::UInt8,
        Value::UInt16(_) => Dtype::UInt16,
        Value::UInt32(_) => Dtype::UInt32,
        Value::UInt64(_) => Dtype::UInt64,
        Value::Float32(_) => Dtype::Float32,
        Value::Float64(_) => Dtype::Float64,
        Value::Text(_) => Dtype::Utf8,
        Value::Bytes(_) => Dtype::Ascii,
        Value::ObjectRef(_) => Dtype::ObjectRef,
        Value::RegionRef(_) => Dtype::RegionRef,
        Value::Compound(_) => return Err(TypeError::CompoundWithoutDtype),
    };
    Ok(dtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!(
            DtypeSpec::parse("float").unwrap(),
            DtypeSpec::Primitive(PrimitiveType::Float32)
        );
        assert_eq!(
            DtypeSpec::parse("double").unwrap(),
            DtypeSpec::Primitive(PrimitiveType::Float64)
        );
        assert_eq!(
            DtypeSpec::parse("long").unwrap(),
            DtypeSpec::Primitive(PrimitiveType::Int64)
        );
        assert_eq!(
            DtypeSpec::parse("utf-8").unwrap(),
            DtypeSpec::Primitive(PrimitiveType::Utf8)
        );
        assert_eq!(
            DtypeSpec::parse("object").unwrap(),
            DtypeSpec::Ref(RefKind::Object)
        );
        assert_eq!(
            DtypeSpec::parse("region").unwrap(),
            DtypeSpec::Ref(RefKind::Region)
        );
    }

    #[test]
    fn parse_unknown_name() {
        let err = DtypeSpec::parse("complex128").unwrap_err();
        assert!(matches!(err, TypeError::UnknownName(_)));
    }

    #[test]
    fn explicit_descriptor_wins_over_sample() {
        let sample = Nested::from_values([1.5f64, 2.5]);
        let dtype = resolve_dtype(
            Some(&DtypeSpec::Primitive(PrimitiveType::Int16)),
            Some(&sample),
        )
        .unwrap();
        assert_eq!(dtype, Dtype::Int16);
    }

    #[test]
    fn fallback_introspects_floats() {
        let sample = Nested::from_values([1.5f64, 2.5]);
        let dtype = resolve_dtype(None, Some(&sample)).unwrap();
        assert_eq!(dtype, Dtype::Float64);
    }

    #[test]
    fn fallback_introspects_strings() {
        let sample = Nested::from_values(["a", "b"]);
        assert_eq!(resolve_dtype(None, Some(&sample)).unwrap(), Dtype::Utf8);
    }

    #[test]
    fn fallback_recurses_into_nested_sequences() {
        let sample = Nested::Seq(vec![Nested::from_values([1i32, 2]), Nested::from_values([3i32, 4])]);
        assert_eq!(resolve_dtype(None, Some(&sample)).unwrap(), Dtype::Int32);
    }

    #[test]
    fn empty_untyped_collection_fails() {
        let sample = Nested::Seq(vec![]);
        let err = resolve_dtype(None, Some(&sample)).unwrap_err();
        assert!(matches!(err, TypeError::EmptyData));
    }

    #[test]
    fn no_descriptor_no_sample_fails() {
        assert!(matches!(resolve_dtype(None, None), Err(TypeError::NoSample)));
    }

    #[test]
    fn compound_descriptor_resolves_recursively() {
        let spec = DtypeSpec::Compound(vec![
            DtypeField::new("id", DtypeSpec::Primitive(PrimitiveType::Int64)),
            DtypeField::new("label", DtypeSpec::Primitive(PrimitiveType::Utf8)),
            DtypeField::new("source", DtypeSpec::Ref(RefKind::Object)),
        ]);
        let dtype = resolve_dtype(Some(&spec), None).unwrap();
        match dtype {
            Dtype::Compound(fields) => {
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[0].dtype, Dtype::Int64);
                assert_eq!(fields[2].dtype, Dtype::ObjectRef);
            }
            other => panic!("expected compound, got {other:?}"),
        }
        assert!(spec.has_refs());
    }

    #[test]
    fn compound_sample_requires_descriptor() {
        let sample = Nested::Scalar(Value::Compound(vec![Value::Int32(1)]));
        let err = resolve_dtype(None, Some(&sample)).unwrap_err();
        assert!(matches!(err, TypeError::CompoundWithoutDtype));
    }

    #[test]
    fn fill_values_match_dtype() {
        assert_eq!(Dtype::Int32.fill_value(), Value::Int32(0));
        assert_eq!(Dtype::Utf8.fill_value(), Value::Text(String::new()));
        let compound = Dtype::Compound(vec![Field {
            name: "x".into(),
            dtype: Dtype::Float64,
        }]);
        assert_eq!(
            compound.fill_value(),
            Value::Compound(vec![Value::Float64(0.0)])
        );
    }
}
