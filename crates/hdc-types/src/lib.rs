//! Value, dtype, shape and selection primitives for the HDC container.
//!
//! This crate is the vocabulary shared by every other HDC crate:
//!
//! - [`Value`] -- a single stored cell (integer, float, text, bytes,
//!   reference, or compound record)
//! - [`Dtype`] / [`DtypeSpec`] -- concrete storage types and the abstract
//!   descriptors they are resolved from
//! - [`Shape`] / [`Nested`] -- n-dimensional extents and the nested
//!   scalar-or-sequence input they are inferred from
//! - [`Selection`] -- index selections into a dataset's extent
//! - [`AttributeValue`] -- small scalar or fixed-array attribute payloads
//!
//! # Resolution contract
//!
//! [`resolve_dtype`] preserves the declared fallback order for partially
//! specified schemas: an explicit descriptor always wins; only when the
//! descriptor is absent is the sample data introspected. An empty, untyped
//! collection cannot be resolved and fails with [`TypeError::EmptyData`].

pub mod attribute;
pub mod dtype;
pub mod error;
pub mod selection;
pub mod shape;
pub mod value;

pub use attribute::AttributeValue;
pub use dtype::{resolve_dtype, Dtype, DtypeField, DtypeSpec, Field, PrimitiveType, RefKind};
pub use error::{ShapeError, TypeError, TypeResult};
pub use selection::Selection;
pub use shape::{flatten, infer_shape, MaxShape, Shape, ShapeValidator};
pub use value::{Nested, ObjectRef, RegionRef, Value};
