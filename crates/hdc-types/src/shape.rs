use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;
use crate::value::{Nested, Value};

/// Per-dimension upper bounds for a growable dataset; `None` means the
/// dimension is unbounded.
pub type MaxShape = Vec<Option<u64>>;

/// An n-dimensional extent. A zero-dimensional shape is a scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape(pub Vec<u64>);

impl Shape {
    /// The scalar (zero-dimensional) shape.
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the zero-dimensional shape.
    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Total element count (product of extents; 1 for a scalar).
    pub fn element_count(&self) -> u64 {
        self.0.iter().product()
    }

    /// Extent along one axis, if the axis exists.
    pub fn axis(&self, axis: usize) -> Option<u64> {
        self.0.get(axis).copied()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, extent) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{extent}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<u64>> for Shape {
    fn from(dims: Vec<u64>) -> Self {
        Shape(dims)
    }
}

/// Infer the shape of nested input by successive length lookups.
///
/// Descends into the first element of each sequence until a non-sized
/// element is reached. An empty sequence terminates the descent with a
/// zero extent at that depth.
pub fn infer_shape(nested: &Nested) -> Shape {
    let mut dims = Vec::new();
    let mut cursor = nested;
    loop {
        match cursor {
            Nested::Scalar(_) => break,
            Nested::Seq(items) => {
                dims.push(items.len() as u64);
                match items.first() {
                    Some(first) => cursor = first,
                    None => break,
                }
            }
        }
    }
    Shape(dims)
}

/// Flatten nested input into row-major values plus its inferred shape.
///
/// Fails with [`ShapeError::Ragged`] if the leaf count disagrees with the
/// inferred shape (i.e. the nesting is not rectangular).
pub fn flatten(nested: Nested) -> Result<(Vec<Value>, Shape), ShapeError> {
    let shape = infer_shape(&nested);
    let mut values = Vec::new();
    collect_leaves(nested, &mut values);
    let expected = shape.element_count();
    if values.len() as u64 != expected {
        return Err(ShapeError::Ragged {
            shape: shape.0.clone(),
            expected,
            found: values.len() as u64,
        });
    }
    Ok((values, shape))
}

fn collect_leaves(nested: Nested, out: &mut Vec<Value>) {
    match nested {
        Nested::Scalar(v) => out.push(v),
        Nested::Seq(items) => {
            for item in items {
                collect_leaves(item, out);
            }
        }
    }
}

/// Accumulates axis-equality checks between structurally correlated arrays
/// and reports every failure in one combined error.
///
/// Checks against an undetermined shape (`None`) are skipped rather than
/// failed, so streaming sources with unknown extents can participate.
#[derive(Debug, Default)]
pub struct ShapeValidator {
    mismatches: Vec<String>,
}

impl ShapeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `shape1[axis1] == shape2[axis2]`.
    pub fn assert_axis_eq(
        &mut self,
        name1: &str,
        shape1: Option<&Shape>,
        axis1: usize,
        name2: &str,
        shape2: Option<&Shape>,
        axis2: usize,
    ) {
        let (Some(s1), Some(s2)) = (shape1, shape2) else {
            return;
        };
        let (Some(len1), Some(len2)) = (s1.axis(axis1), s2.axis(axis2)) else {
            return;
        };
        if len1 != len2 {
            self.mismatches.push(format!(
                "{name2} (axis {axis2}, length {len2}) does not match {name1} (axis {axis1}, length {len1})"
            ));
        }
    }

    /// Returns the accumulated result: `Ok` if every check passed, or a
    /// single [`ShapeError::Mismatch`] listing all offending pairs.
    pub fn finish(self) -> Result<(), ShapeError> {
        if self.mismatches.is_empty() {
            Ok(())
        } else {
            Err(ShapeError::Mismatch(self.mismatches.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uniform(dims: &[u64]) -> Nested {
        match dims.split_first() {
            None => Nested::Scalar(Value::Int32(0)),
            Some((&n, rest)) => Nested::Seq((0..n).map(|_| uniform(rest)).collect()),
        }
    }

    #[test]
    fn scalar_shape_is_empty() {
        let n = Nested::Scalar(Value::Float64(1.0));
        assert_eq!(infer_shape(&n), Shape::scalar());
        assert!(infer_shape(&n).is_scalar());
    }

    #[test]
    fn one_dimensional_shape() {
        let n = Nested::from_values([1i32, 2, 3, 4]);
        assert_eq!(infer_shape(&n), Shape(vec![4]));
    }

    #[test]
    fn nested_shape_uses_first_elements() {
        let n = Nested::Seq(vec![
            Nested::from_values([1i32, 2, 3]),
            Nested::from_values([4i32, 5, 6]),
        ]);
        assert_eq!(infer_shape(&n), Shape(vec![2, 3]));
    }

    #[test]
    fn empty_sequence_terminates_with_zero_extent() {
        let n = Nested::Seq(vec![]);
        assert_eq!(infer_shape(&n), Shape(vec![0]));
    }

    #[test]
    fn flatten_rectangular() {
        let n = Nested::Seq(vec![
            Nested::from_values([1i32, 2]),
            Nested::from_values([3i32, 4]),
        ]);
        let (values, shape) = flatten(n).unwrap();
        assert_eq!(shape, Shape(vec![2, 2]));
        assert_eq!(
            values,
            vec![
                Value::Int32(1),
                Value::Int32(2),
                Value::Int32(3),
                Value::Int32(4)
            ]
        );
    }

    #[test]
    fn flatten_ragged_fails() {
        let n = Nested::Seq(vec![
            Nested::from_values([1i32, 2, 3]),
            Nested::from_values([4i32]),
        ]);
        let err = flatten(n).unwrap_err();
        assert!(matches!(err, ShapeError::Ragged { .. }));
    }

    #[test]
    fn shape_display() {
        assert_eq!(format!("{}", Shape(vec![10, 5, 3])), "(10, 5, 3)");
        assert_eq!(format!("{}", Shape::scalar()), "()");
    }

    // -----------------------------------------------------------------------
    // ShapeValidator
    // -----------------------------------------------------------------------

    #[test]
    fn feature_extraction_scenario_passes() {
        let features = Shape(vec![10, 5, 3]);
        let times = Shape(vec![10]);
        let electrodes = Shape(vec![5]);
        let description = Shape(vec![3]);

        let mut v = ShapeValidator::new();
        v.assert_axis_eq("features", Some(&features), 0, "times", Some(&times), 0);
        v.assert_axis_eq(
            "features",
            Some(&features),
            1,
            "electrodes",
            Some(&electrodes),
            0,
        );
        v.assert_axis_eq(
            "features",
            Some(&features),
            2,
            "description",
            Some(&description),
            0,
        );
        assert!(v.finish().is_ok());
    }

    #[test]
    fn feature_extraction_scenario_reports_times_axis() {
        let features = Shape(vec![10, 5, 3]);
        let times = Shape(vec![9]);

        let mut v = ShapeValidator::new();
        v.assert_axis_eq("features", Some(&features), 0, "times", Some(&times), 0);
        let err = v.finish().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("times"), "message was: {msg}");
        assert!(msg.contains("axis 0"), "message was: {msg}");
    }

    #[test]
    fn all_mismatches_reported_together() {
        let features = Shape(vec![10, 5, 3]);
        let times = Shape(vec![9]);
        let description = Shape(vec![4]);

        let mut v = ShapeValidator::new();
        v.assert_axis_eq("features", Some(&features), 0, "times", Some(&times), 0);
        v.assert_axis_eq(
            "features",
            Some(&features),
            2,
            "description",
            Some(&description),
            0,
        );
        let msg = v.finish().unwrap_err().to_string();
        assert!(msg.contains("times"));
        assert!(msg.contains("description"));
    }

    #[test]
    fn undetermined_shapes_are_skipped() {
        let features = Shape(vec![10]);
        let mut v = ShapeValidator::new();
        v.assert_axis_eq("features", Some(&features), 0, "stream", None, 0);
        v.assert_axis_eq("features", Some(&features), 7, "other", Some(&features), 0);
        assert!(v.finish().is_ok());
    }

    proptest! {
        #[test]
        fn inferred_shape_matches_construction(dims in proptest::collection::vec(1u64..5, 0..4)) {
            let nested = uniform(&dims);
            prop_assert_eq!(infer_shape(&nested), Shape(dims.clone()));
            let (values, shape) = flatten(nested).unwrap();
            prop_assert_eq!(values.len() as u64, shape.element_count());
        }
    }
}
