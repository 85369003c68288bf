use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A small attribute payload attachable to any group or dataset: a single
/// scalar value or a fixed-size array of scalars.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Scalar(Value),
    Array(Vec<Value>),
}

impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        AttributeValue::Scalar(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Scalar(Value::Text(v.to_string()))
    }
}

impl From<Vec<Value>> for AttributeValue {
    fn from(v: Vec<Value>) -> Self {
        AttributeValue::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(
            AttributeValue::from("unit"),
            AttributeValue::Scalar(Value::Text("unit".into()))
        );
        assert_eq!(
            AttributeValue::from(vec![Value::Int32(1), Value::Int32(2)]),
            AttributeValue::Array(vec![Value::Int32(1), Value::Int32(2)])
        );
    }
}
