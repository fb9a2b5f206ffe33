//! value representation
//!
//! A resource passes through the pipeline as a [Value] tree:
//! - the decoder produces objects whose leaves are unevaluated [Value::Expression]s
//!   (absent optional fields are [Value::Null])
//! - the evaluator replaces every expression with a concrete value, or with
//!   [Value::Unknown] where the value is only known once the stack is deployed (references)
//! - the encoder turns the remaining concrete values into JSON
//!
//! Objects preserve insertion order, which is the declaration order of the schema fields.
use crate::expression::{Expression, PathStep};
use crate::schema::Shape;
use indexmap::IndexMap;
use serde::{
    ser::{Error as _, SerializeMap, SerializeSeq},
    Serialize, Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(hcl::Number),
    String(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// A value that is only known after deployment
    Unknown,
    /// An expression that has not been evaluated yet
    Expression(Box<Expression>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human readable name of the value's type, as used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "tuple",
            Value::Object(_) => "object",
            Value::Unknown => "unknown",
            Value::Expression(_) => "expression",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn get(&self, step: &PathStep) -> Option<&Value> {
        match (self, step) {
            (Value::Object(entries), PathStep::Attr(name)) => entries.get(name),
            (Value::List(items), PathStep::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(name))
    }

    pub fn get_path(&self, steps: &[PathStep]) -> Option<&Value> {
        steps
            .iter()
            .try_fold(self, |value, step| value.get(step))
    }

    /// Whether the value and all values nested within it are concrete
    pub fn is_known(&self) -> bool {
        match self {
            Value::Unknown | Value::Expression(_) => false,
            Value::List(items) => items.iter().all(Value::is_known),
            Value::Object(entries) => entries.values().all(Value::is_known),
            _ => true,
        }
    }

    /// Converts a concrete value into JSON, `None` if it is not fully known
    pub fn to_json(&self) -> Option<serde_json::Value> {
        if !self.is_known() {
            return None;
        }
        serde_json::to_value(self).ok()
    }

    /// Converts the value to the type described by `shape`
    ///
    /// `null` and unknown values convert to any shape. Primitive types convert into each
    /// other where the conversion is lossless (`12` to `"12"`, `"true"` to `true`).
    pub fn convert(self, shape: &Shape) -> Result<Value, ConversionError> {
        let shape = shape.underlying();
        match (shape, self) {
            (_, value @ (Value::Null | Value::Unknown)) => Ok(value),
            (Shape::String, Value::String(s)) => Ok(Value::String(s)),
            (Shape::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Shape::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (Shape::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (Shape::Number, Value::String(s)) => {
                parse_number(&s).ok_or_else(|| ConversionError::new(shape))
            }
            (Shape::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Shape::Bool, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(ConversionError::new(shape)),
            },
            (Shape::List(element), Value::List(items)) => items
                .into_iter()
                .map(|item| item.convert(element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
                .map_err(|_| ConversionError::new(shape)),
            (Shape::Map(element), Value::Object(entries)) => entries
                .into_iter()
                .map(|(key, value)| Ok((key, value.convert(element)?)))
                .collect::<Result<IndexMap<_, _>, _>>()
                .map(Value::Object)
                .map_err(|_: ConversionError| ConversionError::new(shape)),
            (shape, _) => Err(ConversionError::new(shape)),
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(int) = s.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(hcl::Number::from_f64)
        .map(Value::Number)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{expected} required")]
pub struct ConversionError {
    expected: String,
}

impl ConversionError {
    fn new(shape: &Shape) -> Self {
        Self {
            expected: shape.friendly_name(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<Expression> for Value {
    fn from(value: Expression) -> Self {
        Value::Expression(Box::new(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<hcl::value::Map<K, V>> for Value {
    fn from(value: hcl::value::Map<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => o.into(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Number(value) => value.serialize(serializer),
            Value::String(value) => serializer.serialize_str(value),
            Value::List(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Unknown => Err(S::Error::custom("unknown value cannot be serialized")),
            Value::Expression(_) => Err(S::Error::custom(
                "unevaluated expression cannot be serialized",
            )),
        }
    }
}
