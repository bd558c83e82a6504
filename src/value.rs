//! Transport-neutral property values and a typed decoder for them.
//!
//! Replies from the bus are converted into [`Value`] by the transport. Callers
//! then pull typed fields out with [`Field`], which keeps "key absent",
//! "wrong type" and "present and valid" apart instead of silently defaulting.

use std::collections::HashMap;

/// Subset of bus value types that MPRIS properties use.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty reply body (method calls without a return value).
    Unit,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    StrList(Vec<String>),
    List(Vec<Value>),
    Dict(HashMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::StrList(_) => "string list",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Conversion from a [`Value`] into a concrete type. Returns `None` on a type mismatch.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::StrList(v) => Some(v.clone()),
            // An empty `as` array carries no element type once converted.
            Value::List(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I64(i) => Some(*i),
            Value::U64(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::U64(u) => Some(*u),
            Value::I64(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
}

/// Outcome of decoding one expected key.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// The key is not present.
    Absent,
    /// The key is present but holds a value of another type.
    WrongType { found: &'static str },
    /// The key is present and decoded.
    Valid(T),
}

impl<T> Field<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Field::Valid(v) => Some(v),
            Field::Absent | Field::WrongType { .. } => None,
        }
    }
}

/// Decode `key` from a dictionary.
pub fn field<T: FromValue>(dict: &HashMap<String, Value>, key: &str) -> Field<T> {
    match dict.get(key) {
        None => Field::Absent,
        Some(value) => match T::from_value(value) {
            Some(v) => Field::Valid(v),
            None => Field::WrongType { found: value.kind() },
        },
    }
}
