use std::fmt;

use indexmap::IndexMap;

/// Tree-shaped repository value. Repository records arrive as JSON; converting
/// them into this closed union keeps the merge and flattening rules an
/// exhaustive match instead of open-ended type inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(num) => Value::Number(num.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::Text(text),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Combine a second partial value for the same entity into `self` without
    /// dropping either side. The repository caps field-list size per request,
    /// so one logical record is reassembled from multiple responses.
    ///
    /// Collisions resolve by: equal values are left alone, lists concatenate,
    /// strings pair up into a two-element list, maps merge recursively, and
    /// any other differing pair demotes the base to a list and appends.
    pub fn merge_from(&mut self, incoming: Value) {
        if *self == incoming {
            return;
        }
        let base = std::mem::replace(self, Value::Null);
        *self = match (base, incoming) {
            (Value::List(mut items), Value::List(extra)) => {
                items.extend(extra);
                Value::List(items)
            }
            (Value::Text(first), Value::Text(second)) => {
                Value::List(vec![Value::Text(first), Value::Text(second)])
            }
            (Value::Map(mut entries), Value::Map(extra)) => {
                merge_maps(&mut entries, extra);
                Value::Map(entries)
            }
            (Value::List(mut items), other) => {
                items.push(other);
                Value::List(items)
            }
            (base, other) => Value::List(vec![base, other]),
        };
    }
}

/// Key-wise merge of two record bodies; absent keys copy over verbatim,
/// colliding keys go through [`Value::merge_from`].
pub fn merge_maps(base: &mut IndexMap<String, Value>, incoming: IndexMap<String, Value>) {
    for (key, value) in incoming {
        match base.get_mut(&key) {
            Some(existing) => existing.merge_from(value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Number(num) => write!(f, "{num}"),
            Value::Text(text) => write!(f, "{text}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Text(text) => write!(f, "'{text}'")?,
                        Value::Null => write!(f, "None")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{key}': {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
