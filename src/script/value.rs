//! Runtime values flowing through the interpreter and the execution engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::table::Table;

use super::ScriptError;

/// Host function injected into the namespace (e.g. `concat`,
/// `execute_sql_query`, chart savers supplied as extra dependencies).
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync>;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Table(Arc<Table>),
    Callable { name: String, func: NativeFn },
}

impl Value {
    pub fn callable(name: impl Into<String>, func: NativeFn) -> Value {
        Value::Callable { name: name.into(), func }
    }

    /// Runtime kind name, also used in diagnostics and envelope checks.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Table(_) => "dataframe",
            Value::Callable { .. } => "callable",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Envelope accessor: `Some((type_tag, value))` when the value is a dict
    /// carrying a string `type` and a `value` entry.
    pub fn as_envelope(&self) -> Option<(&str, &Value)> {
        let Value::Dict(map) = self else { return None };
        let tag = map.get("type").and_then(|v| match v {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        })?;
        Some((tag, map.get("value")?))
    }

    /// Human-oriented rendering used by `str()` and string concatenation.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> =
                    map.iter().map(|(k, v)| format!("{k}: {}", v.render())).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Table(t) => t.render(),
            Value::Callable { name, .. } => format!("<callable {name}>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Callable { name, .. } => write!(f, "Callable({name})"),
            Value::Table(t) => write!(f, "Table({})", t.name),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Dict(m) => f.debug_tuple("Dict").field(m).finish(),
        }
    }
}
