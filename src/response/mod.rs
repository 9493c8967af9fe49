//! Transport projection of execution results.

use serde_json::{json, Value as Json};

use crate::script::value::Value;

/// Serialize a result value for transport. Envelopes keep their type tag
/// with a projected value; tables become `{headers, rows}`.
pub fn serialize(value: &Value) -> Json {
    let projected = match value.as_envelope() {
        Some((tag, inner)) => json!({ "type": tag, "value": project(inner) }),
        None => project(value),
    };
    json!({ "content_type": "response", "value": projected })
}

fn project(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::List(items) => Json::Array(items.iter().map(project).collect()),
        Value::Dict(map) => {
            Json::Object(map.iter().map(|(k, v)| (k.clone(), project(v))).collect())
        }
        Value::Table(t) => json!({
            "headers": t.column_names(),
            "rows": t.rows(),
        }),
        Value::Callable { name, .. } => json!(format!("<callable {name}>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn table_envelope_projects_headers_and_rows() {
        let table = Arc::new(Table::from_csv("t", "a,b\n1,x\n").unwrap());
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), Value::Str("dataframe".to_string()));
        map.insert("value".to_string(), Value::Table(table));
        let out = serialize(&Value::Dict(map));
        assert_eq!(out["content_type"], "response");
        assert_eq!(out["value"]["type"], "dataframe");
        assert_eq!(out["value"]["value"]["headers"][0], "a");
        assert_eq!(out["value"]["value"]["rows"][0][1], "x");
    }

    #[test]
    fn raw_scalar_projects_directly() {
        let out = serialize(&Value::Int(5));
        assert_eq!(out["value"], 5);
    }
}
