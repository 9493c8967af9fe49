//! Execution namespace construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::script::interp::Env;
use crate::script::value::{NativeFn, Value};
use crate::script::ScriptError;
use crate::table::{Column, Table, TableHandle};

/// Build the namespace one attempt runs in.
///
/// Extra dependency handles go in first and the engine bindings (`concat`,
/// `dfs`, `df`, `execute_sql_query`) override them, so generated code always
/// sees the real table list. Absent slots stay null so positional indexing
/// by the generated code keeps working.
pub fn build(
    required: &[Option<&TableHandle>],
    all: &[TableHandle],
    config: &EngineConfig,
    extras: &HashMap<String, Value>,
) -> Result<Env, EngineError> {
    let mut env: Env = extras.clone().into_iter().collect();
    env.insert("concat".to_string(), Value::callable("concat", concat_fn()));

    let mut slots = Vec::with_capacity(required.len());
    for (index, slot) in required.iter().enumerate() {
        match slot {
            Some(handle) => {
                let table = handle
                    .materialize()
                    .map_err(|source| EngineError::Materialize { index, source })?;
                slots.push(Value::Table(table));
            }
            None => slots.push(Value::Null),
        }
    }
    let materialized = slots.iter().filter(|v| !matches!(v, Value::Null)).count();
    debug!(materialized, total = slots.len(), "sandbox namespace built");

    // Convenience singular alias when exactly one table resolved; bound to
    // the same Arc as the sequence element.
    let mut resolved = slots.iter().filter(|v| matches!(v, Value::Table(_)));
    if let (Some(only), None) = (resolved.next(), resolved.next()) {
        env.insert("df".to_string(), only.clone());
    }
    env.insert("dfs".to_string(), Value::List(slots));

    if config.direct_sql {
        if let Some(first) = all.first() {
            let handle = first.clone();
            let func: NativeFn = Arc::new(move |args: &[Value]| {
                let [Value::Str(sql)] = args else {
                    return Err(ScriptError::Type(
                        "execute_sql_query() takes one SQL string".to_string(),
                    ));
                };
                let table = handle
                    .direct_query(sql)
                    .map_err(|e| ScriptError::Runtime(format!("direct SQL failed: {e}")))?;
                Ok(Value::Table(table))
            });
            env.insert(
                "execute_sql_query".to_string(),
                Value::callable("execute_sql_query", func),
            );
        }
    }

    Ok(env)
}

/// `concat(dfs)`: append rows of every table in a list, skipping null
/// placeholders. Columns are taken from the first table; the rest must
/// match by name.
fn concat_fn() -> NativeFn {
    Arc::new(|args: &[Value]| {
        let [Value::List(items)] = args else {
            return Err(ScriptError::Type("concat() takes a list of dataframes".to_string()));
        };
        let tables: Vec<&Arc<Table>> = items
            .iter()
            .filter_map(|v| match v {
                Value::Table(t) => Some(t),
                _ => None,
            })
            .collect();
        let Some(first) = tables.first() else {
            return Err(ScriptError::Runtime("concat() got no dataframes".to_string()));
        };
        let mut columns: Vec<Column> = first
            .columns
            .iter()
            .map(|c| Column { name: c.name.clone(), values: Vec::new() })
            .collect();
        for table in &tables {
            for col in columns.iter_mut() {
                let src = table.column(&col.name).ok_or_else(|| {
                    ScriptError::Runtime(format!(
                        "concat(): table `{}` is missing column `{}`",
                        table.name, col.name
                    ))
                })?;
                col.values.extend(src.values.iter().cloned());
            }
        }
        Ok(Value::Table(Arc::new(Table::new("concat", columns))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str, csv: &str) -> TableHandle {
        TableHandle::Materialized(Arc::new(Table::from_csv(name, csv).unwrap()))
    }

    #[test]
    fn absent_slots_stay_null() {
        let tables = vec![handle("a", "x\n1\n"), handle("b", "x\n2\n")];
        let required = vec![None, Some(&tables[1])];
        let env = build(&required, &tables, &EngineConfig::default(), &HashMap::new()).unwrap();
        let Value::List(slots) = &env["dfs"] else { panic!("dfs must be a list") };
        assert!(matches!(slots[0], Value::Null));
        assert!(matches!(slots[1], Value::Table(_)));
    }

    #[test]
    fn single_table_gets_identity_alias() {
        let tables = vec![handle("a", "x\n1\n"), handle("b", "x\n2\n")];
        let required = vec![Some(&tables[0]), None];
        let env = build(&required, &tables, &EngineConfig::default(), &HashMap::new()).unwrap();
        let Value::List(slots) = &env["dfs"] else { panic!() };
        let (Value::Table(in_list), Value::Table(alias)) = (&slots[0], &env["df"]) else {
            panic!("expected table values")
        };
        assert!(Arc::ptr_eq(in_list, alias));
    }

    #[test]
    fn two_resolved_tables_have_no_alias() {
        let tables = vec![handle("a", "x\n1\n"), handle("b", "x\n2\n")];
        let required = vec![Some(&tables[0]), Some(&tables[1])];
        let env = build(&required, &tables, &EngineConfig::default(), &HashMap::new()).unwrap();
        assert!(!env.contains_key("df"));
    }

    #[test]
    fn extras_merge_but_never_shadow_tables() {
        let tables = vec![handle("a", "x\n1\n")];
        let required = vec![Some(&tables[0])];
        let mut extras = HashMap::new();
        extras.insert("answer".to_string(), Value::Int(42));
        extras.insert("dfs".to_string(), Value::Int(0));
        let env = build(&required, &tables, &EngineConfig::default(), &extras).unwrap();
        assert_eq!(env["answer"], Value::Int(42));
        assert!(matches!(env["dfs"], Value::List(_)));
    }

    #[test]
    fn direct_sql_injects_callable() {
        let tables = vec![handle("a", "x\n1\n")];
        let required = vec![Some(&tables[0])];
        let config = EngineConfig { direct_sql: true, ..EngineConfig::default() };
        let env = build(&required, &tables, &config, &HashMap::new()).unwrap();
        assert!(matches!(env["execute_sql_query"], Value::Callable { .. }));
    }

    #[test]
    fn concat_appends_rows() {
        let (a, b) = (
            Arc::new(Table::from_csv("a", "x\n1\n2\n").unwrap()),
            Arc::new(Table::from_csv("b", "x\n3\n").unwrap()),
        );
        let out = concat_fn()(&[Value::List(vec![
            Value::Table(a),
            Value::Null,
            Value::Table(b),
        ])])
        .unwrap();
        let Value::Table(t) = out else { panic!() };
        assert_eq!(t.row_count(), 3);
    }
}
