//! Dependency analysis: which tables does a code candidate actually use?
//!
//! This is a deliberate lexical heuristic, not a parse. Models sometimes
//! loop over the whole table list or concatenate it even when one table
//! would do; those idioms force every table. Otherwise only positionally
//! subscripted tables are materialized, so unused connectors never fetch.
//! Substring false positives (an index-like string inside a comment) are an
//! accepted tradeoff for speed.

use tracing::debug;

use crate::table::TableHandle;

/// Idioms that require every table regardless of explicit indexing.
const NEED_ALL_IDIOMS: &[&str] = &["for df in dfs", "concat(dfs"];

/// Positionally aligned slots: `Some` for tables the code references,
/// `None` for slots that stay as placeholders.
pub fn required_tables<'a>(code: &str, tables: &'a [TableHandle]) -> Vec<Option<&'a TableHandle>> {
    if NEED_ALL_IDIOMS.iter().any(|idiom| code.contains(idiom)) {
        debug!("need-all idiom detected, requiring all {} tables", tables.len());
        return tables.iter().map(Some).collect();
    }

    let mut required: Vec<Option<&TableHandle>> = Vec::with_capacity(tables.len());
    let mut any = false;
    for (i, table) in tables.iter().enumerate() {
        if code.contains(&format!("dfs[{i}]")) {
            any = true;
            required.push(Some(table));
        } else {
            required.push(None);
        }
    }

    // Nothing referenced positionally (e.g. the code only uses the singular
    // `df` alias): expose everything so the namespace is never empty.
    if !any {
        debug!("no positional references found, requiring all tables");
        return tables.iter().map(Some).collect();
    }
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use std::sync::Arc;

    fn handles(n: usize) -> Vec<TableHandle> {
        (0..n)
            .map(|i| TableHandle::Materialized(Arc::new(Table::new(format!("t{i}"), vec![]))))
            .collect()
    }

    #[test]
    fn marks_only_referenced_indices() {
        let tables = handles(3);
        let required = required_tables("result = dfs[1].count()", &tables);
        assert!(required[0].is_none());
        assert!(required[1].is_some());
        assert!(required[2].is_none());
    }

    #[test]
    fn loop_idiom_requires_all() {
        let tables = handles(2);
        let required = required_tables("for df in dfs:\n    df.count()", &tables);
        assert!(required.iter().all(Option::is_some));
    }

    #[test]
    fn concat_idiom_requires_all() {
        let tables = handles(2);
        let required = required_tables("result = concat(dfs)", &tables);
        assert!(required.iter().all(Option::is_some));
    }

    #[test]
    fn alias_only_code_falls_back_to_all() {
        let tables = handles(2);
        let required = required_tables("result = df.count()", &tables);
        assert!(required.iter().all(Option::is_some));
    }

    #[test]
    fn substring_false_positive_is_accepted() {
        let tables = handles(2);
        // "dfs[0]" appears inside a string literal; the heuristic still
        // counts it. Documented tradeoff.
        let required = required_tables("result = 'uses dfs[0] maybe'", &tables);
        assert!(required[0].is_some());
        assert!(required[1].is_none());
    }
}
