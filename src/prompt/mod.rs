//! Prompt construction: the contract that keeps generated snippets inside
//! the dialect the interpreter understands.

use crate::engine::OutputType;
use crate::llm::{ChatMessage, Role};
use crate::table::TableHandle;

const DIALECT_RULES: &str = "\
Write a short code snippet in a restricted Python-like dialect:
- one statement per line: assignments, expressions, or `for <name> in dfs:` loops with an indented body
- the tables are available as the list `dfs`, positionally indexed (`dfs[0]`, `dfs[1]`, ...); with a single table it is also bound to `df`
- table methods: sum('col'), mean('col'), min('col'), max('col'), count(), head(n), columns(), sort_values('col', ascending), to_string()
- helpers: len(x), str(x), round(x, digits), concat(dfs)
- for charts call save_chart(df); it writes the chart file and returns its path, use that as the 'plot' value
- no imports, no user-defined functions, no attribute access other than method calls
- the final line must assign a dict to `result`, e.g. result = {'type': 'number', 'value': dfs[0].sum('amount')}
- the `type` tag must be one of: 'dataframe', 'plot', 'string', 'number', and `value` must match it
Respond with the code only, no explanations.";

/// System + user messages for the initial generation request.
pub fn generation_messages(
    tables: &[TableHandle],
    question: &str,
    output_type: Option<OutputType>,
) -> Vec<ChatMessage> {
    let mut system = String::from(DIALECT_RULES);
    system.push_str("\n\nAvailable tables, in order:\n");
    for (i, table) in tables.iter().enumerate() {
        system.push_str(&format!("- dfs[{i}]: {}\n", table.schema_line()));
    }
    if let Some(ty) = output_type {
        system.push_str(&format!("\nThe result type must be '{ty}'.\n"));
    }
    vec![
        ChatMessage::new(Role::System, system),
        ChatMessage::new(Role::User, question.to_string()),
    ]
}

/// Messages asking the model to repair a failing snippet.
pub fn correction_messages(code: &str, diagnostic: &str) -> Vec<ChatMessage> {
    let user = format!(
        "This snippet failed:\n\n{code}\n\nError:\n{diagnostic}\n\nReturn a corrected snippet following the same rules."
    );
    vec![
        ChatMessage::new(Role::System, DIALECT_RULES.to_string()),
        ChatMessage::new(Role::User, user),
    ]
}

/// Pull the code out of a fenced block if the model wrapped it in one.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. ```python) up to the first newline.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.rsplit_once("```")
        .map(|(code, _)| code)
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_blocks() {
        assert_eq!(strip_code_fences("```python\nresult = 1\n```"), "result = 1");
        assert_eq!(strip_code_fences("```\nresult = 1\n```"), "result = 1");
        assert_eq!(strip_code_fences("result = 1"), "result = 1");
    }

    #[test]
    fn generation_prompt_lists_schemas_in_order() {
        use crate::table::Table;
        use std::sync::Arc;
        let tables = vec![
            TableHandle::Materialized(Arc::new(Table::from_csv("a", "x\n1\n").unwrap())),
            TableHandle::Materialized(Arc::new(Table::from_csv("b", "y\n2\n").unwrap())),
        ];
        let messages = generation_messages(&tables, "how many rows?", Some(OutputType::Number));
        let system = &messages[0].content;
        assert!(system.contains("dfs[0]: a(x: int)"));
        assert!(system.contains("dfs[1]: b(y: int)"));
        assert!(system.contains("must be 'number'"));
        assert_eq!(messages[1].content, "how many rows?");
    }
}
