//! In-memory tables and lazy connector handles.

use std::fmt::Write as _;

use anyhow::{bail, Result};
use serde_json::Value as Json;

pub mod connector;

pub use connector::{Connector, FileConnector, TableHandle};

/// One named column; cells are kept as loosely-typed JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Json>,
}

impl Column {
    /// Numeric cells, skipping anything that is not a number.
    pub fn numeric(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| v.as_f64())
    }

    /// True when every cell is an integer (nulls excluded).
    pub fn all_integer(&self) -> bool {
        self.values.iter().all(|v| v.is_i64() || v.is_null())
    }
}

/// Column-major table, ordered columns, positionally identified rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self { name: name.into(), columns }
    }

    /// Build a table from an array of JSON objects. Column order follows
    /// first appearance; missing keys become nulls.
    pub fn from_records(name: impl Into<String>, records: &[Json]) -> Result<Self> {
        let mut columns: Vec<Column> = Vec::new();
        for (i, rec) in records.iter().enumerate() {
            let Some(obj) = rec.as_object() else {
                bail!("record {i} is not an object");
            };
            for key in obj.keys() {
                if !columns.iter().any(|c| &c.name == key) {
                    columns.push(Column { name: key.clone(), values: vec![Json::Null; i] });
                }
            }
            for col in columns.iter_mut() {
                col.values.push(obj.get(&col.name).cloned().unwrap_or(Json::Null));
            }
        }
        Ok(Self { name: name.into(), columns })
    }

    /// Parse CSV text with a header row. Quoted fields may contain commas;
    /// unquoted cells are coerced to int/float/bool when they parse as such.
    pub fn from_csv(name: impl Into<String>, text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            bail!("csv input has no header row");
        };
        let mut columns: Vec<Column> = split_csv_line(header)
            .into_iter()
            .map(|(name, _)| Column { name, values: Vec::new() })
            .collect();
        for (i, line) in lines.enumerate() {
            let cells = split_csv_line(line);
            if cells.len() != columns.len() {
                bail!("csv row {} has {} cells, expected {}", i + 2, cells.len(), columns.len());
            }
            for (col, (raw, quoted)) in columns.iter_mut().zip(cells) {
                col.values.push(if quoted { Json::String(raw) } else { coerce_cell(&raw) });
            }
        }
        Ok(Self { name: name.into(), columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn head(&self, n: usize) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column { name: c.name.clone(), values: c.values.iter().take(n).cloned().collect() })
            .collect();
        Table { name: self.name.clone(), columns }
    }

    /// Stable sort by one column; numbers compare numerically, everything
    /// else by its string rendering. Returns None for an unknown column.
    pub fn sort_by(&self, column: &str, ascending: bool) -> Option<Table> {
        let key = self.column(column)?;
        let mut order: Vec<usize> = (0..self.row_count()).collect();
        order.sort_by(|&a, &b| {
            let (va, vb) = (&key.values[a], &key.values[b]);
            let ord = match (va.as_f64(), vb.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                _ => cell_text(va).cmp(&cell_text(vb)),
            };
            if ascending { ord } else { ord.reverse() }
        });
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: order.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Some(Table { name: self.name.clone(), columns })
    }

    /// Row-major projection used by the transport serializer.
    pub fn rows(&self) -> Vec<Vec<Json>> {
        (0..self.row_count())
            .map(|i| self.columns.iter().map(|c| c.values[i].clone()).collect())
            .collect()
    }

    /// One-line schema summary used when building prompts.
    pub fn schema_line(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let ty = c
                    .values
                    .iter()
                    .find(|v| !v.is_null())
                    .map(json_type_name)
                    .unwrap_or("null");
                format!("{}: {}", c.name, ty)
            })
            .collect();
        format!("{}({})", self.name, cols.join(", "))
    }

    /// Plain-text rendering with aligned columns.
    pub fn render(&self) -> String {
        let headers = self.column_names();
        let rows = self.rows();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell_text(cell).len());
            }
        }
        let mut out = String::new();
        for (i, h) in headers.iter().enumerate() {
            let _ = write!(out, "{:<width$}  ", h, width = widths[i]);
        }
        out.push('\n');
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                let _ = write!(out, "{:<width$}  ", cell_text(cell), width = widths[i]);
            }
            out.push('\n');
        }
        out
    }
}

fn json_type_name(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_i64() => "int",
        Json::Number(_) => "float",
        Json::String(_) => "str",
        Json::Array(_) => "list",
        Json::Object(_) => "dict",
    }
}

fn cell_text(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_cell(raw: &str) -> Json {
    let t = raw.trim();
    if t.is_empty() {
        return Json::Null;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Json::from(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return Json::from(f);
    }
    match t {
        "true" | "True" => Json::Bool(true),
        "false" | "False" => Json::Bool(false),
        _ => Json::String(t.to_string()),
    }
}

/// Split one CSV line; returns (cell, was_quoted) pairs.
fn split_csv_line(line: &str) -> Vec<(String, bool)> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cur.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
                quoted = true;
            }
            ',' if !in_quotes => {
                cells.push((std::mem::take(&mut cur), quoted));
                quoted = false;
            }
            _ => cur.push(ch),
        }
    }
    cells.push((cur, quoted));
    cells
}
