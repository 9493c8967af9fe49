//! Table sources: already-materialized tables and lazily fetched connectors.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use super::Table;

/// A source that can project a table into memory on demand.
///
/// `fetch` is only invoked for tables the dependency analyzer marked as
/// required, so implementations may be expensive (remote queries, big files).
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Materialize the full table.
    fn fetch(&self) -> Result<Arc<Table>>;

    /// Run a SQL query directly against the source, bypassing `fetch`.
    fn query(&self, _sql: &str) -> Result<Arc<Table>> {
        bail!("connector `{}` does not support direct SQL", self.name())
    }

    /// Schema summary available without materializing, if the source has one.
    fn schema(&self) -> Option<String> {
        None
    }
}

/// One positional slot in the table list handed to the engine.
#[derive(Clone)]
pub enum TableHandle {
    Materialized(Arc<Table>),
    Lazy(Arc<dyn Connector>),
}

impl TableHandle {
    pub fn name(&self) -> String {
        match self {
            TableHandle::Materialized(t) => t.name.clone(),
            TableHandle::Lazy(c) => c.name().to_string(),
        }
    }

    /// In-memory projection; fetches lazily-backed tables.
    pub fn materialize(&self) -> Result<Arc<Table>> {
        match self {
            TableHandle::Materialized(t) => Ok(t.clone()),
            TableHandle::Lazy(c) => c.fetch(),
        }
    }

    pub fn direct_query(&self, sql: &str) -> Result<Arc<Table>> {
        match self {
            TableHandle::Materialized(t) => {
                bail!("table `{}` is in-memory only and does not support direct SQL", t.name)
            }
            TableHandle::Lazy(c) => c.query(sql),
        }
    }

    /// Schema line for prompt construction; never fetches.
    pub fn schema_line(&self) -> String {
        match self {
            TableHandle::Materialized(t) => t.schema_line(),
            TableHandle::Lazy(c) => c
                .schema()
                .unwrap_or_else(|| format!("{}(<fetched on demand>)", c.name())),
        }
    }

    /// Load a `.csv` or `.json` file, eagerly by default or behind a lazy
    /// connector when asked.
    pub fn from_path(path: &Path, lazy: bool) -> Result<TableHandle> {
        if lazy {
            return Ok(TableHandle::Lazy(Arc::new(FileConnector::new(path)?)));
        }
        Ok(TableHandle::Materialized(load_file(path)?))
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableHandle::Materialized(t) => write!(f, "Materialized({})", t.name),
            TableHandle::Lazy(c) => write!(f, "Lazy({})", c.name()),
        }
    }
}

/// File-backed connector deferring the read until `fetch`.
pub struct FileConnector {
    path: PathBuf,
    name: String,
}

impl FileConnector {
    pub fn new(path: &Path) -> Result<Self> {
        let name = table_name_for(path);
        if !path.exists() {
            bail!("table file {} does not exist", path.display());
        }
        Ok(Self { path: path.to_path_buf(), name })
    }
}

impl Connector for FileConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Arc<Table>> {
        load_file(&self.path)
    }
}

fn table_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

fn load_file(path: &Path) -> Result<Arc<Table>> {
    let name = table_name_for(path);
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read table file {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let table = match ext {
        "csv" => Table::from_csv(name, &text)?,
        "json" => {
            let records: Vec<serde_json::Value> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array of records", path.display()))?;
            Table::from_records(name, &records)?
        }
        other => bail!("unsupported table file type `.{other}` (expected .csv or .json)"),
    };
    Ok(Arc::new(table))
}
