use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::trace;

use crate::sql::RenderedQuery;
use crate::value::{Row, Value};

/// Runs rendered statements against the relational layer.
///
/// One call is one physical statement. Implementations count statements so
/// batching guarantees can be asserted.
pub trait QueryExecutor: Send + Sync {
    /// Executes `query` and returns its rows keyed by output column name.
    fn execute(&self, query: &RenderedQuery) -> rusqlite::Result<Vec<Row>>;

    /// Statements executed so far.
    fn statements_executed(&self) -> u64;
}

/// [`QueryExecutor`] over one SQLite connection.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
    executed: AtomicU64,
}

impl SqliteExecutor {
    /// Wraps an open connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            executed: AtomicU64::new(0),
        }
    }

    /// Opens a database file.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Ok(Self::new(Connection::open(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    /// Runs setup SQL (schema, fixtures). Not counted as a query.
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(sql)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &RenderedQuery) -> rusqlite::Result<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&query.sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let bound: Vec<(&str, &dyn ToSql)> = query
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();
        self.executed.fetch_add(1, Ordering::Relaxed);
        trace!(sql = query.sql.as_str(), params = bound.len(), "executor.execute");
        let mut rows = stmt.query(bound.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in names.iter().enumerate() {
                let value: rusqlite::types::Value = row.get(idx)?;
                record.insert(name.clone(), Value::from(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn statements_executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}
