use rusqlite::{params_from_iter, Connection, OpenFlags};
use rusqlite::types::{Value, ValueRef};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{ExportError, Result};
use crate::schema;

pub mod store;

pub use store::{Connector, Rows, Store};

/// Database connection wrapper
///
/// Every connection handed out is read-only: the export path never writes.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

/// Open `path` read-only with the pragmas every export connection uses.
fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(ExportError::Database)?;

    // query_only guards against writes slipping through a hand-authored predicate;
    // busy_timeout lets reads wait out a concurrent writer's lock instead of failing
    conn.execute_batch(
        "PRAGMA query_only = ON; \
         PRAGMA busy_timeout = 5000; \
         PRAGMA temp_store = MEMORY;"
    )?;

    Ok(conn)
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new read-only database connection
    pub fn open_connection(&self) -> Result<Connection> {
        if !self.path.exists() {
            return Err(ExportError::Config(format!(
                "Database file does not exist: {}",
                self.path.display()
            )));
        }
        open_read_only(&self.path)
    }

    /// Execute a closure with a read-only connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let conn = db.open_connection()?;
            f(&conn)
        })
        .await
        .map_err(|e| ExportError::Config(format!("Database task failed: {}", e)))?
    }
}

impl Connector for Db {
    type Store = SqliteStore;

    fn connect(&self) -> Result<SqliteStore> {
        Ok(SqliteStore::new(self.open_connection()?))
    }
}

/// Copy a cell out of the row. Text that is not valid UTF-8 is decoded lossily.
pub fn owned_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// [`Store`] over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Store for SqliteStore {
    fn columns(&self, table: &str) -> Result<BTreeSet<String>> {
        schema::table_columns(&self.conn, table)
    }

    fn fetch(&self, sql: &str, params: &[&str]) -> Result<Rows> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(owned_value(row.get_ref(i)?));
            }
            out.push(values);
        }

        Ok(Rows { columns, rows: out })
    }

    fn read<T>(&self, f: impl FnOnce(&Self) -> T) -> Result<T> {
        // Deferred transaction: introspection and the data read share one snapshot.
        // Dropping it rolls back, which is a no-op for reads.
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self);
        drop(tx);
        Ok(out)
    }
}
