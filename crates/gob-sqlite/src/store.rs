//! Per-request connections
//!
//! Every query gets its own connection, opened read-only, so a request's
//! cursor never shares state with another request. The connection lives as
//! long as the cursor and is closed when both are dropped.

use crate::config::SqliteConfig;
use crate::cursor::SqliteCursor;
use crate::error::{SqliteError, SqliteResult};
use crate::schema;
use gob_model::Registry;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

/// Handle on a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    config: SqliteConfig,
}

impl SqliteStore {
    /// Fails when the database file does not exist
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        if !config.path.exists() {
            return Err(SqliteError::Connection(format!(
                "Database {} does not exist",
                config.path.display()
            )));
        }
        info!(path = ?config.path, read_only = config.read_only, "Using SQLite store");
        Ok(Self { config })
    }

    /// Create (or open) the database and its tables for a model
    pub fn create(config: SqliteConfig, registry: &Registry) -> SqliteResult<Self> {
        let store = Self { config };
        let conn = store.connect_rw()?;
        schema::init_schema(&conn, registry)?;
        Ok(store)
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Open a query connection
    pub fn connect(&self) -> SqliteResult<Connection> {
        if !self.config.read_only {
            return self.connect_rw();
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&self.config.path, flags)?;
        self.configure_pragmas(&conn)?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        debug!(path = ?self.config.path, "Opened read-only connection");
        Ok(conn)
    }

    /// Open a writable connection, creating the file when needed
    pub fn connect_rw(&self) -> SqliteResult<Connection> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::Connection(format!("Failed to create directory: {}", e))
                })?;
            }
        }
        let conn = Connection::open(&self.config.path)?;
        if self.config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        }
        self.configure_pragmas(&conn)?;
        Ok(conn)
    }

    /// Run `sql` on a fresh connection and hand its row cursor to `f`
    ///
    /// Connection and statement are dropped when `f` returns.
    pub fn with_cursor<T>(
        &self,
        sql: &str,
        f: impl FnOnce(SqliteCursor<'_>) -> T,
    ) -> SqliteResult<T> {
        let conn = self.connect()?;
        let mut statement = conn.prepare(sql)?;
        let cursor = SqliteCursor::open(&mut statement)?;
        Ok(f(cursor))
    }

    fn configure_pragmas(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};",
            self.config.busy_timeout_ms
        ))?;
        conn.execute_batch(&format!("PRAGMA cache_size = {};", self.config.cache_size))?;
        if self.config.mmap_size > 0 {
            conn.execute_batch(&format!("PRAGMA mmap_size = {};", self.config.mmap_size))?;
        }
        conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
        Ok(())
    }
}
