pub mod filter;
pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;

use huddle_types::Result;
use rusqlite::{Connection, ToSql, Transaction, TransactionBehavior};
use tracing::info;

/// Process-scoped store handle. Constructed once at startup and passed by
/// reference into the engine; there is no ambient global connection.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }

    /// Run `f` inside an immediate (write-locked) transaction. Any error
    /// rolls the whole sequence back, so guarded multi-statement sequences
    /// commit or vanish as a unit.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Execute one mutation whose WHERE clause encodes the authorization
    /// rule. The returned match count is the caller's only success signal;
    /// there is no separate read-then-write step on this path.
    pub fn conditional_update(&self, sql: &str, params: &[(&str, &dyn ToSql)]) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute(sql, params)?))
    }
}
