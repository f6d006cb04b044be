pub mod migrations;
pub mod queries;

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

/// How long a writer waits on SQLite's lock before giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle connections kept for reuse; more are opened on demand.
const MAX_IDLE_CONNECTIONS: usize = 8;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Opens a connection and brings the schema up to date.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = connect(path)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn connect(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    Ok(conn)
}

/// Connections to one database file.
///
/// Every caller works on a connection of its own, so a writer waiting out
/// `SQLITE_BUSY` never stalls readers or other writers in this process: they
/// contend on SQLite's locks only. The idle list is locked just long enough
/// to take or return a connection.
pub struct Db {
    path: String,
    idle: Mutex<Vec<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !path.is_empty() && path != ":memory:",
            "database path must name a file; an in-memory database is private to one connection"
        );
        let conn = init_db(path)?;
        tracing::info!(path, "database ready");
        Ok(Self {
            path: path.to_string(),
            idle: Mutex::new(vec![conn]),
        })
    }

    /// Runs `f` with a connection checked out for its sole use. Blocking.
    pub fn run<T, E>(&self, f: impl FnOnce(&mut Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.checkout()?;
        let out = f(&mut conn);
        self.checkin(conn);
        out
    }

    fn checkout(&self) -> anyhow::Result<Connection> {
        let reused = self.idle_connections().pop();
        match reused {
            Some(conn) => Ok(conn),
            None => {
                tracing::debug!(path = %self.path, "opening database connection");
                connect(&self.path)
            }
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle_connections();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }

    fn idle_connections(&self) -> MutexGuard<'_, Vec<Connection>> {
        // A panic elsewhere cannot leave the list itself inconsistent.
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}
