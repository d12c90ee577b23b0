//! SQLite-backed decision log.
//!
//! Every request the gate evaluates and every websocket it kills can be
//! recorded in a SQLite database with its timestamp, method, URL, scheme,
//! verdict and reason. Writes from connection tasks go through an [`r2d2`]
//! connection pool ([`DbPool`]).
//!
//! [`observer::DecisionLogObserver`] feeds the log from gate events, and the
//! [`export`] submodule provides JSON and CSV export.

pub mod export;
pub mod observer;

use rusqlite::Connection;

use crate::error::Result;
use crate::policy::Verdict;

pub use observer::DecisionLogObserver;

/// SQLite connection pool type alias (r2d2 + r2d2-sqlite).
pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Verdict label recorded when a websocket session is terminated.
pub const WS_KILLED: &str = "ws-killed";

/// Open a connection pool for the given database file path.
///
/// Creates the database and `decisions` table if they don't exist.
pub fn open_pool(path: &std::path::Path) -> Result<DbPool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder().max_size(4).build(manager)?;
    init_db(&*pool.get()?)?;
    Ok(pool)
}

/// Open an in-memory connection pool (for testing).
///
/// Limited to one connection: every in-memory connection is its own database.
pub fn open_memory_pool() -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    init_db(&*pool.get()?)?;
    Ok(pool)
}

/// A single record stored in the `decisions` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionLog {
    /// Auto-incremented row ID (`None` before insert).
    pub id: Option<i64>,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// HTTP method; empty for websocket kills.
    pub method: String,
    pub url: String,
    /// Scheme as seen by the host; empty for websocket kills.
    pub scheme: String,
    /// `"allow"`, `"deny-scheme"`, `"deny-upgrade"` or `"ws-killed"`.
    pub verdict: String,
    pub reason: String,
}

/// Aggregated counts from the `decisions` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionStats {
    pub total: usize,
    pub allowed: usize,
    pub denied_scheme: usize,
    pub denied_upgrade: usize,
    pub websockets_killed: usize,
}

/// Create the `decisions` table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS decisions (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            method    TEXT NOT NULL,
            url       TEXT NOT NULL,
            scheme    TEXT NOT NULL,
            verdict   TEXT NOT NULL,
            reason    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);
        CREATE INDEX IF NOT EXISTS idx_decisions_verdict ON decisions(verdict);",
    )?;
    Ok(())
}

/// Insert a decision and return its row ID.
pub fn log_decision(conn: &Connection, log: &DecisionLog) -> Result<i64> {
    conn.execute(
        "INSERT INTO decisions (timestamp, method, url, scheme, verdict, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            log.timestamp,
            log.method,
            log.url,
            log.scheme,
            log.verdict,
            log.reason,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query the most recent N decisions, newest first.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<DecisionLog>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, method, url, scheme, verdict, reason
         FROM decisions ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(DecisionLog {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            method: row.get(2)?,
            url: row.get(3)?,
            scheme: row.get(4)?,
            verdict: row.get(5)?,
            reason: row.get(6)?,
        })
    })?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

/// Count decisions grouped by verdict.
pub fn query_stats(conn: &Connection) -> Result<DecisionStats> {
    let mut stmt = conn.prepare("SELECT verdict, COUNT(*) FROM decisions GROUP BY verdict")?;
    let rows = stmt.query_map([], |row| {
        let verdict: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((verdict, count as usize))
    })?;

    let mut stats = DecisionStats::default();
    for row in rows {
        let (verdict, count) = row?;
        stats.total += count;
        match Verdict::from_label(&verdict) {
            Some(Verdict::Allow) => stats.allowed = count,
            Some(Verdict::DenyScheme) => stats.denied_scheme = count,
            Some(Verdict::DenyUpgrade) => stats.denied_upgrade = count,
            None if verdict == WS_KILLED => stats.websockets_killed = count,
            None => {}
        }
    }
    Ok(stats)
}

/// Open or create a SQLite database at the given path.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing).
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}
