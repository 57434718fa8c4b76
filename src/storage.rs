use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to the single SQLite connection behind the stores.
pub type Db = Arc<Mutex<Connection>>;

/// Open (or create) the database file and apply the standard pragmas.
///
/// The user and todo stores share one connection so the owner foreign key
/// and its cascade live in the same database file.
pub fn open_database(db_path: &str) -> Result<Db> {
    let conn = Connection::open(db_path).context("open database")?;
    apply_pragmas(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database for tests.
pub fn open_in_memory() -> Result<Db> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    apply_pragmas(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("set journal_mode")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("set synchronous")?;
    // Owner cascade relies on FK enforcement, which SQLite leaves off by default.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign_keys")?;
    Ok(())
}
