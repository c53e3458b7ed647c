use anyhow::{Context, Result};
use rusqlite::Connection;

// Timestamps are local time so they compare directly with resolved date tokens.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS todos (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    text       TEXT NOT NULL CHECK(length(trim(text)) > 0),
    priority   TINYINT NOT NULL DEFAULT 2 CHECK(priority IN (1, 2, 3)),
    status     TINYINT NOT NULL DEFAULT 1 CHECK(status IN (1, 2, 3)),
    due        DATETIME,
    tag        TEXT,
    created_at DATETIME NOT NULL DEFAULT (datetime('now', 'localtime')),
    updated_at DATETIME NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE INDEX IF NOT EXISTS idx_todos_due ON todos(due);
CREATE INDEX IF NOT EXISTS idx_todos_created_at ON todos(created_at);
";

fn set_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("failed to open database {path}"))?;
    set_pragmas(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}
