use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{RegcheckError, Result};

use super::SqliteRegulationStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS regulations (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        category TEXT NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        dim INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS system_kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_regulations_source ON regulations(source);
";

impl SqliteRegulationStore {
    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RegcheckError::mutex_poisoned("sqlite"))?;
        conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        if !has_table(&conn, "regulations")? {
            return Err(RegcheckError::Internal(
                "regulations table missing after migration".to_string(),
            ));
        }
        ensure_required_column(
            &conn,
            "regulations",
            "embedding",
            "unsupported regulations schema: embedding is missing; reset the state database",
        )?;
        ensure_required_column(
            &conn,
            "regulations",
            "dim",
            "unsupported regulations schema: dim is missing; reset the state database",
        )?;
        drop(conn);
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
            params![table],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(RegcheckError::Validation(error_message.to_string()))
    }
}
