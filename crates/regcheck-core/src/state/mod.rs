use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::embedding::EmbeddingProfile;
use crate::error::{RegcheckError, Result};
use crate::models::{ComplianceRule, RegulationSource, RuleEmbedding};

mod migration;

const EMBEDDING_PROFILE_KEY: &str = "embedding_profile";

/// Durable copy of the knowledge base. Rows are append-only; ids never change.
#[derive(Clone)]
pub struct SqliteRegulationStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteRegulationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRegulationStore").finish_non_exhaustive()
    }
}

impl SqliteRegulationStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RegcheckError::mutex_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| RegcheckError::mutex_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    pub fn get_system_value(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM system_kv WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_system_value(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO system_kv(key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>> {
        self.get_system_value(EMBEDDING_PROFILE_KEY)?
            .map(|raw| serde_json::from_str(&raw).map_err(RegcheckError::from))
            .transpose()
    }

    pub fn set_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()> {
        let raw = serde_json::to_string(profile)?;
        self.set_system_value(EMBEDDING_PROFILE_KEY, &raw)
    }

    /// Inserts embedded rules in one transaction. Existing ids are left untouched.
    /// Returns the number of rows actually written.
    pub fn insert_regulations(&self, rules: &[ComplianceRule]) -> Result<usize> {
        if rules.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                r"
                INSERT OR IGNORE INTO regulations(id, source, category, text, embedding, dim, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;
            let mut written = 0usize;
            for rule in rules {
                let RuleEmbedding::Embedded(vector) = &rule.embedding else {
                    return Err(RegcheckError::Validation(format!(
                        "cannot persist unembedded rule {}",
                        rule.id
                    )));
                };
                written += stmt.execute(params![
                    rule.id,
                    rule.source.as_str(),
                    rule.category,
                    rule.text,
                    encode_embedding_blob(vector),
                    usize_to_i64_saturating(vector.len()),
                    now,
                ])?;
            }
            Ok(written)
        })
    }

    /// All persisted rules in insertion order.
    pub fn list_regulations(&self) -> Result<Vec<ComplianceRule>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, source, category, text, embedding, dim
                FROM regulations
                ORDER BY rowid ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, source, category, text, blob, dim) = row?;
                let dim = usize::try_from(dim).map_err(|_| {
                    RegcheckError::Internal(format!("invalid embedding dimension for {id}: {dim}"))
                })?;
                out.push(ComplianceRule {
                    source: RegulationSource::parse(&source)?,
                    embedding: RuleEmbedding::Embedded(decode_embedding_blob(&blob, dim)?),
                    id,
                    text,
                    category,
                });
            }
            Ok(out)
        })
    }

    pub fn regulation_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM regulations", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Drops every persisted rule. Used when the embedding profile changes.
    pub fn clear_regulations(&self) -> Result<usize> {
        self.with_tx(|tx| Ok(tx.execute("DELETE FROM regulations", [])?))
    }
}

fn encode_embedding_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding_blob(blob: &[u8], dim: usize) -> Result<Vec<f32>> {
    let expected_len = dim
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| RegcheckError::Internal("embedding blob length overflow".to_string()))?;
    if blob.len() != expected_len {
        return Err(RegcheckError::DimensionMismatch {
            expected: dim,
            actual: blob.len() / std::mem::size_of::<f32>(),
        });
    }
    let mut out = Vec::with_capacity(dim);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(RegcheckError::Internal(
                "persisted embedding contains non-finite values".to_string(),
            ));
        }
        out.push(value);
    }
    Ok(out)
}

fn usize_to_i64_saturating(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
