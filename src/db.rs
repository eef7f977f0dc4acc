use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::player::{KeyValueStore, PREFERRED_QUALITY_KEY, StoreError, progress_key};

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub episode_id: String,
    pub seconds: Option<f64>,
    pub updated_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_kv_store_updated_at ON kv_store(updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Saved positions for one content item, most recently written first.
    pub fn list_progress(&self, content_id: &str) -> Result<Vec<ProgressEntry>> {
        let prefix = progress_key(content_id, "");
        let mut stmt = self.conn.prepare(
            r#"
            SELECT key, value, updated_at FROM kv_store
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY updated_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok(ProgressEntry {
                episode_id: key[prefix.len()..].to_string(),
                seconds: value.trim().parse::<f64>().ok(),
                updated_at: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn clear_progress(&self, content_id: &str) -> Result<usize> {
        let prefix = progress_key(content_id, "");
        let removed = self.conn.execute(
            "DELETE FROM kv_store WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        Ok(removed)
    }

    pub fn preferred_quality(&self) -> Result<Option<u32>> {
        Ok(self
            .get_value(PREFERRED_QUALITY_KEY)?
            .and_then(|raw| raw.trim().parse::<u32>().ok()))
    }

    pub fn set_preferred_quality(&self, quality: u32) -> Result<()> {
        self.set_value(PREFERRED_QUALITY_KEY, &quality.to_string())
    }

    pub fn clear_preferred_quality(&self) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM kv_store WHERE key = ?1",
            params![PREFERRED_QUALITY_KEY],
        )?;
        Ok(removed > 0)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_value(key)
            .map_err(|err| StoreError::Backend(format!("{err:#}")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_value(key, value)
            .map_err(|err| StoreError::Backend(format!("{err:#}")))
    }
}
