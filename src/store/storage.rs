//! Key-value backends the conversation list is persisted to.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::{Error, Result};
use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

use super::models::now_millis;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, Error>;
    async fn save(&self, key: &str, value: String) -> Result<(), Error>;
}

/// Keeps values for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        storage
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Stores values in the `kv` table created by `initialize_db`.
#[derive(Clone)]
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_owned();
        let value = self
            .db
            .call(move |conn| {
                let value = conn
                    .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn save(&self, key: &str, value: String) -> Result<(), Error> {
        let key = key.to_owned();
        let updated_at = now_millis();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
