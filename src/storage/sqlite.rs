use async_trait::async_trait;
use sqlx::SqlitePool;

use super::SettingsStore;
use crate::error::AppResult;
use crate::settings::{PortalSettings, SETTINGS_KEY};

/// Durable settings store: one key-value row in SQLite, the record serialized
/// as JSON. The upsert replaces the value in a single statement, so readers
/// never observe a partially written record.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the backing table if it does not exist yet.
    pub async fn ensure_schema(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn put(&self, settings: &PortalSettings) -> AppResult<()> {
        let value = serde_json::to_string(settings)?;
        sqlx::query(
            "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(SETTINGS_KEY)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self) -> AppResult<Option<PortalSettings>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?1")
                .bind(SETTINGS_KEY)
                .fetch_optional(&self.pool)
                .await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
