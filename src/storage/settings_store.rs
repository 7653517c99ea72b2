use anyhow::{Context, Result};

use super::schema::Database;
use crate::settings::{InstallReason, Settings, SETTINGS_KEY};

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get a raw stored value by key. `None` if the key is not set.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM extension_storage WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a raw value (UPSERT).
    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO extension_storage (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a key. Returns whether it existed.
    pub async fn remove_item(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM extension_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Settings Record
    // ========================================================================

    /// Load the settings record.
    ///
    /// `Ok(None)` when nothing has been stored yet. A record that is not valid
    /// settings JSON is an error.
    pub async fn load_settings(&self) -> Result<Option<Settings>> {
        let Some(raw) = self.get_item(SETTINGS_KEY).await? else {
            return Ok(None);
        };
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("Stored '{SETTINGS_KEY}' record is not valid settings JSON"))?;
        Ok(Some(settings))
    }

    /// Replace the settings record.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings).context("Failed to serialize settings")?;
        self.set_item(SETTINGS_KEY, &json).await
    }

    /// Installation hook: seed defaults on first install.
    ///
    /// `Install` writes the default record (overwriting any existing one);
    /// `Update` leaves the stored record untouched. Returns whether defaults
    /// were written.
    pub async fn install(&self, reason: InstallReason) -> Result<bool> {
        match reason {
            InstallReason::Install => {
                self.save_settings(&Settings::default()).await?;
                tracing::info!("Default settings saved");
                Ok(true)
            }
            InstallReason::Update => {
                tracing::debug!("Update install, keeping stored settings");
                Ok(false)
            }
        }
    }
}
