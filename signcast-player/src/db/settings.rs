//! Settings database access
//!
//! Read/write settings from the settings table (key-value store), plus the
//! device identity bootstrap. All settings are device-wide.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

/// Get the persistent device id, creating one on first run.
///
/// Prefers the OS machine id so the identity survives a wiped data folder;
/// falls back to a generated UUID. Once persisted, the stored value wins.
pub async fn get_or_create_device_id(db: &Pool<Sqlite>) -> Result<String> {
    if let Some(id) = get_setting::<String>(db, "device_id").await? {
        if !id.is_empty() {
            return Ok(id);
        }
    }

    let id = machine_id().unwrap_or_else(|| Uuid::new_v4().to_string());
    set_setting(db, "device_id", id.clone()).await?;
    Ok(id)
}

/// Get the device name, defaulting to the hostname.
pub async fn get_or_create_device_name(db: &Pool<Sqlite>) -> Result<String> {
    if let Some(name) = get_setting::<String>(db, "device_name").await? {
        if !name.is_empty() {
            return Ok(name);
        }
    }

    let name = hostname().unwrap_or_else(|| "Unknown Device".to_string());
    set_setting(db, "device_name", name.clone()).await?;
    Ok(name)
}

/// Whether the platform decoder handles 4K @ 30 fps
pub async fn get_decoder_supports_4k(db: &Pool<Sqlite>) -> Result<bool> {
    Ok(get_setting::<bool>(db, "decoder_supports_4k")
        .await?
        .unwrap_or(false))
}

/// Record the platform decoder 4K capability
pub async fn set_decoder_supports_4k(db: &Pool<Sqlite>, supported: bool) -> Result<()> {
    set_setting(db, "decoder_supports_4k", supported).await
}

fn machine_id() -> Option<String> {
    let id = std::fs::read_to_string("/etc/machine-id").ok()?;
    let id = id.trim().to_string();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn hostname() -> Option<String> {
    let name = std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))?;
    Some(name)
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_device_id_is_stable() {
        let db = setup_test_db().await;

        let first = get_or_create_device_id(&db).await.unwrap();
        assert!(!first.is_empty());

        let second = get_or_create_device_id(&db).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_persisted_device_id_wins() {
        let db = setup_test_db().await;

        set_setting(&db, "device_id", "kiosk-42".to_string())
            .await
            .unwrap();
        let id = get_or_create_device_id(&db).await.unwrap();
        assert_eq!(id, "kiosk-42");
    }

    #[tokio::test]
    async fn test_device_name_has_fallback() {
        let db = setup_test_db().await;

        let name = get_or_create_device_name(&db).await.unwrap();
        assert!(!name.is_empty());

        set_setting(&db, "device_name", "Lobby East".to_string())
            .await
            .unwrap();
        let name = get_or_create_device_name(&db).await.unwrap();
        assert_eq!(name, "Lobby East");
    }

    #[tokio::test]
    async fn test_decoder_capability_defaults_off() {
        let db = setup_test_db().await;

        assert!(!get_decoder_supports_4k(&db).await.unwrap());

        set_decoder_supports_4k(&db, true).await.unwrap();
        assert!(get_decoder_supports_4k(&db).await.unwrap());
    }

    #[tokio::test]
    async fn test_generic_setting_get_set() {
        let db = setup_test_db().await;

        set_setting(&db, "test_int", 42).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(42));

        let value: Option<String> = get_setting(&db, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }
}
