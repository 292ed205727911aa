//! Persisted catalog access
//!
//! The local catalog holds exactly one generation of assets at a time.
//! `replace_all` swaps in a new generation inside a single transaction, so
//! concurrent readers observe either the old generation or the new one,
//! never a mix. All writers are serialized by the sync engine's mutation
//! queue; nothing here takes cross-call locks.

use crate::error::Result;
use signcast_common::model::{MediaAsset, MediaKind, SubAsset, UrlType};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: String,
    title: String,
    description: String,
    kind: String,
    primary_url: String,
    local_path: Option<String>,
    thumbnail_url: String,
    duration_seconds: i64,
    display_order: i64,
    active: i64,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct SubAssetRow {
    asset_id: String,
    sub_id: String,
    url_type: String,
    url: String,
    local_path: Option<String>,
}

/// Replace the whole catalog with a new generation in one transaction
pub async fn replace_all(db: &Pool<Sqlite>, assets: &[MediaAsset]) -> Result<()> {
    let mut tx = db.begin().await?;

    // sub_asset rows cascade with their asset
    sqlx::query("DELETE FROM asset").execute(&mut *tx).await?;

    for asset in assets {
        sqlx::query(
            r#"
            INSERT INTO asset (id, title, description, kind, primary_url, local_path,
                               thumbnail_url, duration_seconds, display_order, active,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&asset.id)
        .bind(&asset.title)
        .bind(&asset.description)
        .bind(asset.kind.as_str())
        .bind(&asset.primary_url)
        .bind(&asset.local_path)
        .bind(&asset.thumbnail_url)
        .bind(asset.duration_seconds)
        .bind(asset.display_order)
        .bind(asset.active as i64)
        .bind(&asset.created_at)
        .bind(&asset.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, sub) in asset.sub_assets.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sub_asset (asset_id, sub_id, url_type, url, local_path, position)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&asset.id)
            .bind(&sub.id)
            .bind(sub.url_type.as_str())
            .bind(&sub.url)
            .bind(&sub.local_path)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Load the current generation ordered for playback
pub async fn load_all(db: &Pool<Sqlite>) -> Result<Vec<MediaAsset>> {
    let asset_rows: Vec<AssetRow> = sqlx::query_as(
        r#"
        SELECT id, title, description, kind, primary_url, local_path, thumbnail_url,
               duration_seconds, display_order, active, created_at, updated_at
        FROM asset
        ORDER BY display_order, id
        "#,
    )
    .fetch_all(db)
    .await?;

    let sub_rows: Vec<SubAssetRow> = sqlx::query_as(
        r#"
        SELECT asset_id, sub_id, url_type, url, local_path
        FROM sub_asset
        ORDER BY asset_id, position
        "#,
    )
    .fetch_all(db)
    .await?;

    let mut subs_by_asset: HashMap<String, Vec<SubAsset>> = HashMap::new();
    for row in sub_rows {
        subs_by_asset
            .entry(row.asset_id)
            .or_default()
            .push(SubAsset {
                id: row.sub_id,
                url_type: UrlType::from_api(&row.url_type),
                url: row.url,
                local_path: row.local_path,
            });
    }

    Ok(asset_rows
        .into_iter()
        .map(|row| {
            let sub_assets = subs_by_asset.remove(&row.id).unwrap_or_default();
            MediaAsset {
                kind: MediaKind::from_api(&row.kind),
                id: row.id,
                title: row.title,
                description: row.description,
                primary_url: row.primary_url,
                local_path: row.local_path,
                thumbnail_url: row.thumbnail_url,
                duration_seconds: row.duration_seconds,
                display_order: row.display_order,
                active: row.active != 0,
                created_at: row.created_at,
                updated_at: row.updated_at,
                sub_assets,
            }
        })
        .collect())
}

/// Number of assets in the current generation
pub async fn count_assets(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Clear an asset's cached-file path after failed verification
pub async fn clear_asset_local_path(db: &Pool<Sqlite>, asset_id: &str) -> Result<()> {
    sqlx::query("UPDATE asset SET local_path = NULL WHERE id = ?")
        .bind(asset_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Clear a sub-asset's cached-file path after failed verification
pub async fn clear_sub_asset_local_path(
    db: &Pool<Sqlite>,
    asset_id: &str,
    position: usize,
) -> Result<()> {
    sqlx::query("UPDATE sub_asset SET local_path = NULL WHERE asset_id = ? AND position = ?")
        .bind(asset_id)
        .bind(position as i64)
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

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE asset (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL DEFAULT 'SINGLE',
                primary_url TEXT NOT NULL DEFAULT '',
                local_path TEXT,
                thumbnail_url TEXT NOT NULL DEFAULT '',
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                display_order INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE sub_asset (
                rowid_id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_id TEXT NOT NULL REFERENCES asset(id) ON DELETE CASCADE,
                sub_id TEXT NOT NULL DEFAULT '',
                url_type TEXT NOT NULL DEFAULT 'video',
                url TEXT NOT NULL DEFAULT '',
                local_path TEXT,
                position INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn sample_asset(id: &str, order: i64) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            title: format!("Asset {}", id),
            description: String::new(),
            kind: MediaKind::Single,
            primary_url: format!("https://cdn.example.com/{}.mp4", id),
            local_path: None,
            thumbnail_url: String::new(),
            duration_seconds: 30,
            display_order: order,
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
            sub_assets: Vec::new(),
        }
    }

    fn split_asset(id: &str, order: i64) -> MediaAsset {
        let mut asset = sample_asset(id, order);
        asset.kind = MediaKind::Multiple;
        asset.sub_assets = vec![
            SubAsset {
                id: format!("{}-left", id),
                url_type: UrlType::Video,
                url: format!("https://cdn.example.com/{}-left.mp4", id),
                local_path: Some(format!("/data/media/{}-left.mp4", id)),
            },
            SubAsset {
                id: format!("{}-right", id),
                url_type: UrlType::Image,
                url: format!("https://cdn.example.com/{}-right.jpg", id),
                local_path: None,
            },
        ];
        asset
    }

    #[tokio::test]
    async fn test_replace_and_load_round_trip() {
        let db = setup_test_db().await;

        let assets = vec![split_asset("b", 2), sample_asset("a", 1)];
        replace_all(&db, &assets).await.unwrap();

        let loaded = load_all(&db).await.unwrap();
        assert_eq!(loaded.len(), 2);
        // Ordered by display_order regardless of insert order
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[1].id, "b");
        assert_eq!(loaded[1].sub_assets.len(), 2);
        assert_eq!(loaded[1].sub_assets[0].id, "b-left");
        assert_eq!(loaded[1].sub_assets[0].url_type, UrlType::Video);
        assert_eq!(
            loaded[1].sub_assets[0].local_path.as_deref(),
            Some("/data/media/b-left.mp4")
        );
        assert_eq!(loaded[1].sub_assets[1].url_type, UrlType::Image);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_generation() {
        let db = setup_test_db().await;

        replace_all(&db, &[split_asset("old", 1)]).await.unwrap();
        replace_all(&db, &[sample_asset("new", 1)]).await.unwrap();

        let loaded = load_all(&db).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "new");

        // Old generation's sub-assets cascaded away
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_asset")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_replace_with_empty_catalog() {
        let db = setup_test_db().await;

        replace_all(&db, &[sample_asset("a", 1)]).await.unwrap();
        replace_all(&db, &[]).await.unwrap();

        assert_eq!(count_assets(&db).await.unwrap(), 0);
        assert!(load_all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_local_paths_in_place() {
        let db = setup_test_db().await;

        let mut asset = split_asset("x", 1);
        asset.local_path = Some("/data/media/x.mp4".to_string());
        replace_all(&db, &[asset]).await.unwrap();

        clear_asset_local_path(&db, "x").await.unwrap();
        clear_sub_asset_local_path(&db, "x", 0).await.unwrap();

        let loaded = load_all(&db).await.unwrap();
        assert_eq!(loaded[0].local_path, None);
        assert_eq!(loaded[0].sub_assets[0].local_path, None);
        // Everything else untouched
        assert_eq!(loaded[0].title, "Asset x");
        assert_eq!(loaded[0].sub_assets[0].url, "https://cdn.example.com/x-left.mp4");
    }

    #[tokio::test]
    async fn test_count_assets() {
        let db = setup_test_db().await;

        assert_eq!(count_assets(&db).await.unwrap(), 0);
        replace_all(&db, &[sample_asset("a", 1), sample_asset("b", 2)])
            .await
            .unwrap();
        assert_eq!(count_assets(&db).await.unwrap(), 2);
    }
}
