//! Database module for track, version, stem, and webhook persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Track creation (idempotent per request key) and status transitions
//! - Version upserts and master-version selection
//! - Stem records
//! - Webhook delivery bookkeeping for callback idempotency
//!
//! # Example
//!
//! ```ignore
//! use trackforge::db::{init_db, get_track_by_task_id};
//!
//! let pool = init_db("sqlite:trackforge.db").await?;
//! let track = get_track_by_task_id(&pool, "task-123").await?;
//! ```

use serde_json::{Map, Value};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{
    Provider, SeparationMode, StemType, Track, TrackStatus, TrackStem, TrackVersion,
};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "trackforge.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Tracks
// ============================================================================

/// Fields needed to create a track when a generation request is accepted.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub id: String,
    pub title: String,
    pub provider: Option<Provider>,
    pub task_id: Option<String>,
    pub lyrics: Option<String>,
    pub style_tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub idempotency_key: Option<String>,
}

/// Insert a pending track, or return the existing one for the same idempotency key.
///
/// A double-submitted request carries the same key, so the unique constraint
/// on `idempotency_key` turns the second insert into a lookup.
pub async fn insert_track(pool: &SqlitePool, track: &NewTrack) -> sqlx::Result<String> {
    insert_or_get_track(pool, track).await.map(|(id, _)| id)
}

/// Insert a track, or return the existing row sharing its idempotency key.
///
/// The flag is `true` when a new row was written.
pub async fn insert_or_get_track(
    pool: &SqlitePool,
    track: &NewTrack,
) -> sqlx::Result<(String, bool)> {
    let ts = now();
    let tags = serde_json::to_string(&track.style_tags).unwrap_or_else(|_| "[]".to_string());
    let metadata = Value::Object(track.metadata.clone()).to_string();

    let inserted: Option<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO tracks (id, title, status, provider, task_id, lyrics, style_tags,
                            metadata, idempotency_key, created_at, updated_at)
        VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(idempotency_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&track.id)
    .bind(&track.title)
    .bind(track.provider.map(|p| p.as_str()))
    .bind(&track.task_id)
    .bind(&track.lyrics)
    .bind(tags)
    .bind(metadata)
    .bind(&track.idempotency_key)
    .bind(&ts)
    .bind(&ts)
    .fetch_optional(pool)
    .await?;

    if let Some((id,)) = inserted {
        return Ok((id, true));
    }

    let (id,): (String,) = sqlx::query_as("SELECT id FROM tracks WHERE idempotency_key = ?")
        .bind(&track.idempotency_key)
        .fetch_one(pool)
        .await?;
    tracing::info!(track_id = %id, "Duplicate generation request, reusing track");
    Ok((id, false))
}

/// Get a single track by ID.
pub async fn get_track_by_id(pool: &SqlitePool, track_id: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as("SELECT * FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(pool)
        .await
}

/// Find the track a provider task belongs to.
pub async fn get_track_by_task_id(pool: &SqlitePool, task_id: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as("SELECT * FROM tracks WHERE task_id = ? ORDER BY created_at DESC LIMIT 1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

/// List tracks, newest first. Trashed tracks are only included on request.
pub async fn list_tracks(pool: &SqlitePool, include_trashed: bool) -> sqlx::Result<Vec<Track>> {
    let sql = if include_trashed {
        "SELECT * FROM tracks ORDER BY created_at DESC"
    } else {
        "SELECT * FROM tracks WHERE deleted_at IS NULL ORDER BY created_at DESC"
    };
    sqlx::query_as(sql).fetch_all(pool).await
}

/// Record the provider task ID and move the track to `processing`.
pub async fn mark_processing(pool: &SqlitePool, track_id: &str, task_id: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE tracks SET task_id = ?, status = 'processing', updated_at = ? WHERE id = ?",
    )
    .bind(task_id)
    .bind(now())
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Media produced by a finished generation.
#[derive(Debug, Clone, Default)]
pub struct CompletedMedia {
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<f64>,
    pub lyrics: Option<String>,
}

/// Mark a track completed and store its media.
///
/// Existing cover/video/lyrics are kept when the callback omits them.
pub async fn complete_track(
    pool: &SqlitePool,
    track_id: &str,
    media: &CompletedMedia,
    metadata_patch: Map<String, Value>,
) -> sqlx::Result<()> {
    let metadata = merged_metadata(pool, track_id, metadata_patch).await?;
    sqlx::query(
        r#"
        UPDATE tracks SET
            status = 'completed',
            audio_url = ?,
            cover_url = COALESCE(?, cover_url),
            video_url = COALESCE(?, video_url),
            duration = COALESCE(?, duration),
            lyrics = COALESCE(?, lyrics),
            error_message = NULL,
            metadata = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&media.audio_url)
    .bind(&media.cover_url)
    .bind(&media.video_url)
    .bind(media.duration)
    .bind(&media.lyrics)
    .bind(metadata)
    .bind(now())
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record an intermediate callback stage.
///
/// When the stage already carries a playable URL it becomes the track's
/// audio so playback can start before the final callback arrives. A track
/// that already reached a terminal status keeps it.
pub async fn record_progress(
    pool: &SqlitePool,
    track_id: &str,
    audio_url: Option<&str>,
    metadata_patch: Map<String, Value>,
) -> sqlx::Result<()> {
    let metadata = merged_metadata(pool, track_id, metadata_patch).await?;
    sqlx::query(
        r#"
        UPDATE tracks SET
            status = CASE WHEN status IN ('completed', 'failed') THEN status ELSE 'processing' END,
            audio_url = COALESCE(?, audio_url),
            metadata = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(audio_url)
    .bind(metadata)
    .bind(now())
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a track failed with an error message.
pub async fn fail_track(
    pool: &SqlitePool,
    track_id: &str,
    message: &str,
    metadata_patch: Map<String, Value>,
) -> sqlx::Result<()> {
    let metadata = merged_metadata(pool, track_id, metadata_patch).await?;
    sqlx::query(
        "UPDATE tracks SET status = ?, error_message = ?, metadata = ?, updated_at = ? WHERE id = ?",
    )
    .bind(TrackStatus::Failed)
    .bind(message)
    .bind(metadata)
    .bind(now())
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a track to trash. Returns false if the track doesn't exist or is already trashed.
pub async fn trash_track(pool: &SqlitePool, track_id: &str) -> sqlx::Result<bool> {
    let ts = now();
    let result = sqlx::query(
        "UPDATE tracks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&ts)
    .bind(&ts)
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Restore a trashed track. Returns false if the track wasn't in trash.
pub async fn restore_track(pool: &SqlitePool, track_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE tracks SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
    )
    .bind(now())
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Read a track's metadata bag and overlay `patch` on it.
async fn merged_metadata(
    pool: &SqlitePool,
    track_id: &str,
    patch: Map<String, Value>,
) -> sqlx::Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT metadata FROM tracks WHERE id = ?")
        .bind(track_id)
        .fetch_optional(pool)
        .await?;

    let mut metadata: Map<String, Value> = row
        .and_then(|(raw,)| serde_json::from_str(&raw).ok())
        .unwrap_or_default();
    metadata.extend(patch);
    Ok(Value::Object(metadata).to_string())
}

// ============================================================================
// Versions
// ============================================================================

/// An alternate render to store for a track.
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    pub id: String,
    pub parent_track_id: String,
    pub version_number: i64,
    pub is_preferred: bool,
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub duration: Option<f64>,
    pub lyrics: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Insert or update a version keyed by (parent track, version number).
///
/// Repeated callbacks for the same variant update it in place instead of
/// duplicating it. Returns the stored version's ID.
pub async fn upsert_version(pool: &SqlitePool, version: &NewVersion) -> sqlx::Result<String> {
    let row: (String,) = sqlx::query_as(
        r#"
        INSERT INTO track_versions (id, parent_track_id, version_number, is_preferred, title,
                                    audio_url, cover_url, duration, lyrics, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(parent_track_id, version_number) DO UPDATE SET
            is_preferred = excluded.is_preferred,
            title = COALESCE(excluded.title, title),
            audio_url = COALESCE(excluded.audio_url, audio_url),
            cover_url = COALESCE(excluded.cover_url, cover_url),
            duration = COALESCE(excluded.duration, duration),
            lyrics = COALESCE(excluded.lyrics, lyrics),
            metadata = excluded.metadata
        RETURNING id
        "#,
    )
    .bind(&version.id)
    .bind(&version.parent_track_id)
    .bind(version.version_number)
    .bind(version.is_preferred)
    .bind(&version.title)
    .bind(&version.audio_url)
    .bind(&version.cover_url)
    .bind(version.duration)
    .bind(&version.lyrics)
    .bind(Value::Object(version.metadata.clone()).to_string())
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// All versions of a track ordered by version number.
pub async fn get_versions_for_track(
    pool: &SqlitePool,
    track_id: &str,
) -> sqlx::Result<Vec<TrackVersion>> {
    sqlx::query_as(
        "SELECT * FROM track_versions WHERE parent_track_id = ? ORDER BY version_number",
    )
    .bind(track_id)
    .fetch_all(pool)
    .await
}

/// Flag one version as the track's master, clearing any previous master.
///
/// Both updates run in one transaction so the track never has two masters.
/// Fails with [`sqlx::Error::RowNotFound`] if the version doesn't belong to the track.
pub async fn set_master_version(
    pool: &SqlitePool,
    track_id: &str,
    version_id: &str,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    let owned: Option<(String,)> =
        sqlx::query_as("SELECT id FROM track_versions WHERE id = ? AND parent_track_id = ?")
            .bind(version_id)
            .bind(track_id)
            .fetch_optional(&mut *tx)
            .await?;
    if owned.is_none() {
        return Err(sqlx::Error::RowNotFound);
    }

    sqlx::query("UPDATE track_versions SET is_master = 0 WHERE parent_track_id = ?")
        .bind(track_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE track_versions SET is_master = 1 WHERE id = ?")
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

// ============================================================================
// Stems
// ============================================================================

/// A separated stem to store.
#[derive(Debug, Clone)]
pub struct NewStem {
    pub track_id: String,
    pub version_id: Option<String>,
    pub stem_type: StemType,
    pub separation_mode: SeparationMode,
    pub audio_url: String,
}

pub async fn insert_stem(pool: &SqlitePool, stem: &NewStem) -> sqlx::Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO track_stems (track_id, version_id, stem_type, separation_mode, audio_url, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&stem.track_id)
    .bind(&stem.version_id)
    .bind(stem.stem_type)
    .bind(stem.separation_mode)
    .bind(&stem.audio_url)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_stems_for_track(pool: &SqlitePool, track_id: &str) -> sqlx::Result<Vec<TrackStem>> {
    sqlx::query_as("SELECT * FROM track_stems WHERE track_id = ? ORDER BY id")
        .bind(track_id)
        .fetch_all(pool)
        .await
}

// ============================================================================
// Webhook deliveries
// ============================================================================

/// Processing state of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Processing,
    Completed,
    Failed,
}

/// Current state of a delivery, if it has been seen before.
pub async fn delivery_status(
    pool: &SqlitePool,
    delivery_id: &str,
) -> sqlx::Result<Option<DeliveryStatus>> {
    let row: Option<(DeliveryStatus,)> =
        sqlx::query_as("SELECT status FROM webhook_deliveries WHERE id = ?")
            .bind(delivery_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(status,)| status))
}

/// Register a delivery as in progress. A failed delivery may be re-registered.
pub async fn register_delivery(
    pool: &SqlitePool,
    delivery_id: &str,
    provider: Provider,
    task_id: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO webhook_deliveries (id, provider, task_id, status, received_at)
        VALUES (?, ?, ?, 'processing', ?)
        ON CONFLICT(id) DO UPDATE SET status = 'processing', error_message = NULL
        "#,
    )
    .bind(delivery_id)
    .bind(provider.as_str())
    .bind(task_id)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn complete_delivery(
    pool: &SqlitePool,
    delivery_id: &str,
    track_id: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE webhook_deliveries SET status = 'completed', track_id = ?, completed_at = ? WHERE id = ?",
    )
    .bind(track_id)
    .bind(now())
    .bind(delivery_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_delivery(pool: &SqlitePool, delivery_id: &str, message: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE webhook_deliveries SET status = 'failed', error_message = ? WHERE id = ?")
        .bind(message)
        .bind(delivery_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_new_track, mock_new_version, temp_db};

    #[tokio::test]
    async fn test_insert_and_get_track() {
        let (pool, _dir) = temp_db().await;
        let id = insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        assert_eq!(id, "t1");

        let track = get_track_by_id(&pool, "t1").await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Pending);
        assert_eq!(track.tags(), vec!["synthwave".to_string()]);
        assert_eq!(track.provider.as_deref(), Some("suno"));
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_key() {
        let (pool, _dir) = temp_db().await;
        let first = NewTrack {
            idempotency_key: Some("key-1".to_string()),
            ..mock_new_track("a")
        };
        let second = NewTrack {
            idempotency_key: Some("key-1".to_string()),
            ..mock_new_track("b")
        };

        assert_eq!(insert_track(&pool, &first).await.unwrap(), "a");
        assert_eq!(insert_track(&pool, &second).await.unwrap(), "a");
        assert_eq!(list_tracks(&pool, true).await.unwrap().len(), 1);

        let (id, created) = insert_or_get_track(&pool, &second).await.unwrap();
        assert_eq!(id, "a");
        assert!(!created);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();

        mark_processing(&pool, "t1", "task-9").await.unwrap();
        let track = get_track_by_task_id(&pool, "task-9").await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Processing);

        let media = CompletedMedia {
            audio_url: "https://cdn.example.com/a.mp3".to_string(),
            duration: Some(120.5),
            ..Default::default()
        };
        let mut patch = Map::new();
        patch.insert("clip_id".to_string(), Value::from("c1"));
        complete_track(&pool, "t1", &media, patch).await.unwrap();

        let track = get_track_by_id(&pool, "t1").await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Completed);
        assert_eq!(track.duration, Some(120.5));
        assert_eq!(track.metadata_value()["clip_id"], "c1");
        // Original metadata survives the merge
        assert_eq!(track.metadata_value()["prompt"], "test prompt");
    }

    #[tokio::test]
    async fn test_progress_does_not_reopen_terminal_track() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        fail_track(&pool, "t1", "boom", Map::new()).await.unwrap();

        record_progress(&pool, "t1", Some("https://x/y.mp3"), Map::new())
            .await
            .unwrap();

        let track = get_track_by_id(&pool, "t1").await.unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Failed);
        assert_eq!(track.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_trash_and_restore() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();

        assert!(trash_track(&pool, "t1").await.unwrap());
        assert!(!trash_track(&pool, "t1").await.unwrap());
        assert!(list_tracks(&pool, false).await.unwrap().is_empty());
        assert_eq!(list_tracks(&pool, true).await.unwrap().len(), 1);

        assert!(restore_track(&pool, "t1").await.unwrap());
        assert_eq!(list_tracks(&pool, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_version_updates_in_place() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();

        let id = upsert_version(&pool, &mock_new_version("v1", "t1", 1)).await.unwrap();
        let again = NewVersion {
            id: "v1-dup".to_string(),
            duration: Some(99.0),
            ..mock_new_version("v1", "t1", 1)
        };
        let id2 = upsert_version(&pool, &again).await.unwrap();

        assert_eq!(id, id2);
        let versions = get_versions_for_track(&pool, "t1").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].duration, Some(99.0));
    }

    #[tokio::test]
    async fn test_single_master_version() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        upsert_version(&pool, &mock_new_version("v0", "t1", 0)).await.unwrap();
        upsert_version(&pool, &mock_new_version("v1", "t1", 1)).await.unwrap();

        set_master_version(&pool, "t1", "v0").await.unwrap();
        set_master_version(&pool, "t1", "v1").await.unwrap();

        let masters: Vec<_> = get_versions_for_track(&pool, "t1")
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.is_master)
            .collect();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].id, "v1");
    }

    #[tokio::test]
    async fn test_master_version_must_belong_to_track() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        insert_track(&pool, &mock_new_track("t2")).await.unwrap();
        upsert_version(&pool, &mock_new_version("v1", "t2", 1)).await.unwrap();

        let result = set_master_version(&pool, "t1", "v1").await;
        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn test_stems() {
        let (pool, _dir) = temp_db().await;
        insert_track(&pool, &mock_new_track("t1")).await.unwrap();
        let stem = NewStem {
            track_id: "t1".to_string(),
            version_id: None,
            stem_type: StemType::Vocals,
            separation_mode: SeparationMode::SeparateVocal,
            audio_url: "https://cdn.example.com/vocals.mp3".to_string(),
        };
        insert_stem(&pool, &stem).await.unwrap();

        let stems = get_stems_for_track(&pool, "t1").await.unwrap();
        assert_eq!(stems.len(), 1);
        assert_eq!(stems[0].stem_type, StemType::Vocals);
        assert_eq!(stems[0].separation_mode, SeparationMode::SeparateVocal);
    }

    #[tokio::test]
    async fn test_delivery_lifecycle() {
        let (pool, _dir) = temp_db().await;
        assert_eq!(delivery_status(&pool, "d1").await.unwrap(), None);

        register_delivery(&pool, "d1", Provider::Suno, "task").await.unwrap();
        assert_eq!(
            delivery_status(&pool, "d1").await.unwrap(),
            Some(DeliveryStatus::Processing)
        );

        fail_delivery(&pool, "d1", "db down").await.unwrap();
        register_delivery(&pool, "d1", Provider::Suno, "task").await.unwrap();
        complete_delivery(&pool, "d1", Some("t1")).await.unwrap();
        assert_eq!(
            delivery_status(&pool, "d1").await.unwrap(),
            Some(DeliveryStatus::Completed)
        );
    }
}
