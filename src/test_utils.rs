//! Test utilities and fixtures for trackforge tests.
//!
//! Common helpers, mock factories and database setup shared by the
//! `#[cfg(test)]` modules.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, mock_new_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     db::insert_track(&pool, &mock_new_track("t1")).await.unwrap();
//! }
//! ```

use serde_json::{Map, json};
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::db::{NewTrack, NewVersion};
use crate::model::Provider;
use crate::player::PlayableTrack;
use crate::providers::GenerationRequest;

/// Creates a temporary database for testing.
///
/// The database lives in a temporary directory that is removed when the
/// returned `TempDir` is dropped; keep it alive for the whole test.
/// Migrations are run automatically.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// A pending Suno track with one style tag and a prompt in its metadata.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let track = NewTrack {
///     idempotency_key: Some("key".into()),
///     ..mock_new_track("t1")
/// };
/// ```
pub fn mock_new_track(id: &str) -> NewTrack {
    let mut metadata = Map::new();
    metadata.insert("prompt".into(), json!("test prompt"));
    NewTrack {
        id: id.to_string(),
        title: format!("Track {id}"),
        provider: Some(Provider::Suno),
        task_id: None,
        lyrics: None,
        style_tags: vec!["synthwave".to_string()],
        metadata,
        idempotency_key: None,
    }
}

/// A version of `parent` with its own audio URL.
pub fn mock_new_version(id: &str, parent: &str, number: i64) -> NewVersion {
    NewVersion {
        id: id.to_string(),
        parent_track_id: parent.to_string(),
        version_number: number,
        is_preferred: false,
        title: Some(format!("Version {number}")),
        audio_url: Some(format!("https://cdn.example.com/{id}.mp3")),
        cover_url: None,
        duration: Some(180.0),
        lyrics: None,
        metadata: Map::new(),
    }
}

/// A normalized Suno-style request.
pub fn mock_generation_request() -> GenerationRequest {
    GenerationRequest {
        prompt: Some("dreamy synthwave".to_string()),
        lyrics: None,
        title: Some("Test Song".to_string()),
        style_tags: Vec::new(),
        make_instrumental: false,
        bg_music: false,
        model: "V4_5".to_string(),
        custom_mode: false,
        idempotency_key: "0123456789abcdef0123456789abcdef".to_string(),
        reference_audio_url: None,
        vocal_gender: None,
        negative_tags: Vec::new(),
        style_weight: None,
        lyrics_weight: None,
        audio_weight: None,
        weirdness: None,
    }
}

/// A playable base track at `https://cdn.example.com/{id}.mp3`.
pub fn mock_playable(id: &str) -> PlayableTrack {
    PlayableTrack {
        id: id.to_string(),
        title: format!("Track {id}"),
        audio_url: format!("https://cdn.example.com/{id}.mp3"),
        duration: Some(120.0),
        ..Default::default()
    }
}

/// Version `number` of `base`, with id `{base}-v{number}`.
pub fn mock_version_of(base: &str, number: i64) -> PlayableTrack {
    let id = format!("{base}-v{number}");
    PlayableTrack {
        title: format!("Track {base} v{number}"),
        parent_track_id: Some(base.to_string()),
        version_number: Some(number),
        ..mock_playable(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;
        let tracks = crate::db::list_tracks(&pool, true).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_mock_version_of() {
        let version = mock_version_of("t1", 2);
        assert_eq!(version.id, "t1-v2");
        assert_eq!(version.base_track_id(), "t1");
        assert_eq!(version.audio_url, "https://cdn.example.com/t1-v2.mp3");
    }
}
