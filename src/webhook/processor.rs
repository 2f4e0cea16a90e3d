//! Apply a parsed callback to the track library.

use serde_json::json;
use sqlx::SqlitePool;

use super::WebhookError;
use super::payload::{Callback, CallbackEvent};
use crate::db::{self, CompletedMedia, DeliveryStatus, NewVersion};
use crate::model::Provider;
use crate::providers::GeneratedClip;

/// What processing a callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Applied {
        track_id: String,
        stage: String,
        versions: usize,
    },
    /// This delivery was already applied
    AlreadyProcessed,
    /// No track carries the task id yet; the provider should retry
    TrackNotFound,
}

/// Delivery id for a callback without a delivery header.
///
/// Keyed on the resolved event rather than the raw stage label: a `complete`
/// callback that arrives before its audio is ready is a progress update and
/// must not shadow the real completion.
pub fn derived_delivery_id(callback: &Callback) -> String {
    let kind = match &callback.event {
        CallbackEvent::Progress { .. } => format!("progress-{}", callback.stage),
        CallbackEvent::Completed { .. } => "completed".to_string(),
        CallbackEvent::Failed { .. } => "failed".to_string(),
    };
    format!("{}:{}:{}", callback.provider, callback.task_id, kind)
}

/// Apply `callback` exactly once per `delivery_id`.
pub async fn process_callback(
    pool: &SqlitePool,
    callback: &Callback,
    delivery_id: &str,
) -> Result<ProcessOutcome, WebhookError> {
    if db::delivery_status(pool, delivery_id).await? == Some(DeliveryStatus::Completed) {
        tracing::info!(delivery_id, "Webhook delivery already processed");
        return Ok(ProcessOutcome::AlreadyProcessed);
    }

    let Some(track) = db::get_track_by_task_id(pool, &callback.task_id).await? else {
        tracing::warn!(
            provider = %callback.provider,
            task_id = %callback.task_id,
            "No track for callback task"
        );
        return Ok(ProcessOutcome::TrackNotFound);
    };

    db::register_delivery(pool, delivery_id, callback.provider, &callback.task_id).await?;

    match apply(pool, &track.id, callback).await {
        Ok(versions) => {
            db::complete_delivery(pool, delivery_id, Some(&track.id)).await?;
            tracing::info!(
                track_id = %track.id,
                stage = %callback.stage,
                versions,
                "Webhook applied"
            );
            Ok(ProcessOutcome::Applied {
                track_id: track.id,
                stage: callback.stage.clone(),
                versions,
            })
        }
        Err(e) => {
            if let Err(mark) = db::fail_delivery(pool, delivery_id, &e.to_string()).await {
                tracing::error!(delivery_id, error = %mark, "Failed to record delivery failure");
            }
            Err(e.into())
        }
    }
}

/// Returns the number of versions written.
async fn apply(pool: &SqlitePool, track_id: &str, callback: &Callback) -> sqlx::Result<usize> {
    let mut metadata = callback.metadata.clone();

    match &callback.event {
        CallbackEvent::Failed { message } => {
            tracing::error!(track_id, %message, "Generation failed");
            db::fail_track(pool, track_id, message, metadata).await?;
            Ok(0)
        }
        CallbackEvent::Progress { clips } => {
            let early_url = clips.first().and_then(GeneratedClip::playable_url);
            db::record_progress(pool, track_id, early_url, metadata).await?;
            Ok(0)
        }
        CallbackEvent::Completed { clips } => {
            let Some(first) = clips.first() else {
                tracing::error!(track_id, "Completion callback carried no clips");
                db::fail_track(pool, track_id, "No clips in completed callback", metadata)
                    .await?;
                return Ok(0);
            };
            metadata.insert("clip_id".into(), json!(first.id));
            let media = CompletedMedia {
                audio_url: first.playable_url().unwrap_or_default().to_string(),
                cover_url: first.image_url.clone(),
                video_url: first.video_url.clone(),
                duration: first.duration,
                lyrics: first.lyrics.clone(),
            };
            db::complete_track(pool, track_id, &media, metadata).await?;

            // Suno reports every variant, Mureka's first clip is the track itself
            let first_version = match callback.provider {
                Provider::Suno => 0,
                Provider::Mureka => 1,
            };
            let mut written = 0;
            for (index, clip) in clips.iter().enumerate().skip(first_version) {
                let version = version_from_clip(track_id, index, index == first_version, callback, clip);
                db::upsert_version(pool, &version).await?;
                written += 1;
            }
            Ok(written)
        }
    }
}

fn version_from_clip(
    track_id: &str,
    index: usize,
    preferred: bool,
    callback: &Callback,
    clip: &GeneratedClip,
) -> NewVersion {
    let mut metadata = serde_json::Map::new();
    metadata.insert("clip_id".into(), json!(clip.id));
    metadata.insert("provider".into(), json!(callback.provider.as_str()));
    metadata.insert("task_id".into(), json!(callback.task_id));
    if !clip.tags.is_empty() {
        metadata.insert("tags".into(), json!(clip.tags));
    }

    NewVersion {
        id: format!("{track_id}-v{index}"),
        parent_track_id: track_id.to_string(),
        version_number: index as i64,
        is_preferred: preferred,
        title: clip.title.clone(),
        audio_url: clip.playable_url().map(str::to_string),
        cover_url: clip.image_url.clone(),
        duration: clip.duration,
        lyrics: clip.lyrics.clone(),
        metadata,
    }
}
