//! Callback payload schemas.
//!
//! Each provider posts its own shape; both are reduced to a [`Callback`]
//! before anything touches the database.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::WebhookError;
use crate::model::Provider;
use crate::providers::GeneratedClip;
use crate::providers::suno::split_tags;

/// What a callback asks us to do with its track.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    /// Intermediate stage, possibly with an early playable clip
    Progress { clips: Vec<GeneratedClip> },
    /// Final clips; the first one is always playable
    Completed { clips: Vec<GeneratedClip> },
    Failed { message: String },
}

/// Provider-neutral view of one callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    pub provider: Provider,
    pub task_id: String,
    /// Provider stage label (`text`, `first`, `complete`, `error`, `processing`, ...)
    pub stage: String,
    pub event: CallbackEvent,
    /// Provider-specific fields merged into the track metadata
    pub metadata: Map<String, Value>,
}

// ============================================================================
// Suno
// ============================================================================

#[derive(Debug, Deserialize)]
struct SunoCallback {
    code: i64,
    #[serde(default)]
    msg: String,
    data: SunoCallbackData,
}

#[derive(Debug, Deserialize)]
struct SunoCallbackData {
    #[serde(rename = "callbackType")]
    callback_type: SunoStage,
    task_id: String,
    #[serde(default)]
    data: Option<Vec<SunoClip>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SunoStage {
    Text,
    First,
    Complete,
    Error,
}

impl SunoStage {
    fn as_str(self) -> &'static str {
        match self {
            SunoStage::Text => "text",
            SunoStage::First => "first",
            SunoStage::Complete => "complete",
            SunoStage::Error => "error",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SunoClip {
    id: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    stream_audio_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl From<SunoClip> for GeneratedClip {
    fn from(clip: SunoClip) -> Self {
        GeneratedClip {
            id: clip.id,
            audio_url: non_empty(clip.audio_url),
            stream_audio_url: non_empty(clip.stream_audio_url),
            image_url: non_empty(clip.image_url),
            video_url: None,
            title: clip.title,
            // Suno echoes the lyrics back in `prompt` for custom-mode songs
            lyrics: non_empty(clip.prompt),
            tags: split_tags(clip.tags.as_deref()),
            duration: clip.duration,
        }
    }
}

fn from_suno(payload: SunoCallback) -> Result<Callback, WebhookError> {
    let data = payload.data;
    require_task_id(&data.task_id)?;
    let stage = data.callback_type;
    let clips: Vec<GeneratedClip> = data
        .data
        .unwrap_or_default()
        .into_iter()
        .map(GeneratedClip::from)
        .collect();

    let mut metadata = Map::new();
    metadata.insert("suno_callback_stage".into(), json!(stage.as_str()));

    let event = if payload.code >= 400 || matches!(stage, SunoStage::Error) {
        metadata.insert("suno_callback_code".into(), json!(payload.code));
        metadata.insert("suno_callback_msg".into(), json!(payload.msg));
        let message = if payload.msg.is_empty() {
            "Generation failed".to_string()
        } else {
            payload.msg
        };
        CallbackEvent::Failed { message }
    } else if matches!(stage, SunoStage::Complete) && has_playable_head(&clips) {
        CallbackEvent::Completed { clips }
    } else {
        CallbackEvent::Progress { clips }
    };

    Ok(Callback {
        provider: Provider::Suno,
        task_id: data.task_id,
        stage: stage.as_str().to_string(),
        event,
        metadata,
    })
}

// ============================================================================
// Mureka
// ============================================================================

#[derive(Debug, Deserialize)]
struct MurekaCallback {
    #[allow(dead_code)]
    code: i64,
    #[serde(default)]
    #[allow(dead_code)]
    msg: String,
    data: MurekaCallbackData,
}

#[derive(Debug, Deserialize)]
struct MurekaCallbackData {
    task_id: String,
    status: MurekaStatus,
    #[serde(default)]
    clips: Option<Vec<MurekaClip>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MurekaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MurekaStatus {
    fn as_str(self) -> &'static str {
        match self {
            MurekaStatus::Pending => "pending",
            MurekaStatus::Processing => "processing",
            MurekaStatus::Completed => "completed",
            MurekaStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MurekaClip {
    id: String,
    audio_url: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    title: String,
    #[serde(default)]
    lyrics: Option<String>,
    /// Milliseconds
    duration: f64,
    #[allow(dead_code)]
    created_at: String,
    #[serde(default)]
    metadata: Option<Value>,
}

impl From<MurekaClip> for GeneratedClip {
    fn from(clip: MurekaClip) -> Self {
        GeneratedClip {
            id: clip.id,
            audio_url: non_empty(Some(clip.audio_url)),
            stream_audio_url: None,
            image_url: non_empty(clip.image_url),
            video_url: non_empty(clip.video_url),
            lyrics: non_empty(clip.lyrics).or_else(|| Some(clip.title.clone())),
            title: Some(clip.title),
            tags: Vec::new(),
            duration: Some(clip.duration / 1000.0),
        }
    }
}

fn from_mureka(payload: MurekaCallback) -> Result<Callback, WebhookError> {
    let data = payload.data;
    require_task_id(&data.task_id)?;
    let status = data.status;
    let raw_clips = data.clips.unwrap_or_default();

    let mut metadata = Map::new();
    metadata.insert("mureka_status".into(), json!(status.as_str()));
    if let Some(first) = raw_clips.first() {
        metadata.insert("mureka_clip_id".into(), json!(first.id));
        metadata.insert("clips_count".into(), json!(raw_clips.len()));
        if let Some(extra) = &first.metadata {
            metadata.insert("mureka_metadata".into(), extra.clone());
        }
    }
    let clips: Vec<GeneratedClip> = raw_clips.into_iter().map(GeneratedClip::from).collect();

    let event = match status {
        MurekaStatus::Failed => CallbackEvent::Failed {
            message: data
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Generation failed".to_string()),
        },
        MurekaStatus::Completed if has_playable_head(&clips) => CallbackEvent::Completed { clips },
        _ => CallbackEvent::Progress { clips },
    };

    Ok(Callback {
        provider: Provider::Mureka,
        task_id: data.task_id,
        stage: status.as_str().to_string(),
        event,
        metadata,
    })
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse and validate a raw callback body.
pub fn parse_callback(provider: Provider, body: &[u8]) -> Result<Callback, WebhookError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(WebhookError::InvalidPayload(vec![
            "body: expected a JSON object".to_string(),
        ]));
    }

    match provider {
        Provider::Suno => from_suno(serde_json::from_value(value).map_err(schema_error)?),
        Provider::Mureka => from_mureka(serde_json::from_value(value).map_err(schema_error)?),
    }
}

fn schema_error(e: serde_json::Error) -> WebhookError {
    WebhookError::InvalidPayload(vec![e.to_string()])
}

fn require_task_id(task_id: &str) -> Result<(), WebhookError> {
    if task_id.trim().is_empty() {
        return Err(WebhookError::InvalidPayload(vec![
            "data.task_id: must not be empty".to_string(),
        ]));
    }
    Ok(())
}

fn has_playable_head(clips: &[GeneratedClip]) -> bool {
    clips.first().and_then(GeneratedClip::playable_url).is_some()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suno_body(stage: &str, code: i64, clips: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "code": code,
            "msg": "All generated successfully.",
            "data": { "callbackType": stage, "task_id": "task-1", "data": clips }
        }))
        .unwrap()
    }

    #[test]
    fn test_suno_complete() {
        let body = suno_body(
            "complete",
            200,
            json!([
                { "id": "a", "audio_url": "https://cdn/a.mp3", "image_url": "https://cdn/a.jpg",
                  "prompt": "[Verse] hi", "title": "A", "tags": "pop, dreamy", "duration": 120.5 },
                { "id": "b", "audio_url": "https://cdn/b.mp3", "title": "B" }
            ]),
        );
        let callback = parse_callback(Provider::Suno, &body).unwrap();
        assert_eq!(callback.stage, "complete");
        let CallbackEvent::Completed { clips } = callback.event else {
            panic!("expected completion");
        };
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].lyrics.as_deref(), Some("[Verse] hi"));
        assert_eq!(clips[0].tags, vec!["pop".to_string(), "dreamy".to_string()]);
        assert_eq!(clips[0].duration, Some(120.5));
    }

    #[test]
    fn test_suno_first_stage_is_progress() {
        let body = suno_body(
            "first",
            200,
            json!([{ "id": "a", "stream_audio_url": "https://cdn/a-stream" }]),
        );
        let callback = parse_callback(Provider::Suno, &body).unwrap();
        let CallbackEvent::Progress { clips } = callback.event else {
            panic!("expected progress");
        };
        assert_eq!(clips[0].playable_url(), Some("https://cdn/a-stream"));
    }

    #[test]
    fn test_suno_error_code_fails() {
        let body = suno_body("complete", 451, json!(null));
        let callback = parse_callback(Provider::Suno, &body).unwrap();
        assert!(matches!(callback.event, CallbackEvent::Failed { .. }));
        assert_eq!(callback.metadata["suno_callback_code"], json!(451));
    }

    #[test]
    fn test_suno_complete_without_clips_is_progress() {
        let body = suno_body("complete", 200, json!([]));
        let callback = parse_callback(Provider::Suno, &body).unwrap();
        assert_eq!(callback.event, CallbackEvent::Progress { clips: vec![] });
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let body = suno_body("bogus", 200, json!([]));
        let err = parse_callback(Provider::Suno, &body).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_callback(Provider::Suno, b"{not json").unwrap_err();
        assert!(matches!(err, WebhookError::InvalidJson(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_empty_task_id_rejected() {
        let body = br#"{"code":200,"data":{"task_id":" ","status":"pending"}}"#;
        let err = parse_callback(Provider::Mureka, body).unwrap_err();
        assert!(err.to_string().contains("data.task_id"));
    }

    #[test]
    fn test_mureka_completed() {
        let body = serde_json::to_vec(&json!({
            "code": 200,
            "msg": "ok",
            "data": {
                "task_id": "m-1",
                "status": "completed",
                "clips": [
                    { "id": "c1", "audio_url": "https://cdn/1.mp3", "title": "One",
                      "duration": 90000, "created_at": "2025-01-01T00:00:00Z" },
                    { "id": "c2", "audio_url": "https://cdn/2.mp3", "title": "Two",
                      "lyrics": "la la", "duration": 60000, "created_at": "2025-01-01T00:00:00Z" }
                ]
            }
        }))
        .unwrap();
        let callback = parse_callback(Provider::Mureka, &body).unwrap();
        assert_eq!(callback.metadata["mureka_clip_id"], json!("c1"));
        assert_eq!(callback.metadata["clips_count"], json!(2));
        let CallbackEvent::Completed { clips } = callback.event else {
            panic!("expected completion");
        };
        assert_eq!(clips[0].duration, Some(90.0));
        assert_eq!(clips[0].lyrics.as_deref(), Some("One"));
        assert_eq!(clips[1].lyrics.as_deref(), Some("la la"));
    }

    #[test]
    fn test_mureka_failed_uses_error() {
        let body = br#"{"code":200,"data":{"task_id":"m-1","status":"failed","error":"moderation"}}"#;
        let callback = parse_callback(Provider::Mureka, body).unwrap();
        assert_eq!(
            callback.event,
            CallbackEvent::Failed {
                message: "moderation".into()
            }
        );
    }

    #[test]
    fn test_mureka_clip_missing_fields() {
        let body = br#"{"code":200,"data":{"task_id":"m-1","status":"completed","clips":[{"id":"c"}]}}"#;
        assert!(matches!(
            parse_callback(Provider::Mureka, body),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
