//! Suno API Data Transfer Objects
//!
//! These types match what the Suno API (api.sunoapi.org) sends and expects.
//! DO NOT use these types outside the suno module - convert to domain types.
//!
//! Every response is wrapped in `{ code, msg, data }` where `code` mirrors
//! an HTTP status (200 = success).

use serde::{Deserialize, Serialize};

/// Response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Body for `POST /generate` and `POST /generate/upload-cover`
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Style description, or the lyrics in custom mode
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub custom_mode: bool,
    pub instrumental: bool,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_tags: Option<String>,
    /// `m` or `f`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weirdness_constraint: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_weight: Option<f32>,
    /// Reference audio for cover generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_back_url: Option<String>,
}

/// Body for `POST /generate/extend`
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtendRequest {
    pub audio_id: String,
    /// `true` when custom parameters (prompt/style/title/continueAt) are sent
    pub default_param_flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumental: Option<bool>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_back_url: Option<String>,
}

/// Body for `POST /vocal-removal/generate`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StemRequest {
    pub task_id: String,
    pub audio_id: String,
    /// `separate_vocal` or `split_stem`
    #[serde(rename = "type")]
    pub separation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_back_url: Option<String>,
}

/// `data` of a task-creating response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
}

/// `data` of `GET /generate/record-info`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub task_id: String,
    /// PENDING, TEXT_SUCCESS, FIRST_SUCCESS, SUCCESS, or one of the *_FAILED / *_ERROR codes
    pub status: String,
    pub response: Option<RecordResponse>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    #[serde(default)]
    pub suno_data: Vec<SunoTrack>,
}

/// One clip as returned by record-info (camelCase fields)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunoTrack {
    pub id: String,
    pub audio_url: Option<String>,
    pub stream_audio_url: Option<String>,
    pub image_url: Option<String>,
    pub prompt: Option<String>,
    pub title: Option<String>,
    /// Comma-separated
    pub tags: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
}
