//! Internal domain models for music generation.
//!
//! These types are OUR types - they don't change when a provider's API
//! changes. Every provider response is converted into these via adapters.

use serde::{Deserialize, Serialize};

use crate::model::{Provider, SeparationMode, StemType, UnsupportedProvider};

/// Uniform generation input, the same shape for every provider.
///
/// Field names follow the JSON the front-end sends (`hasVocals`,
/// `styleTags`, `isBGM`, ...), so a request body deserializes directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Provider name; `None` uses the configured default
    pub provider: Option<String>,
    pub prompt: String,
    pub title: Option<String>,
    pub lyrics: Option<String>,
    /// Legacy tag list, used when `style_tags` is empty
    pub tags: Vec<String>,
    pub style_tags: Vec<String>,
    pub has_vocals: Option<bool>,
    /// Explicit instrumental flag; wins over `has_vocals` for Suno
    pub make_instrumental: Option<bool>,
    pub model_version: Option<String>,
    pub custom_mode: Option<bool>,
    pub idempotency_key: Option<String>,
    pub reference_audio_url: Option<String>,
    pub vocal_gender: Option<String>,
    pub style_weight: Option<f32>,
    pub lyrics_weight: Option<f32>,
    pub audio_weight: Option<f32>,
    pub weirdness: Option<f32>,
    pub negative_tags: Option<String>,
    /// Background-music mode (Mureka only)
    #[serde(rename = "isBGM")]
    pub is_bgm: Option<bool>,
}

/// Requested vocal gender. `any` is not sent to providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VocalGender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl VocalGender {
    /// Parse the request value; `any` and unknown values mean no preference.
    pub fn from_request(value: &str) -> Option<Self> {
        match value {
            "m" | "male" => Some(VocalGender::Male),
            "f" | "female" => Some(VocalGender::Female),
            _ => None,
        }
    }
}

/// A generation request after per-provider normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Style description; `None` in Suno custom mode
    pub prompt: Option<String>,
    pub lyrics: Option<String>,
    pub title: Option<String>,
    /// Trimmed, non-empty tags
    pub style_tags: Vec<String>,
    pub make_instrumental: bool,
    /// Background-music mode (Mureka only)
    pub bg_music: bool,
    pub model: String,
    pub custom_mode: bool,
    pub idempotency_key: String,
    pub reference_audio_url: Option<String>,
    pub vocal_gender: Option<VocalGender>,
    pub negative_tags: Vec<String>,
    /// Weights clamped to [0, 1]
    pub style_weight: Option<f32>,
    pub lyrics_weight: Option<f32>,
    pub audio_weight: Option<f32>,
    pub weirdness: Option<f32>,
}

/// Continue an existing clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendOptions {
    /// Provider clip ID to extend
    pub audio_id: String,
    pub prompt: Option<String>,
    pub title: Option<String>,
    pub style_tags: Vec<String>,
    /// Position in seconds to continue from
    pub continue_at: Option<f64>,
    pub model_version: Option<String>,
    pub make_instrumental: Option<bool>,
}

/// Split a clip into stems.
#[derive(Debug, Clone, PartialEq)]
pub struct StemOptions {
    /// Generation task the clip came from (Suno)
    pub task_id: Option<String>,
    /// Provider clip ID (Suno)
    pub audio_id: Option<String>,
    /// Public audio URL (Mureka)
    pub audio_url: Option<String>,
    pub mode: SeparationMode,
}

/// Accepted generation, extension or separation job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTask {
    pub provider: Provider,
    pub task_id: String,
}

/// Provider-side progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One rendered clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratedClip {
    pub id: String,
    pub audio_url: Option<String>,
    /// Playable before the final file is ready
    pub stream_audio_url: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub lyrics: Option<String>,
    pub tags: Vec<String>,
    /// Seconds
    pub duration: Option<f64>,
}

impl GeneratedClip {
    /// Best URL to start playback with.
    pub fn playable_url(&self) -> Option<&str> {
        self.audio_url
            .as_deref()
            .or(self.stream_audio_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// Task status as reported by a provider query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub status: TaskStatus,
    pub clips: Vec<GeneratedClip>,
    pub error: Option<String>,
}

/// Result of a stem separation request.
///
/// Suno answers asynchronously with a task ID; Mureka answers with a ZIP
/// of all stems.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StemResult {
    pub task_id: Option<String>,
    pub zip_url: Option<String>,
    pub stems: Vec<(StemType, String)>,
}

/// Remaining credits with a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub provider: Provider,
    pub credits: f64,
    pub currency: Option<String>,
    /// Served from the last successful response after a failed refresh
    pub stale: bool,
}

/// Errors that can occur talking to a provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("{provider} does not support {operation}")]
    NotSupported {
        provider: Provider,
        operation: &'static str,
    },

    #[error("No API key configured for {0}")]
    MissingApiKey(Provider),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::RateLimited => {
                true
            }
            ProviderError::Api { status, .. } => matches!(status, 408 | 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<UnsupportedProvider> for ProviderError {
    fn from(err: UnsupportedProvider) -> Self {
        ProviderError::UnsupportedProvider(err.0)
    }
}

/// Map a failed `reqwest` send into our error type.
pub(crate) fn network_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(0)
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Map a non-success HTTP status into our error type.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited;
    }
    ProviderError::Api {
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    }
}
