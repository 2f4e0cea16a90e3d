//! Mureka API Data Transfer Objects
//!
//! DO NOT use these types outside the mureka module - convert to domain types.
//!
//! Mureka answers either with a bare object or wrapped in
//! `{ code, msg, data }`, and clip lists have appeared as `choices`,
//! `clips` and `data` across API versions; [`MaybeEnvelope`] and the
//! aliases below accept all of them.

use serde::{Deserialize, Serialize};

/// Either a `{ code, msg, data }` wrapper or the bare payload
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeEnvelope<T> {
    Wrapped {
        code: i64,
        #[serde(default)]
        msg: String,
        data: Option<T>,
    },
    Bare(T),
}

/// Body for `POST /v1/song/generate`
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GenerateRequest {
    /// Required by the API; instrumentals send a placeholder
    pub lyrics: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub model: String,
    /// Number of variants (2-3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
}

/// Body for `POST /v1/song/stem`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StemRequest {
    pub url: String,
}

/// Task as returned by generate and query
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(alias = "task_id")]
    pub id: String,
    /// pending, preparing, queued, running, streaming, succeeded, failed, timeouted, cancelled
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "clips", alias = "data")]
    pub choices: Vec<Clip>,
    #[serde(alias = "error")]
    pub failed_reason: Option<String>,
}

/// One generated song variant
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Clip {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "audio_url")]
    pub url: Option<String>,
    pub flac_url: Option<String>,
    #[serde(alias = "cover_url")]
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub lyrics: Option<String>,
    /// Milliseconds
    pub duration: Option<f64>,
    pub index: Option<u32>,
}

/// `GET /v1/account/billing`
#[derive(Debug, Clone, Deserialize)]
pub struct Billing {
    pub balance: f64,
    pub currency: Option<String>,
}

/// `POST /v1/song/stem`
#[derive(Debug, Clone, Deserialize)]
pub struct StemResponse {
    pub zip_url: Option<String>,
    pub expires_at: Option<i64>,
}
