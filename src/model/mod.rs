//! Core data models for generated music.
//!
//! Defines the primary entities: [`Track`], [`TrackVersion`], and [`TrackStem`],
//! plus the [`Provider`] and [`TrackStatus`] enums shared by every subsystem.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `tracks` - Generated or uploaded audio assets
//! - `track_versions` - Alternate renders of a base track
//! - `track_stems` - Isolated instrument/vocal layers
//! - `webhook_deliveries` - Provider callback idempotency log

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A third-party AI music generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Suno,
    Mureka,
}

impl Provider {
    /// All supported providers, in registry order.
    pub const ALL: [Provider; 2] = [Provider::Suno, Provider::Mureka];

    /// Lowercase identifier used in requests, config, and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Suno => "suno",
            Provider::Mureka => "mureka",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a provider name is not recognised.
///
/// Matching is case-sensitive: `"SUNO"` is not a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported provider: {0}")]
pub struct UnsupportedProvider(pub String);

impl FromStr for Provider {
    type Err = UnsupportedProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suno" => Ok(Provider::Suno),
            "mureka" => Ok(Provider::Mureka),
            other => Err(UnsupportedProvider(other.to_string())),
        }
    }
}

/// Generation lifecycle of a track.
///
/// Transitions are `Pending -> Processing -> (Completed | Failed)` and are
/// driven by provider callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TrackStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Processing => "processing",
            TrackStatus::Completed => "completed",
            TrackStatus::Failed => "failed",
        }
    }

    /// Whether no further callback can move the track.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Completed | TrackStatus::Failed)
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated (or uploaded) audio asset.
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    /// Track ID (caller-assigned, unique)
    pub id: String,
    /// Display title
    pub title: String,
    /// Generation status
    pub status: TrackStatus,
    /// Provider name (`suno` / `mureka`), `None` for uploads
    pub provider: Option<String>,
    /// Provider task ID used to match callbacks
    pub task_id: Option<String>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub video_url: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub lyrics: Option<String>,
    /// Style tags as a JSON array
    pub style_tags: String,
    pub like_count: i64,
    pub view_count: i64,
    /// Provider-specific fields as a JSON object
    pub metadata: String,
    pub error_message: Option<String>,
    pub idempotency_key: Option<String>,
    /// RFC 3339 timestamp when the track was moved to trash
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Track {
    /// Decoded style tags; malformed JSON yields an empty list.
    pub fn tags(&self) -> Vec<String> {
        serde_json::from_str(&self.style_tags).unwrap_or_default()
    }

    /// Decoded metadata bag; malformed JSON yields an empty object.
    pub fn metadata_value(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_str(&self.metadata).unwrap_or_default()
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// An alternate render of a base track.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TrackVersion {
    pub id: String,
    /// Base track this version belongs to
    pub parent_track_id: String,
    /// Variant index; 0 is the original render
    pub version_number: i64,
    /// Canonical render of the track (at most one per track)
    pub is_master: bool,
    pub is_preferred: bool,
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub duration: Option<f64>,
    pub lyrics: Option<String>,
    pub metadata: String,
    pub created_at: String,
}

/// Kind of isolated layer produced by stem separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StemType {
    Vocals,
    Instrumental,
    Drums,
    Bass,
    Guitar,
    Piano,
    Other,
}

impl StemType {
    /// Map a provider's stem label onto our stem types.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "vocal" | "vocals" | "voice" => StemType::Vocals,
            "instrumental" | "accompaniment" | "backing" => StemType::Instrumental,
            "drums" | "drum" => StemType::Drums,
            "bass" => StemType::Bass,
            "guitar" => StemType::Guitar,
            "piano" | "keys" => StemType::Piano,
            _ => StemType::Other,
        }
    }
}

/// Stem separation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SeparationMode {
    /// Two stems: vocals and instrumental
    SeparateVocal,
    /// Full multi-instrument split
    SplitStem,
}

impl SeparationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeparationMode::SeparateVocal => "separate_vocal",
            SeparationMode::SplitStem => "split_stem",
        }
    }
}

/// One isolated instrument/vocal layer extracted from a track or version.
#[derive(Debug, Clone, FromRow)]
pub struct TrackStem {
    pub id: i64,
    pub track_id: String,
    pub version_id: Option<String>,
    pub stem_type: StemType,
    pub separation_mode: SeparationMode,
    pub audio_url: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_sensitive() {
        assert_eq!("suno".parse::<Provider>(), Ok(Provider::Suno));
        assert_eq!("mureka".parse::<Provider>(), Ok(Provider::Mureka));
        assert!("SUNO".parse::<Provider>().is_err());
    }

    #[test]
    fn test_unsupported_provider_names_the_input() {
        let err = "replicate".parse::<Provider>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported provider: replicate");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!TrackStatus::Pending.is_terminal());
        assert!(!TrackStatus::Processing.is_terminal());
        assert!(TrackStatus::Completed.is_terminal());
        assert!(TrackStatus::Failed.is_terminal());
    }

    #[test]
    fn test_stem_labels() {
        assert_eq!(StemType::from_label("Vocals"), StemType::Vocals);
        assert_eq!(StemType::from_label("accompaniment"), StemType::Instrumental);
        assert_eq!(StemType::from_label("synth"), StemType::Other);
    }
}
