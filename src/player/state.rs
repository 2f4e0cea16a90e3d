//! Player state and event types.

use std::time::Duration;

use crate::model::{Track, TrackVersion};

/// Current playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

/// Something the player can play: a base track or one of its versions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayableTrack {
    pub id: String,
    pub title: String,
    pub audio_url: String,
    pub cover_url: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub lyrics: Option<String>,
    pub style_tags: Vec<String>,
    /// Base track when this is a version
    pub parent_track_id: Option<String>,
    pub version_number: Option<i64>,
    pub is_master: bool,
}

impl PlayableTrack {
    /// The base track this entry belongs to.
    pub fn base_track_id(&self) -> &str {
        self.parent_track_id.as_deref().unwrap_or(&self.id)
    }

    pub fn is_original_version(&self) -> bool {
        self.version_number.unwrap_or(0) == 0
    }

    /// A stored version of `parent`. Versions without a title inherit the parent's.
    pub fn from_version(version: &TrackVersion, parent_title: &str) -> Self {
        Self {
            id: version.id.clone(),
            title: version
                .title
                .clone()
                .unwrap_or_else(|| format!("{parent_title} (v{})", version.version_number)),
            audio_url: version.audio_url.clone().unwrap_or_default(),
            cover_url: version.cover_url.clone(),
            duration: version.duration,
            lyrics: version.lyrics.clone(),
            style_tags: Vec::new(),
            parent_track_id: Some(version.parent_track_id.clone()),
            version_number: Some(version.version_number),
            is_master: version.is_master,
        }
    }
}

impl From<&Track> for PlayableTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            audio_url: track.audio_url.clone().unwrap_or_default(),
            cover_url: track.cover_url.clone(),
            duration: track.duration,
            lyrics: track.lyrics.clone(),
            style_tags: track.tags(),
            parent_track_id: None,
            version_number: None,
            is_master: false,
        }
    }
}

/// Shared player state.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub status: PlaybackStatus,
    pub current_track: Option<PlayableTrack>,
    /// Current position in the track
    pub position: Duration,
    /// Total duration of the track
    pub duration: Duration,
    /// Volume level (0.0 - 1.0)
    pub volume: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            current_track: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
        }
    }
}

impl PlayerState {
    /// Get position as a fraction (0.0 - 1.0).
    pub fn position_fraction(&self) -> f32 {
        if self.duration.is_zero() {
            0.0
        } else {
            self.position.as_secs_f32() / self.duration.as_secs_f32()
        }
    }

    /// Format position as MM:SS.
    pub fn position_str(&self) -> String {
        format_duration(self.position)
    }

    /// Format duration as MM:SS.
    pub fn duration_str(&self) -> String {
        format_duration(self.duration)
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing message (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// State changes broadcast by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StatusChanged(PlaybackStatus),
    /// Track id now loaded, `None` after clear
    TrackChanged(Option<String>),
    /// The track played through to its end
    TrackEnded(String),
    Notice(Notice),
}
