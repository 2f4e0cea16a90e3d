//! The media resource the playback controller drives.

use std::time::Duration;

use async_trait::async_trait;

/// Errors from loading or driving media.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Audio server answered HTTP {0}")]
    Http(u16),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    #[error("Load aborted")]
    Aborted,

    #[error("Audio load timeout")]
    Timeout,

    #[error("Audio device error: {0}")]
    Device(String),
}

impl MediaError {
    /// Worth another load attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::Network(_) | MediaError::Timeout => true,
            MediaError::Http(status) => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    /// Attach storage credentials
    pub with_credentials: bool,
}

/// Known once a source is ready to play.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub codec: Option<String>,
}

/// A single audio output.
///
/// `load` resolves once enough is buffered to start playback. Dropping the
/// future abandons the load.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn load(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError>;

    /// Fetch and check a source ahead of time without touching the current
    /// one. A later `load` of the same URL reuses the buffered head.
    async fn preload(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError>;

    fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    /// Drop the current source.
    fn stop(&self);

    fn seek(&self, position: Duration);

    fn set_volume(&self, volume: f32);

    fn position(&self) -> Duration;

    /// A source is loaded and buffered enough to play.
    fn is_ready(&self) -> bool;

    /// The loaded source played through to its end.
    fn has_ended(&self) -> bool;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MediaError::Network("reset".into()).is_transient());
        assert!(MediaError::Timeout.is_transient());
        assert!(MediaError::Http(503).is_transient());
        assert!(!MediaError::Http(404).is_transient());
        assert!(!MediaError::Decode("bad frame".into()).is_transient());
        assert!(!MediaError::Unsupported("midi".into()).is_transient());
        assert!(!MediaError::Aborted.is_transient());
        assert!(!MediaError::Device("no output".into()).is_transient());
    }
}
