//! Audio player for generated tracks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    AudioPlayer (coordinator)                 │
//! │     commands are method calls, events go out on a channel    │
//! └───────┬──────────────────────┬────────────────────────┬──────┘
//!         │                      │                        │
//!         ▼                      ▼                        ▼
//! ┌───────────────┐    ┌───────────────────┐    ┌───────────────────┐
//! │  PlayQueue    │    │ PlaybackController│    │   VersionCache    │
//! │ cursor, dedup │    │ one load at a time│    │ renders of track  │
//! └───────────────┘    └─────────┬─────────┘    └─────────┬─────────┘
//!                                │ MediaBackend           │ VersionStore
//!                                ▼                        ▼
//!                 cpal device (or HTTP clock)          SQLite
//! ```

mod backend;
mod debounce;
mod decoder;
mod output;
mod playback;
mod queue;
mod resampler;
mod source;
mod state;
mod stream;
pub mod url;
mod versions;

pub use backend::{LoadRequest, MediaBackend, MediaError, MediaInfo};
pub use debounce::Debouncer;
pub use output::DeviceBackend;
pub use playback::{LoadSettings, PlaybackController, PlaybackError};
pub use queue::PlayQueue;
pub use state::{
    Notice, NoticeLevel, PlayableTrack, PlaybackStatus, PlayerEvent, PlayerState, format_duration,
};
pub use stream::HttpStreamBackend;
pub use versions::{VersionCache, VersionError, VersionStore};

use std::sync::Arc;

use crossbeam_channel::{Receiver, unbounded};
use sqlx::SqlitePool;

use crate::config::PlaybackConfig;
use url::UrlPolicy;

/// Queue, versions and playback behind one interface.
pub struct AudioPlayer {
    playback: PlaybackController,
    queue: PlayQueue,
    versions: VersionCache,
    events: Receiver<PlayerEvent>,
}

impl AudioPlayer {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn VersionStore>,
        config: &PlaybackConfig,
    ) -> Self {
        let (events_tx, events) = unbounded();
        let playback = PlaybackController::new(
            backend,
            UrlPolicy::from_config(config),
            LoadSettings::from_config(config),
            events_tx,
        );
        playback.set_volume(config.volume);
        playback.flush_now();

        Self {
            playback,
            queue: PlayQueue::new(),
            versions: VersionCache::new(store),
            events,
        }
    }

    /// Player on the default audio device, falling back to the HTTP clock
    /// backend when no device can be opened.
    pub fn with_device_backend(
        pool: SqlitePool,
        config: &PlaybackConfig,
        storage_token: Option<String>,
    ) -> Self {
        match DeviceBackend::new(storage_token.clone()) {
            Ok(backend) => Self::new(Arc::new(backend), Arc::new(pool), config),
            Err(e) => {
                tracing::warn!(error = %e, "No audio device, playing without sound");
                Self::with_http_backend(pool, config, storage_token)
            }
        }
    }

    /// Player streaming over HTTP with versions from the library database.
    pub fn with_http_backend(
        pool: SqlitePool,
        config: &PlaybackConfig,
        storage_token: Option<String>,
    ) -> Self {
        Self::new(
            Arc::new(HttpStreamBackend::new(storage_token)),
            Arc::new(pool),
            config,
        )
    }

    /// Play a track, loading its versions first.
    pub async fn play_track(&mut self, track: PlayableTrack) -> Result<(), PlaybackError> {
        let base = track.base_track_id().to_string();
        if let Err(e) = self.versions.load_versions(&base, false).await {
            tracing::warn!(track_id = %base, error = %e, "Could not load versions");
        }
        self.playback.play_track(track).await
    }

    /// Replace the queue with `tracks` and play `track` from it.
    pub async fn play_track_with_queue(
        &mut self,
        track: PlayableTrack,
        tracks: Vec<PlayableTrack>,
    ) -> Result<(), PlaybackError> {
        self.queue.set_tracks(tracks, Some(track.id.as_str()));
        if !self.queue.contains(&track.id) {
            self.queue.add_next(track.clone());
            if let Some(index) = self.queue.items().iter().position(|t| t.id == track.id) {
                self.queue.jump_to(index);
            }
        }
        self.play_track(track).await
    }

    /// Play the next queue entry. Returns false at the end of the queue.
    pub async fn play_next(&mut self) -> Result<bool, PlaybackError> {
        let mut chosen = None;
        self.queue.play_next(|t| chosen = Some(t.clone()));
        match chosen {
            Some(track) => self.play_track(track).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Play the previous queue entry. Returns false at the start of the queue.
    pub async fn play_previous(&mut self) -> Result<bool, PlaybackError> {
        let mut chosen = None;
        self.queue.play_previous(|t| chosen = Some(t.clone()));
        match chosen {
            Some(track) => self.play_track(track).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Switch playback to another version of the current track.
    pub async fn switch_to_version(&mut self, version_id: &str) -> crate::error::Result<()> {
        let current = self.playback.state().current_track;
        let version = match self
            .versions
            .switch_to_version(version_id, current.as_ref())
            .await
        {
            Ok(version) => version,
            Err(e) => {
                let notice = match &e {
                    VersionError::NoAudio(_) => {
                        Notice::error("Version unavailable", "No audio for this version")
                    }
                    _ => Notice::error("Version not found", "Try refreshing the track list"),
                };
                self.playback.notify(notice);
                return Err(e.into());
            }
        };
        self.playback.play_track(version).await?;
        Ok(())
    }

    pub fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        self.playback.toggle_play_pause()
    }

    pub fn pause(&self) {
        self.playback.pause();
    }

    pub fn seek_to(&self, seconds: f64) {
        self.playback.seek_to(seconds);
    }

    pub fn set_volume(&self, volume: f32) {
        self.playback.set_volume(volume);
    }

    /// Stop playback and drop the current track. The queue is kept.
    pub fn clear(&self) {
        self.playback.clear();
    }

    /// Periodic housekeeping: flush debounced writes and refresh position.
    pub fn tick(&self) {
        self.playback.flush_pending();
        self.playback.sync_position();
    }

    /// Tracks worth fetching ahead of time: the next queue entry and the
    /// next version, each handed out once.
    pub fn preload_candidates(&mut self) -> Vec<PlayableTrack> {
        self.queue
            .take_preload()
            .into_iter()
            .chain(self.versions.next_version_to_preload())
            .collect()
    }

    /// Fetch the preload candidates through the backend. Failures are
    /// logged and skipped; the track will load normally when played.
    pub async fn preload_next(&mut self) -> usize {
        let mut preloaded = 0;
        for track in self.preload_candidates() {
            match self.playback.preload(&track).await {
                Ok(_) => preloaded += 1,
                Err(e) => {
                    tracing::debug!(track_id = %track.id, error = %e, "Preload skipped")
                }
            }
        }
        preloaded
    }

    pub fn available_versions(&self) -> Vec<PlayableTrack> {
        self.versions.available_versions()
    }

    /// Drop cached versions so the next play reloads them.
    pub fn invalidate_versions(&mut self, track_id: &str) {
        self.versions.invalidate(track_id);
    }

    pub fn state(&self) -> PlayerState {
        self.playback.state()
    }

    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PlayQueue {
        &mut self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::backend::mocks::MockBackend;
    use crate::player::versions::mocks::MockVersionStore;
    use crate::test_utils::{mock_playable, mock_version_of};

    fn player() -> (AudioPlayer, Arc<MockBackend>, Arc<MockVersionStore>) {
        let backend = Arc::new(MockBackend::new());
        let store = Arc::new(MockVersionStore::with(
            "t1",
            vec![mock_playable("t1"), mock_version_of("t1", 1)],
        ));
        let config = PlaybackConfig {
            retry_base_delay_ms: 1,
            ..Default::default()
        };
        (
            AudioPlayer::new(backend.clone(), store.clone(), &config),
            backend,
            store,
        )
    }

    #[test]
    fn test_player_state_default() {
        let (player, _, _) = player();
        let state = player.state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.volume, 1.0);
    }

    #[tokio::test]
    async fn test_queue_navigation_plays_tracks() {
        let (mut player, backend, _) = player();
        let tracks = vec![mock_playable("t1"), mock_playable("t2")];
        player
            .play_track_with_queue(mock_playable("t1"), tracks)
            .await
            .unwrap();
        assert_eq!(player.queue().current_index(), Some(0));

        assert!(player.play_next().await.unwrap());
        assert_eq!(player.state().current_track.unwrap().id, "t2");
        assert!(!player.play_next().await.unwrap());

        assert!(player.play_previous().await.unwrap());
        assert_eq!(
            backend.loaded_url().as_deref(),
            Some("https://cdn.example.com/t1.mp3")
        );
    }

    #[tokio::test]
    async fn test_switch_version() {
        let (mut player, _, store) = player();
        player.play_track(mock_playable("t1")).await.unwrap();
        assert_eq!(player.available_versions().len(), 2);

        player.switch_to_version("t1-v1").await.unwrap();
        let current = player.state().current_track.unwrap();
        assert_eq!(current.id, "t1-v1");
        assert_eq!(store.fetch_count(), 1);

        let err = player.switch_to_version("t1-v9").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Version(VersionError::NotFound(_))
        ));
        assert_eq!(store.fetch_count(), 2);
        assert!(player.events().try_iter().any(|e| matches!(
            e,
            PlayerEvent::Notice(Notice { level: NoticeLevel::Error, .. })
        )));
    }

    #[tokio::test]
    async fn test_preload_candidates() {
        let (mut player, _, _) = player();
        let tracks = vec![mock_playable("t1"), mock_playable("t2")];
        player
            .play_track_with_queue(mock_playable("t1"), tracks)
            .await
            .unwrap();

        let ids: Vec<String> = player
            .preload_candidates()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t2".to_string(), "t1-v1".to_string()]);
        assert!(player.preload_candidates().is_empty());
    }

    #[tokio::test]
    async fn test_preload_next_fetches_through_backend() {
        let (mut player, backend, _) = player();
        let tracks = vec![mock_playable("t1"), mock_playable("t2")];
        player
            .play_track_with_queue(mock_playable("t1"), tracks)
            .await
            .unwrap();

        assert_eq!(player.preload_next().await, 2);
        assert_eq!(
            backend.preloaded_urls(),
            vec![
                "https://cdn.example.com/t2.mp3".to_string(),
                "https://cdn.example.com/t1-v1.mp3".to_string(),
            ]
        );
        assert_eq!(player.state().current_track.unwrap().id, "t1");

        // Each candidate is fetched once
        assert_eq!(player.preload_next().await, 0);
        assert_eq!(backend.preloaded_urls().len(), 2);
    }
}
