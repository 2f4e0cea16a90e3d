//! Load/play/pause/seek/volume lifecycle for one media backend.
//!
//! Only one load is live at a time. Every `play_track` bumps a generation
//! counter and signals the previous load to stop; a superseded load returns
//! [`PlaybackError::Cancelled`] without touching state or raising a notice.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::backend::{LoadRequest, MediaBackend, MediaError, MediaInfo};
use super::debounce::Debouncer;
use super::state::{Notice, PlayableTrack, PlaybackStatus, PlayerEvent, PlayerState};
use super::url::UrlPolicy;
use crate::config::PlaybackConfig;

/// Playback errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Audio URL is missing")]
    MissingUrl,

    #[error("Not an audio URL: {0}")]
    UnknownFormat(String),

    #[error("No audio loaded")]
    NotReady,

    #[error("Superseded by a newer request")]
    Cancelled,

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Timing for loads.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Readiness timeout per attempt
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub seek_debounce: Duration,
    pub volume_debounce: Duration,
}

impl LoadSettings {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.load_timeout_secs),
            max_attempts: config.max_load_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            seek_debounce: Duration::from_millis(config.seek_debounce_ms),
            volume_debounce: Duration::from_millis(config.volume_debounce_ms),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

/// Owns one media backend and the shared state snapshot.
pub struct PlaybackController {
    backend: Arc<dyn MediaBackend>,
    state: Arc<RwLock<PlayerState>>,
    events: Sender<PlayerEvent>,
    policy: UrlPolicy,
    settings: LoadSettings,
    generation: AtomicU64,
    cancel: Mutex<Option<watch::Sender<bool>>>,
    pending_seek: Mutex<Debouncer<Duration>>,
    pending_volume: Mutex<Debouncer<f32>>,
}

impl PlaybackController {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        policy: UrlPolicy,
        settings: LoadSettings,
        events: Sender<PlayerEvent>,
    ) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(PlayerState::default())),
            events,
            policy,
            pending_seek: Mutex::new(Debouncer::new(settings.seek_debounce)),
            pending_volume: Mutex::new(Debouncer::new(settings.volume_debounce)),
            settings,
            generation: AtomicU64::new(0),
            cancel: Mutex::new(None),
        }
    }

    /// Shared state handle.
    pub fn state_handle(&self) -> Arc<RwLock<PlayerState>> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> PlayerState {
        self.state.read().clone()
    }

    /// Load and start `track`, superseding any load in flight.
    pub async fn play_track(&self, track: PlayableTrack) -> Result<(), PlaybackError> {
        let url = match self.policy.check(&track.audio_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(track_id = %track.id, error = %e, "Rejected audio URL");
                let message = match &e {
                    PlaybackError::MissingUrl => "Audio URL is missing",
                    _ => "The file is not audio",
                };
                self.notify(Notice::error("Playback error", message));
                return Err(e);
            }
        };

        let (generation, mut cancelled) = self.begin_load();
        self.backend.pause();
        {
            let mut state = self.state.write();
            state.status = PlaybackStatus::Loading;
            state.current_track = Some(PlayableTrack {
                audio_url: url.clone(),
                ..track.clone()
            });
            state.position = Duration::ZERO;
            state.duration = Duration::ZERO;
        }
        self.emit(PlayerEvent::TrackChanged(Some(track.id.clone())));
        self.emit(PlayerEvent::StatusChanged(PlaybackStatus::Loading));
        tracing::info!(track_id = %track.id, title = %track.title, "Loading track");

        let request = LoadRequest {
            with_credentials: self.policy.needs_credentials(&url),
            url,
        };
        let info = match self.load_with_retry(&request, &mut cancelled).await {
            Ok(info) => info,
            Err(PlaybackError::Cancelled) => {
                tracing::debug!(track_id = %track.id, "Load superseded");
                return Err(PlaybackError::Cancelled);
            }
            Err(e) => {
                if self.is_current(generation) {
                    tracing::error!(track_id = %track.id, error = %e, "Failed to load track");
                    self.set_status(PlaybackStatus::Stopped);
                    self.notify(Notice::error(
                        "Playback error",
                        "Could not load the audio file. Try again.",
                    ));
                }
                return Err(e);
            }
        };

        if !self.is_current(generation) {
            return Err(PlaybackError::Cancelled);
        }

        if let Err(e) = self.backend.play() {
            tracing::error!(track_id = %track.id, error = %e, "Failed to start playback");
            self.set_status(PlaybackStatus::Stopped);
            self.notify(Notice::error("Playback error", "Could not start playback."));
            return Err(e.into());
        }

        {
            let mut state = self.state.write();
            state.status = PlaybackStatus::Playing;
            state.duration = info
                .duration
                .or_else(|| {
                    track
                        .duration
                        .filter(|d| d.is_finite() && *d > 0.0)
                        .map(Duration::from_secs_f64)
                })
                .unwrap_or_default();
        }
        self.emit(PlayerEvent::StatusChanged(PlaybackStatus::Playing));
        tracing::info!(track_id = %track.id, version = ?track.version_number, "Now playing");

        if !track.is_original_version()
            && let Some(number) = track.version_number
        {
            self.notify(Notice::info(
                format!("Version {number}"),
                format!("Switched to {}", track.title),
            ));
        }
        Ok(())
    }

    /// Fetch `track` ahead of time so a later play starts without waiting.
    ///
    /// Doesn't touch the current track or state. Errors are returned, not
    /// surfaced as notices.
    pub async fn preload(&self, track: &PlayableTrack) -> Result<MediaInfo, PlaybackError> {
        let url = self.policy.check(&track.audio_url)?;
        let request = LoadRequest {
            with_credentials: self.policy.needs_credentials(&url),
            url,
        };
        let info = tokio::time::timeout(self.settings.timeout, self.backend.preload(&request))
            .await
            .unwrap_or(Err(MediaError::Timeout))?;
        tracing::debug!(track_id = %track.id, "Track preloaded");
        Ok(info)
    }

    /// Start a new load generation and cancel the previous one.
    fn begin_load(&self) -> (u64, watch::Receiver<bool>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = watch::channel(false);
        if let Some(previous) = self.cancel.lock().replace(tx) {
            let _ = previous.send(true);
        }
        (generation, rx)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn load_with_retry(
        &self,
        request: &LoadRequest,
        cancelled: &mut watch::Receiver<bool>,
    ) -> Result<MediaInfo, PlaybackError> {
        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                result = tokio::time::timeout(self.settings.timeout, self.backend.load(request)) => {
                    result.unwrap_or(Err(MediaError::Timeout))
                }
                _ = wait_cancelled(cancelled) => return Err(PlaybackError::Cancelled),
            };

            match outcome {
                Ok(info) => return Ok(info),
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    let delay = self.settings.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Audio load failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_cancelled(cancelled) => return Err(PlaybackError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Toggle between playing and paused.
    pub fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        let has_track = self.state.read().current_track.is_some();
        if !has_track || !self.backend.is_ready() {
            tracing::error!("Cannot play: no audio source");
            self.notify(Notice::error(
                "Playback error",
                "Audio is not loaded. Pick the track again.",
            ));
            return Err(PlaybackError::NotReady);
        }

        if self.state.read().status == PlaybackStatus::Playing {
            self.pause();
            return Ok(());
        }

        if let Err(e) = self.backend.play() {
            tracing::error!(error = %e, "Failed to resume playback");
            self.notify(Notice::error("Playback error", "Could not resume playback."));
            return Err(e.into());
        }
        self.set_status(PlaybackStatus::Playing);
        Ok(())
    }

    pub fn pause(&self) {
        self.backend.pause();
        if self.state.read().status == PlaybackStatus::Playing {
            self.set_status(PlaybackStatus::Paused);
        }
    }

    /// Seek to `seconds`; the backend write is debounced.
    ///
    /// NaN is ignored. Targets past the end, infinity included, land on the
    /// known duration; with no duration yet an unbounded target is ignored.
    pub fn seek_to(&self, seconds: f64) {
        if seconds.is_nan() {
            tracing::warn!("Ignoring NaN seek target");
            return;
        }
        let target = {
            let mut state = self.state.write();
            let target = match Duration::try_from_secs_f64(seconds.max(0.0)) {
                Ok(t) if state.duration.is_zero() => t,
                Ok(t) => t.min(state.duration),
                Err(_) if !state.duration.is_zero() => state.duration,
                Err(_) => {
                    tracing::warn!(seconds, "Ignoring out-of-range seek target");
                    return;
                }
            };
            state.position = target;
            target
        };
        self.pending_seek.lock().push(target);
    }

    /// Set volume (clamped to 0.0 - 1.0); the backend write is debounced.
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.write().volume = volume;
        self.pending_volume.lock().push(volume);
    }

    /// Send debounced writes whose quiet period has passed.
    pub fn flush_pending(&self) {
        let now = Instant::now();
        if let Some(position) = self.pending_seek.lock().take_due(now) {
            self.backend.seek(position);
        }
        if let Some(volume) = self.pending_volume.lock().take_due(now) {
            self.backend.set_volume(volume);
        }
    }

    /// Send all debounced writes now.
    pub fn flush_now(&self) {
        if let Some(position) = self.pending_seek.lock().take() {
            self.backend.seek(position);
        }
        if let Some(volume) = self.pending_volume.lock().take() {
            self.backend.set_volume(volume);
        }
    }

    /// Refresh the position from the backend while playing, and stop once
    /// the backend reports the end of the source.
    pub fn sync_position(&self) {
        if self.pending_seek.lock().is_pending() {
            return;
        }
        let ended = {
            let mut state = self.state.write();
            if state.status != PlaybackStatus::Playing {
                return;
            }
            if self.backend.has_ended() {
                if !state.duration.is_zero() {
                    state.position = state.duration;
                }
                state.status = PlaybackStatus::Stopped;
                state.current_track.as_ref().map(|t| t.id.clone())
            } else {
                state.position = self.backend.position();
                return;
            }
        };

        tracing::info!(track_id = ?ended, "Track finished");
        self.emit(PlayerEvent::StatusChanged(PlaybackStatus::Stopped));
        if let Some(id) = ended {
            self.emit(PlayerEvent::TrackEnded(id));
        }
    }

    /// Drop the current track and cancel any load.
    pub fn clear(&self) {
        self.begin_load();
        self.backend.stop();
        {
            let mut state = self.state.write();
            let volume = state.volume;
            *state = PlayerState {
                volume,
                ..Default::default()
            };
        }
        self.emit(PlayerEvent::TrackChanged(None));
        self.emit(PlayerEvent::StatusChanged(PlaybackStatus::Stopped));
        tracing::info!("Current track cleared");
    }

    fn set_status(&self, status: PlaybackStatus) {
        self.state.write().status = status;
        self.emit(PlayerEvent::StatusChanged(status));
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(PlayerEvent::Notice(notice));
    }

    fn emit(&self, event: PlayerEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::backend::mocks::{Call, MockBackend};
    use crate::player::state::NoticeLevel;
    use crate::test_utils::mock_playable;
    use crossbeam_channel::{Receiver, unbounded};

    fn fast_settings() -> LoadSettings {
        LoadSettings {
            timeout: Duration::from_millis(500),
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            seek_debounce: Duration::from_millis(20),
            volume_debounce: Duration::from_millis(20),
        }
    }

    fn controller() -> (Arc<PlaybackController>, Arc<MockBackend>, Receiver<PlayerEvent>) {
        let backend = Arc::new(MockBackend::new());
        let (tx, rx) = unbounded();
        let controller = PlaybackController::new(
            backend.clone(),
            UrlPolicy::default(),
            fast_settings(),
            tx,
        );
        (Arc::new(controller), backend, rx)
    }

    fn notices(rx: &Receiver<PlayerEvent>) -> Vec<Notice> {
        rx.try_iter()
            .filter_map(|e| match e {
                PlayerEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_play_track_success() {
        let (ctl, backend, _rx) = controller();
        ctl.play_track(mock_playable("a")).await.unwrap();

        let state = ctl.state();
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.current_track.unwrap().id, "a");
        assert_eq!(state.duration, Duration::from_secs(120));
        assert_eq!(backend.count(&Call::Play), 1);
    }

    #[tokio::test]
    async fn test_rejects_blank_and_unknown_urls() {
        let (ctl, backend, rx) = controller();

        let blank = PlayableTrack {
            audio_url: "  ".into(),
            ..mock_playable("a")
        };
        assert_eq!(ctl.play_track(blank).await, Err(PlaybackError::MissingUrl));

        let page = PlayableTrack {
            audio_url: "https://example.com/page".into(),
            ..mock_playable("b")
        };
        assert!(matches!(
            ctl.play_track(page).await,
            Err(PlaybackError::UnknownFormat(_))
        ));

        assert_eq!(backend.load_count(), 0);
        let notices = notices(&rx);
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));
    }

    #[tokio::test]
    async fn test_latest_play_wins() {
        let (ctl, backend, rx) = controller();
        let first = mock_playable("first");
        let second = mock_playable("second");
        backend.delay(&first.audio_url, Duration::from_millis(200));

        let (a, b) = tokio::join!(ctl.play_track(first), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctl.play_track(second).await
        });

        assert_eq!(a, Err(PlaybackError::Cancelled));
        assert_eq!(b, Ok(()));
        let state = ctl.state();
        assert_eq!(state.current_track.unwrap().id, "second");
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(backend.count(&Call::Play), 1);
        // Cancellation is silent
        assert!(notices(&rx).is_empty());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let (ctl, backend, _rx) = controller();
        backend.queue_result(Err(MediaError::Network("reset".into())));
        backend.queue_result(Err(MediaError::Http(503)));

        ctl.play_track(mock_playable("a")).await.unwrap();
        assert_eq!(backend.load_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_capped() {
        let (ctl, backend, rx) = controller();
        for _ in 0..5 {
            backend.queue_result(Err(MediaError::Network("down".into())));
        }

        let result = ctl.play_track(mock_playable("a")).await;
        assert!(matches!(result, Err(PlaybackError::Media(MediaError::Network(_)))));
        assert_eq!(backend.load_count(), 3);
        assert_eq!(ctl.state().status, PlaybackStatus::Stopped);
        assert_eq!(notices(&rx).len(), 1);
    }

    #[tokio::test]
    async fn test_decode_error_is_terminal() {
        let (ctl, backend, rx) = controller();
        backend.queue_result(Err(MediaError::Decode("bad header".into())));

        let result = ctl.play_track(mock_playable("a")).await;
        assert!(matches!(result, Err(PlaybackError::Media(MediaError::Decode(_)))));
        assert_eq!(backend.load_count(), 1);
        assert_eq!(notices(&rx)[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_load_timeout() {
        let (ctl, backend, _rx) = controller();
        let track = mock_playable("slow");
        backend.delay(&track.audio_url, Duration::from_secs(5));

        let settings = LoadSettings {
            timeout: Duration::from_millis(20),
            max_attempts: 1,
            ..fast_settings()
        };
        let (tx, _rx2) = unbounded();
        let ctl2 = PlaybackController::new(backend.clone(), UrlPolicy::default(), settings, tx);
        drop(ctl);

        assert_eq!(
            ctl2.play_track(track).await,
            Err(PlaybackError::Media(MediaError::Timeout))
        );
    }

    #[tokio::test]
    async fn test_version_notice() {
        let (ctl, _backend, rx) = controller();
        let version = PlayableTrack {
            parent_track_id: Some("a".into()),
            version_number: Some(2),
            ..mock_playable("a-v2")
        };
        ctl.play_track(version).await.unwrap();

        let notices = notices(&rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
        assert_eq!(notices[0].title, "Version 2");
    }

    #[tokio::test]
    async fn test_internal_hosts_get_credentials() {
        let (ctl, backend, _rx) = controller();
        let track = PlayableTrack {
            audio_url: "https://proj.supabase.co/storage/v1/object/public/tracks/a.mp3".into(),
            ..mock_playable("a")
        };
        ctl.play_track(track).await.unwrap();
        ctl.play_track(mock_playable("b")).await.unwrap();

        let loads: Vec<bool> = backend
            .calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Load(r) => Some(r.with_credentials),
                _ => None,
            })
            .collect();
        assert_eq!(loads, vec![true, false]);
    }

    #[tokio::test]
    async fn test_toggle_requires_loaded_audio() {
        let (ctl, _backend, rx) = controller();
        assert_eq!(ctl.toggle_play_pause(), Err(PlaybackError::NotReady));
        assert_eq!(notices(&rx).len(), 1);

        ctl.play_track(mock_playable("a")).await.unwrap();
        ctl.toggle_play_pause().unwrap();
        assert_eq!(ctl.state().status, PlaybackStatus::Paused);
        ctl.toggle_play_pause().unwrap();
        assert_eq!(ctl.state().status, PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_seek_and_volume_are_debounced() {
        let (ctl, backend, _rx) = controller();
        ctl.play_track(mock_playable("a")).await.unwrap();

        ctl.seek_to(10.0);
        ctl.seek_to(20.0);
        ctl.seek_to(500.0);
        ctl.set_volume(0.3);
        ctl.set_volume(1.7);

        // Optimistic state, clamped
        let state = ctl.state();
        assert_eq!(state.position, Duration::from_secs(120));
        assert_eq!(state.volume, 1.0);

        ctl.flush_pending();
        assert_eq!(backend.count(&Call::Seek(Duration::from_secs(120))), 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        ctl.flush_pending();
        let calls = backend.calls.lock().clone();
        let seeks: Vec<_> = calls.iter().filter(|c| matches!(c, Call::Seek(_))).collect();
        let volumes: Vec<_> = calls.iter().filter(|c| matches!(c, Call::Volume(_))).collect();
        assert_eq!(seeks, vec![&Call::Seek(Duration::from_secs(120))]);
        assert_eq!(volumes, vec![&Call::Volume(1.0)]);
    }

    #[tokio::test]
    async fn test_non_finite_seek_targets() {
        let (ctl, backend, _rx) = controller();

        // Nothing loaded, no duration to clamp to
        ctl.seek_to(f64::INFINITY);
        ctl.seek_to(f64::NAN);
        ctl.set_volume(f32::NAN);
        assert_eq!(ctl.state().position, Duration::ZERO);
        assert_eq!(ctl.state().volume, 1.0);

        ctl.play_track(mock_playable("a")).await.unwrap();
        ctl.seek_to(f64::INFINITY);
        assert_eq!(ctl.state().position, Duration::from_secs(120));
        ctl.seek_to(f64::NEG_INFINITY);
        assert_eq!(ctl.state().position, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(40)).await;
        ctl.flush_pending();
        assert_eq!(backend.count(&Call::Seek(Duration::ZERO)), 1);
    }

    #[tokio::test]
    async fn test_preload_leaves_current_track_alone() {
        let (ctl, backend, rx) = controller();
        ctl.play_track(mock_playable("a")).await.unwrap();
        let _ = rx.try_iter().count();

        let next = PlayableTrack {
            audio_url: "https://proj.supabase.co/storage/v1/object/public/tracks/b.mp3".into(),
            ..mock_playable("b")
        };
        ctl.preload(&next).await.unwrap();

        assert_eq!(backend.preloaded_urls(), vec![next.audio_url.clone()]);
        assert!(backend.calls.lock().contains(&Call::Preload(LoadRequest {
            url: next.audio_url.clone(),
            with_credentials: true,
        })));
        assert_eq!(ctl.state().current_track.unwrap().id, "a");
        assert_eq!(backend.load_count(), 1);
        assert!(rx.try_iter().next().is_none());

        let page = PlayableTrack {
            audio_url: "https://example.com/page".into(),
            ..mock_playable("c")
        };
        assert!(matches!(
            ctl.preload(&page).await,
            Err(PlaybackError::UnknownFormat(_))
        ));
        assert_eq!(backend.preloaded_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_end_of_source_stops_and_reports() {
        let (ctl, backend, rx) = controller();
        ctl.play_track(mock_playable("a")).await.unwrap();
        let _ = rx.try_iter().count();

        ctl.sync_position();
        assert_eq!(ctl.state().status, PlaybackStatus::Playing);

        backend.finish();
        ctl.sync_position();
        let state = ctl.state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.position, Duration::from_secs(120));

        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::TrackEnded("a".into())));

        // Reported once
        ctl.sync_position();
        assert!(rx.try_iter().next().is_none());
    }

    #[tokio::test]
    async fn test_clear_resets_state_and_cancels() {
        let (ctl, backend, _rx) = controller();
        let track = mock_playable("a");
        backend.delay(&track.audio_url, Duration::from_millis(200));

        let (result, _) = tokio::join!(ctl.play_track(track), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ctl.set_volume(0.5);
            ctl.clear();
        });

        assert_eq!(result, Err(PlaybackError::Cancelled));
        let state = ctl.state();
        assert!(state.current_track.is_none());
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.volume, 0.5);
        assert_eq!(backend.count(&Call::Stop), 1);
    }
}
