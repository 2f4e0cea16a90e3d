//! Clock-driven HTTP backend.
//!
//! Fetches the head of the remote file with a range request and opens it
//! with the decoder: a source that opens is playable, one that doesn't is a
//! terminal format error. Playback is then tracked with a clock; no audio
//! device sits behind it. Used where no output device is available.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{LoadRequest, MediaBackend, MediaError, MediaInfo};
use super::decoder::AudioDecoder;
use super::source::{PreloadCache, SourceFetcher, extension_of};

/// Bytes fetched to check a source.
const HEAD_BYTES: usize = 256 * 1024;

/// Checked sources kept for a later load.
const PRELOAD_SLOTS: usize = 4;

#[derive(Debug, Default)]
struct Transport {
    loaded: Option<String>,
    /// Position when playback last started or was paused
    offset: Duration,
    started_at: Option<Instant>,
    duration: Option<Duration>,
    volume: f32,
}

impl Transport {
    fn position(&self) -> Duration {
        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let position = self.offset + elapsed;
        match self.duration {
            Some(total) => position.min(total),
            None => position,
        }
    }
}

/// Streams audio over HTTP(S) without an output device.
pub struct HttpStreamBackend {
    fetcher: SourceFetcher,
    transport: Mutex<Transport>,
    preloaded: Mutex<PreloadCache<MediaInfo>>,
}

impl HttpStreamBackend {
    pub fn new(storage_token: Option<String>) -> Self {
        Self {
            fetcher: SourceFetcher::new(storage_token),
            transport: Mutex::new(Transport {
                volume: 1.0,
                ..Default::default()
            }),
            preloaded: Mutex::new(PreloadCache::new(PRELOAD_SLOTS)),
        }
    }

    async fn inspect(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError> {
        let head = self.fetcher.fetch_head(request, HEAD_BYTES).await?;
        inspect_head(head, &request.url)
    }
}

/// Format details from the first bytes of a source.
fn inspect_head(head: Vec<u8>, url: &str) -> Result<MediaInfo, MediaError> {
    let extension = extension_of(url);
    AudioDecoder::open(head, extension.as_deref()).map(|decoder| decoder.info())
}

#[async_trait]
impl MediaBackend for HttpStreamBackend {
    async fn load(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError> {
        tracing::debug!(url = %request.url, credentials = request.with_credentials, "Loading stream");
        let cached = self.preloaded.lock().take(&request.url);
        let info = match cached {
            Some(info) => info,
            None => self.inspect(request).await?,
        };

        let mut transport = self.transport.lock();
        transport.loaded = Some(request.url.clone());
        transport.offset = Duration::ZERO;
        transport.started_at = None;
        transport.duration = info.duration;
        Ok(info)
    }

    async fn preload(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError> {
        if let Some(info) = self.preloaded.lock().get(&request.url).cloned() {
            return Ok(info);
        }
        let info = self.inspect(request).await?;
        self.preloaded.lock().insert(&request.url, info.clone());
        tracing::debug!(url = %request.url, "Source preloaded");
        Ok(info)
    }

    fn play(&self) -> Result<(), MediaError> {
        let mut transport = self.transport.lock();
        if transport.loaded.is_none() {
            return Err(MediaError::Aborted);
        }
        if transport.started_at.is_none() {
            transport.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut transport = self.transport.lock();
        transport.offset = transport.position();
        transport.started_at = None;
    }

    fn stop(&self) {
        let mut transport = self.transport.lock();
        let volume = transport.volume;
        *transport = Transport {
            volume,
            ..Default::default()
        };
    }

    fn seek(&self, position: Duration) {
        let mut transport = self.transport.lock();
        transport.offset = position;
        if transport.started_at.is_some() {
            transport.started_at = Some(Instant::now());
        }
    }

    fn set_volume(&self, volume: f32) {
        self.transport.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn position(&self) -> Duration {
        self.transport.lock().position()
    }

    fn is_ready(&self) -> bool {
        self.transport.lock().loaded.is_some()
    }

    fn has_ended(&self) -> bool {
        let transport = self.transport.lock();
        transport.loaded.is_some()
            && transport
                .duration
                .is_some_and(|total| transport.position() >= total)
    }
}
