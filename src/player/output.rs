//! Audio device backend using cpal.
//!
//! Sources are fetched whole, decoded on the `audio-output` thread and fed
//! to the device callback through a bounded channel:
//!
//! ```text
//! load() ──Command──▶ decoder thread ──AudioChunk──▶ cpal callback ──▶ device
//!                     (symphonia, rubato)            (volume, position)
//! ```
//!
//! The cpal stream is created on the decoder thread and lives there; streams
//! are not `Send` on every host. Seek, stop and load bump an epoch, and the
//! callback drops chunks decoded for an older one. A source has ended once
//! the decoder has drained it and the callback has played every queued
//! chunk of the same epoch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TryRecvError, bounded, unbounded};
use parking_lot::Mutex;

use super::backend::{LoadRequest, MediaBackend, MediaError, MediaInfo};
use super::decoder::AudioDecoder;
use super::resampler::{Resampler, remix};
use super::source::{PreloadCache, SourceFetcher, extension_of};

/// Largest source fetched for playback.
const MAX_SOURCE_BYTES: usize = 64 * 1024 * 1024;

/// Decoded sources kept for a later load.
const PRELOAD_SLOTS: usize = 2;

/// Decoded chunks queued ahead of the device.
const CHUNK_QUEUE: usize = 8;

/// How long the decoder waits on a full queue before checking for commands.
const SEND_WAIT: Duration = Duration::from_millis(20);

/// Sample rate and channel count the device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// State shared by the control side, the decoder thread and the callback.
#[derive(Debug)]
struct Shared {
    playing: AtomicBool,
    loaded: AtomicBool,
    /// Epoch whose source the decoder has run out of
    drained_epoch: AtomicU64,
    /// Epoch whose last sample the callback has played
    ended_epoch: AtomicU64,
    /// `f32` bits
    volume: AtomicU32,
    position_ms: AtomicU64,
    epoch: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
            drained_epoch: AtomicU64::new(u64::MAX),
            ended_epoch: AtomicU64::new(u64::MAX),
            volume: AtomicU32::new(1.0f32.to_bits()),
            position_ms: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn has_ended(&self) -> bool {
        self.ended_epoch.load(Ordering::Acquire) == self.epoch.load(Ordering::Acquire)
    }

    fn set_position(&self, position: Duration) {
        self.position_ms
            .store(position.as_millis() as u64, Ordering::Release);
    }
}

/// Work for the decoder thread; the `u64` is the epoch it belongs to.
enum Command {
    Load(Box<AudioDecoder>, u64),
    /// Wake up after `play`
    Resume,
    Seek(Duration, u64),
    Stop(u64),
}

/// Samples in the device's rate and channel layout.
struct AudioChunk {
    samples: Vec<f32>,
    timestamp: Duration,
    epoch: u64,
}

/// Plays through the default output device.
pub struct DeviceBackend {
    fetcher: SourceFetcher,
    shared: Arc<Shared>,
    commands: Sender<Command>,
    preloaded: Mutex<PreloadCache<Box<AudioDecoder>>>,
    _thread: JoinHandle<()>,
}

impl DeviceBackend {
    /// Open the default output device.
    ///
    /// Fails with [`MediaError::Device`] when no device can be opened, e.g.
    /// on a headless machine.
    pub fn new(storage_token: Option<String>) -> Result<Self, MediaError> {
        let shared = Arc::new(Shared::new());
        let (commands, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<OutputFormat, String>>(1);

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match open_output(&thread_shared) {
                Ok((stream, format, audio_tx)) => {
                    let _ = ready_tx.send(Ok(format));
                    run_decoder(format, &thread_shared, &command_rx, &audio_tx);
                    drop(stream);
                    tracing::debug!("Audio output closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| MediaError::Device(e.to_string()))?;

        let format = ready_rx
            .recv()
            .map_err(|_| MediaError::Device("audio thread exited".to_string()))?
            .map_err(MediaError::Device)?;
        tracing::debug!(?format, "Audio output started");

        Ok(Self {
            fetcher: SourceFetcher::new(storage_token),
            shared,
            commands,
            preloaded: Mutex::new(PreloadCache::new(PRELOAD_SLOTS)),
            _thread: thread,
        })
    }

    async fn open_source(&self, request: &LoadRequest) -> Result<Box<AudioDecoder>, MediaError> {
        let bytes = self.fetcher.fetch_all(request, MAX_SOURCE_BYTES).await?;
        let extension = extension_of(&request.url);
        Ok(Box::new(AudioDecoder::open(bytes, extension.as_deref())?))
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("Audio output thread is gone");
        }
    }
}

#[async_trait]
impl MediaBackend for DeviceBackend {
    async fn load(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError> {
        tracing::debug!(url = %request.url, credentials = request.with_credentials, "Loading source");
        let cached = self.preloaded.lock().take(&request.url);
        let decoder = match cached {
            Some(decoder) => decoder,
            None => self.open_source(request).await?,
        };
        let info = decoder.info();

        let epoch = self.shared.next_epoch();
        self.shared.playing.store(false, Ordering::Release);
        self.shared.set_position(Duration::ZERO);
        self.commands
            .send(Command::Load(decoder, epoch))
            .map_err(|_| MediaError::Device("audio output thread is gone".to_string()))?;
        self.shared.loaded.store(true, Ordering::Release);
        Ok(info)
    }

    async fn preload(&self, request: &LoadRequest) -> Result<MediaInfo, MediaError> {
        if let Some(decoder) = self.preloaded.lock().get(&request.url) {
            return Ok(decoder.info());
        }
        let decoder = self.open_source(request).await?;
        let info = decoder.info();
        self.preloaded.lock().insert(&request.url, decoder);
        tracing::debug!(url = %request.url, "Source preloaded");
        Ok(info)
    }

    fn play(&self) -> Result<(), MediaError> {
        if !self.shared.loaded.load(Ordering::Acquire) {
            return Err(MediaError::Aborted);
        }
        self.shared.playing.store(true, Ordering::Release);
        self.commands
            .send(Command::Resume)
            .map_err(|_| MediaError::Device("audio output thread is gone".to_string()))
    }

    fn pause(&self) {
        self.shared.playing.store(false, Ordering::Release);
    }

    fn stop(&self) {
        let epoch = self.shared.next_epoch();
        self.shared.playing.store(false, Ordering::Release);
        self.shared.loaded.store(false, Ordering::Release);
        self.shared.set_position(Duration::ZERO);
        self.send(Command::Stop(epoch));
    }

    fn seek(&self, position: Duration) {
        let epoch = self.shared.next_epoch();
        self.shared.set_position(position);
        self.send(Command::Seek(position, epoch));
    }

    fn set_volume(&self, volume: f32) {
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.shared.position_ms.load(Ordering::Acquire))
    }

    fn is_ready(&self) -> bool {
        self.shared.loaded.load(Ordering::Acquire)
    }

    fn has_ended(&self) -> bool {
        self.shared.has_ended()
    }
}

// ============================================================================
// Device
// ============================================================================

fn open_output(shared: &Arc<Shared>) -> Result<(Stream, OutputFormat, Sender<AudioChunk>), String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "No output device found".to_string())?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| e.to_string())?;
    let config: StreamConfig = supported.config();
    let format = OutputFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    tracing::info!(
        device = %name,
        sample_rate = format.sample_rate,
        channels = format.channels,
        "Using audio device"
    );

    let (audio_tx, audio_rx) = bounded(CHUNK_QUEUE);
    let reader = ChunkReader::new(audio_rx, Arc::clone(shared));
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, reader),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, reader),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, reader),
        other => return Err(format!("Unsupported sample format: {:?}", other)),
    }
    .map_err(|e| e.to_string())?;
    stream.play().map_err(|e| e.to_string())?;

    Ok((stream, format, audio_tx))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut reader: ChunkReader,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            reader.fill(&mut scratch);
            for (out, sample) in data.iter_mut().zip(&scratch) {
                *out = T::from_sample(*sample);
            }
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}

/// Callback side: copies queued chunks to the device buffer.
struct ChunkReader {
    audio_rx: Receiver<AudioChunk>,
    shared: Arc<Shared>,
    current: Option<(AudioChunk, usize)>,
}

impl ChunkReader {
    fn new(audio_rx: Receiver<AudioChunk>, shared: Arc<Shared>) -> Self {
        Self {
            audio_rx,
            shared,
            current: None,
        }
    }

    /// Fill `out` with volume-scaled samples, or silence when paused or
    /// starved.
    fn fill(&mut self, out: &mut [f32]) {
        if !self.shared.playing.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        let volume = self.shared.volume();

        let mut written = 0;
        while written < out.len() {
            let exhausted = self
                .current
                .as_ref()
                .is_none_or(|(chunk, pos)| chunk.epoch != epoch || *pos >= chunk.samples.len());
            if exhausted {
                self.current = None;
                match self.audio_rx.try_recv() {
                    Ok(chunk) if chunk.epoch != epoch => continue,
                    Ok(chunk) => {
                        self.shared.set_position(chunk.timestamp);
                        self.current = Some((chunk, 0));
                    }
                    Err(_) => {
                        if self.shared.drained_epoch.load(Ordering::Acquire) == epoch {
                            self.shared.ended_epoch.store(epoch, Ordering::Release);
                        }
                        out[written..].fill(0.0);
                        return;
                    }
                }
            }

            if let Some((chunk, pos)) = self.current.as_mut() {
                let n = (chunk.samples.len() - *pos).min(out.len() - written);
                for (o, s) in out[written..written + n]
                    .iter_mut()
                    .zip(&chunk.samples[*pos..*pos + n])
                {
                    *o = s * volume;
                }
                *pos += n;
                written += n;
            }
        }
    }
}

// ============================================================================
// Decoder thread
// ============================================================================

/// A source being decoded into the device format.
struct Source {
    decoder: Box<AudioDecoder>,
    resampler: Resampler,
    format: OutputFormat,
    last_timestamp: Duration,
    drained: bool,
}

impl Source {
    fn new(decoder: Box<AudioDecoder>, format: OutputFormat) -> Result<Self, MediaError> {
        let resampler = Resampler::new(decoder.sample_rate(), format.sample_rate, decoder.channels())
            .map_err(MediaError::Decode)?;
        Ok(Self {
            decoder,
            resampler,
            format,
            last_timestamp: Duration::ZERO,
            drained: false,
        })
    }

    fn seek(&mut self, position: Duration) -> Result<(), MediaError> {
        self.decoder.seek(position)?;
        self.resampler.reset();
        self.drained = false;
        Ok(())
    }

    /// Next run of samples in device layout; `None` once fully drained.
    fn next_chunk(&mut self) -> Result<Option<(Vec<f32>, Duration)>, MediaError> {
        let source_channels = self.decoder.channels() as usize;
        let device_channels = self.format.channels as usize;
        loop {
            if self.drained {
                return Ok(None);
            }
            let (samples, timestamp) = match self.decoder.decode_next()? {
                Some(chunk) => {
                    self.last_timestamp = chunk.timestamp;
                    (self.resampler.process(&chunk.samples), chunk.timestamp)
                }
                None => {
                    self.drained = true;
                    (self.resampler.flush(), self.last_timestamp)
                }
            };
            if !samples.is_empty() {
                return Ok(Some((
                    remix(&samples, source_channels, device_channels),
                    timestamp,
                )));
            }
        }
    }
}

/// Decoder loop. Blocks on commands while idle and exits once the
/// control side or the device callback goes away.
fn run_decoder(
    format: OutputFormat,
    shared: &Shared,
    commands: &Receiver<Command>,
    audio_tx: &Sender<AudioChunk>,
) {
    let mut source: Option<Source> = None;
    let mut epoch = 0;
    let mut pending: Option<AudioChunk> = None;

    loop {
        let active = source.as_ref().is_some_and(|s| !s.drained)
            && shared.playing.load(Ordering::Acquire);
        let command = if active {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        if let Some(command) = command {
            match command {
                Command::Load(decoder, new_epoch) => {
                    epoch = new_epoch;
                    pending = None;
                    source = match Source::new(decoder, format) {
                        Ok(s) => Some(s),
                        Err(e) => {
                            tracing::error!(error = %e, "Cannot play source on this device");
                            shared.drained_epoch.store(epoch, Ordering::Release);
                            None
                        }
                    };
                }
                Command::Resume => {}
                Command::Seek(position, new_epoch) => {
                    epoch = new_epoch;
                    pending = None;
                    if let Some(s) = source.as_mut()
                        && let Err(e) = s.seek(position)
                    {
                        tracing::warn!(error = %e, "Seek failed");
                    }
                }
                Command::Stop(new_epoch) => {
                    epoch = new_epoch;
                    pending = None;
                    source = None;
                }
            }
            continue;
        }

        let chunk = match pending.take() {
            Some(chunk) => chunk,
            None => {
                let Some(s) = source.as_mut() else {
                    continue;
                };
                match s.next_chunk() {
                    Ok(Some((samples, timestamp))) => AudioChunk {
                        samples,
                        timestamp,
                        epoch,
                    },
                    Ok(None) => {
                        tracing::debug!("Source drained");
                        shared.drained_epoch.store(epoch, Ordering::Release);
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Decode error");
                        shared.drained_epoch.store(epoch, Ordering::Release);
                        source = None;
                        continue;
                    }
                }
            }
        };

        match audio_tx.send_timeout(chunk, SEND_WAIT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(chunk)) => pending = Some(chunk),
            Err(SendTimeoutError::Disconnected(_)) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::decoder::tests::silent_wav;

    fn chunk(samples: Vec<f32>, secs: u64, epoch: u64) -> AudioChunk {
        AudioChunk {
            samples,
            timestamp: Duration::from_secs(secs),
            epoch,
        }
    }

    fn reader() -> (ChunkReader, Sender<AudioChunk>, Arc<Shared>) {
        let shared = Arc::new(Shared::new());
        let (tx, rx) = bounded(CHUNK_QUEUE);
        (ChunkReader::new(rx, Arc::clone(&shared)), tx, shared)
    }

    #[test]
    fn test_reader_silent_while_paused() {
        let (mut reader, tx, _shared) = reader();
        tx.send(chunk(vec![1.0; 4], 0, 0)).unwrap();

        let mut out = [0.5; 4];
        reader.fill(&mut out);
        assert_eq!(out, [0.0; 4]);
        // Nothing consumed
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn test_reader_applies_volume_and_tracks_position() {
        let (mut reader, tx, shared) = reader();
        shared.playing.store(true, Ordering::Release);
        shared.volume.store(0.5f32.to_bits(), Ordering::Relaxed);
        tx.send(chunk(vec![1.0; 3], 7, 0)).unwrap();
        tx.send(chunk(vec![-1.0; 3], 8, 0)).unwrap();

        let mut out = [0.0; 4];
        reader.fill(&mut out);
        assert_eq!(out, [0.5, 0.5, 0.5, -0.5]);
        assert_eq!(shared.position_ms.load(Ordering::Acquire), 8000);

        // Rest of the second chunk, then silence on underrun
        reader.fill(&mut out);
        assert_eq!(out, [-0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_reader_drops_stale_epochs() {
        let (mut reader, tx, shared) = reader();
        shared.playing.store(true, Ordering::Release);
        tx.send(chunk(vec![1.0; 2], 0, 0)).unwrap();
        shared.next_epoch();
        tx.send(chunk(vec![0.25; 2], 30, 1)).unwrap();

        let mut out = [0.0; 2];
        reader.fill(&mut out);
        assert_eq!(out, [0.25, 0.25]);
        assert_eq!(shared.position_ms.load(Ordering::Acquire), 30_000);
    }

    #[test]
    fn test_reader_reports_end_after_last_chunk() {
        let (mut reader, tx, shared) = reader();
        let epoch = shared.next_epoch();
        shared.playing.store(true, Ordering::Release);
        tx.send(chunk(vec![1.0; 4], 0, epoch)).unwrap();
        shared.drained_epoch.store(epoch, Ordering::Release);

        let mut out = [0.0; 4];
        reader.fill(&mut out);
        assert!(!shared.has_ended());

        reader.fill(&mut out);
        assert!(shared.has_ended());

        // A seek starts a new epoch
        shared.next_epoch();
        assert!(!shared.has_ended());
    }

    #[test]
    fn test_source_converts_to_device_layout() {
        let decoder = AudioDecoder::open(silent_wav(1), Some("wav")).unwrap();
        let format = OutputFormat {
            sample_rate: 8000,
            channels: 2,
        };
        let mut source = Source::new(Box::new(decoder), format).unwrap();

        let mut samples = 0;
        while let Some((chunk, _)) = source.next_chunk().unwrap() {
            assert_eq!(chunk.len() % 2, 0);
            samples += chunk.len();
        }
        assert_eq!(samples, 16000);
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_decoder_thread_plays_to_end() {
        let shared = Arc::new(Shared::new());
        let (command_tx, command_rx) = unbounded();
        let (audio_tx, audio_rx) = bounded(CHUNK_QUEUE);
        let format = OutputFormat {
            sample_rate: 8000,
            channels: 1,
        };

        let thread_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            run_decoder(format, &thread_shared, &command_rx, &audio_tx);
        });

        let decoder = AudioDecoder::open(silent_wav(1), Some("wav")).unwrap();
        let epoch = shared.next_epoch();
        command_tx.send(Command::Load(Box::new(decoder), epoch)).unwrap();
        shared.playing.store(true, Ordering::Release);
        command_tx.send(Command::Resume).unwrap();

        let mut samples = 0;
        while let Ok(chunk) = audio_rx.recv_timeout(Duration::from_secs(2)) {
            assert_eq!(chunk.epoch, epoch);
            samples += chunk.samples.len();
            if samples >= 8000 {
                break;
            }
        }
        assert_eq!(samples, 8000);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while shared.drained_epoch.load(Ordering::Acquire) != epoch
            && std::time::Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.drained_epoch.load(Ordering::Acquire), epoch);
        // Queued chunks are still to be played
        assert!(!shared.has_ended());

        drop(command_tx);
        handle.join().unwrap();
    }
}
