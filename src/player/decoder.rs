//! Audio decoding with symphonia.
//!
//! Sources are decoded from memory: the backends fetch bytes over HTTP and
//! hand them over whole (or just the head, when only the format is needed).
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)

use std::io::Cursor;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::backend::{MediaError, MediaInfo};

/// Decoder over one in-memory source.
pub struct AudioDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    info: MediaInfo,
    time_base: Option<TimeBase>,
}

/// Interleaved f32 samples from one packet.
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    pub samples: Vec<f32>,
    pub timestamp: Duration,
}

impl AudioDecoder {
    /// Open `bytes`; `extension` is a format hint.
    ///
    /// Bytes that aren't a known container, or hold no audio track, are a
    /// terminal [`MediaError::Decode`] / [`MediaError::Unsupported`].
    pub fn open(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self, MediaError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let reader = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| MediaError::Decode(e.to_string()))?
            .format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| MediaError::Unsupported("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| MediaError::Decode("Unknown sample rate".to_string()))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let time_base = params.time_base;

        let duration = match (params.n_frames, time_base) {
            (Some(frames), Some(tb)) => Some(time_to_duration(tb.calc_time(frames))),
            (Some(frames), None) => Some(Duration::from_secs_f64(
                frames as f64 / sample_rate as f64,
            )),
            _ => None,
        };
        let codec = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|d| d.short_name.to_string());

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| MediaError::Unsupported(e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            info: MediaInfo { duration, codec },
            time_base,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn info(&self) -> MediaInfo {
        self.info.clone()
    }

    /// Jump to `position`, clamped to the known duration.
    pub fn seek(&mut self, position: Duration) -> Result<(), MediaError> {
        let target = match self.info.duration {
            Some(total) => position.min(total),
            None => position,
        };
        let seek_to = SeekTo::Time {
            time: Time::from(target.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.reader
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| MediaError::Decode(format!("Seek failed: {}", e)))?;
        self.decoder.reset();
        Ok(())
    }

    /// Decode the next packet of the audio track.
    ///
    /// Returns `Ok(None)` at end of stream. Corrupt frames are skipped.
    pub fn decode_next(&mut self) -> Result<Option<DecodedChunk>, MediaError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(MediaError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let timestamp = self
                .time_base
                .map(|tb| time_to_duration(tb.calc_time(packet.ts())))
                .unwrap_or_default();

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!(error = e, "Skipping undecodable frame");
                    continue;
                }
                Err(e) => return Err(MediaError::Decode(e.to_string())),
            };

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            buffer.copy_interleaved_ref(decoded);
            return Ok(Some(DecodedChunk {
                samples: buffer.samples().to_vec(),
                timestamp,
            }));
        }
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_secs_f64(time.seconds as f64 + time.frac)
}
