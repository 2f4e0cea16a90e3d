//! Sample rate and channel conversion with rubato.
//!
//! Converts decoded audio from the source rate (e.g. 44.1kHz) to the output
//! device rate (e.g. 48kHz) so playback keeps its pitch and speed.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

/// Input frames per resampling pass.
const CHUNK_FRAMES: usize = 1024;

/// Resampler for one source.
pub struct Resampler {
    resampler: Option<FftFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Per-channel input waiting for a full chunk
    pending: Vec<Vec<f32>>,
}

impl Resampler {
    /// Rates that match need no resampling; samples pass through.
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self, String> {
        let channels = (channels as usize).max(1);
        let resampler = if input_rate == output_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_FRAMES,
                2,
                channels,
            )
            .map_err(|e| e.to_string())?;
            tracing::info!(input_rate, output_rate, channels, "Resampling source");
            Some(resampler)
        };

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    pub fn needs_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    pub fn ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }

    /// Resample interleaved samples. Output lags input by up to one chunk.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return input.to_vec();
        };

        for (i, sample) in input.iter().enumerate() {
            self.pending[i % self.channels].push(*sample);
        }

        let mut output = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_FRAMES).collect())
                .collect();
            match resampler.process(&chunk, None) {
                Ok(resampled) => interleave_into(&resampled, usize::MAX, &mut output),
                Err(e) => tracing::warn!(error = %e, "Resampling failed"),
            }
        }
        output
    }

    /// Drain what is left at end of stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let ratio = self.ratio();
        let Some(resampler) = self.resampler.as_mut() else {
            return Vec::new();
        };
        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Vec::new();
        }

        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|ch| {
                let mut padded = std::mem::take(ch);
                padded.resize(CHUNK_FRAMES, 0.0);
                padded
            })
            .collect();

        let mut output = Vec::new();
        match resampler.process(&chunk, None) {
            Ok(resampled) => {
                let frames = (remaining as f64 * ratio).ceil() as usize;
                interleave_into(&resampled, frames, &mut output);
            }
            Err(e) => tracing::warn!(error = %e, "Resampling flush failed"),
        }
        output
    }

    /// Forget buffered input, e.g. after a seek.
    pub fn reset(&mut self) {
        for ch in &mut self.pending {
            ch.clear();
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

fn interleave_into(planes: &[Vec<f32>], max_frames: usize, output: &mut Vec<f32>) {
    let Some(first) = planes.first() else {
        return;
    };
    for frame in 0..first.len().min(max_frames) {
        for plane in planes {
            output.push(plane[frame]);
        }
    }
}

/// Map interleaved samples from `from` channels to `to` channels.
///
/// Down to mono averages all channels; otherwise each output channel takes
/// the matching input channel, repeating the last one when there are fewer.
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            output.extend((0..to).map(|ch| frame[ch.min(from - 1)]));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut resampler = Resampler::new(48000, 48000, 2).unwrap();
        assert!(!resampler.needs_resampling());
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.process(&input), input);
        assert!(resampler.flush().is_empty());
    }

    #[test]
    fn test_ratio_when_rates_differ() {
        let resampler = Resampler::new(44100, 48000, 2).unwrap();
        assert!(resampler.needs_resampling());
        assert!((resampler.ratio() - 48000.0 / 44100.0).abs() < 0.0001);
    }

    #[test]
    fn test_upsampling_grows_output() {
        let mut resampler = Resampler::new(24000, 48000, 1).unwrap();
        let input = vec![0.0; 4096];
        let mut output = resampler.process(&input);
        output.extend(resampler.flush());
        // Roughly twice the frames once everything is drained
        assert!(output.len() > 6000, "got {}", output.len());
    }

    #[test]
    fn test_remix_mono_to_stereo_and_back() {
        assert_eq!(remix(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
        assert_eq!(remix(&[0.25, 0.75, 1.0, 0.0], 2, 1), vec![0.5, 0.5]);
        assert_eq!(remix(&[0.1, 0.2], 2, 2), vec![0.1, 0.2]);
    }
}
