//! Polyphase rate conversion for the three fixed-rate conversions the MPX
//! pipeline needs: audio input up to the oscillator rate, RDS waveform up
//! to the oscillator rate, and MPX composite down to the output rate.
//!
//! All three share one implementation, parameterized by the stopband/
//! passband edge the conversion needs to protect. Rates are fixed at init
//! (no dynamic reconfiguration), so the `rubato` resampler and its internal
//! buffers are built once and reused for the life of the stream.

use crate::error::{ResamplerError, Result};
use rubato::{Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

/// A single-channel rational-rate converter. `process` is called once per
/// audio-callback block with exactly `chunk_size` input samples and returns
/// the corresponding (slightly variable, bounded) number of output samples.
pub struct RateConverter {
    input_rate: u32,
    output_rate: u32,
    chunk_size: usize,
    inner: Inner,
}

enum Inner {
    /// Source and destination rates are equal: memcpy path, no filtering.
    Bypass,
    Active {
        resampler: SincFixedIn<f32>,
        /// Scratch input/output channel buffers, sized once by rubato's own
        /// allocation helpers and reused for the life of the converter so
        /// `process_into` never allocates on the hot path.
        input_buf: Vec<Vec<f32>>,
        output_buf: Vec<Vec<f32>>,
    },
}

impl RateConverter {
    /// `edge_hz` is the stopband-start frequency for an upsampler or the
    /// passband-end frequency for a downsampler; it is expressed relative
    /// to the Nyquist frequency of the *lower* of the two rates, which is
    /// always the meaningful constraint for either direction.
    pub fn new(input_rate: u32, output_rate: u32, edge_hz: f64, chunk_size: usize) -> Result<Self> {
        if input_rate == output_rate {
            return Ok(Self {
                input_rate,
                output_rate,
                chunk_size,
                inner: Inner::Bypass,
            });
        }

        let nyquist = input_rate.min(output_rate) as f64 / 2.0;
        let f_cutoff = ((edge_hz / nyquist) as f32).clamp(0.05, 0.999);
        let ratio = output_rate as f64 / input_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
            .map_err(|e| ResamplerError::Construction(e.to_string()))?;
        let input_buf = resampler.input_buffer_allocate(true);
        let output_buf = resampler.output_buffer_allocate(true);

        Ok(Self {
            input_rate,
            output_rate,
            chunk_size,
            inner: Inner::Active {
                resampler,
                input_buf,
                output_buf,
            },
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self.inner, Inner::Bypass)
    }

    /// Rate-convert exactly `self.chunk_size` input samples. `out` is
    /// cleared and refilled in place, and the active path copies `input`
    /// into a scratch buffer allocated once at construction, so no
    /// allocation occurs once the caller's buffer has grown to its
    /// steady-state size.
    pub fn process_into(&mut self, input: &[f32], out: &mut Vec<f32>) -> Result<()> {
        debug_assert_eq!(input.len(), self.chunk_size);
        out.clear();
        match &mut self.inner {
            Inner::Bypass => out.extend_from_slice(input),
            Inner::Active {
                resampler,
                input_buf,
                output_buf,
            } => {
                input_buf[0].copy_from_slice(input);
                let (_, frames_written) = resampler
                    .process_into_buffer(input_buf, output_buf, None)
                    .map_err(|e| ResamplerError::Process(e.to_string()))?;
                out.extend_from_slice(&output_buf[0][..frames_written]);
            }
        }
        Ok(())
    }

    /// Upper bound on samples produced by the next `process_into` call,
    /// used to size scratch buffers once at init.
    pub fn max_output_frames(&self) -> usize {
        match &self.inner {
            Inner::Bypass => self.chunk_size,
            Inner::Active { resampler, .. } => resampler.output_frames_max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_path_copies_samples_unchanged() {
        let mut conv = RateConverter::new(48_000, 48_000, 19_000.0, 256).unwrap();
        assert!(conv.is_bypass());
        let input: Vec<f32> = (0..256).map(|i| i as f32 * 0.01).collect();
        let mut out = Vec::new();
        conv.process_into(&input, &mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn active_upsampler_roughly_matches_expected_ratio() {
        let mut conv = RateConverter::new(48_000, 228_000, 19_000.0, 1024).unwrap();
        assert!(!conv.is_bypass());
        let input = vec![0.0f32; 1024];
        let mut out = Vec::new();
        conv.process_into(&input, &mut out).unwrap();
        let expected = (1024.0 * 228_000.0 / 48_000.0).ceil() as usize;
        assert!(out.len() <= conv.max_output_frames());
        assert!((out.len() as i64 - expected as i64).unsigned_abs() < expected as u64 / 4);
    }
}
