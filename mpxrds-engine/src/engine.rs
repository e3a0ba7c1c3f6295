//! The MPX synthesis orchestrator: owns the per-block DSP pipeline (§4.4)
//! and wires the `cpal` audio callback, the RDS consumer, and the FIFO/RTP
//! egress dispatch together. Everything in [`MpxEngine::process_block`]
//! runs on the real-time audio-input callback thread: no allocation after
//! construction, no lock held across a blocking call, and the only
//! suspension point is the FIFO writer's non-blocking `write`.

use std::sync::Arc;

use mpxrds_core::control::PreEmphasis;
use mpxrds_core::mpx::StereoMode;
use mpxrds_core::oscillator::Interpolation;
use mpxrds_core::rds::Consumer as RdsConsumer;
use mpxrds_core::{MpxGenerator, RateConverter};
use ringbuf::HeapProducer;
use tracing::debug;

use crate::audio::FifoWriter;
use crate::config::Config;
use crate::error::Result;
use crate::rtp::RtpSinkHandle;
use crate::state::SharedState;

/// Cache of the modulation-affecting control fields last pushed into the
/// real-time [`MpxGenerator`], so the audio thread only touches the
/// generator's (cheap but non-trivial) setters when something actually
/// changed since the previous block.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AppliedModulation {
    stereo_mode: StereoMode,
    lpf_enabled: bool,
    preemphasis: PreEmphasis,
}

fn fit_to_len(buf: &mut Vec<f32>, len: usize) {
    match buf.len().cmp(&len) {
        std::cmp::Ordering::Less => {
            let last = buf.last().copied().unwrap_or(0.0);
            buf.resize(len, last);
        }
        std::cmp::Ordering::Greater => buf.truncate(len),
        std::cmp::Ordering::Equal => {}
    }
}

pub struct MpxEngine {
    state: Arc<SharedState>,
    mpx: MpxGenerator,
    upsample_l: RateConverter,
    upsample_r: RateConverter,
    downsample: RateConverter,
    rds: RdsConsumer,
    fifo: FifoWriter,
    rtp: RtpSinkHandle,
    output_tx: HeapProducer<f32>,

    input_block_size: usize,
    upsampled_len: usize,

    up_l: Vec<f32>,
    up_r: Vec<f32>,
    mpx_buf: Vec<f32>,
    down_buf: Vec<f32>,

    applied: AppliedModulation,
}

impl MpxEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        input_rate: u32,
        state: Arc<SharedState>,
        rds: RdsConsumer,
        fifo: FifoWriter,
        rtp: RtpSinkHandle,
        output_tx: HeapProducer<f32>,
    ) -> Result<Self> {
        let osc_rate = config.oscillator_rate;
        let upsampled_len = ((config.block_size as u64 * osc_rate as u64 + input_rate as u64 - 1) / input_rate as u64) as usize;

        let initial = {
            let ctl = state.fmmod.lock().unwrap();
            AppliedModulation {
                stereo_mode: ctl.stereo_mode,
                lpf_enabled: ctl.lpf_enabled,
                preemphasis: ctl.preemphasis,
            }
        };

        let mut mpx = MpxGenerator::new(
            osc_rate,
            16_500,
            initial.preemphasis.tau_usecs().unwrap_or(50),
            Interpolation::Cubic,
            initial.stereo_mode,
            upsampled_len,
        )?;
        mpx.set_lpf_enabled(initial.lpf_enabled);
        mpx.set_preemphasis(initial.preemphasis.tau_usecs(), osc_rate)?;

        Ok(Self {
            state,
            mpx,
            upsample_l: RateConverter::new(input_rate, osc_rate, 19_000.0, config.block_size)?,
            upsample_r: RateConverter::new(input_rate, osc_rate, 19_000.0, config.block_size)?,
            downsample: RateConverter::new(osc_rate, config.output_sample_rate, 60_000.0, upsampled_len)?,
            rds,
            fifo,
            rtp,
            output_tx,
            input_block_size: config.block_size,
            upsampled_len,
            up_l: Vec::with_capacity(upsampled_len + 8),
            up_r: Vec::with_capacity(upsampled_len + 8),
            mpx_buf: vec![0.0; upsampled_len],
            down_buf: Vec::with_capacity(upsampled_len),
            applied: initial,
        })
    }

    pub fn upsampled_len(&self) -> usize {
        self.upsampled_len
    }

    /// Copies any control-plane modulation changes into the real-time
    /// generator. Locks [`SharedState::fmmod`] briefly (uncontended in the
    /// steady state) rather than holding it across the whole block.
    fn sync_modulation(&mut self) {
        let current = {
            let ctl = self.state.fmmod.lock().unwrap();
            AppliedModulation {
                stereo_mode: ctl.stereo_mode,
                lpf_enabled: ctl.lpf_enabled,
                preemphasis: ctl.preemphasis,
            }
        };
        if current == self.applied {
            return;
        }
        if current.stereo_mode != self.applied.stereo_mode {
            self.mpx.set_stereo_mode(current.stereo_mode);
        }
        if current.lpf_enabled != self.applied.lpf_enabled {
            self.mpx.set_lpf_enabled(current.lpf_enabled);
        }
        if current.preemphasis != self.applied.preemphasis {
            if let Err(e) = self.mpx.set_preemphasis(current.preemphasis.tau_usecs(), self.mpx_osc_rate()) {
                tracing::warn!(error = %e, "rejected pre-emphasis change from control plane");
            }
        }
        self.applied = current;
    }

    fn mpx_osc_rate(&self) -> u32 {
        self.upsample_l.output_rate()
    }

    /// Runs one full block through the pipeline: pre-emphasis/LPF,
    /// upsample, MPX synthesis, downsample, dispatch. A no-op if the
    /// transport hands us fewer frames than the configured block size
    /// (§4.4 edge cases).
    pub fn process_block(&mut self, audio_l: &[f32], audio_r: &[f32]) {
        if audio_l.len() != self.input_block_size || audio_r.len() != self.input_block_size {
            debug!(got = audio_l.len(), expected = self.input_block_size, "short audio block, skipping");
            return;
        }

        self.sync_modulation();

        if let Err(e) = self.upsample_l.process_into(audio_l, &mut self.up_l) {
            tracing::warn!(error = %e, "audio upsample (L) failed, skipping block");
            return;
        }
        if let Err(e) = self.upsample_r.process_into(audio_r, &mut self.up_r) {
            tracing::warn!(error = %e, "audio upsample (R) failed, skipping block");
            return;
        }
        fit_to_len(&mut self.up_l, self.upsampled_len);
        fit_to_len(&mut self.up_r, self.upsampled_len);

        let gains = self.state.gains();
        if let Err(e) = self.mpx.process_block(&self.up_l, &self.up_r, &mut self.rds, gains, &mut self.mpx_buf) {
            tracing::warn!(error = %e, "MPX synthesis failed, skipping block");
            return;
        }

        let peak_l = audio_l.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let peak_r = audio_r.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let peak_mpx = self.mpx_buf.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        self.state.record_peak(peak_l, peak_r, peak_mpx);

        if let Err(e) = self.downsample.process_into(&self.mpx_buf, &mut self.down_buf) {
            tracing::warn!(error = %e, "MPX downsample failed, skipping block");
            return;
        }

        for &sample in self.down_buf.iter() {
            let _ = self.output_tx.push(sample);
        }
        self.fifo.write_samples(&self.down_buf);
        self.rtp.push_samples(&self.down_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_to_len_pads_short_buffers_by_repeating_last_sample() {
        let mut buf = vec![1.0, 2.0, 3.0];
        fit_to_len(&mut buf, 5);
        assert_eq!(buf, vec![1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn fit_to_len_truncates_long_buffers() {
        let mut buf = vec![1.0, 2.0, 3.0, 4.0];
        fit_to_len(&mut buf, 2);
        assert_eq!(buf, vec![1.0, 2.0]);
    }
}
