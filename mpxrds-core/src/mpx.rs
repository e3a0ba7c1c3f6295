//! The MPX generator: combines conditioned audio, the pilot tone, one of
//! the stereo-encoder variants, and the RDS subcarrier into the composite
//! baseband signal, one block at a time.
//!
//! All oscillator sampling for a frame happens after [`oscillator::OscillatorPair::step`]
//! has advanced that frame's phase, matching the convention the oscillator
//! module's own tests use (step, then sample).

use crate::error::{Error, Result};
use crate::filters::{AudioFilter, HilbertTransformer, WeaverLowPass, HT_GROUP_DELAY, WEAVER_GROUP_DELAY};
use crate::oscillator::{Interpolation, OscillatorPair};
use crate::rds::RdsSampleSource;
use crate::ssb_lpf::OverlapAddLowPass;

/// First-stage local-oscillator frequency for the Weaver modulator: a
/// quarter of the 38 kHz stereo subcarrier, sampled from the same
/// phase-locked table as the pilot/carrier/RDS tones.
pub const WEAVER_MIX_FREQ_HZ: f64 = 38_000.0 / 4.0;

/// Stereo-encoder variant. `SsbWeaver` is reachable only through the config
/// file or control API, not the CLI tool's `-s {0..3}` range, which only
/// ever spans the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoMode {
    Dsb,
    SsbHartley,
    SsbLpf,
    Mono,
    SsbWeaver,
}

impl StereoMode {
    /// Maps the `fmmod_tool -s` selector, which only covers the four modes
    /// the CLI exposes.
    pub fn from_cli(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StereoMode::Dsb),
            1 => Ok(StereoMode::SsbHartley),
            2 => Ok(StereoMode::SsbLpf),
            3 => Ok(StereoMode::Mono),
            other => Err(Error::InvalidInput(format!("stereo mode selector out of range: {other}"))),
        }
    }
}

/// Per-block gain settings, copied out of the control plane once per block
/// so the hot loop never touches a lock.
#[derive(Debug, Clone, Copy)]
pub struct Gains {
    pub audio: f32,
    pub pilot: f32,
    pub stereo_carrier: f32,
    pub rds: f32,
    pub mpx: f32,
}

/// Fixed-length ring buffer used purely to delay one signal path by a known
/// number of samples so it can be re-added to a path that picked up group
/// delay from filtering.
#[derive(Debug, Clone)]
struct DelayLine {
    buf: Vec<f32>,
    idx: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len.max(1)],
            idx: 0,
        }
    }

    fn push_pop(&mut self, x: f32) -> f32 {
        let out = self.buf[self.idx];
        self.buf[self.idx] = x;
        self.idx = (self.idx + 1) % self.buf.len();
        out
    }
}

const SSB_LPF_KERNEL_LEN: usize = 129;
const SSB_LPF_GROUP_DELAY: usize = SSB_LPF_KERNEL_LEN / 2;

fn ssb_lpf_kernel(cutoff_hz: f64, sample_rate: u32) -> Vec<f32> {
    let half = (SSB_LPF_KERNEL_LEN / 2) as isize;
    let fc = 2.0 * cutoff_hz / sample_rate as f64;
    let n = (SSB_LPF_KERNEL_LEN - 1) as f64;
    let mut taps: Vec<f64> = (-half..=half)
        .map(|k| {
            let sinc = if k == 0 {
                fc
            } else {
                (std::f64::consts::PI * fc * k as f64).sin() / (std::f64::consts::PI * k as f64)
            };
            let bin = (k + half) as f64;
            // Blackman window, matching the register of filters.rs's own
            // windowed-sinc design without depending on its private helpers.
            let window = 0.42 - 0.5 * (2.0 * std::f64::consts::PI * bin / n).cos() + 0.08 * (4.0 * std::f64::consts::PI * bin / n).cos();
            sinc * window
        })
        .collect();
    let sum: f64 = taps.iter().sum();
    for t in taps.iter_mut() {
        *t /= sum;
    }
    taps.into_iter().map(|t| t as f32).collect()
}

/// Orchestrates one MPX composite sample (or block, for the SSB-LPF
/// variant) out of conditioned stereo audio, the pilot, the selected
/// stereo-encoder variant, and a pre-resampled RDS waveform sample.
pub struct MpxGenerator {
    stereo_mode: StereoMode,
    pair: OscillatorPair,
    audio_filter: AudioFilter,
    preemphasis_enabled: bool,
    lpf_enabled: bool,

    hilbert: HilbertTransformer,
    hilbert_delay: DelayLine,

    weaver_i: WeaverLowPass,
    weaver_q: WeaverLowPass,
    weaver_delay: DelayLine,

    ssb_lpf: OverlapAddLowPass,
    ssb_lpf_delay: DelayLine,
    scratch_dsb: Vec<f32>,
    scratch_filtered: Vec<f32>,
    scratch_rest: Vec<f32>,
}

impl MpxGenerator {
    pub fn new(
        oscillator_rate: u32,
        audio_cutoff_hz: u32,
        preemphasis_tau_usecs: u32,
        interpolation: Interpolation,
        stereo_mode: StereoMode,
        block_len: usize,
    ) -> Result<Self> {
        let ssb_lpf_kernel = ssb_lpf_kernel(16_500.0, oscillator_rate);
        Ok(Self {
            stereo_mode,
            pair: OscillatorPair::new(oscillator_rate, interpolation)?,
            audio_filter: AudioFilter::new(audio_cutoff_hz, oscillator_rate, preemphasis_tau_usecs)?,
            preemphasis_enabled: true,
            lpf_enabled: true,
            hilbert: HilbertTransformer::try_new_checked()?,
            hilbert_delay: DelayLine::new(HT_GROUP_DELAY),
            weaver_i: WeaverLowPass::new(),
            weaver_q: WeaverLowPass::new(),
            weaver_delay: DelayLine::new(WEAVER_GROUP_DELAY),
            ssb_lpf: OverlapAddLowPass::new(&ssb_lpf_kernel, block_len)?,
            ssb_lpf_delay: DelayLine::new(SSB_LPF_GROUP_DELAY),
            scratch_dsb: vec![0.0; block_len],
            scratch_filtered: vec![0.0; block_len],
            scratch_rest: vec![0.0; block_len],
        })
    }

    pub fn set_stereo_mode(&mut self, mode: StereoMode) {
        self.stereo_mode = mode;
    }

    pub fn stereo_mode(&self) -> StereoMode {
        self.stereo_mode
    }

    pub fn set_lpf_enabled(&mut self, enabled: bool) {
        self.lpf_enabled = enabled;
    }

    /// `None` disables pre-emphasis; `Some(tau)` rebuilds the biquad for the
    /// new time constant. Rebuilding is cheap and only happens on a control
    /// API write, never in the per-block hot path.
    pub fn set_preemphasis(&mut self, tau_usecs: Option<u32>, oscillator_rate: u32) -> Result<()> {
        match tau_usecs {
            None => self.preemphasis_enabled = false,
            Some(tau) => {
                self.audio_filter.preemphasis = crate::filters::PreEmphasis::new(oscillator_rate, tau)?;
                self.preemphasis_enabled = true;
            }
        }
        Ok(())
    }

    fn condition(&mut self, sample: f32, channel: u8) -> f32 {
        let pe = if self.preemphasis_enabled {
            self.audio_filter.preemphasis.apply(sample, channel)
        } else {
            sample
        };
        if self.lpf_enabled {
            self.audio_filter.lpf.apply(pe, channel)
        } else {
            pe
        }
    }

    /// Rate-convert a whole block of conditioned stereo audio plus one
    /// RDS waveform sample per frame into an MPX composite block.
    ///
    /// `audio_l`/`audio_r`/`out` must all have the same length. For every
    /// mode but [`StereoMode::SsbLpf`] this runs a pure per-frame loop; the
    /// SSB-LPF variant needs the whole block's DSB product up front, since
    /// its low-pass is a block-convolution filter.
    pub fn process_block<R: RdsSampleSource>(
        &mut self,
        audio_l: &[f32],
        audio_r: &[f32],
        rds: &mut R,
        gains: Gains,
        out: &mut [f32],
    ) -> Result<()> {
        let n = audio_l.len();
        debug_assert_eq!(audio_r.len(), n);
        debug_assert_eq!(out.len(), n);

        if self.stereo_mode == StereoMode::SsbLpf {
            return self.process_block_ssb_lpf(audio_l, audio_r, rds, gains, out);
        }

        for i in 0..n {
            out[i] = self.process_frame(audio_l[i], audio_r[i], rds.next_sample(), gains);
        }
        Ok(())
    }

    fn process_frame(&mut self, l: f32, r: f32, rds_sample: f32, gains: Gains) -> f32 {
        self.pair.step();

        let l2 = self.condition(l, 0);
        let r2 = self.condition(r, 1);
        if self.lpf_enabled {
            self.audio_filter.advance_frame();
        }

        let mono = 0.5 * (l2 + r2);
        let diff = 0.5 * (l2 - r2);

        let pilot = self.pair.sine.sample_for(19_000.0) as f32;
        let carrier57 = self.pair.sine.sample_for(57_000.0) as f32;
        let rest = gains.audio * mono + gains.pilot * pilot + gains.rds * rds_sample * carrier57;

        let total = match self.stereo_mode {
            StereoMode::Dsb => {
                let c38 = self.pair.sine.sample_for(38_000.0) as f32;
                rest + gains.stereo_carrier * diff * c38
            }
            StereoMode::Mono => rest,
            StereoMode::SsbHartley => {
                let delayed_diff = self.hilbert_delay.push_pop(diff);
                let imag = self.hilbert.apply(diff);
                let c38 = self.pair.sine.sample_for(38_000.0) as f32;
                let cos38 = self.pair.cosine.sample_for(38_000.0) as f32;
                rest + gains.stereo_carrier * (delayed_diff * cos38 - imag * c38)
            }
            StereoMode::SsbWeaver => {
                let mix_sin = self.pair.sine.sample_for(WEAVER_MIX_FREQ_HZ) as f32;
                let mix_cos = self.pair.cosine.sample_for(WEAVER_MIX_FREQ_HZ) as f32;
                let filt_i = self.weaver_i.apply(diff * mix_cos);
                let filt_q = self.weaver_q.apply(diff * mix_sin);
                let c38 = self.pair.sine.sample_for(38_000.0) as f32;
                let cos38 = self.pair.cosine.sample_for(38_000.0) as f32;
                let stereo = gains.stereo_carrier * (filt_i * cos38 - filt_q * c38);
                self.weaver_delay.push_pop(rest) + stereo
            }
            StereoMode::SsbLpf => unreachable!("handled by process_block_ssb_lpf"),
        };

        total * gains.mpx
    }

    fn process_block_ssb_lpf<R: RdsSampleSource>(
        &mut self,
        audio_l: &[f32],
        audio_r: &[f32],
        rds: &mut R,
        gains: Gains,
        out: &mut [f32],
    ) -> Result<()> {
        let n = audio_l.len();
        for i in 0..n {
            self.pair.step();

            let l2 = self.condition(audio_l[i], 0);
            let r2 = self.condition(audio_r[i], 1);
            if self.lpf_enabled {
                self.audio_filter.advance_frame();
            }

            let mono = 0.5 * (l2 + r2);
            let diff = 0.5 * (l2 - r2);

            let pilot = self.pair.sine.sample_for(19_000.0) as f32;
            let carrier57 = self.pair.sine.sample_for(57_000.0) as f32;
            let c38 = self.pair.sine.sample_for(38_000.0) as f32;

            self.scratch_rest[i] = gains.audio * mono + gains.pilot * pilot + gains.rds * rds.next_sample() * carrier57;
            self.scratch_dsb[i] = diff * c38;
        }

        self.ssb_lpf.process_block(&self.scratch_dsb, &mut self.scratch_filtered)?;

        for i in 0..n {
            let delayed_rest = self.ssb_lpf_delay.push_pop(self.scratch_rest[i]);
            out[i] = (delayed_rest + gains.stereo_carrier * self.scratch_filtered[i]) * gains.mpx;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentRds;
    impl RdsSampleSource for SilentRds {
        fn next_sample(&mut self) -> f32 {
            0.0
        }
    }

    fn unity_gains() -> Gains {
        Gains {
            audio: 1.0,
            pilot: 0.09,
            stereo_carrier: 0.09,
            rds: 0.05,
            mpx: 1.0,
        }
    }

    #[test]
    fn mono_mode_produces_only_mono_plus_pilot() {
        let mut gen = MpxGenerator::new(228_000, 16_500, 50, Interpolation::Cubic, StereoMode::Mono, 64).unwrap();
        let mut rds = SilentRds;
        let audio_l = vec![0.5f32; 64];
        let audio_r = vec![0.5f32; 64];
        let mut out = vec![0.0f32; 64];
        gen.process_block(&audio_l, &audio_r, &mut rds, unity_gains(), &mut out).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn dsb_mode_differs_from_mono_when_channels_differ() {
        let mut gen_dsb = MpxGenerator::new(228_000, 16_500, 50, Interpolation::Cubic, StereoMode::Dsb, 64).unwrap();
        let mut gen_mono = MpxGenerator::new(228_000, 16_500, 50, Interpolation::Cubic, StereoMode::Mono, 64).unwrap();
        let mut rds = SilentRds;
        let audio_l = vec![0.8f32; 64];
        let audio_r = vec![-0.8f32; 64];
        let mut out_dsb = vec![0.0f32; 64];
        let mut out_mono = vec![0.0f32; 64];
        gen_dsb
            .process_block(&audio_l, &audio_r, &mut rds, unity_gains(), &mut out_dsb)
            .unwrap();
        gen_mono
            .process_block(&audio_l, &audio_r, &mut SilentRds, unity_gains(), &mut out_mono)
            .unwrap();
        assert_ne!(out_dsb, out_mono);
    }

    #[test]
    fn ssb_lpf_mode_stays_finite_over_several_blocks() {
        let mut gen = MpxGenerator::new(228_000, 16_500, 50, Interpolation::Cubic, StereoMode::SsbLpf, 64).unwrap();
        let mut rds = SilentRds;
        let audio_l: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();
        let audio_r: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).cos()).collect();
        let mut out = vec![0.0f32; 64];
        for _ in 0..20 {
            gen.process_block(&audio_l, &audio_r, &mut rds, unity_gains(), &mut out).unwrap();
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn weaver_mode_stays_finite_over_several_blocks() {
        let mut gen = MpxGenerator::new(228_000, 16_500, 50, Interpolation::Cubic, StereoMode::SsbWeaver, 64).unwrap();
        let mut rds = SilentRds;
        let audio_l: Vec<f32> = (0..64).map(|i| (i as f32 * 0.05).sin()).collect();
        let audio_r: Vec<f32> = (0..64).map(|i| (i as f32 * 0.07).sin()).collect();
        let mut out = vec![0.0f32; 64];
        for _ in 0..20 {
            gen.process_block(&audio_l, &audio_r, &mut rds, unity_gains(), &mut out).unwrap();
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn cli_selector_out_of_range_is_rejected() {
        assert!(StereoMode::from_cli(4).is_err());
        assert!(StereoMode::from_cli(3).is_ok());
    }
}
