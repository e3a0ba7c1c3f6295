//! FM audio pre-emphasis, the protective audio low-pass, and the two fixed
//! filters used by the SSB stereo-encoder variants (Weaver's Butterworth
//! low-pass and Hartley's Hilbert transformer).

use crate::error::{AudioFilterError, HilbertError, LpfError, Result};

/// Windowed-sinc FIR low-pass, used both to protect the 19 kHz pilot region
/// from wideband audio and as the stopband shape for SSB-LPF.
pub const FIR_FILTER_SIZE: usize = 127;
pub const FIR_FILTER_HALF_SIZE: usize = FIR_FILTER_SIZE / 2;

fn sinc(phase: f64) -> f64 {
    if phase == 0.0 {
        1.0
    } else {
        (std::f64::consts::PI * phase).sin() / (std::f64::consts::PI * phase)
    }
}

fn sinc_filter(fc_doubled: f64, bin: usize) -> f64 {
    sinc(fc_doubled * (bin as f64 - FIR_FILTER_HALF_SIZE as f64))
}

fn blackman_harris(bin: usize) -> f64 {
    const A0: f64 = 0.35875;
    const A1: f64 = 0.48829;
    const A2: f64 = 0.14128;
    const A3: f64 = 0.01168;
    let n = (FIR_FILTER_SIZE - 1) as f64;
    A0 - A1 * (2.0 * std::f64::consts::PI * bin as f64 / n).cos()
        + A2 * (4.0 * std::f64::consts::PI * bin as f64 / n).cos()
        - A3 * (6.0 * std::f64::consts::PI * bin as f64 / n).cos()
}

/// Windowed-sinc FIR low-pass filter, two channels sharing one write index.
///
/// The shared index is deliberate: both channels are driven by the same
/// audio callback block, and keeping one index for both (rather than
/// advancing it once per channel per sample) is what keeps the left and
/// right ring buffers phase-aligned. Callers must invoke [`Self::advance`]
/// exactly once per input frame, after applying the filter to every channel
/// of that frame, never once per channel.
#[derive(Debug, Clone)]
pub struct FirLowPass {
    coeffs: Vec<f32>,
    buf_l: Vec<f32>,
    buf_r: Vec<f32>,
    index: usize,
}

impl FirLowPass {
    pub fn new(cutoff_freq: u32, sample_rate: u32) -> Result<Self> {
        if FIR_FILTER_SIZE % 2 == 0 {
            return Err(LpfError::EvenSize(FIR_FILTER_SIZE).into());
        }
        let fc_doubled = 2.0 * (cutoff_freq as f64 / sample_rate as f64);
        let mut coeffs = vec![0.0f64; FIR_FILTER_HALF_SIZE];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = sinc_filter(fc_doubled, i) * blackman_harris(i);
        }
        let sum: f64 = 2.0 * coeffs.iter().sum::<f64>();
        for c in coeffs.iter_mut() {
            *c /= sum;
        }

        Ok(Self {
            coeffs: coeffs.into_iter().map(|c| c as f32).collect(),
            buf_l: vec![0.0; FIR_FILTER_SIZE],
            buf_r: vec![0.0; FIR_FILTER_SIZE],
            index: 0,
        })
    }

    /// Apply the filter to one channel's sample for the current frame.
    /// `channel` is 0 for left, 1 for right.
    pub fn apply(&mut self, sample: f32, channel: u8) -> f32 {
        let buf = match channel {
            0 => &mut self.buf_l,
            1 => &mut self.buf_r,
            _ => return 0.0,
        };
        buf[self.index] = sample;

        let mut out = 0.0f32;
        let mut previous = self.index as isize;
        let mut later = self.index as isize;
        for (i, c) in self.coeffs.iter().enumerate() {
            previous -= 1;
            if previous < 0 {
                previous = FIR_FILTER_SIZE as isize - 1;
            }
            later += 1;
            if later >= FIR_FILTER_SIZE as isize {
                later = 0;
            }
            out += c * (buf[previous as usize] + buf[later as usize]);
            let _ = i;
        }
        out
    }

    /// Advance the shared ring-buffer index. Call once per input frame,
    /// after filtering all channels of that frame.
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % FIR_FILTER_SIZE;
    }
}

/// FM pre-emphasis: an Audio-EQ-Cookbook high-shelf biquad with a fixed
/// gain/slope pair matched to the 50us/75us regional time constants.
#[derive(Debug, Clone, Copy)]
pub struct PreEmphasis {
    a_taps: [f32; 3],
    b_taps: [f32; 2],
    in_l: [f32; 2],
    in_r: [f32; 2],
    out_l: [f32; 2],
    out_r: [f32; 2],
}

impl PreEmphasis {
    pub fn new(sample_rate: u32, tau_usecs: u32) -> Result<Self> {
        if tau_usecs == 0 {
            return Err(AudioFilterError::BadTimeConstant(tau_usecs).into());
        }
        let tau = 0.000_001 * tau_usecs as f64;
        let cutoff_freq = 1.0 / (2.0 * std::f64::consts::PI * tau);
        let fc = cutoff_freq / sample_rate as f64;
        let pre_warped_fc = 2.0 * std::f64::consts::PI * fc;
        let re = pre_warped_fc.cos();
        let im = pre_warped_fc.sin();

        // Gain/slope come from SoX's CD de-emphasis filter (the same curve
        // FM pre-emphasis uses at 50us).
        let gain = 9.477_f64;
        let slope = 0.4845_f64;
        let a_gain = (gain / 40.0 * 10f64.ln()).exp();
        let alpha = im / 2.0 * ((a_gain + 1.0 / a_gain) * (1.0 / slope - 1.0) + 2.0).sqrt();
        let sqrt_a = a_gain.sqrt();

        let b0 = a_gain * ((a_gain + 1.0) + (a_gain - 1.0) * re + 2.0 * sqrt_a * alpha);
        let b1 = -2.0 * a_gain * ((a_gain - 1.0) + (a_gain + 1.0) * re);
        let b2 = a_gain * ((a_gain + 1.0) + (a_gain - 1.0) * re - 2.0 * sqrt_a * alpha);
        let a0 = (a_gain + 1.0) - (a_gain - 1.0) * re + 2.0 * sqrt_a * alpha;
        let a1 = 2.0 * ((a_gain - 1.0) - (a_gain + 1.0) * re);
        let a2 = (a_gain + 1.0) - (a_gain - 1.0) * re - 2.0 * sqrt_a * alpha;

        Ok(Self {
            a_taps: [(b0 / a0) as f32, (b1 / a0) as f32, (b2 / a0) as f32],
            b_taps: [(a1 / a0) as f32, (a2 / a0) as f32],
            in_l: [0.0; 2],
            in_r: [0.0; 2],
            out_l: [0.0; 2],
            out_r: [0.0; 2],
        })
    }

    pub fn apply(&mut self, sample: f32, channel: u8) -> f32 {
        let (in_buf, out_buf) = match channel {
            0 => (&mut self.in_l, &mut self.out_l),
            1 => (&mut self.in_r, &mut self.out_r),
            _ => return 0.0,
        };

        let out = self.a_taps[0] * sample + self.a_taps[1] * in_buf[1] + self.a_taps[2] * in_buf[0]
            - self.b_taps[0] * out_buf[1]
            - self.b_taps[1] * out_buf[0];

        in_buf[0] = in_buf[1];
        in_buf[1] = sample;
        out_buf[0] = out_buf[1];
        out_buf[1] = out;

        out
    }
}

/// Combined per-frame audio conditioning: pre-emphasis first, then the
/// optional protective low-pass. Owns the shared FIR ring-buffer index, so
/// callers drive it through [`Self::advance_frame`] rather than touching
/// the LPF directly.
#[derive(Debug, Clone)]
pub struct AudioFilter {
    pub preemphasis: PreEmphasis,
    pub lpf: FirLowPass,
}

impl AudioFilter {
    pub fn new(cutoff_freq: u32, sample_rate: u32, tau_usecs: u32) -> Result<Self> {
        Ok(Self {
            preemphasis: PreEmphasis::new(sample_rate, tau_usecs)?,
            lpf: FirLowPass::new(cutoff_freq, sample_rate)?,
        })
    }

    pub fn apply(&mut self, sample: f32, channel: u8, use_lpf: bool) -> f32 {
        let out = self.preemphasis.apply(sample, channel);
        if use_lpf {
            self.lpf.apply(out, channel)
        } else {
            out
        }
    }

    /// Call once per input frame, after [`Self::apply`] has been called for
    /// every channel of that frame.
    pub fn advance_frame(&mut self) {
        self.lpf.advance();
    }
}

/// Fixed 10-tap Butterworth low-pass used by the Weaver SSB modulator to cut
/// everything above roughly a quarter of the oscillator rate. Coefficients
/// are a frozen analog-prototype design (not recomputed at runtime).
const WEAVER_FILTER_TAPS: usize = 10;
const WEAVER_FILTER_SIZE: usize = WEAVER_FILTER_TAPS + 1;
const WEAVER_REVERSE_MAX_GAIN: f32 = 1.0 / 527.929_430_3;

/// Group delay of the Weaver low-pass, in samples at the oscillator rate.
/// The Weaver stereo encoder delays its undelayed `S` path by this many
/// samples so it stays time-aligned with the I/Q branch after filtering.
pub const WEAVER_GROUP_DELAY: usize = WEAVER_FILTER_TAPS / 2;

const WEAVER_A_TAPS: [f32; 6] = [1.0, 10.0, 45.0, 120.0, 210.0, 252.0];
const WEAVER_B_TAPS: [f32; 10] = [
    -0.0000223708,
    0.0002921703,
    -0.0040647116,
    0.0147536451,
    -0.0945583553,
    0.1621107260,
    -0.6336867140,
    0.5477895114,
    -1.4564581781,
    0.5241910939,
];

#[derive(Debug, Clone, Copy)]
pub struct WeaverLowPass {
    in_buf: [f32; WEAVER_FILTER_SIZE],
    out_buf: [f32; WEAVER_FILTER_SIZE],
}

impl Default for WeaverLowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl WeaverLowPass {
    pub fn new() -> Self {
        Self {
            in_buf: [0.0; WEAVER_FILTER_SIZE],
            out_buf: [0.0; WEAVER_FILTER_SIZE],
        }
    }

    pub fn apply(&mut self, sample: f32) -> f32 {
        self.in_buf.copy_within(1.., 0);
        self.in_buf[WEAVER_FILTER_SIZE - 1] = sample * WEAVER_REVERSE_MAX_GAIN;

        let mut out = 0.0f32;
        for (i, a) in WEAVER_A_TAPS.iter().enumerate().take(WEAVER_FILTER_TAPS / 2) {
            out += a * (self.in_buf[i] + self.in_buf[WEAVER_FILTER_TAPS - i]);
        }
        out += WEAVER_A_TAPS[WEAVER_FILTER_TAPS / 2] * self.in_buf[WEAVER_FILTER_TAPS / 2];

        self.out_buf.copy_within(1.., 0);
        for (b, histv) in WEAVER_B_TAPS.iter().zip(self.out_buf.iter()) {
            out += b * histv;
        }
        self.out_buf[WEAVER_FILTER_SIZE - 1] = out;

        out
    }
}

/// 65-tap odd-symmetric Hilbert transformer used by the Hartley SSB
/// modulator to produce the quadrature component of L-R.
pub const HT_FIR_FILTER_SIZE: usize = 65;
pub const HT_FIR_FILTER_GAIN: f32 = 1.568_367_973;
const HT_REVERSE_GAIN: f32 = 1.0 / HT_FIR_FILTER_GAIN;

/// Group delay of the Hilbert transformer, in samples. The Hartley stereo
/// encoder delays the undelayed (real) `D` path by this many samples so it
/// stays time-aligned with the transformed (imaginary) path.
pub const HT_GROUP_DELAY: usize = HT_FIR_FILTER_SIZE / 2;

#[rustfmt::skip]
const HT_COEFFS: [f32; HT_FIR_FILTER_SIZE] = [
    0.0000000000,  0.0026520976,  0.0000000000,  0.0034416361,
    0.0000000000,  0.0049746748,  0.0000000000,  0.0073766077,
    0.0000000000,  0.0107903952,  0.0000000000,  0.0153884524,
    0.0000000000,  0.0213931078,  0.0000000000,  0.0291124774,
    0.0000000000,  0.0390058590,  0.0000000000,  0.0518100732,
    0.0000000000,  0.0688038635,  0.0000000000,  0.0924245456,
    0.0000000000,  0.1279406869,  0.0000000000,  0.1891367563,
    0.0000000000,  0.3267308515,  0.0000000000,  0.9977849743,
    0.0000000000, -0.9977849743, -0.0000000000, -0.3267308515,
   -0.0000000000, -0.1891367563, -0.0000000000, -0.1279406869,
   -0.0000000000, -0.0924245456, -0.0000000000, -0.0688038635,
   -0.0000000000, -0.0518100732, -0.0000000000, -0.0390058590,
   -0.0000000000, -0.0291124774, -0.0000000000, -0.0213931078,
   -0.0000000000, -0.0153884524, -0.0000000000, -0.0107903952,
   -0.0000000000, -0.0073766077, -0.0000000000, -0.0049746748,
   -0.0000000000, -0.0034416361, -0.0000000000, -0.0026520976,
   -0.0000000000,
];

#[derive(Debug, Clone, Copy)]
pub struct HilbertTransformer {
    buf: [f32; HT_FIR_FILTER_SIZE],
}

impl Default for HilbertTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl HilbertTransformer {
    pub fn new() -> Self {
        Self {
            buf: [0.0; HT_FIR_FILTER_SIZE],
        }
    }

    pub fn try_new_checked() -> Result<Self> {
        if HT_FIR_FILTER_SIZE % 2 == 0 {
            return Err(HilbertError::EvenTapCount(HT_FIR_FILTER_SIZE).into());
        }
        Ok(Self::new())
    }

    pub fn apply(&mut self, sample: f32) -> f32 {
        self.buf.copy_within(1.., 0);
        self.buf[HT_FIR_FILTER_SIZE - 1] = sample * HT_REVERSE_GAIN;

        HT_COEFFS.iter().zip(self.buf.iter()).map(|(c, s)| c * s).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fir_coefficients_are_normalized() {
        let fir = FirLowPass::new(16_500, 228_000).unwrap();
        let sum: f32 = 2.0 * fir.coeffs.iter().sum::<f32>();
        assert!((sum - 1.0).abs() < 1e-3, "sum={sum}");
    }

    #[test]
    fn fir_shared_index_advances_once_per_frame() {
        let mut fir = FirLowPass::new(16_500, 228_000).unwrap();
        let before = fir.index;
        fir.apply(1.0, 0);
        fir.apply(1.0, 1);
        assert_eq!(fir.index, before, "apply() alone must not move the index");
        fir.advance();
        assert_eq!(fir.index, (before + 1) % FIR_FILTER_SIZE);
    }

    #[test]
    fn preemphasis_boosts_high_frequency_more_than_low() {
        let mut pe_low = PreEmphasis::new(228_000, 50).unwrap();
        let mut pe_high = pe_low;
        let n = 4096;
        let mut low_energy = 0.0f32;
        let mut high_energy = 0.0f32;
        for i in 0..n {
            let t = i as f32 / 228_000.0;
            let low_in = (2.0 * std::f32::consts::PI * 200.0 * t).sin();
            let high_in = (2.0 * std::f32::consts::PI * 15_000.0 * t).sin();
            low_energy += pe_low.apply(low_in, 0).abs();
            high_energy += pe_high.apply(high_in, 0).abs();
        }
        assert!(high_energy > low_energy);
    }

    #[test]
    fn weaver_lowpass_is_stable_under_dc_input() {
        let mut w = WeaverLowPass::new();
        let mut last = 0.0;
        for _ in 0..10_000 {
            last = w.apply(1.0);
        }
        assert!(last.is_finite());
    }

    #[test]
    fn hilbert_transformer_has_odd_symmetric_coefficients() {
        for i in 0..HT_FIR_FILTER_SIZE / 2 {
            let a = HT_COEFFS[i];
            let b = HT_COEFFS[HT_FIR_FILTER_SIZE - 1 - i];
            assert!((a + b).abs() < 1e-9, "index {i}: {a} vs {b}");
        }
    }
}
