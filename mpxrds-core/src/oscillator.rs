//! Phase-locked sine/cosine wavetable oscillator bank.
//!
//! Produces phase-synchronized samples at arbitrary frequencies by scaling the
//! read phase of a single wavetable, which is how the pilot (19 kHz), stereo
//! subcarrier (38 kHz) and RDS subcarrier (57 kHz) stay locked to one another.

use crate::error::{OscillatorError, Result};

/// Highest frequency this oscillator bank is ever asked to synthesize.
pub const MAX_FREQUENCY: u32 = 57_000;

/// Default oscillator sample rate: a common multiple of 19 kHz/38 kHz/57 kHz
/// high enough to keep MAX_FREQUENCY comfortably under Nyquist.
pub const DEFAULT_SAMPLE_RATE: u32 = 228_000;

/// Wavetable size, small enough to fit in cache, large enough that cubic
/// interpolation error is negligible. Values between lookups are filled in
/// by [`Kind::Cubic`] interpolation when selected.
pub const WAVE_TABLE_SIZE: usize = 63;

const ONE_PERIOD: f64 = WAVE_TABLE_SIZE as f64;

/// Whether the oscillator bank looks up raw table slots or interpolates
/// between them with a cubic spline through the stored derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Nearest wavetable slot. Cheapest, adequate above a few hundred kHz of
    /// table resolution relative to sample rate.
    Nearest,
    /// Cubic spline through the two neighboring slots using the stored
    /// derivative table (cos for a sine oscillator, -sin for a cosine one).
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Sine,
    Cosine,
}

/// A single phase-locked oscillator. `sample_for(freq)` can be called with
/// any of 19 kHz/38 kHz/57 kHz (or the quarter-rate Weaver tone) and all
/// such calls share one running `current_phase`, which is what keeps them
/// phase-synced: playing back one period `freq` times faster is the same as
/// scaling the phase read before the lookup.
#[derive(Debug, Clone)]
pub struct Oscillator {
    kind: Kind,
    interpolation: Interpolation,
    table: [f64; WAVE_TABLE_SIZE],
    derivative: [f64; WAVE_TABLE_SIZE],
    sample_rate: u32,
    phase_step: f64,
    current_phase: f64,
}

impl Oscillator {
    pub fn new(kind: Kind, sample_rate: u32, interpolation: Interpolation) -> Result<Self> {
        if MAX_FREQUENCY >= sample_rate {
            return Err(OscillatorError::RateTooLow {
                rate: sample_rate,
                max_freq: MAX_FREQUENCY,
            }
            .into());
        }
        if (sample_rate / MAX_FREQUENCY) % 2 != 0 {
            return Err(OscillatorError::BadRatio {
                rate: sample_rate,
                max_freq: MAX_FREQUENCY,
            }
            .into());
        }

        let mut table = [0.0; WAVE_TABLE_SIZE];
        let mut derivative = [0.0; WAVE_TABLE_SIZE];
        for i in 0..WAVE_TABLE_SIZE {
            let phase = 2.0 * std::f64::consts::PI * (i as f64) / ONE_PERIOD;
            match kind {
                Kind::Sine => {
                    table[i] = phase.sin();
                    derivative[i] = phase.cos();
                }
                Kind::Cosine => {
                    table[i] = phase.cos();
                    derivative[i] = -phase.sin();
                }
            }
        }

        Ok(Self {
            kind,
            interpolation,
            table,
            derivative,
            sample_rate,
            phase_step: ONE_PERIOD / sample_rate as f64,
            current_phase: 0.0,
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn current_phase(&self) -> f64 {
        self.current_phase
    }

    /// Force the running phase, used to phase-lock a companion oscillator
    /// (e.g. a cosine oscillator copying a sine master's phase for SSB).
    pub fn set_phase(&mut self, phase: f64) {
        self.current_phase = phase;
    }

    /// Advance the running phase by one sample tick, wrapping at one period.
    pub fn step(&mut self) {
        self.current_phase += self.phase_step;
        if self.current_phase >= ONE_PERIOD {
            self.current_phase -= ONE_PERIOD;
        }
        // Catches -0.0 as well as any residual negative drift.
        if self.current_phase.is_sign_negative() {
            self.current_phase = 0.0;
        }
    }

    /// Sample the oscillator at an arbitrary frequency using the current
    /// phase. Phase-locking across different frequencies falls out of
    /// scaling the same running phase rather than keeping per-frequency
    /// counters.
    pub fn sample_for(&self, freq: f64) -> f64 {
        let phase = self.current_phase * freq;
        match self.interpolation {
            Interpolation::Nearest => {
                let slot = (phase as i64).rem_euclid(WAVE_TABLE_SIZE as i64) as usize;
                self.table[slot]
            }
            Interpolation::Cubic => self.cubic_interpolate(phase),
        }
    }

    fn cubic_interpolate(&self, phase: f64) -> f64 {
        let x1 = (phase - self.phase_step).rem_euclid(ONE_PERIOD) as i64 as usize % WAVE_TABLE_SIZE;
        let x2 = (phase + self.phase_step).rem_euclid(ONE_PERIOD) as i64 as usize % WAVE_TABLE_SIZE;

        let y1 = self.table[x1];
        let y2 = self.table[x2];
        let dy1 = self.derivative[x1];
        let dy2 = self.derivative[x2];

        let a = 2.0 * (y1 - y2) + dy1 + dy2;
        let b = 3.0 * (y2 - y1) - 2.0 * dy1 - dy2;
        let c = dy1;
        let d = y1;

        let xtemp = (phase - self.phase_step).rem_euclid(ONE_PERIOD);
        let x = (phase - xtemp).rem_euclid(ONE_PERIOD);
        let xsq = x * x;
        let xcub = xsq * x;

        a * xcub + b * xsq + c * x + d
    }

    pub fn sample_19k(&self) -> f64 {
        self.sample_for(19_000.0)
    }

    pub fn sample_38k(&self) -> f64 {
        self.sample_for(38_000.0)
    }

    pub fn sample_57k(&self) -> f64 {
        self.sample_for(57_000.0)
    }
}

/// A matched sine/cosine pair sharing one phase, as used by the SSB
/// stereo-encoder variants (Hartley and Weaver both need an in-phase and a
/// quadrature tone at the same instant).
#[derive(Debug, Clone)]
pub struct OscillatorPair {
    pub sine: Oscillator,
    pub cosine: Oscillator,
}

impl OscillatorPair {
    pub fn new(sample_rate: u32, interpolation: Interpolation) -> Result<Self> {
        Ok(Self {
            sine: Oscillator::new(Kind::Sine, sample_rate, interpolation)?,
            cosine: Oscillator::new(Kind::Cosine, sample_rate, interpolation)?,
        })
    }

    pub fn step(&mut self) {
        self.sine.step();
        // Keep the cosine phase-locked to the sine master rather than
        // advancing independently, so floating point drift never makes
        // them disagree about "now".
        self.cosine.set_phase(self.sine.current_phase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_rate_below_nyquist() {
        let err = Oscillator::new(Kind::Sine, 57_000, Interpolation::Nearest);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_odd_frequency_ratio() {
        // 171000 / 57000 = 3, an odd multiple, so this rate clears the
        // Nyquist check but must still be rejected by the ratio check.
        let err = Oscillator::new(Kind::Sine, 171_000, Interpolation::Nearest);
        assert!(err.is_err());
    }

    #[test]
    fn accepts_even_frequency_ratio() {
        // 114000 / 57000 = 2, an even multiple.
        let osc = Oscillator::new(Kind::Sine, 114_000, Interpolation::Nearest).unwrap();
        assert_eq!(osc.sample_rate(), 114_000);
    }

    #[test]
    fn accepts_default_rate() {
        let osc = Oscillator::new(Kind::Sine, DEFAULT_SAMPLE_RATE, Interpolation::Cubic).unwrap();
        assert_eq!(osc.sample_rate(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn phase_wraps_within_one_period() {
        let mut osc = Oscillator::new(Kind::Sine, DEFAULT_SAMPLE_RATE, Interpolation::Nearest).unwrap();
        for _ in 0..(DEFAULT_SAMPLE_RATE as usize * 2) {
            osc.step();
            assert!(osc.current_phase() >= 0.0 && osc.current_phase() < WAVE_TABLE_SIZE as f64);
        }
    }

    #[test]
    fn samples_stay_within_unit_amplitude() {
        let mut osc = Oscillator::new(Kind::Sine, DEFAULT_SAMPLE_RATE, Interpolation::Cubic).unwrap();
        for _ in 0..1000 {
            osc.step();
            for freq in [19_000.0, 38_000.0, 57_000.0] {
                assert!(osc.sample_for(freq).abs() <= 1.0 + 1e-6);
            }
        }
    }

    #[test]
    fn oscillator_pair_keeps_cosine_locked_to_sine_phase() {
        let mut pair = OscillatorPair::new(DEFAULT_SAMPLE_RATE, Interpolation::Cubic).unwrap();
        for _ in 0..100 {
            pair.step();
            assert_eq!(pair.sine.current_phase(), pair.cosine.current_phase());
        }
    }
}
