//! Plain control-plane data: the values a control-API handler mutates and
//! the real-time audio thread reads. These structs carry no locking of
//! their own — the engine crate wraps each one in an `Arc<RwLock<_>>` (or,
//! for the handful of fields touched every block, a plain `Arc<Mutex<_>>`)
//! and exposes it to the control API and the audio callback.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::mpx::StereoMode;

/// Pre-emphasis time constant selector, matching `fmmod_tool -e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreEmphasis {
    Us50,
    Us75,
    Disabled,
}

impl PreEmphasis {
    pub fn tau_usecs(self) -> Option<u32> {
        match self {
            PreEmphasis::Us50 => Some(50),
            PreEmphasis::Us75 => Some(75),
            PreEmphasis::Disabled => None,
        }
    }

    pub fn from_cli(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PreEmphasis::Us50),
            1 => Ok(PreEmphasis::Us75),
            2 => Ok(PreEmphasis::Disabled),
            other => Err(Error::InvalidInput(format!("pre-emphasis selector out of range: {other}"))),
        }
    }
}

/// Live peak meters, updated by the audio callback and read by the control
/// plane. Values are raw peak amplitude, not dB.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakMeters {
    pub left: f32,
    pub right: f32,
    pub mpx: f32,
}

/// FM-modulator control block: gains, the stereo-encoder selector, and the
/// fixed parameters decided once at startup (sample rates, block size).
#[derive(Debug, Clone)]
pub struct FmModControl {
    pub gain_audio: f32,
    pub gain_pilot: f32,
    pub gain_stereo_carrier: f32,
    pub gain_rds: f32,
    pub gain_mpx: f32,
    pub stereo_mode: StereoMode,
    pub lpf_enabled: bool,
    pub preemphasis: PreEmphasis,
    pub peak: PeakMeters,
    pub audio_sample_rate: u32,
    pub block_size: usize,
}

impl Default for FmModControl {
    fn default() -> Self {
        Self {
            gain_audio: 1.0,
            gain_pilot: 0.09,
            gain_stereo_carrier: 0.09,
            gain_rds: 0.05,
            gain_mpx: 1.0,
            stereo_mode: StereoMode::Dsb,
            lpf_enabled: true,
            preemphasis: PreEmphasis::Us50,
            peak: PeakMeters::default(),
            audio_sample_rate: 48_000,
            block_size: 1024,
        }
    }
}

impl FmModControl {
    /// Percent-scale setters matching the CLI tool's `-a/-m/-p/-r/-c N`
    /// flags, which take a percentage in `[0, 100]`.
    pub fn set_gain_percent(gain: &mut f32, percent: i32) -> Result<()> {
        if !(0..=100).contains(&percent) {
            return Err(Error::InvalidInput(format!("gain percent out of range: {percent}")));
        }
        *gain = percent as f32 / 100.0;
        Ok(())
    }
}

/// Fixed upper bound on the number of simultaneous RTP receivers, matching
/// the on-shm table size in the source material.
pub const MAX_RTP_RECEIVERS: usize = 64;

/// RTP egress control/bookkeeping block.
#[derive(Debug, Clone)]
pub struct RtpControl {
    pub pid: u32,
    pub rtp_bytes: u64,
    pub rtcp_bytes: u64,
    pub receivers: Vec<Ipv4Addr>,
}

impl Default for RtpControl {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            rtp_bytes: 0,
            rtcp_bytes: 0,
            receivers: Vec::with_capacity(MAX_RTP_RECEIVERS),
        }
    }
}

impl RtpControl {
    pub fn add_receiver(&mut self, addr: Ipv4Addr) -> Result<()> {
        if self.receivers.contains(&addr) {
            return Ok(());
        }
        if self.receivers.len() >= MAX_RTP_RECEIVERS {
            return Err(Error::Rtp(format!("receiver table full ({MAX_RTP_RECEIVERS} max)")));
        }
        self.receivers.push(addr);
        Ok(())
    }

    pub fn remove_receiver(&mut self, addr: Ipv4Addr) {
        self.receivers.retain(|r| *r != addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_percent_rejects_out_of_range() {
        let mut gain = 0.0;
        assert!(FmModControl::set_gain_percent(&mut gain, 101).is_err());
        assert!(FmModControl::set_gain_percent(&mut gain, -1).is_err());
        assert!(FmModControl::set_gain_percent(&mut gain, 50).is_ok());
        assert_eq!(gain, 0.5);
    }

    #[test]
    fn rtp_receiver_table_rejects_beyond_capacity() {
        let mut ctl = RtpControl::default();
        for i in 0..MAX_RTP_RECEIVERS {
            ctl.add_receiver(Ipv4Addr::from(i as u32)).unwrap();
        }
        assert!(ctl.add_receiver(Ipv4Addr::new(9, 9, 9, 9)).is_err());
    }

    #[test]
    fn rtp_receiver_add_is_idempotent() {
        let mut ctl = RtpControl::default();
        let addr = Ipv4Addr::new(192, 168, 1, 1);
        ctl.add_receiver(addr).unwrap();
        ctl.add_receiver(addr).unwrap();
        assert_eq!(ctl.receivers.len(), 1);
    }
}
