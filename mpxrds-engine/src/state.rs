//! Process-wide shared state: the three control regions the signal path
//! reads from the control API and writes from the real-time/producer
//! threads, plus the event channel backing the SSE stream.

use std::sync::{Arc, Mutex};

use mpxrds_core::rds::EncoderState;
use mpxrds_core::{FmModControl, Gains, RtpControl};

use crate::sse::SseBroadcaster;

/// Everything the control API, the audio threads, and the RDS producer
/// share. Cloned cheaply (it's all `Arc`s) into every handler and thread.
#[derive(Clone)]
pub struct SharedState {
    pub fmmod: Arc<Mutex<FmModControl>>,
    pub rds: Arc<Mutex<EncoderState>>,
    pub rtp: Arc<Mutex<RtpControl>>,
    pub events: Arc<SseBroadcaster>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            fmmod: Arc::new(Mutex::new(FmModControl::default())),
            rds: Arc::new(Mutex::new(EncoderState::default())),
            rtp: Arc::new(Mutex::new(RtpControl::default())),
            events: Arc::new(SseBroadcaster::new(64)),
        }
    }

    /// Copies out the per-block gains the audio thread needs, without
    /// holding the lock past the copy.
    pub fn gains(&self) -> Gains {
        let ctl = self.fmmod.lock().unwrap();
        Gains {
            audio: ctl.gain_audio,
            pilot: ctl.gain_pilot,
            stereo_carrier: ctl.gain_stereo_carrier,
            rds: ctl.gain_rds,
            mpx: ctl.gain_mpx,
        }
    }

    pub fn record_peak(&self, left: f32, right: f32, mpx: f32) {
        let mut ctl = self.fmmod.lock().unwrap();
        ctl.peak.left = ctl.peak.left.max(left.abs());
        ctl.peak.right = ctl.peak.right.max(right.abs());
        ctl.peak.mpx = ctl.peak.mpx.max(mpx.abs());
    }

    /// Reads and resets the peak meters, used by the periodic SSE ticker so
    /// each reported peak reflects only the interval since the last read.
    pub fn take_peak(&self) -> mpxrds_core::PeakMeters {
        let mut ctl = self.fmmod.lock().unwrap();
        let peak = ctl.peak;
        ctl.peak = mpxrds_core::PeakMeters::default();
        peak
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
