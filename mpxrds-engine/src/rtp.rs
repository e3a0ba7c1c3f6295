//! RTP/RTCP egress boundary.
//!
//! Packetizing the MPX composite into RTP and running RTCP sender reports
//! is out of scope here; this trait is the seam a real transport would
//! plug into. [`NullRtpSink`] is the default when no RTP egress is
//! configured, and also stands in as the test double.

use std::sync::{Arc, Mutex};

pub trait RtpSink: Send {
    /// Accepts one block of MPX composite samples for packetization.
    fn push_samples(&mut self, samples: &[f32]);

    /// Adds a unicast receiver, returning `false` if already present or the
    /// receiver table is full.
    fn add_receiver(&mut self, addr: std::net::Ipv4Addr) -> bool;

    /// Removes a unicast receiver, returning `false` if it wasn't present.
    fn remove_receiver(&mut self, addr: std::net::Ipv4Addr) -> bool;
}

#[derive(Debug, Default)]
pub struct NullRtpSink;

impl RtpSink for NullRtpSink {
    fn push_samples(&mut self, _samples: &[f32]) {}

    fn add_receiver(&mut self, _addr: std::net::Ipv4Addr) -> bool {
        false
    }

    fn remove_receiver(&mut self, _addr: std::net::Ipv4Addr) -> bool {
        false
    }
}

/// Shared handle to the configured RTP sink. The audio thread pushes
/// samples through it once per block; the control API reaches through the
/// same handle to add or remove receivers, so both sides see one sink
/// instance without the audio thread ever blocking on an async runtime.
#[derive(Clone)]
pub struct RtpSinkHandle(Arc<Mutex<Box<dyn RtpSink>>>);

impl RtpSinkHandle {
    pub fn new(sink: Box<dyn RtpSink>) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    pub fn push_samples(&self, samples: &[f32]) {
        self.0.lock().unwrap().push_samples(samples);
    }

    pub fn add_receiver(&self, addr: std::net::Ipv4Addr) -> bool {
        self.0.lock().unwrap().add_receiver(addr)
    }

    pub fn remove_receiver(&self, addr: std::net::Ipv4Addr) -> bool {
        self.0.lock().unwrap().remove_receiver(addr)
    }
}

impl Default for RtpSinkHandle {
    fn default() -> Self {
        Self::new(Box::new(NullRtpSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_handle_defaults_to_null_sink() {
        let handle = RtpSinkHandle::default();
        handle.push_samples(&[0.0; 4]);
        assert!(!handle.add_receiver(std::net::Ipv4Addr::new(239, 0, 0, 1)));
    }

    #[test]
    fn null_sink_accepts_samples_without_panicking() {
        let mut sink = NullRtpSink;
        sink.push_samples(&[0.0; 16]);
    }

    #[test]
    fn null_sink_rejects_receiver_changes() {
        let mut sink = NullRtpSink;
        assert!(!sink.add_receiver(std::net::Ipv4Addr::new(239, 0, 0, 1)));
        assert!(!sink.remove_receiver(std::net::Ipv4Addr::new(239, 0, 0, 1)));
    }
}
