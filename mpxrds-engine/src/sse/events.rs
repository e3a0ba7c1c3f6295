//! SSE event types broadcast by the control-plane server.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// SSE event wrapper for transmission.
#[derive(Debug, Clone, Serialize)]
pub struct SseEvent {
    pub event: String,
    pub data: SseEventData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(event: &str, data: SseEventData) -> Self {
        let id = NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            event: event.to_string(),
            data,
            id: Some(id.to_string()),
        }
    }
}

/// SSE event data variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEventData {
    /// Live peak meters, reported on a fixed tick rather than per-block.
    PeakMeters { left: f32, right: f32, mpx: f32, timestamp_ms: i64 },

    /// RDS producer status transition (Starting/Running/Failed).
    RdsProducerStatus { status: String, timestamp_ms: i64 },

    /// RTP receiver table changed via the control API.
    RtpReceiversChanged { count: usize, timestamp_ms: i64 },

    /// Keep-alive ping, mirrored into the event stream in addition to the
    /// transport-level SSE comment keep-alive.
    KeepAlive { timestamp_ms: i64 },
}

impl SseEventData {
    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn peak_meters(left: f32, right: f32, mpx: f32) -> Self {
        Self::PeakMeters { left, right, mpx, timestamp_ms: Self::now_ms() }
    }

    pub fn rds_producer_status(status: &str) -> Self {
        Self::RdsProducerStatus { status: status.to_string(), timestamp_ms: Self::now_ms() }
    }

    pub fn rtp_receivers_changed(count: usize) -> Self {
        Self::RtpReceiversChanged { count, timestamp_ms: Self::now_ms() }
    }

    pub fn keep_alive() -> Self {
        Self::KeepAlive { timestamp_ms: Self::now_ms() }
    }
}
