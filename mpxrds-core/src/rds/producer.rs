//! Double-buffered producer/consumer handoff for the RDS waveform.
//!
//! A dedicated thread assembles groups via the scheduler, resamples them to
//! the oscillator rate, and fills the slot the consumer isn't reading; the
//! audio thread pulls samples one at a time through [`RdsSampleSource`] and
//! only flips the active slot once it has fully drained the current one,
//! waking the producer to refill the slot it just walked away from. The
//! producer stays parked on the condvar the rest of the time rather than
//! free-running ahead of the consumer, so a stalled producer shows up as
//! the consumer repeating its last sample rather than as a torn read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::biphase::BiphaseEncoder;
use super::groups::GROUP_SAMPLES;
use super::scheduler::Scheduler;
use super::state::EncoderState;
use crate::error::{RdsError, Result};
use crate::resampler::RateConverter;

/// RDS group rate: 1187.5 bit/s times the biphase encoder's 40
/// samples-per-symbol.
pub const RDS_SAMPLE_RATE_HZ: u32 = 47_500;

/// How many groups the producer assembles before resampling and handing
/// off a new chunk. Larger values mean fewer handoffs but more latency
/// between a control-plane edit (e.g. a new PS) and it reaching the air.
pub const DEFAULT_CHUNK_GROUPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Starting,
    Running,
    Failed,
}

struct HandoffInner {
    buffers: [Vec<f32>; 2],
    filled_len: [usize; 2],
    /// Index of the slot the consumer is currently reading.
    front: usize,
    /// Set once the producer has finished filling `buffers[1 - front]`, the
    /// slot waiting to become active. Cleared by the consumer the moment it
    /// flips into that slot, which is also the producer's cue to refill the
    /// slot the consumer just walked away from.
    back_ready: bool,
    status: Status,
}

struct Handoff {
    state: Mutex<HandoffInner>,
    cv: Condvar,
}

/// Pull-based source of RDS waveform samples, already resampled to the
/// oscillator rate, consumed one at a time by [`crate::mpx::MpxGenerator`].
pub trait RdsSampleSource {
    fn next_sample(&mut self) -> f32;
}

/// Owns the producer thread and the shared double buffer. Dropping it signals
/// the thread to stop and joins it.
pub struct Producer {
    handoff: Arc<Handoff>,
    state: Arc<Mutex<EncoderState>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Producer {
    pub fn spawn(state: Arc<Mutex<EncoderState>>, oscillator_rate: u32, chunk_groups: usize) -> Result<Self> {
        let handoff = Arc::new(Handoff {
            state: Mutex::new(HandoffInner {
                buffers: [Vec::new(), Vec::new()],
                filled_len: [0, 0],
                front: 0,
                back_ready: false,
                status: Status::Starting,
            }),
            cv: Condvar::new(),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let handoff_thread = Arc::clone(&handoff);
        let stop_thread = Arc::clone(&stop);
        let state_thread = Arc::clone(&state);
        let join = std::thread::Builder::new()
            .name("rds-producer".into())
            .spawn(move || producer_loop(state_thread, handoff_thread, stop_thread, oscillator_rate, chunk_groups))
            .map_err(|e| RdsError::ProducerFailed(e.to_string()))?;

        Ok(Self {
            handoff,
            state,
            stop,
            join: Some(join),
        })
    }

    pub fn status(&self) -> Status {
        self.handoff.state.lock().unwrap().status
    }

    /// Blocks until the first buffer is ready, the producer has failed, or
    /// `timeout` elapses, whichever comes first.
    pub fn wait_until_running(&self, timeout: Duration) -> Status {
        let inner = self.handoff.state.lock().unwrap();
        let (inner, _) = self
            .handoff
            .cv
            .wait_timeout_while(inner, timeout, |i| i.status == Status::Starting)
            .unwrap();
        inner.status
    }

    /// A new consumer handle reading from this producer's current buffer.
    pub fn consumer(&self) -> Consumer {
        Consumer::new(Arc::clone(&self.handoff), Arc::clone(&self.state))
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.handoff.cv.notify_all();
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub struct Consumer {
    handoff: Arc<Handoff>,
    state: Arc<Mutex<EncoderState>>,
    read_pos: usize,
    last_sample: f32,
}

impl Consumer {
    fn new(handoff: Arc<Handoff>, state: Arc<Mutex<EncoderState>>) -> Self {
        Self {
            handoff,
            state,
            read_pos: 0,
            last_sample: 0.0,
        }
    }
}

impl RdsSampleSource for Consumer {
    /// If the encoder is disabled or the producer thread has failed,
    /// returns silence without disturbing `last_sample` or the handoff's
    /// condvar — a disabled encoder produces no wake-ups at all.
    fn next_sample(&mut self) -> f32 {
        if !self.state.lock().unwrap().enabled {
            return 0.0;
        }

        let mut inner = self.handoff.state.lock().unwrap();
        if inner.status == Status::Failed {
            return 0.0;
        }

        let len = inner.filled_len[inner.front];
        if self.read_pos < len {
            let sample = inner.buffers[inner.front][self.read_pos];
            self.read_pos += 1;
            self.last_sample = sample;
            return sample;
        }

        // The active slot is drained. Only flip into the other one if the
        // producer has actually finished filling it — otherwise hold the
        // last sample rather than read a slot that's still being written.
        if !inner.back_ready {
            return self.last_sample;
        }
        inner.front ^= 1;
        inner.back_ready = false;
        self.read_pos = 0;
        drop(inner);
        self.handoff.cv.notify_all();

        let inner = self.handoff.state.lock().unwrap();
        let len = inner.filled_len[inner.front];
        if len == 0 {
            return self.last_sample;
        }
        let sample = inner.buffers[inner.front][0];
        drop(inner);
        self.read_pos = 1;
        self.last_sample = sample;
        sample
    }
}

fn fill_chunk(state: &Mutex<EncoderState>, scheduler: &mut Scheduler, biphase: &mut BiphaseEncoder, chunk: &mut Vec<f32>, chunk_groups: usize) -> Result<()> {
    chunk.clear();
    let mut st = state.lock().unwrap();
    for _ in 0..chunk_groups {
        let group = scheduler.next_group(&mut st, biphase)?;
        chunk.extend_from_slice(&group.samples);
    }
    Ok(())
}

fn producer_loop(state: Arc<Mutex<EncoderState>>, handoff: Arc<Handoff>, stop: Arc<AtomicBool>, oscillator_rate: u32, chunk_groups: usize) {
    let run = || -> Result<()> {
        let mut scheduler = Scheduler::new();
        let mut biphase = BiphaseEncoder::new();
        let chunk_size = GROUP_SAMPLES * chunk_groups;
        let mut resampler = RateConverter::new(RDS_SAMPLE_RATE_HZ, oscillator_rate, 19_000.0, chunk_size)?;
        let mut chunk: Vec<f32> = Vec::with_capacity(chunk_size);
        let mut resampled: Vec<f32> = Vec::with_capacity(resampler.max_output_frames());

        // Fill the slot the consumer reads first so that, by the time
        // `status` flips to `Running`, the active slot already holds real
        // content rather than a chunk's worth of startup silence.
        fill_chunk(&state, &mut scheduler, &mut biphase, &mut chunk, chunk_groups)?;
        resampler.process_into(&chunk, &mut resampled)?;
        {
            let mut inner = handoff.state.lock().unwrap();
            let front = inner.front;
            inner.buffers[front].clear();
            inner.buffers[front].extend_from_slice(&resampled);
            inner.filled_len[front] = resampled.len();
            inner.status = Status::Running;
        }
        handoff.cv.notify_all();

        loop {
            // Park here until the consumer has drained the active slot and
            // flipped into the one we just filled — that's the signal that
            // the slot it walked away from (now `back`) needs a refill.
            // The timeout is just a defensive poll against a missed wakeup;
            // the stop check below is what actually ends the loop.
            {
                let guard = handoff.state.lock().unwrap();
                let _ = handoff
                    .cv
                    .wait_timeout_while(guard, Duration::from_millis(200), |i| i.back_ready && !stop.load(Ordering::Acquire))
                    .unwrap();
            }
            if stop.load(Ordering::Acquire) {
                return Ok(());
            }

            fill_chunk(&state, &mut scheduler, &mut biphase, &mut chunk, chunk_groups)?;
            resampler.process_into(&chunk, &mut resampled)?;

            {
                let mut inner = handoff.state.lock().unwrap();
                let back = inner.front ^ 1;
                inner.buffers[back].clear();
                inner.buffers[back].extend_from_slice(&resampled);
                inner.filled_len[back] = resampled.len();
                inner.back_ready = true;
            }
            handoff.cv.notify_all();
        }
    };

    if let Err(e) = run() {
        {
            let mut inner = handoff.state.lock().unwrap();
            inner.status = Status::Failed;
        }
        handoff.cv.notify_all();
        tracing::error!(error = %e, "RDS producer thread failed, raising SIGTERM");
        // SAFETY: raise(2) with a standard termination signal and no
        // arguments beyond the signal number is always safe to call.
        unsafe {
            libc::raise(libc::SIGTERM);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_reaches_running_and_serves_samples() {
        let state = Arc::new(Mutex::new(EncoderState::default()));
        {
            let mut st = state.lock().unwrap();
            st.set_ps("TESTING!").unwrap();
        }
        let producer = Producer::spawn(state, 228_000, 1).unwrap();
        let status = producer.wait_until_running(Duration::from_secs(5));
        assert_eq!(status, Status::Running);

        let mut consumer = producer.consumer();
        let mut saw_nonzero = false;
        for _ in 0..10_000 {
            if consumer.next_sample() != 0.0 {
                saw_nonzero = true;
                break;
            }
        }
        assert!(saw_nonzero);
    }

    #[test]
    fn consumer_underrun_holds_last_sample_rather_than_going_silent() {
        let handoff = Arc::new(Handoff {
            state: Mutex::new(HandoffInner {
                buffers: [vec![0.5, 0.25], Vec::new()],
                filled_len: [2, 0],
                front: 0,
                back_ready: false,
                status: Status::Running,
            }),
            cv: Condvar::new(),
        });
        let state = Arc::new(Mutex::new(EncoderState::default()));
        let mut consumer = Consumer::new(handoff, state);
        assert_eq!(consumer.next_sample(), 0.5);
        assert_eq!(consumer.next_sample(), 0.25);
        // Past the filled length with the other slot not yet ready: hold
        // the last real sample instead of flipping into an empty slot.
        assert_eq!(consumer.next_sample(), 0.25);
        assert_eq!(consumer.next_sample(), 0.25);
    }

    #[test]
    fn consumer_flips_slot_only_after_fully_draining_the_active_one() {
        let handoff = Arc::new(Handoff {
            state: Mutex::new(HandoffInner {
                buffers: [vec![0.1, 0.2], vec![0.3, 0.4, 0.5]],
                filled_len: [2, 3],
                front: 0,
                back_ready: true,
                status: Status::Running,
            }),
            cv: Condvar::new(),
        });
        let state = Arc::new(Mutex::new(EncoderState::default()));
        let mut consumer = Consumer::new(handoff, state);
        assert_eq!(consumer.next_sample(), 0.1);
        assert_eq!(consumer.next_sample(), 0.2);
        // Slot 0 just drained and slot 1 was pre-filled, so the consumer
        // flips straight into it and keeps going, rather than repeating 0.2
        // or resetting to a stale read position.
        assert_eq!(consumer.next_sample(), 0.3);
        assert_eq!(consumer.next_sample(), 0.4);
        assert_eq!(consumer.next_sample(), 0.5);
    }

    #[test]
    fn consumer_is_silent_when_encoder_disabled() {
        let handoff = Arc::new(Handoff {
            state: Mutex::new(HandoffInner {
                buffers: [vec![0.5, 0.25], Vec::new()],
                filled_len: [2, 0],
                front: 0,
                back_ready: false,
                status: Status::Running,
            }),
            cv: Condvar::new(),
        });
        let mut encoder_state = EncoderState::default();
        encoder_state.enabled = false;
        let state = Arc::new(Mutex::new(encoder_state));
        let mut consumer = Consumer::new(handoff, state);
        assert_eq!(consumer.next_sample(), 0.0);
        assert_eq!(consumer.next_sample(), 0.0);
    }

    #[test]
    fn consumer_is_silent_when_producer_failed() {
        let handoff = Arc::new(Handoff {
            state: Mutex::new(HandoffInner {
                buffers: [vec![0.5, 0.25], Vec::new()],
                filled_len: [2, 0],
                front: 0,
                back_ready: false,
                status: Status::Failed,
            }),
            cv: Condvar::new(),
        });
        let state = Arc::new(Mutex::new(EncoderState::default()));
        let mut consumer = Consumer::new(handoff, state);
        assert_eq!(consumer.next_sample(), 0.0);
    }
}
