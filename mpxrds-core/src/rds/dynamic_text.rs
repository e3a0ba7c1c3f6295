//! Dynamic PS and RadioText rotators (§4.7): a filesystem watch on a
//! user-supplied text file feeds a live payload string; a separate
//! consumer thread publishes that payload into [`EncoderState`] in fixed
//! windows on its own dwell timer, interleaving the static fallback value
//! so receivers still see the station's call sign/fallback text between
//! cycles of the scrolling text. Both the monitor and the consumer run on
//! their own OS thread so neither a wedged filesystem nor a long dwell
//! ever stalls the audio path.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{Event, RecursiveMode, Watcher};

use super::state::EncoderState;
use crate::error::{Error, Result};

pub const DYNPS_DELAY_SECS: u64 = 3;
pub const DYNRT_DELAY_SECS: u64 = 10;
pub const DYNRT_MAX_SEGMENTS: usize = 3;

/// Replace control characters and anything outside printable ASCII with a
/// space, matching the standard's requirement that PS/RT carry only the
/// basic G0 character set.
fn sanitize(raw: &str) -> String {
    raw.chars().map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' }).collect()
}

fn first_nonblank_line(contents: &str) -> String {
    contents.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim().to_string()
}

/// Splits `s` into fixed-width, space-padded chunks of `width` characters.
fn chunk_padded(s: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    chars
        .chunks(width)
        .map(|c| {
            let mut seg: String = c.iter().collect();
            while seg.chars().count() < width {
                seg.push(' ');
            }
            seg
        })
        .collect()
}

/// Shared payload between the file monitor and the consumer thread: the
/// live string read from disk, sanitized and length-capped but not yet
/// windowed into fixed-size segments.
#[derive(Default)]
struct LivePayload {
    text: String,
    /// Bumped on every file update so the consumer can detect a change and
    /// restart its rotation at segment zero.
    generation: u64,
}

enum Field {
    Ps { fixed: String },
    RadioText { fixed: String },
}

/// Owns the monitor and consumer threads for one dynamic-text file.
/// Dropping it stops both threads and restores the field's fixed value.
pub struct Rotator {
    stop: Arc<Mutex<bool>>,
    wake: Arc<Condvar>,
    monitor_join: Option<JoinHandle<()>>,
    consumer_join: Option<JoinHandle<()>>,
}

impl Rotator {
    /// Watches `path` for a dynamic PS source; `fixed` is the static
    /// fallback name (e.g. the call sign) interleaved between cycles of
    /// the scrolling text and used verbatim when the file is empty.
    pub fn watch_ps(path: impl AsRef<Path>, fixed: impl Into<String>, state: Arc<Mutex<EncoderState>>) -> Result<Self> {
        Self::watch(path.as_ref().to_path_buf(), state, Field::Ps { fixed: fixed.into() })
    }

    /// Watches `path` for a dynamic RadioText source; `fixed` is the
    /// static fallback RadioText used when the file is empty.
    pub fn watch_radiotext(path: impl AsRef<Path>, fixed: impl Into<String>, state: Arc<Mutex<EncoderState>>) -> Result<Self> {
        Self::watch(path.as_ref().to_path_buf(), state, Field::RadioText { fixed: fixed.into() })
    }

    fn watch(path: PathBuf, state: Arc<Mutex<EncoderState>>, field: Field) -> Result<Self> {
        let stop = Arc::new(Mutex::new(false));
        let wake = Arc::new(Condvar::new());
        let live = Arc::new(Mutex::new(LivePayload::default()));

        // Prime the live payload once at startup so a file already in
        // place before the first filesystem event still takes effect.
        read_into_live(&path, &live);

        let fixed = match &field {
            Field::Ps { fixed } | Field::RadioText { fixed } => fixed.clone(),
        };
        let is_ps = matches!(field, Field::Ps { .. });

        let monitor_join = {
            let path = path.clone();
            let live = Arc::clone(&live);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("dynamic-text-monitor".into())
                .spawn(move || monitor_loop(path, live, stop))
                .map_err(|e| Error::Config(format!("failed to spawn dynamic text monitor: {e}")))?
        };

        let consumer_join = {
            let state = Arc::clone(&state);
            let live = Arc::clone(&live);
            let stop = Arc::clone(&stop);
            let wake = Arc::clone(&wake);
            std::thread::Builder::new()
                .name("dynamic-text-consumer".into())
                .spawn(move || {
                    if is_ps {
                        consumer_loop_ps(state, live, fixed, stop, wake);
                    } else {
                        consumer_loop_rt(state, live, fixed, stop, wake);
                    }
                })
                .map_err(|e| Error::Config(format!("failed to spawn dynamic text consumer: {e}")))?
        };

        Ok(Self {
            stop,
            wake,
            monitor_join: Some(monitor_join),
            consumer_join: Some(consumer_join),
        })
    }
}

impl Drop for Rotator {
    fn drop(&mut self) {
        *self.stop.lock().unwrap() = true;
        self.wake.notify_all();
        if let Some(j) = self.monitor_join.take() {
            let _ = j.join();
        }
        if let Some(j) = self.consumer_join.take() {
            let _ = j.join();
        }
    }
}

fn read_into_live(path: &Path, live: &Arc<Mutex<LivePayload>>) {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "dynamic text file unreadable, keeping previous payload");
            return;
        }
    };
    let mut l = live.lock().unwrap();
    l.text = contents;
    l.generation += 1;
}

fn monitor_loop(path: PathBuf, live: Arc<Mutex<LivePayload>>, stop: Arc<Mutex<bool>>) {
    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to create dynamic text file watcher");
            return;
        }
    };

    let watch_target = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    if let Err(e) = watcher.watch(watch_target, RecursiveMode::NonRecursive) {
        tracing::error!(path = %watch_target.display(), error = %e, "failed to watch dynamic text directory");
        return;
    }

    loop {
        if *stop.lock().unwrap() {
            return;
        }
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(event)) => {
                if event.paths.iter().any(|p| p == &path) {
                    read_into_live(&path, &live);
                }
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "dynamic text watch event error"),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Publishes the fixed PS once, then 8-char windows of the live string
/// every [`DYNPS_DELAY_SECS`], looping back to the fixed name at the start
/// of every full pass over the live text.
fn consumer_loop_ps(state: Arc<Mutex<EncoderState>>, live: Arc<Mutex<LivePayload>>, fixed: String, stop: Arc<Mutex<bool>>, wake: Arc<Condvar>) {
    let mut last_generation = u64::MAX;
    let mut segments: Vec<String> = Vec::new();
    let mut remaining_len = 0usize;

    loop {
        {
            let l = live.lock().unwrap();
            if l.generation != last_generation {
                last_generation = l.generation;
                let sanitized = sanitize(&first_nonblank_line(&l.text));
                segments = chunk_padded(&sanitized, super::state::PS_LENGTH);
                remaining_len = 0;
            }
        }

        if remaining_len == 0 {
            publish_ps(&state, &fixed);
            remaining_len = segments.len();
        } else {
            let idx = segments.len() - remaining_len;
            publish_ps(&state, &segments[idx]);
            remaining_len -= 1;
        }

        if wait_or_stop(&stop, &wake, Duration::from_secs(DYNPS_DELAY_SECS)) {
            return;
        }
    }
}

fn publish_ps(state: &Arc<Mutex<EncoderState>>, text: &str) {
    let truncated: String = text.chars().take(super::state::PS_LENGTH).collect();
    let mut st = state.lock().unwrap();
    if let Err(e) = st.set_ps(&truncated) {
        tracing::warn!(error = %e, "rejected dynamic PS segment");
    }
}

/// Publishes up to [`DYNRT_MAX_SEGMENTS`] lines from the live file,
/// rotating every [`DYNRT_DELAY_SECS`] and toggling the flush flag (via
/// [`EncoderState::set_rt`]) on every change; falls back to the fixed
/// RadioText when the file is empty.
fn consumer_loop_rt(state: Arc<Mutex<EncoderState>>, live: Arc<Mutex<LivePayload>>, fixed: String, stop: Arc<Mutex<bool>>, wake: Arc<Condvar>) {
    let mut last_generation = u64::MAX;
    let mut segments: Vec<String> = Vec::new();
    let mut idx = 0usize;

    loop {
        {
            let l = live.lock().unwrap();
            if l.generation != last_generation {
                last_generation = l.generation;
                segments = l
                    .text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .take(DYNRT_MAX_SEGMENTS)
                    .map(|line| sanitize(line).chars().take(super::state::RT_LENGTH).collect())
                    .collect();
                idx = 0;
            }
        }

        let text = if segments.is_empty() { &fixed } else { &segments[idx % segments.len()] };
        {
            let mut st = state.lock().unwrap();
            if let Err(e) = st.set_rt(text) {
                tracing::warn!(error = %e, "rejected dynamic RadioText segment");
            }
        }
        if !segments.is_empty() {
            idx = (idx + 1) % segments.len();
        }

        if wait_or_stop(&stop, &wake, Duration::from_secs(DYNRT_DELAY_SECS)) {
            return;
        }
    }
}

/// Waits up to `dur` on the shared condvar, returning `true` if the thread
/// should stop (either because `stop` was already set, or it was set
/// during the wait).
fn wait_or_stop(stop: &Arc<Mutex<bool>>, wake: &Arc<Condvar>, dur: Duration) -> bool {
    let guard = stop.lock().unwrap();
    if *guard {
        return true;
    }
    let (guard, _) = wake.wait_timeout(guard, dur).unwrap();
    *guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sanitize_blanks_control_characters() {
        let raw = "Hello\u{0007}World\n";
        let cleaned = sanitize(raw);
        assert!(!cleaned.contains('\u{0007}'));
        assert!(cleaned.contains("Hello"));
    }

    #[test]
    fn chunk_padded_splits_and_pads_to_fixed_width() {
        let segs = chunk_padded("THE QUICK BROWN FOX JUMPS", 8);
        assert_eq!(segs, vec!["THE QUIC", "K BROWN ", "FOX JUMP", "S       "]);
    }

    #[test]
    fn ps_watcher_picks_up_initial_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ps.txt");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "THE QUICK BROWN FOX JUMPS").unwrap();
        }

        let state = Arc::new(Mutex::new(EncoderState::default()));
        let _rotator = Rotator::watch_ps(&path, "KEXAMPLE", Arc::clone(&state)).unwrap();

        let mut tries = 0;
        loop {
            {
                let st = state.lock().unwrap();
                if st.ps_set {
                    break;
                }
            }
            tries += 1;
            assert!(tries < 100, "dynamic PS file was never picked up");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn radiotext_watcher_falls_back_to_fixed_on_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.txt");
        std::fs::write(&path, "").unwrap();

        let state = Arc::new(Mutex::new(EncoderState::default()));
        let _rotator = Rotator::watch_radiotext(&path, "Fallback RadioText", Arc::clone(&state)).unwrap();

        let mut tries = 0;
        loop {
            {
                let st = state.lock().unwrap();
                if st.rt_set && String::from_utf8_lossy(&st.rt).trim() == "Fallback RadioText" {
                    break;
                }
            }
            tries += 1;
            assert!(tries < 100, "radiotext fallback was never published");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
