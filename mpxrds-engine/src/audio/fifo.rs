//! Named-FIFO egress for the downsampled MPX composite: little-endian
//! IEEE-754 32-bit floats, one per sample, no framing (§6).
//!
//! The FIFO is opened write-only and non-blocking. With no reader attached,
//! `open(2)` on a FIFO fails with `ENXIO` rather than blocking; that is
//! treated the same as `WouldBlock` on a write — try again next block. A
//! reader disconnecting mid-stream surfaces as `EPIPE` on the next write,
//! which closes the descriptor so the next block retries the open.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

pub struct FifoWriter {
    path: PathBuf,
    file: Option<File>,
    scratch: Vec<u8>,
}

impl FifoWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_fifo(&path)?;
        Ok(Self { path, file: None, scratch: Vec::new() })
    }

    fn try_open(&mut self) {
        match OpenOptions::new().write(true).custom_flags(libc::O_NONBLOCK).open(&self.path) {
            Ok(file) => {
                info!(path = %self.path.display(), "FIFO reader attached, opened for writing");
                self.file = Some(file);
            }
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                // No reader yet; not an error, just try again next block.
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to open MPX FIFO"),
        }
    }

    /// Writes one block of MPX samples. Silently drops the block (rather
    /// than blocking the real-time caller) if there is no reader or the
    /// pipe's buffer is currently full.
    pub fn write_samples(&mut self, samples: &[f32]) {
        if self.file.is_none() {
            self.try_open();
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };

        self.scratch.clear();
        self.scratch.reserve(samples.len() * 4);
        for s in samples {
            self.scratch.extend_from_slice(&s.to_le_bytes());
        }

        match file.write_all(&self.scratch) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "MPX FIFO write failed, closing for reopen");
                self.file = None;
            }
        }
    }
}

fn ensure_fifo(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| crate::error::Error::Config(format!("invalid FIFO path: {e}")))?;
    // SAFETY: c_path is a valid NUL-terminated byte string for the lifetime
    // of this call; mkfifo only reads it.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if ret != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_fifo_file_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpx.sock");
        let _writer = FifoWriter::new(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_without_reader_does_not_panic_or_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpx.sock");
        let mut writer = FifoWriter::new(&path).unwrap();
        writer.write_samples(&[0.1, 0.2, 0.3]);
    }
}
