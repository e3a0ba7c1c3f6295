//! Error taxonomy shared by the signal-path and control-plane crates.

use thiserror::Error;

/// Common result type for mpxrds operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum, nesting a dedicated variant per subsystem so callers
/// can match on the failing component without string-parsing a message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Resampler(#[from] ResamplerError),

    #[error("audio transport error: {0}")]
    Transport(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error(transparent)]
    Oscillator(#[from] OscillatorError),

    #[error(transparent)]
    Rds(#[from] RdsError),

    #[error("control plane error: {0}")]
    Control(String),

    #[error("FIFO error: {0}")]
    Fifo(String),

    #[error("RTP error: {0}")]
    Rtp(String),

    #[error("already running")]
    AlreadyRunning,

    #[error(transparent)]
    Lpf(#[from] LpfError),

    #[error(transparent)]
    Hilbert(#[from] HilbertError),

    #[error(transparent)]
    AudioFilter(#[from] AudioFilterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ResamplerError {
    #[error("unsupported rate conversion: {from} -> {to}")]
    UnsupportedRate { from: u32, to: u32 },
    #[error("resampler construction failed: {0}")]
    Construction(String),
    #[error("resampler processing failed: {0}")]
    Process(String),
}

#[derive(Error, Debug)]
pub enum OscillatorError {
    #[error("sample rate {rate} too low for max frequency {max_freq} (need rate >= 2*max_freq)")]
    RateTooLow { rate: u32, max_freq: u32 },
    #[error("max frequency {max_freq} does not divide sample rate {rate} evenly into an even factor")]
    BadRatio { rate: u32, max_freq: u32 },
}

#[derive(Error, Debug)]
pub enum RdsError {
    #[error("unknown group code: {0}")]
    UnknownGroup(u8),
    #[error("unsupported group version for code {code}: {version}")]
    UnsupportedVersion { code: u8, version: char },
    #[error("string field too long: {field} ({len} > {max})")]
    FieldTooLong { field: &'static str, len: usize, max: usize },
    #[error("programme type out of range: {0}")]
    InvalidPty(u8),
    #[error("local/UTC time conversion failed: {0}")]
    TimeConversion(String),
    #[error("RDS encoder producer thread failed: {0}")]
    ProducerFailed(String),
}

#[derive(Error, Debug)]
pub enum LpfError {
    #[error("FIR filter size must be odd, got {0}")]
    EvenSize(usize),
    #[error("FFT overlap-add init failed: {0}")]
    FftInit(String),
}

#[derive(Error, Debug)]
pub enum HilbertError {
    #[error("Hilbert transformer tap count must be odd, got {0}")]
    EvenTapCount(usize),
}

#[derive(Error, Debug)]
pub enum AudioFilterError {
    #[error("unsupported pre-emphasis time constant: {0} us")]
    BadTimeConstant(u32),
}
