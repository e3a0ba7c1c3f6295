//! `mpxrds-engine`: the daemon binary's library crate.
//!
//! Wires the pure-DSP/RDS `mpxrds-core` library to real devices: `cpal`
//! audio I/O, the named-FIFO egress writer, the RTP sink seam, and the
//! local HTTP control API that the CLI tools and any monitoring client
//! speak to.

pub mod api;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod rtp;
pub mod sse;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
