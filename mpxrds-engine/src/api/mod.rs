//! HTTP control plane (§4.8/§6): the local API the three CLI tools and any
//! monitoring client speak to. Replaces the original system's POSIX shared
//! memory plus `SIGUSR1`/`SIGUSR2` signal RPC with in-process state behind
//! a small `axum` router — every mutation here is a direct, synchronous
//! `Mutex` write visible to the audio thread on its next block.

pub mod handlers;
pub mod server;

pub use server::{build_router, run, ApiState};
