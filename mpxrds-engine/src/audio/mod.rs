//! Audio device boundary: a `cpal` input stream driving the synthesis
//! pipeline, a `cpal` output stream draining the already-synthesized MPX
//! composite, and the named-FIFO egress writer.

pub mod fifo;
pub mod input;
pub mod output;

pub use fifo::FifoWriter;
pub use input::AudioInput;
pub use output::AudioOutput;
