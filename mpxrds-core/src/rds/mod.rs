//! RDS (Radio Data System) encoder: group assembly, CRC, biphase shaping,
//! the group scheduler, the producer/consumer waveform handoff, and the
//! dynamic PSN/RadioText file-watch rotators.

pub mod biphase;
pub mod block;
pub mod dynamic_text;
pub mod groups;
pub mod producer;
pub mod scheduler;
pub mod state;

pub use biphase::BiphaseEncoder;
pub use block::Block;
pub use dynamic_text::Rotator;
pub use groups::{Group, Version};
pub use producer::{Consumer, Producer, RdsSampleSource};
pub use scheduler::Scheduler;
pub use state::EncoderState;
