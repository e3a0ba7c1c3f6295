//! Group scheduler: decides which group type to emit next, targeting the
//! standard's 12 groups/sec repetition table and a once-a-minute clock-time
//! group.

use super::biphase::BiphaseEncoder;
use super::groups::{generate_group, Group, Version};
use super::state::EncoderState;
use crate::error::Result;

pub const GROUPS_PER_SEC: u16 = 12;
pub const GROUPS_PER_MIN: u16 = GROUPS_PER_SEC * 60;

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    groups_per_sec_counter: i16,
    groups_per_min_counter: u16,
    ptyn_count: u8,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for the next group, mutating `state`'s rotating indices/flags as
    /// a side effect (PS index, RT index, AF index, etc.).
    pub fn next_group(&mut self, state: &mut EncoderState, biphase: &mut BiphaseEncoder) -> Result<Group> {
        if self.groups_per_min_counter >= GROUPS_PER_MIN {
            let group = generate_group(state, 4, Version::A, biphase)?;
            self.groups_per_min_counter = 0;
            return Ok(group);
        }

        let group = if self.groups_per_sec_counter < 4 {
            if state.ps_set {
                if state.af_set {
                    generate_group(state, 0, Version::A, biphase)?
                } else {
                    generate_group(state, 0, Version::B, biphase)?
                }
            } else {
                generate_group(state, 15, Version::B, biphase)?
            }
        } else if self.groups_per_sec_counter < 5 && (state.ecc_set || state.lic_set) {
            generate_group(state, 1, Version::A, biphase)?
        } else if self.groups_per_sec_counter < 7 && state.ptyn_set && self.ptyn_count < 2 {
            self.ptyn_count += 1;
            generate_group(state, 10, Version::A, biphase)?
        } else if self.groups_per_sec_counter < GROUPS_PER_SEC as i16 && state.rt_set {
            generate_group(state, 2, Version::A, biphase)?
        } else {
            self.groups_per_sec_counter = -1;
            return self.next_group_after_rollover(state, biphase);
        };

        self.groups_per_sec_counter += 1;
        self.groups_per_min_counter += 1;
        if self.ptyn_count >= 2 {
            self.ptyn_count = 0;
        }
        Ok(group)
    }

    fn next_group_after_rollover(&mut self, state: &mut EncoderState, biphase: &mut BiphaseEncoder) -> Result<Group> {
        self.next_group(state, biphase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_15b_tuning_group_when_ps_unset() {
        let mut state = EncoderState::default();
        let mut sched = Scheduler::new();
        let mut biphase = BiphaseEncoder::new();
        let group = sched.next_group(&mut state, &mut biphase).unwrap();
        // Block 1's group-code nibble should be 15.
        assert_eq!((group.blocks[1].infoword >> 12) & 0xF, 15);
    }

    #[test]
    fn emits_clock_time_group_once_per_minute() {
        let mut state = EncoderState::default();
        state.set_ps("KEXAMPLE").unwrap();
        let mut sched = Scheduler::new();
        let mut biphase = BiphaseEncoder::new();

        let mut saw_4a = false;
        for _ in 0..(GROUPS_PER_MIN as usize + 5) {
            let group = sched.next_group(&mut state, &mut biphase).unwrap();
            if (group.blocks[1].infoword >> 12) & 0xF == 4 {
                saw_4a = true;
            }
        }
        assert!(saw_4a);
    }
}
