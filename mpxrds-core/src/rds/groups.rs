//! RDS group assembly: the common prelude plus the per-group-type bit
//! packing for the group types this encoder supports (0A/0B, 1A, 2A, 4A,
//! 10A, 15B).

use super::biphase::BiphaseEncoder;
use super::block::{Block, OFFSET_C_PRIME, OFFSET_WORDS};
use super::state::EncoderState;
use crate::error::{RdsError, Result};
use crate::time_mjd::local_clock_time;

pub const BLOCKS_PER_GROUP: usize = 4;
pub const BLOCK_SIZE_BITS: u32 = 26;
pub const GROUP_SIZE_BITS: u32 = BLOCK_SIZE_BITS * BLOCKS_PER_GROUP as u32;
pub const GROUP_SAMPLES: usize = GROUP_SIZE_BITS as usize * super::biphase::SAMPLES_PER_SYMBOL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    A,
    B,
}

impl Version {
    fn bit(self) -> u16 {
        match self {
            Version::A => 0,
            Version::B => 1,
        }
    }

    fn as_char(self) -> char {
        match self {
            Version::A => 'A',
            Version::B => 'B',
        }
    }
}

/// A fully assembled group: 4 CRC-protected blocks plus their biphase
/// waveform, ready to be resampled to the oscillator rate.
#[derive(Debug, Clone)]
pub struct Group {
    pub blocks: [Block; BLOCKS_PER_GROUP],
    pub samples: Vec<f32>,
}

/// Build the common prelude (PI in block 0, group code/version/TP/PTY in
/// block 1, and for version B groups PI + offset C' in block 2), then
/// dispatch to the group-type-specific packer.
pub fn generate_group(state: &mut EncoderState, code: u8, version: Version, biphase: &mut BiphaseEncoder) -> Result<Group> {
    let mut blocks = [Block::default(); BLOCKS_PER_GROUP];
    for (i, b) in blocks.iter_mut().enumerate() {
        b.offset_word = OFFSET_WORDS[i];
    }

    blocks[0].infoword = state.pi;
    blocks[1].infoword =
        ((code as u16 & 0xF) << 12) | (version.bit() << 11) | ((state.tp as u16) << 10) | ((state.pty as u16 & 0x1F) << 5);

    if version == Version::B {
        blocks[2].infoword = state.pi;
        blocks[2].offset_word = OFFSET_C_PRIME;
    }

    match (code, version) {
        (0, v) => pack_group_0(state, &mut blocks, v)?,
        (1, Version::A) => pack_group_1(state, &mut blocks)?,
        (1, Version::B) => return Err(RdsError::UnsupportedVersion { code, version: 'B' }.into()),
        (2, Version::A) => pack_group_2(state, &mut blocks)?,
        (2, Version::B) => return Err(RdsError::UnsupportedVersion { code, version: 'B' }.into()),
        (4, Version::A) => pack_group_4(&mut blocks)?,
        (4, Version::B) => return Err(RdsError::UnsupportedVersion { code, version: 'B' }.into()),
        (10, Version::A) => pack_group_10(state, &mut blocks)?,
        (10, Version::B) => return Err(RdsError::UnsupportedVersion { code, version: 'B' }.into()),
        (15, Version::B) => pack_group_15(state, &mut blocks)?,
        (15, Version::A) => return Err(RdsError::UnsupportedVersion { code, version: 'A' }.into()),
        _ => return Err(RdsError::UnknownGroup(code).into()),
    }

    for b in blocks.iter_mut() {
        b.finalize();
    }

    let mut samples = Vec::with_capacity(GROUP_SAMPLES);
    for b in blocks.iter() {
        biphase.encode_word(b.encoded(), BLOCK_SIZE_BITS, &mut samples);
    }

    Ok(Group { blocks, samples })
}

/// Group 0A/0B: basic tuning, PS transmission, AF (version A only).
fn pack_group_0(state: &mut EncoderState, blocks: &mut [Block; BLOCKS_PER_GROUP], version: Version) -> Result<()> {
    let tuning_flags = (state.ps_idx as u16)
        | (((state.di >> (3 - state.ps_idx)) & 1) as u16) << 2
        | ((state.ms as u16) << 3)
        | ((state.ta as u16) << 4);
    blocks[1].infoword |= tuning_flags;

    if version == Version::A {
        // AF bytes occupy block 2 for version A; the tuning flags are not
        // also written here (the original's self-overwrite of this field
        // with `tuning_flags` is treated as a defect, not reproduced).
        let lo = state.af_idx as usize;
        blocks[2].infoword = ((state.af_data[lo] as u16) << 8) | state.af_data[lo + 1] as u16;
        state.af_idx = if state.af_idx >= 10 { 0 } else { state.af_idx + 2 };
    }

    let idx = state.ps_idx as usize;
    blocks[3].infoword = ((state.ps[2 * idx] as u16) << 8) | state.ps[2 * idx + 1] as u16;
    state.ps_idx = if state.ps_idx >= 3 { 0 } else { state.ps_idx + 1 };

    Ok(())
}

/// Group 1A: alternates Extended Country Code and Language Identification
/// Code in block 2, via a variant code that toggles 0/3 every emission.
fn pack_group_1(state: &mut EncoderState, blocks: &mut [Block; BLOCKS_PER_GROUP]) -> Result<()> {
    state.group1_vcode = if state.group1_vcode == 0 { 3 } else { 0 };
    let payload = if state.group1_vcode == 0 {
        state.ecc as u16 & 0xFF
    } else {
        state.lic & 0xFFF
    };
    blocks[2].infoword = payload | ((state.group1_vcode as u16) << 12);
    Ok(())
}

/// Group 2A: RadioText, 4 characters per group, A/B flush flag in block 1.
fn pack_group_2(state: &mut EncoderState, blocks: &mut [Block; BLOCKS_PER_GROUP]) -> Result<()> {
    let idx = state.rt_idx as usize;
    blocks[1].infoword |= (state.rt_idx as u16 & 0xF) | ((state.rt_flush as u16) << 4);

    blocks[2].infoword = ((state.rt[4 * idx] as u16) << 8) | state.rt[4 * idx + 1] as u16;
    blocks[3].infoword = ((state.rt[4 * idx + 2] as u16) << 8) | state.rt[4 * idx + 3] as u16;

    state.rt_idx += 1;
    if state.rt_idx >= state.rt_segments {
        state.rt_idx = 0;
    }
    Ok(())
}

/// Group 4A: Modified Julian Date + UTC clock time + local offset, per
/// Annex G of the standard.
fn pack_group_4(blocks: &mut [Block; BLOCKS_PER_GROUP]) -> Result<()> {
    let ct = local_clock_time()?;

    blocks[1].infoword |= (ct.mjd >> 15) as u16 & 0x3;
    blocks[2].infoword = (((ct.mjd << 1) & 0xFFFE) as u16) | ((ct.hour >> 4) as u16 & 0x1);
    blocks[3].infoword = (((ct.hour & 0xF) as u16) << 12)
        | (((ct.minute & 0x1F) as u16) << 6)
        | (((ct.offset_negative as u16)) << 5)
        | (ct.offset_half_hours as u16 & 0x1F);

    Ok(())
}

/// Group 10A: Programme Type Name, 4 characters per group, toggling a
/// single-bit index/flush between the two halves of the name.
fn pack_group_10(state: &mut EncoderState, blocks: &mut [Block; BLOCKS_PER_GROUP]) -> Result<()> {
    let idx = state.ptyn_idx as usize;
    blocks[1].infoword |= (state.ptyn_idx as u16) | ((state.ptyn_flush as u16) << 4);

    blocks[2].infoword = ((state.ptyn[4 * idx] as u16) << 8) | state.ptyn[4 * idx + 1] as u16;
    blocks[3].infoword = ((state.ptyn[4 * idx + 2] as u16) << 8) | state.ptyn[4 * idx + 3] as u16;

    state.ptyn_idx = if state.ptyn_idx == 1 { 0 } else { 1 };
    Ok(())
}

/// Group 15B: fast tuning/switching, a mirror of the 0A/0B tuning flags
/// with no PS payload, sent only when PS has not been configured.
fn pack_group_15(state: &mut EncoderState, blocks: &mut [Block; BLOCKS_PER_GROUP]) -> Result<()> {
    let tuning_flags = (state.ps_idx as u16)
        | (((state.di >> (3 - state.ps_idx)) & 1) as u16) << 2
        | ((state.ms as u16) << 3)
        | ((state.ta as u16) << 4);
    blocks[1].infoword |= tuning_flags;
    blocks[3].infoword = blocks[1].infoword;

    state.ps_idx = if state.ps_idx >= 3 { 0 } else { state.ps_idx + 1 };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_0b_tuning_scenario_matches_expected_bit_layout() {
        let mut state = EncoderState::default();
        state.set_pi(0xA1B2);
        state.set_ps("TEST____").unwrap();
        state.ms = true;
        state.ta = false;
        state.di = 0;
        let mut biphase = BiphaseEncoder::new();

        let group = generate_group(&mut state, 0, Version::B, &mut biphase).unwrap();

        assert_eq!(group.blocks[0].infoword, 0xA1B2);
        assert_eq!((group.blocks[1].infoword >> 12) & 0xF, 0x0);
        assert_eq!((group.blocks[1].infoword >> 11) & 0x1, 1);
        assert_eq!((group.blocks[1].infoword >> 10) & 0x1, 0);
        assert_eq!(group.blocks[1].infoword & 0x1F, 0x08);
        assert_eq!(group.blocks[2].infoword, 0xA1B2);
        assert_eq!(group.blocks[2].offset_word, OFFSET_C_PRIME);
        assert_eq!(group.blocks[3].infoword, (b'T' as u16) << 8 | b'E' as u16);
        assert_eq!(group.samples.len(), GROUP_SAMPLES);
    }

    #[test]
    fn group_2a_radiotext_carries_flush_bit_and_first_segment() {
        let mut state = EncoderState::default();
        state.set_rt("Hello World!").unwrap();
        let mut biphase = BiphaseEncoder::new();

        let group = generate_group(&mut state, 2, Version::A, &mut biphase).unwrap();

        assert_eq!((group.blocks[1].infoword >> 4) & 1, state_flush_bit(&state));
        assert_eq!(group.blocks[2].infoword, (b'H' as u16) << 8 | b'e' as u16);
        assert_eq!(group.blocks[3].infoword, (b'l' as u16) << 8 | b'l' as u16);
    }

    fn state_flush_bit(state: &EncoderState) -> u16 {
        state.rt_flush as u16
    }

    #[test]
    fn group_0a_places_af_bytes_without_self_overwrite() {
        let mut state = EncoderState::default();
        state.set_af(&[1, 2, 3, 4]).unwrap();
        let mut biphase = BiphaseEncoder::new();

        let group = generate_group(&mut state, 0, Version::A, &mut biphase).unwrap();
        assert_eq!(group.blocks[2].infoword, (1u16 << 8) | 2u16);
    }

    #[test]
    fn unsupported_group_version_is_rejected() {
        let mut state = EncoderState::default();
        let mut biphase = BiphaseEncoder::new();
        assert!(generate_group(&mut state, 4, Version::B, &mut biphase).is_err());
        assert!(generate_group(&mut state, 15, Version::A, &mut biphase).is_err());
    }
}
