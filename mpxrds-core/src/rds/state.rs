//! Validated RDS encoder state: the fields every group generator reads from
//! and the getters/setters the control plane mutates.

use crate::error::{RdsError, Result};

pub const PS_LENGTH: usize = 8;
pub const PTYN_LENGTH: usize = 8;
pub const RT_LENGTH: usize = 64;
pub const AF_MAX_ENTRIES: usize = 12;

pub const MS_SPEECH: bool = false;
pub const MS_MUSIC: bool = true;

pub const DI_STEREO: u8 = 0x1;
pub const DI_ARTIFICIAL_HEAD: u8 = 0x2;
pub const DI_COMPRESSED: u8 = 0x4;
pub const DI_DYNPTY: u8 = 0x8;

pub const RT_CR: u8 = 0x0D;
pub const RT_LF: u8 = 0x0A;
pub const RT_END_OF_HEADLINE: u8 = 0x0B;
pub const RT_SOFT_HYPHEN: u8 = 0x1F;

/// Mutable encoder state shared between the control plane and the group
/// generators. Not `Sync` by itself: callers wrap it in a `Mutex` (see
/// `rds::producer`).
#[derive(Debug, Clone)]
pub struct EncoderState {
    pub enabled: bool,

    pub pi: u16,
    pub tp: bool,
    pub pty: u8,

    pub ecc: u8,
    pub ecc_set: bool,
    pub lic: u16,
    pub lic_set: bool,

    pub ta: bool,
    pub ms: bool,
    pub di: u8,

    pub ps: [u8; PS_LENGTH],
    pub ps_set: bool,
    pub ps_idx: u8,

    pub ptyn: [u8; PTYN_LENGTH],
    pub ptyn_set: bool,
    pub ptyn_idx: u8,
    pub ptyn_flush: bool,

    pub rt: [u8; RT_LENGTH],
    pub rt_set: bool,
    pub rt_idx: u8,
    pub rt_segments: u8,
    pub rt_flush: bool,

    pub af_data: [u8; AF_MAX_ENTRIES],
    pub af_set: bool,
    pub af_len: u8,
    pub af_idx: u8,

    /// Alternates 0 (ECC)/3 (LIC) across successive group-1A emissions.
    pub group1_vcode: u8,
}

impl Default for EncoderState {
    fn default() -> Self {
        Self {
            enabled: true,
            pi: 0,
            tp: false,
            pty: 0,
            ecc: 0,
            ecc_set: false,
            lic: 0,
            lic_set: false,
            ta: false,
            ms: MS_MUSIC,
            di: DI_STEREO | DI_DYNPTY,
            ps: [b' '; PS_LENGTH],
            ps_set: false,
            ps_idx: 0,
            ptyn: [b' '; PTYN_LENGTH],
            ptyn_set: false,
            ptyn_idx: 0,
            ptyn_flush: false,
            rt: [b' '; RT_LENGTH],
            rt_set: false,
            rt_idx: 0,
            rt_segments: 0,
            rt_flush: false,
            af_data: [0; AF_MAX_ENTRIES],
            af_set: false,
            af_len: 0,
            af_idx: 0,
            group1_vcode: 0,
        }
    }
}

fn pad_ascii<const N: usize>(s: &str, field: &'static str) -> Result<[u8; N]> {
    if s.len() > N {
        return Err(RdsError::FieldTooLong {
            field,
            len: s.len(),
            max: N,
        }
        .into());
    }
    let mut out = [b' '; N];
    out[..s.len()].copy_from_slice(s.as_bytes());
    Ok(out)
}

impl EncoderState {
    pub fn set_pi(&mut self, pi: u16) {
        self.pi = pi;
    }

    pub fn set_pty(&mut self, pty: u8) -> Result<()> {
        if pty > 31 {
            return Err(RdsError::InvalidPty(pty).into());
        }
        self.pty = pty;
        Ok(())
    }

    pub fn set_ecc(&mut self, ecc: u8) {
        self.ecc = ecc;
        self.ecc_set = ecc != 0;
    }

    pub fn set_lic(&mut self, lic: u16) {
        self.lic = lic & 0xFFF;
        self.lic_set = lic != 0;
    }

    /// Returns `true` if the value actually changed (used by callers to
    /// decide whether to flip a flush bit).
    pub fn set_ps(&mut self, ps: &str) -> Result<bool> {
        let padded: [u8; PS_LENGTH] = pad_ascii(ps, "ps")?;
        let changed = padded != self.ps;
        self.ps = padded;
        self.ps_set = true;
        Ok(changed)
    }

    pub fn set_ptyn(&mut self, ptyn: &str) -> Result<bool> {
        let padded: [u8; PTYN_LENGTH] = pad_ascii(ptyn, "ptyn")?;
        let changed = padded != self.ptyn;
        if changed {
            self.ptyn_flush = !self.ptyn_flush;
        }
        self.ptyn = padded;
        self.ptyn_set = true;
        Ok(changed)
    }

    /// RadioText is segmented into 4-character blocks; `rt_segments` is
    /// derived from the text length (rounding up), capped at the 64-char
    /// field width (16 segments). A message shorter than the full field has
    /// no other way to tell a receiver where it ends, so a carriage-return
    /// terminator is appended right after the text before the field is
    /// space-padded and segmented (RDS standard, clause on RadioText
    /// display); a message that fills all 64 characters carries no
    /// terminator and is segmented on its own length.
    pub fn set_rt(&mut self, rt: &str) -> Result<bool> {
        let mut padded: [u8; RT_LENGTH] = pad_ascii(rt, "rt")?;
        let encoded_len = if rt.len() < RT_LENGTH {
            padded[rt.len()] = RT_CR;
            rt.len() + 1
        } else {
            rt.len()
        };
        let changed = padded != self.rt;
        if changed {
            self.rt_flush = !self.rt_flush;
        }
        self.rt = padded;
        self.rt_set = true;
        self.rt_segments = ((encoded_len + 3) / 4).max(1) as u8;
        self.rt_idx = 0;
        Ok(changed)
    }

    pub fn clear_rt(&mut self) {
        self.rt = [b' '; RT_LENGTH];
        self.rt_set = false;
        self.rt_idx = 0;
        self.rt_segments = 0;
    }

    pub fn set_af(&mut self, af_bytes: &[u8]) -> Result<()> {
        if af_bytes.len() > AF_MAX_ENTRIES {
            return Err(RdsError::FieldTooLong {
                field: "af",
                len: af_bytes.len(),
                max: AF_MAX_ENTRIES,
            }
            .into());
        }
        self.af_data = [0; AF_MAX_ENTRIES];
        self.af_data[..af_bytes.len()].copy_from_slice(af_bytes);
        self.af_len = af_bytes.len() as u8;
        self.af_set = !af_bytes.is_empty();
        self.af_idx = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pty_out_of_range() {
        let mut st = EncoderState::default();
        assert!(st.set_pty(32).is_err());
        assert!(st.set_pty(31).is_ok());
    }

    #[test]
    fn rejects_overlong_ps() {
        let mut st = EncoderState::default();
        assert!(st.set_ps("TOO LONG NAME").is_err());
        assert!(st.set_ps("SHORT").is_ok());
    }

    #[test]
    fn ecc_and_lic_zero_clear_set_flags() {
        let mut st = EncoderState::default();
        st.set_ecc(0xA1);
        assert!(st.ecc_set);
        st.set_ecc(0);
        assert!(!st.ecc_set);

        st.set_lic(0x123);
        assert!(st.lic_set);
        st.set_lic(0);
        assert!(!st.lic_set);
    }

    #[test]
    fn set_rt_flips_flush_only_on_change() {
        let mut st = EncoderState::default();
        let before = st.rt_flush;
        let changed = st.set_rt("Hello World!").unwrap();
        assert!(changed);
        assert_ne!(st.rt_flush, before);

        let flush_after_first = st.rt_flush;
        let changed_again = st.set_rt("Hello World!").unwrap();
        assert!(!changed_again);
        assert_eq!(st.rt_flush, flush_after_first);
    }

    #[test]
    fn default_state_matches_standard_defaults() {
        let st = EncoderState::default();
        assert_eq!(st.ms, MS_MUSIC);
        assert_eq!(st.di, DI_STEREO | DI_DYNPTY);
    }

    #[test]
    fn set_rt_counts_the_terminator_in_segments() {
        let mut st = EncoderState::default();
        st.set_rt("Hello World!").unwrap();
        // 12 characters + one CR terminator = 13, rounded up to 4 segments.
        assert_eq!(st.rt_segments, 4);
        assert_eq!(st.rt[12], RT_CR);
    }

    #[test]
    fn set_rt_full_length_message_has_no_terminator() {
        let mut st = EncoderState::default();
        let full = "x".repeat(RT_LENGTH);
        st.set_rt(&full).unwrap();
        assert_eq!(st.rt_segments, (RT_LENGTH / 4) as u8);
        assert!(st.rt.iter().all(|&b| b != RT_CR));
    }
}
