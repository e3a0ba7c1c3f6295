//! Modified Julian Date and RDS clock-time (group 4A) calculation, per
//! Annex G of the RDS standard.

use crate::error::{RdsError, Result};
use chrono::{Datelike, Timelike, Utc};

/// The fields RDS group 4A needs, already reduced to the bit widths the
/// group packer writes into blocks 1-3.
#[derive(Debug, Clone, Copy)]
pub struct ClockTime {
    pub mjd: i32,
    pub hour: u32,
    pub minute: u32,
    /// `true` when the local offset is zero or negative (the standard's
    /// sign convention: 0 means positive, 1 means negative-or-zero).
    pub offset_negative: bool,
    pub offset_half_hours: u32,
}

/// Compute the Modified Julian Date for a UTC calendar date using the
/// Annex G formula (`year` is the chrono full year, reduced internally to
/// years-since-1900 as the formula expects).
pub fn modified_julian_date(year: i32, month: u32, day: u32) -> i32 {
    let leap_day = if month <= 2 { 1 } else { 0 };
    let y = (year - 1900 - leap_day) as f64;
    let m = (month as i32 + 1 + leap_day * 12) as f64;
    14956 + day as i32 + (y * 365.25) as i32 + (m * 30.6001) as i32
}

/// Build a [`ClockTime`] from the current system UTC and local time.
pub fn local_clock_time() -> Result<ClockTime> {
    let utc = Utc::now();
    let local = chrono::Local::now();

    let mjd = modified_julian_date(utc.year(), utc.month(), utc.day());

    // Matches the source material's coarse whole-hour offset (it compares
    // local and UTC hour-of-day directly, so a timezone with a half-hour
    // component is rounded to the nearest hour before being doubled below).
    let tz_offset_hours = local.hour() as i32 - utc.hour() as i32;
    let offset_negative = tz_offset_hours <= 0;
    let offset_half_hours = (2 * tz_offset_hours).unsigned_abs() & 0x1F;

    if !(0..24).contains(&utc.hour()) {
        return Err(RdsError::TimeConversion("UTC hour out of range".into()).into());
    }

    Ok(ClockTime {
        mjd,
        hour: utc.hour(),
        minute: utc.minute(),
        offset_negative,
        offset_half_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjd_matches_known_reference_date() {
        // 1999-09-06 15:00 UTC is the worked example from the RDS standard
        // (CT group, Annex G): 14956 + 6 + floor(99*365.25) + floor(10*30.6001)
        // = 14956 + 6 + 36159 + 306 = 51427.
        let mjd = modified_julian_date(1999, 9, 6);
        assert_eq!(mjd, 51427);
    }

    #[test]
    fn local_clock_time_produces_in_range_fields() {
        let ct = local_clock_time().unwrap();
        assert!(ct.hour < 24);
        assert!(ct.minute < 60);
        assert!(ct.offset_half_hours <= 31);
    }
}
