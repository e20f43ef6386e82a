//! CCSDS day-segmented time (CDS) used for ESH and packet times
//!
//! Layout of the packed 64-bit value, most significant first:
//!
//! | bits | field |
//! |------|-------|
//! | 16   | days since 1958-01-01 |
//! | 32   | milliseconds of day |
//! | 16   | microseconds of millisecond |

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Days between the CCSDS epoch (1958-01-01) and the Unix epoch.
pub const CCSDS_EPOCH_OFFSET_DAYS: i64 = 4383;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Packed CDS timestamp. Ordering follows the packed value, which is
/// chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CdsTime(pub u64);

impl CdsTime {
    pub fn from_parts(days: u16, millis_of_day: u32, micros: u16) -> Self {
        Self(((days as u64) << 48) | ((millis_of_day as u64) << 16) | micros as u64)
    }

    /// Convert a Unix millisecond timestamp. Times before 1958 clamp to zero.
    pub fn from_unix_millis(millis: i64) -> Self {
        let ccsds_millis = millis + CCSDS_EPOCH_OFFSET_DAYS * MILLIS_PER_DAY;
        if ccsds_millis <= 0 {
            return Self(0);
        }
        let days = (ccsds_millis / MILLIS_PER_DAY).min(u16::MAX as i64) as u16;
        let millis_of_day = (ccsds_millis % MILLIS_PER_DAY) as u32;
        Self::from_parts(days, millis_of_day, 0)
    }

    pub fn days(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn millis_of_day(self) -> u32 {
        ((self.0 >> 16) & 0xFFFF_FFFF) as u32
    }

    pub fn micros(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Value as written into construction records.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let unix_millis = (self.days() as i64 - CCSDS_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY
            + self.millis_of_day() as i64;
        Utc.timestamp_millis_opt(unix_millis)
            .single()
            .map(|t| t + chrono::Duration::microseconds(self.micros() as i64))
    }
}

/// Day of year (1-366) and millisecond of day for a Unix millisecond timestamp.
pub fn day_of_year_and_millis(unix_millis: i64) -> (u16, u32) {
    match Utc.timestamp_millis_opt(unix_millis).single() {
        Some(t) => {
            let millis = t.num_seconds_from_midnight() * 1000 + t.timestamp_subsec_millis();
            (t.ordinal() as u16, millis)
        }
        None => (0, 0),
    }
}

/// `yyDDDhhmmss` time component used in dataset file names.
pub fn file_name_stamp(time: DateTime<Utc>) -> String {
    format!(
        "{:02}{:03}{:02}{:02}{:02}",
        time.year() % 100,
        time.ordinal(),
        time.hour(),
        time.minute(),
        time.second()
    )
}
