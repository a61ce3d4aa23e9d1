// src/config/zone.rs
//! Zone that defines the report day.
//!
//! Accepts IANA names ("Asia/Shanghai", "America/New_York") and fixed
//! offsets ("+08:00", "-0530"). "Z" and any casing of "utc" mean UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::RadarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ReportZone {
    pub const UTC: ReportZone = ReportZone::Named(Tz::UTC);

    /// Calendar date of `now` in this zone; DST applies for named zones.
    pub fn date_of(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            ReportZone::Named(tz) => now.with_timezone(tz).date_naive(),
            ReportZone::Fixed(off) => now.with_timezone(off).date_naive(),
        }
    }
}

impl Default for ReportZone {
    fn default() -> Self {
        ReportZone::UTC
    }
}

impl From<Tz> for ReportZone {
    fn from(tz: Tz) -> Self {
        ReportZone::Named(tz)
    }
}

impl From<FixedOffset> for ReportZone {
    fn from(off: FixedOffset) -> Self {
        ReportZone::Fixed(off)
    }
}

impl FromStr for ReportZone {
    type Err = RadarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t == "Z" || t.eq_ignore_ascii_case("utc") {
            return Ok(ReportZone::UTC);
        }
        if let Ok(tz) = t.parse::<Tz>() {
            return Ok(ReportZone::Named(tz));
        }
        t.parse::<FixedOffset>()
            .map(ReportZone::Fixed)
            .map_err(|_| {
                RadarError::config(format!(
                    "invalid timezone `{s}`: expected an IANA name or an offset like +08:00"
                ))
            })
    }
}

impl fmt::Display for ReportZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportZone::Named(tz) => f.write_str(tz.name()),
            ReportZone::Fixed(off) => write!(f, "{off}"),
        }
    }
}
