//! Timestamps with a validated timezone offset

use std::fmt::{self, Display, Formatter};

use chrono::{FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::BonsaiError;

/// Largest supported timezone offset magnitude (UTC±13:00)
pub const MAX_TZ_OFFSET_SECS: i32 = 13 * 60 * 60;

/// Seconds since the Unix epoch plus an offset east of UTC, in seconds
///
/// No calendar or leap-second semantics are attached at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateTime")]
pub struct DateTime {
    timestamp_secs: i64,
    tz_offset_secs: i32,
}

impl DateTime {
    /// # Errors
    /// Returns [`BonsaiError::OutOfRange`] if `|tz_offset_secs|` exceeds
    /// [`MAX_TZ_OFFSET_SECS`]
    pub fn new(timestamp_secs: i64, tz_offset_secs: i32) -> Result<Self, BonsaiError> {
        if !(-MAX_TZ_OFFSET_SECS..=MAX_TZ_OFFSET_SECS).contains(&tz_offset_secs) {
            return Err(BonsaiError::out_of_range(
                "tz_offset_secs",
                tz_offset_secs,
                -MAX_TZ_OFFSET_SECS,
                MAX_TZ_OFFSET_SECS,
            ));
        }
        Ok(Self {
            timestamp_secs,
            tz_offset_secs,
        })
    }

    /// Epoch timestamp in UTC
    #[inline]
    #[must_use]
    pub const fn from_timestamp(timestamp_secs: i64) -> Self {
        Self {
            timestamp_secs,
            tz_offset_secs: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn timestamp_secs(&self) -> i64 {
        self.timestamp_secs
    }

    #[inline]
    #[must_use]
    pub const fn tz_offset_secs(&self) -> i32 {
        self.tz_offset_secs
    }

    /// Interpret as wall-clock time
    ///
    /// Returns `None` if the timestamp is outside chrono's range.
    #[must_use]
    pub fn to_chrono(&self) -> Option<chrono::DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.tz_offset_secs)?;
        offset.timestamp_opt(self.timestamp_secs, 0).single()
    }
}

impl<Tz: TimeZone> TryFrom<chrono::DateTime<Tz>> for DateTime {
    type Error = BonsaiError;

    fn try_from(dt: chrono::DateTime<Tz>) -> Result<Self, Self::Error> {
        let offset = dt.fixed_offset().offset().local_minus_utc();
        Self::new(dt.timestamp(), offset)
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.to_chrono() {
            Some(dt) => f.write_str(&dt.to_rfc3339()),
            None => write!(f, "@{} {:+}", self.timestamp_secs, self.tz_offset_secs),
        }
    }
}

#[derive(Deserialize)]
struct RawDateTime {
    timestamp_secs: i64,
    tz_offset_secs: i32,
}

impl TryFrom<RawDateTime> for DateTime {
    type Error = BonsaiError;

    fn try_from(raw: RawDateTime) -> Result<Self, Self::Error> {
        Self::new(raw.timestamp_secs, raw.tz_offset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_bounds() {
        assert!(DateTime::new(0, 46800).is_ok());
        assert!(DateTime::new(0, -46800).is_ok());
        assert!(matches!(
            DateTime::new(0, 46801),
            Err(BonsaiError::OutOfRange { field: "tz_offset_secs", value: 46801, .. })
        ));
        assert!(DateTime::new(0, -46801).is_err());
    }

    #[test]
    fn negative_timestamps_are_allowed() {
        let dt = DateTime::new(-86_400, 3600).unwrap();
        assert_eq!(dt.timestamp_secs(), -86_400);
    }

    #[test]
    fn chrono_roundtrip() {
        let dt = DateTime::new(1_500_000_000, -7 * 3600).unwrap();
        let chrono_dt = dt.to_chrono().unwrap();
        assert_eq!(DateTime::try_from(chrono_dt).unwrap(), dt);
        assert_eq!(dt.to_string(), "2017-07-13T19:40:00-07:00");
    }

    #[test]
    fn display_outside_chrono_range() {
        let dt = DateTime::from_timestamp(i64::MAX);
        assert_eq!(dt.to_string(), format!("@{} +0", i64::MAX));
    }

    #[test]
    fn serde_validates_offset() {
        let ok: DateTime =
            serde_json::from_str(r#"{"timestamp_secs":10,"tz_offset_secs":-3600}"#).unwrap();
        assert_eq!(ok.tz_offset_secs(), -3600);
        assert!(serde_json::from_str::<DateTime>(r#"{"timestamp_secs":10,"tz_offset_secs":50000}"#)
            .is_err());
    }
}
