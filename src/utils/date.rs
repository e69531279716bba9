use chrono::{DateTime, NaiveDate, Timelike, Utc};

use crate::consts::{DATE_FORMAT, UNKNOWN_DAY};

/// Timestamps at or above this magnitude are treated as milliseconds.
/// 1e11 seconds lies in the year 5138, so no realistic export collides.
const MILLIS_THRESHOLD: f64 = 1e11;

/// Day/hour slot a conversation's usage lands in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket {
    pub day_key: String,
    pub hour: u32,
}

impl TimeBucket {
    pub fn unknown() -> Self {
        TimeBucket {
            day_key: UNKNOWN_DAY.to_string(),
            hour: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.day_key == UNKNOWN_DAY
    }
}

/// Convert a raw creation timestamp (seconds or milliseconds) to a UTC datetime
pub fn to_utc(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let secs = if raw >= MILLIS_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    };
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

pub fn day_of(raw: Option<f64>) -> Option<NaiveDate> {
    raw.and_then(to_utc).map(|dt| dt.date_naive())
}

/// Resolve the bucket for a creation timestamp, falling back to the sentinel day
pub fn bucket_for(raw: Option<f64>) -> TimeBucket {
    match raw.and_then(to_utc) {
        Some(dt) => TimeBucket {
            day_key: dt.format(DATE_FORMAT).to_string(),
            hour: dt.hour(),
        },
        None => TimeBucket::unknown(),
    }
}
