//! Wall-clock timestamps in unix nanoseconds

use chrono::Utc;

/// Current time as unix nanoseconds
pub fn now_nanos() -> i64 {
    // Out of range only after the year 2262
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
