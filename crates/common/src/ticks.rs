//! Timestamps as 100ns ticks since 0001-01-01T00:00:00Z, the unit persisted
//!  in log records and checkpoints.

use chrono::{DateTime, Utc};

pub const TICKS_PER_SECOND: i64 = 10_000_000;
/// Ticks between 0001-01-01 and the unix epoch
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

pub fn to_ticks(time: &DateTime<Utc>) -> i64 {
    let secs = time.timestamp().saturating_mul(TICKS_PER_SECOND);
    let sub = i64::from(time.timestamp_subsec_nanos() / 100);
    UNIX_EPOCH_TICKS.saturating_add(secs).saturating_add(sub)
}

/// `None` if the value does not map onto a representable instant.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// The current time, truncated to tick precision so it survives a round
///  trip through the log unchanged.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    from_ticks(to_ticks(&now)).unwrap_or(now)
}

/// Tick zero, used as the creation time of the root directory.
pub fn origin() -> DateTime<Utc> {
    from_ticks(0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(to_ticks(&epoch), UNIX_EPOCH_TICKS);
        assert_eq!(from_ticks(UNIX_EPOCH_TICKS).unwrap(), epoch);
    }

    #[test]
    fn test_origin() {
        let origin = origin();
        assert_eq!(to_ticks(&origin), 0);
        assert_eq!(origin.to_rfc3339(), "0001-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_now_round_trips() {
        let now = now();
        assert_eq!(from_ticks(to_ticks(&now)).unwrap(), now);
    }

    #[test]
    fn test_sub_second_precision() {
        let t = Utc.timestamp_opt(1_400_000_000, 123_456_700).unwrap();
        let ticks = to_ticks(&t);
        assert_eq!(ticks % TICKS_PER_SECOND, 1_234_567);
        assert_eq!(from_ticks(ticks).unwrap(), t);
    }

    #[test]
    fn test_out_of_range() {
        assert!(from_ticks(i64::MIN).is_none());
    }
}
