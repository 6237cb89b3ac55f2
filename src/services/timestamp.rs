use chrono::{DateTime, TimeDelta, Utc};

pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

/// Accept `event_timestamp` if it lies within `max_age_secs` of now, in
/// either direction. The bound is inclusive.
pub fn validate_timestamp(event_timestamp: &str, max_age_secs: i64) -> bool {
    validate_timestamp_at(event_timestamp, max_age_secs, Utc::now())
}

pub fn validate_timestamp_at(event_timestamp: &str, max_age_secs: i64, now: DateTime<Utc>) -> bool {
    let Ok(ts) = DateTime::parse_from_rfc3339(event_timestamp.trim()) else {
        return false;
    };
    let Some(max_age) = TimeDelta::try_seconds(max_age_secs) else {
        return false;
    };
    (now - ts.with_timezone(&Utc)).abs() <= max_age
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SecondsFormat};

    fn at(now: DateTime<Utc>, offset: Duration) -> String {
        (now + offset).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[test]
    fn boundary_is_inclusive() {
        let now = Utc::now();
        let max = DEFAULT_MAX_AGE_SECS;
        assert!(validate_timestamp_at(&at(now, Duration::seconds(-max)), max, now));
        assert!(!validate_timestamp_at(
            &at(now, Duration::seconds(-max) - Duration::milliseconds(1)),
            max,
            now
        ));
    }

    #[test]
    fn sub_millisecond_overshoot_rejected() {
        let now = Utc::now();
        let just_over = (now - Duration::seconds(300) - Duration::microseconds(900))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        assert!(!validate_timestamp_at(&just_over, 300, now));
    }

    #[test]
    fn future_events_bounded_the_same_way() {
        let now = Utc::now();
        assert!(validate_timestamp_at(&at(now, Duration::seconds(300)), 300, now));
        assert!(!validate_timestamp_at(&at(now, Duration::seconds(301)), 300, now));
    }

    #[test]
    fn invalid_formats_rejected() {
        let now = Utc::now();
        for bad in ["", "yesterday", "2026-13-01T00:00:00Z", "1700000000"] {
            assert!(!validate_timestamp_at(bad, 300, now), "{bad}");
        }
    }

    #[test]
    fn offsets_are_normalised() {
        let now = DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(validate_timestamp_at("2026-10-18T14:04:00+02:00", 300, now));
        assert!(!validate_timestamp_at("2026-10-18T14:06:00+02:00", 300, now));
    }

    #[test]
    fn custom_window() {
        let now = Utc::now();
        let ts = at(now, Duration::seconds(-90));
        assert!(!validate_timestamp_at(&ts, 60, now));
        assert!(validate_timestamp_at(&ts, 120, now));
        assert!(validate_timestamp(&Utc::now().to_rfc3339(), DEFAULT_MAX_AGE_SECS));
    }
}
