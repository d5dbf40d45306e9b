//! Turning tolerant `scheduled_for` strings into comparable UTC instants.
//!
//! Three cases, in order:
//! 1. trailing `Z` or an explicit numeric offset — parsed exactly;
//! 2. a bare local-looking timestamp that is recent enough — taken as UTC;
//! 3. a bare timestamp more than an hour in the past — probably a client
//!    that sent local time without an offset, so a fixed candidate set of
//!    hour offsets is searched for one that lands the instant in a plausible
//!    send window, and the first hit wins.
//!
//! Case 3 is deliberate behavioral compatibility with deployed clients; the
//! clean fix (require an offset at creation) is noted in DESIGN.md.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::info;

use crate::error::{Result, SchedulerError};

/// Hour offsets tried when recovering a timezone-less timestamp.
const CANDIDATE_OFFSETS: [i64; 13] = [0, 1, 2, 3, 4, 5, 6, 7, 8, -5, -6, -7, -8];

/// Recovery window: adjusted instant must fall in [now − 5 min, now + 24 h].
const WINDOW_PAST_SECS: i64 = 5 * 60;
const WINDOW_FUTURE_SECS: i64 = 24 * 60 * 60;

/// A bare timestamp further in the past than this triggers offset recovery.
const AMBIGUITY_THRESHOLD_SECS: i64 = 60 * 60;

/// Naive formats accepted for timezone-less (and `Z`-suffixed) values.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Normalize `raw` into a UTC instant, relative to `now`.
pub fn normalize_scheduled_for(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    // Explicit offset (or RFC3339 `Z`) — exact conversion, no guessing.
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Trailing `Z` on a non-RFC3339 shape (e.g. missing seconds): UTC literal.
    if let Some(stripped) = raw.strip_suffix('Z') {
        let naive = parse_naive(stripped)?;
        return Ok(naive.and_utc());
    }

    // No timezone marker — first compare as-is.
    let naive = parse_naive(raw)?;
    let as_is = naive.and_utc();

    let behind = (now - as_is).num_seconds();
    if behind <= AMBIGUITY_THRESHOLD_SECS {
        return Ok(as_is);
    }

    // More than an hour in the past: likely a local time missing its offset.
    for offset_hours in CANDIDATE_OFFSETS {
        let adjusted = as_is + Duration::hours(offset_hours);
        let ahead = (adjusted - now).num_seconds();
        if (-WINDOW_PAST_SECS..=WINDOW_FUTURE_SECS).contains(&ahead) {
            info!(
                raw,
                offset_hours,
                adjusted = %adjusted.to_rfc3339(),
                "recovered timezone-less timestamp"
            );
            return Ok(adjusted);
        }
    }

    // No candidate fits — keep the literal reading; the job is simply due.
    Ok(as_is)
}

fn parse_naive(s: &str) -> Result<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive);
        }
    }
    Err(SchedulerError::Timestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn z_suffix_is_utc_literal() {
        let t = normalize_scheduled_for("2024-01-01T10:00:00Z", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn explicit_offset_converts_to_utc() {
        let t = normalize_scheduled_for("2024-06-15T14:00:00+02:00", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn recent_bare_timestamp_taken_as_is() {
        // 30 minutes in the past — inside the ambiguity threshold.
        let t = normalize_scheduled_for("2024-06-15T11:30:00", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 11, 30, 0).unwrap());
    }

    #[test]
    fn future_bare_timestamp_taken_as_is() {
        let t = normalize_scheduled_for("2024-06-15T18:45:00", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 18, 45, 0).unwrap());
    }

    #[test]
    fn three_hours_behind_recovers_plus_three() {
        // 09:00 bare, server now 12:00 — offsets 0..2 leave it in the past,
        // +3 lands it exactly on now, inside the window.
        let t = normalize_scheduled_for("2024-06-15T09:00:00", now()).unwrap();
        assert_eq!(t, now());
    }

    #[test]
    fn earliest_fitting_offset_wins() {
        // 09:30 bare against 12:00 now: +3 (12:30) and +4 (13:30) both land
        // inside [now − 5 min, now + 24 h]; the candidate list is searched
        // in order, so +3 is the one taken.
        let t = normalize_scheduled_for("2024-06-15T09:30:00", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap());
    }

    #[test]
    fn no_fitting_candidate_keeps_literal() {
        // 10 hours behind: even +8 leaves the instant 2 h in the past, and
        // the negative candidates push it further back — nothing fits, so
        // the literal reading is kept.
        let t = normalize_scheduled_for("2024-06-15T02:00:00", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 2, 0, 0).unwrap());
    }

    #[test]
    fn minute_precision_accepted() {
        let t = normalize_scheduled_for("2024-06-15T13:05", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 15, 13, 5, 0).unwrap());
    }

    #[test]
    fn garbage_is_a_timestamp_error() {
        assert!(matches!(
            normalize_scheduled_for("next tuesday", now()),
            Err(SchedulerError::Timestamp(_))
        ));
        assert!(matches!(
            normalize_scheduled_for("", now()),
            Err(SchedulerError::Timestamp(_))
        ));
    }
}
