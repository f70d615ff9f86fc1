use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Computes the next fire time for a profile's `Schedule`: a target
/// hour/minute in an IANA timezone, restricted to a set of weekdays.
#[derive(Debug, Clone)]
pub(crate) struct Cadence {
    tz: Tz,
    target: NaiveTime,
    /// `0 = Sunday .. 6 = Saturday`, matching `Schedule::weekdays`.
    weekdays: Vec<u8>,
}

impl Cadence {
    /// # Errors
    /// Returns an error when `timezone` is not a recognised IANA name, the
    /// hour/minute pair is out of range, or `weekdays` contains a value
    /// outside `0..=6`.
    pub(crate) fn new(timezone: &str, hour: u32, minute: u32, weekdays: &[u8]) -> Result<Self> {
        let tz: Tz = timezone.parse().map_err(|_| anyhow::anyhow!("unrecognised IANA timezone {timezone:?}"))?;
        let target = NaiveTime::from_hms_opt(hour, minute, 0).with_context(|| format!("invalid time {hour:02}:{minute:02}"))?;
        if let Some(bad) = weekdays.iter().find(|d| **d > 6) {
            anyhow::bail!("weekday index out of range 0..=6: {bad}");
        }
        let weekdays = if weekdays.is_empty() { (0..=6).collect() } else { weekdays.to_vec() };
        Ok(Self { tz, target, weekdays })
    }

    /// Smallest `DateTime<Utc>` strictly after `after` at which the target
    /// time falls on an enabled weekday. Returns `after` itself if it is
    /// exactly a scheduled fire time.
    pub(crate) fn next_run_from(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let localized = after.with_timezone(&self.tz);
        let mut date = localized.date_naive();

        loop {
            let candidate = local_datetime(&self.tz, date, self.target);
            if let Some(candidate) = candidate {
                if self.weekdays.contains(&(date.weekday().num_days_from_sunday() as u8)) {
                    let candidate_utc = candidate.with_timezone(&Utc);
                    if candidate_utc >= after {
                        return candidate_utc;
                    }
                }
            }
            date = advance_day(date);
        }
    }
}

fn local_datetime(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _) => Some(first),
        LocalResult::None => None,
    }
}

fn advance_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().expect("date should remain representable when advancing")
}

#[cfg(test)]
mod tests {
    use super::Cadence;
    use chrono::DateTime;

    fn parse_utc(ts: &str) -> DateTime<chrono::Utc> {
        DateTime::parse_from_rfc3339(ts).expect("valid datetime").with_timezone(&chrono::Utc)
    }

    #[test]
    fn next_run_same_day_when_before_trigger() {
        let cadence = Cadence::new("Asia/Tokyo", 4, 0, &[]).unwrap();
        let now = parse_utc("2025-11-08T18:30:00Z"); // 03:30 JST
        let expected = parse_utc("2025-11-08T19:00:00Z"); // 04:00 JST
        assert_eq!(cadence.next_run_from(now), expected);
    }

    #[test]
    fn next_run_next_day_when_past_trigger() {
        let cadence = Cadence::new("Asia/Tokyo", 4, 0, &[]).unwrap();
        let now = parse_utc("2025-11-08T10:00:00Z"); // 19:00 JST, already past 04:00
        let expected = parse_utc("2025-11-09T19:00:00Z"); // next day's 04:00 JST
        assert_eq!(cadence.next_run_from(now), expected);
    }

    #[test]
    fn next_run_immediate_when_exact_trigger() {
        let cadence = Cadence::new("Asia/Tokyo", 4, 0, &[]).unwrap();
        let now = parse_utc("2025-11-08T19:00:00Z"); // exactly 04:00 JST
        assert_eq!(cadence.next_run_from(now), now);
    }

    #[test]
    fn restricts_to_enabled_weekdays() {
        // 2025-11-08 is a Saturday (index 6); only Sunday (index 0) is enabled.
        let cadence = Cadence::new("UTC", 4, 0, &[0]).unwrap();
        let now = parse_utc("2025-11-08T00:00:00Z");
        let next = cadence.next_run_from(now);
        assert_eq!(next, parse_utc("2025-11-09T04:00:00Z")); // following Sunday
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(Cadence::new("Not/AZone", 0, 0, &[]).is_err());
    }

    #[test]
    fn rejects_out_of_range_weekday() {
        assert!(Cadence::new("UTC", 0, 0, &[9]).is_err());
    }
}
