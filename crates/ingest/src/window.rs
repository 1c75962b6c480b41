//! Pure helpers of the reading sync: staleness, fetch windows and batch dedup.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use core_types::dates::{months_before, start_of_month};
use core_types::{Reading, ReadingKey};
use std::collections::HashMap;

/// True when the point was synced less than `stale_days` ago.
///
/// A `stale_days` of 0 forces a refresh, and a point that was never synced is
/// never fresh. A window reaching past the representable calendar covers every
/// past sync.
pub fn is_fresh(last_sync_at: Option<DateTime<Utc>>, stale_days: u32, now: DateTime<Utc>) -> bool {
    if stale_days == 0 {
        return false;
    }
    let Some(last) = last_sync_at else {
        return false;
    };
    match TimeDelta::try_days(i64::from(stale_days)).and_then(|window| now.checked_sub_signed(window)) {
        Some(threshold) => last > threshold,
        None => true,
    }
}

/// The `[start, end]` dates to request for a point.
///
/// Resumes from the first day of the month of the last sync, so the current
/// partial month is fetched again on every run and picks up late corrections.
/// A point that was never synced reaches `lookback_months` back.
pub fn fetch_window(
    last_sync_at: Option<DateTime<Utc>>,
    lookback_months: u32,
    now: DateTime<Utc>,
) -> (NaiveDate, NaiveDate) {
    let start = match last_sync_at {
        Some(last) => start_of_month(last),
        None => months_before(now, lookback_months),
    };
    (start.date_naive(), now.date_naive())
}

/// Collapses readings sharing a natural key. The last occurrence's values win;
/// the output keeps the order in which each key was first seen.
pub fn dedup_last_wins(readings: Vec<Reading>) -> Vec<Reading> {
    let mut positions: HashMap<ReadingKey, usize> = HashMap::with_capacity(readings.len());
    let mut unique: Vec<Reading> = Vec::with_capacity(readings.len());

    for reading in readings {
        match positions.get(&reading.key()) {
            Some(&idx) => unique[idx] = reading,
            None => {
                positions.insert(reading.key(), unique.len());
                unique.push(reading);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reading(time: &str, kwh: f64) -> Reading {
        Reading {
            metering_point_id: "ES1".to_string(),
            date: date(2024, 6, 1),
            time: time.to_string(),
            consumption_kwh: kwh,
            obtain_method: "Real".to_string(),
        }
    }

    #[rstest]
    #[case(Some(2), 1, true)]
    #[case(Some(23), 1, true)]
    #[case(Some(25), 1, false)]
    #[case(Some(2), 0, false)]
    #[case(Some(47), 2, true)]
    #[case(None, 1, false)]
    #[case(Some(2), 100_000_000, true)]
    #[case(None, u32::MAX, false)]
    fn freshness(#[case] hours_ago: Option<i64>, #[case] stale_days: u32, #[case] expected: bool) {
        let last = hours_ago.map(|h| now() - Duration::hours(h));
        assert_eq!(is_fresh(last, stale_days, now()), expected);
    }

    #[test]
    fn exactly_at_the_threshold_is_stale() {
        let last = now() - Duration::days(1);
        assert!(!is_fresh(Some(last), 1, now()));
    }

    #[test]
    fn window_resumes_at_start_of_last_sync_month() {
        let last = Utc.with_ymd_and_hms(2024, 5, 17, 3, 0, 0).unwrap();
        assert_eq!(fetch_window(Some(last), 12, now()), (date(2024, 5, 1), date(2024, 6, 20)));
    }

    #[test]
    fn never_synced_point_looks_back_whole_months() {
        assert_eq!(fetch_window(None, 12, now()), (date(2023, 6, 20), date(2024, 6, 20)));
        assert_eq!(fetch_window(None, 3, now()), (date(2024, 3, 20), date(2024, 6, 20)));
    }

    #[test]
    fn dedup_keeps_last_value_in_first_seen_order() {
        let batch = vec![
            reading("01:00", 0.1),
            reading("02:00", 0.2),
            reading("01:00", 0.7),
            reading("03:00", 0.3),
        ];
        let unique = dedup_last_wins(batch);

        let times: Vec<&str> = unique.iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, ["01:00", "02:00", "03:00"]);
        assert_eq!(unique[0].consumption_kwh, 0.7);
    }

    #[test]
    fn dedup_of_empty_batch() {
        assert!(dedup_last_wins(Vec::new()).is_empty());
    }
}
