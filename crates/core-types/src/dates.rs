//! Calendar helpers shared by the analytics engine and the sync job.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc, Weekday};

/// The `YYYY-MM` bucket a date belongs to.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// True for ISO Saturday and Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Midnight UTC on the first day of the month containing `ts`.
pub fn start_of_month(ts: DateTime<Utc>) -> DateTime<Utc> {
    let first = ts.date_naive().with_day(1).unwrap_or(ts.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

/// `ts` shifted back by whole calendar months, clamping to the end of shorter months.
pub fn months_before(ts: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    ts.checked_sub_months(Months::new(months)).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_key_is_zero_padded() {
        assert_eq!(month_key(date(2024, 3, 9)), "2024-03");
        assert_eq!(month_key(date(2023, 12, 31)), "2023-12");
    }

    #[test]
    fn weekend_uses_iso_weekday() {
        // 2024-06-01 is a Saturday.
        assert!(is_weekend(date(2024, 6, 1)));
        assert!(is_weekend(date(2024, 6, 2)));
        assert!(!is_weekend(date(2024, 6, 3)));
        assert!(!is_weekend(date(2024, 6, 7)));
    }

    #[test]
    fn start_of_month_truncates_to_midnight_on_the_first() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 2).unwrap();
        assert_eq!(start_of_month(ts), Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn months_before_clamps_short_months() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 31, 8, 0, 0).unwrap();
        assert_eq!(months_before(ts, 1), Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap());
        assert_eq!(months_before(ts, 12), Utc.with_ymd_and_hms(2023, 3, 31, 8, 0, 0).unwrap());
    }
}
