// Local time conversion for trend display
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};

/// Converts store timestamps (UTC) into the asset's local wall-clock time.
pub trait TimeConverter: Send + Sync {
    fn to_local(&self, utc: DateTime<Utc>, tz_offset_hours: f64, honor_dst: bool) -> NaiveDateTime;
}

/// Fixed offset plus, when honoured, US daylight saving: from the second
/// Sunday of March 02:00 to the first Sunday of November 02:00 local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsDaylightConverter;

impl TimeConverter for UsDaylightConverter {
    fn to_local(&self, utc: DateTime<Utc>, tz_offset_hours: f64, honor_dst: bool) -> NaiveDateTime {
        let naive = utc.naive_utc();
        // An offset that cannot be represented leaves the time in UTC
        let Some(standard) = TimeDelta::try_seconds((tz_offset_hours * 3600.0).round() as i64)
            .and_then(|offset| naive.checked_add_signed(offset))
        else {
            return naive;
        };
        if honor_dst && in_us_daylight_time(standard) {
            standard.checked_add_signed(TimeDelta::hours(1)).unwrap_or(standard)
        } else {
            standard
        }
    }
}

/// `standard` is local standard time. The switch back happens at 02:00
/// daylight time, which is 01:00 standard time.
fn in_us_daylight_time(standard: NaiveDateTime) -> bool {
    let year = standard.year();
    let (Some(start_day), Some(end_day)) = (
        NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2),
        NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1),
    ) else {
        return false;
    };
    let (Some(two_am), Some(one_am)) = (NaiveTime::from_hms_opt(2, 0, 0), NaiveTime::from_hms_opt(1, 0, 0)) else {
        return false;
    };

    let start = start_day.and_time(two_am);
    let end = end_day.and_time(one_am);
    standard >= start && standard < end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_fixed_offset_without_dst() {
        let utc = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(utc, -6.0, false), local(2024, 7, 1, 6, 0));
        assert_eq!(UsDaylightConverter.to_local(utc, 5.5, false), local(2024, 7, 1, 17, 30));
    }

    #[test]
    fn test_summer_gets_extra_hour_when_honoured() {
        let utc = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(utc, -6.0, true), local(2024, 7, 1, 7, 0));

        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(winter, -6.0, true), local(2024, 1, 15, 6, 0));
    }

    #[test]
    fn test_transition_edges_2024() {
        // Spring forward: Sunday 2024-03-10 02:00 CST
        let before = Utc.with_ymd_and_hms(2024, 3, 10, 7, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(before, -6.0, true), local(2024, 3, 10, 1, 59));
        assert_eq!(UsDaylightConverter.to_local(after, -6.0, true), local(2024, 3, 10, 3, 0));

        // Fall back: Sunday 2024-11-03 02:00 CDT == 01:00 CST == 07:00 UTC
        let before = Utc.with_ymd_and_hms(2024, 11, 3, 6, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 11, 3, 7, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(before, -6.0, true), local(2024, 11, 3, 1, 59));
        assert_eq!(UsDaylightConverter.to_local(after, -6.0, true), local(2024, 11, 3, 1, 0));
    }

    #[test]
    fn test_unrepresentable_offset_stays_utc() {
        let utc = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(UsDaylightConverter.to_local(utc, 1e10, false), utc.naive_utc());
        assert_eq!(UsDaylightConverter.to_local(utc, 1e15, true), utc.naive_utc());
    }
}
