use chrono::prelude::*;
use chrono::Duration;
use std::convert::TryFrom;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a wall-clock datetime. A trailing zone designator is rejected
/// because these values are never instants.
pub fn parse_wall_clock(datestr: &str) -> Option<NaiveDateTime> {
    let datestr = datestr.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(datestr, fmt).ok())
}

/// Parses a calendar date in `YYYY-MM-DD` form. A full datetime is also
/// accepted, in which case only its date part is kept.
pub fn parse_date(datestr: &str) -> Option<NaiveDate> {
    let datestr = datestr.trim();
    NaiveDate::parse_from_str(datestr, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_wall_clock(datestr).map(|dt| dt.date()))
}

pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 100 != 0 && year % 4 == 0)
}

// month: January -> 1
pub fn get_month_length(year: i32, month: u32) -> u32 {
    match month {
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Moves `datetime` forward by `months` calendar months keeping the
/// day-of-month and the time of day. A day that does not exist in the
/// target month rolls over into the next month, e.g. Jan 31 + 1 month is
/// Mar 3 in a non leap year.
pub fn add_months_rollover(datetime: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let month0 = datetime.month0() as i64 + months as i64;
    let year = datetime.year() as i64 + month0 / 12;
    let month = (month0 % 12) as u32 + 1;
    let year = i32::try_from(year).ok()?;

    let day = datetime.day();
    let month_length = get_month_length(year, month);
    let date = if day <= month_length {
        NaiveDate::from_ymd_opt(year, month, day)?
    } else {
        let last_of_month = NaiveDate::from_ymd_opt(year, month, month_length)?;
        last_of_month.checked_add_signed(Duration::days((day - month_length) as i64))?
    };
    Some(date.and_time(datetime.time()))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
