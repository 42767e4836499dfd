//! Birthday arithmetic.
//!
//! Birthdays are stored on the platform as a `DDMM` token without a year.
//! The next occurrence is found by computing the member's age against a
//! fixed epoch birth year, stepping the birthdate forward by that age, and
//! stepping one more year if that date is already over.
//!
//! The occurrence is pinned to the last millisecond of the day in the time
//! zone of `now`, so a birthday that is today yields `0` rather than a
//! negative count.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{BdBotError, Result};

/// Leap year, so that `2902` is a valid token.
const EPOCH_YEAR: i32 = 1904;

/// Parse a `DDMM` token into `(day, month)`.
pub fn parse_token(raw: &str) -> Result<(u32, u32)> {
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BdBotError::InvalidBirthday(
            raw.to_string(),
            "expected 4 digits in DDMM format".into(),
        ));
    }
    let day: u32 = raw[..2]
        .parse()
        .map_err(|e| BdBotError::InvalidBirthday(raw.to_string(), format!("bad day: {e}")))?;
    let month: u32 = raw[2..]
        .parse()
        .map_err(|e| BdBotError::InvalidBirthday(raw.to_string(), format!("bad month: {e}")))?;

    if NaiveDate::from_ymd_opt(EPOCH_YEAR, month, day).is_none() {
        return Err(BdBotError::InvalidBirthday(
            raw.to_string(),
            "no such day in the calendar".into(),
        ));
    }
    Ok((day, month))
}

/// The birthday as observed in `year`. Feb 29 falls back to Feb 28 in
/// non-leap years.
fn observed_in(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        if month == 2 && day == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

/// Completed years between `birth` and `on`.
fn age_on(birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

fn end_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let naive: NaiveDateTime = date.and_hms_milli_opt(23, 59, 59, 999)?;
    Some(
        tz.from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    )
}

/// Next occurrence (today included) of the birthday, at end of day.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, raw: &str) -> Result<DateTime<Tz>> {
    let (day, month) = parse_token(raw)?;
    let tz = now.timezone();
    let today = now.date_naive();
    let out_of_range =
        || BdBotError::InvalidBirthday(raw.to_string(), "date out of range".into());

    let birth = NaiveDate::from_ymd_opt(EPOCH_YEAR, month, day).ok_or_else(out_of_range)?;
    let age = age_on(birth, today);

    let mut year = EPOCH_YEAR + age;
    let mut occurrence = observed_in(year, month, day)
        .and_then(|d| end_of_day(&tz, d))
        .ok_or_else(out_of_range)?;
    if now.naive_utc() > occurrence.naive_utc() {
        year += 1;
        occurrence = observed_in(year, month, day)
            .and_then(|d| end_of_day(&tz, d))
            .ok_or_else(out_of_range)?;
    }
    Ok(occurrence)
}

/// Whole days left until the next birthday; `0` means today.
pub fn days_until_birthday<Tz: TimeZone>(now: &DateTime<Tz>, raw: &str) -> Result<i64> {
    let occurrence = next_occurrence(now, raw)?;
    let left = occurrence.naive_utc() - now.naive_utc();
    let days = left.num_hours() / 24;
    tracing::debug!(birthday = raw, days, "computed days until birthday");
    Ok(days)
}
