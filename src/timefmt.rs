//! Timestamps as shown in the history list.

use chrono::{DateTime, Datelike, Local, TimeZone};
use std::fmt::Display;

/// Formats `millis` relative to `now`: `"03:05 PM Jan 07"` within the same
/// year, `"Jan 07, 2023"` otherwise.
///
/// Out-of-range timestamps render as an empty string.
pub fn format_timestamp<Tz>(millis: i64, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(at) = now.timezone().timestamp_millis_opt(millis).single() else {
        return String::new();
    };

    if at.year() == now.year() {
        at.format("%I:%M %p %b %d").to_string()
    } else {
        at.format("%b %d, %Y").to_string()
    }
}

/// [`format_timestamp`] in the local time zone.
pub fn format_local(millis: i64) -> String {
    format_timestamp(millis, &Local::now())
}
