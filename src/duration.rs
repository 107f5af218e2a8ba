//! Duration parsing for command input
//!
//! Accepts compound strings such as `1d 5h 30m`, `2h`, or `90s`, the format
//! moderators type into the giveaway and tempban commands.

use chrono::Duration;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DURATION_REGEX: Regex = Regex::new(r"(\d+)\s*(w|d|h|m|s)").unwrap();
}

/// Parse a duration string. Returns `None` when no recognizable component is
/// present or the components sum to zero.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total = Duration::zero();
    let mut matched = false;

    for capture in DURATION_REGEX.captures_iter(&input.to_lowercase()) {
        let value: i64 = capture.get(1)?.as_str().parse().ok()?;
        let component = match capture.get(2)?.as_str() {
            "w" => Duration::weeks(value),
            "d" => Duration::days(value),
            "h" => Duration::hours(value),
            "m" => Duration::minutes(value),
            "s" => Duration::seconds(value),
            _ => continue,
        };
        total = total.checked_add(&component)?;
        matched = true;
    }

    if matched && total > Duration::zero() {
        Some(total)
    } else {
        None
    }
}
