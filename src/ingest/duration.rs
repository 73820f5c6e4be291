//! Duration normalization to weeks.

use crate::models::{CourseDuration, RawDuration};

/// Convert a value/unit pair to whole weeks.
///
/// Months count as four weeks; days and hours round up (ten study hours
/// approximate one week of part-time load). Unknown units yield None and the
/// display string alone survives.
pub fn to_weeks(value: f64, unit: &str) -> Option<u32> {
    if value <= 0.0 || !value.is_finite() {
        return None;
    }

    let unit = unit.trim().to_lowercase();
    let unit = unit.trim_end_matches('s');

    let weeks = match unit {
        "hour" | "hr" | "h" => (value / 10.0).ceil(),
        "day" | "d" => (value / 7.0).ceil(),
        "week" | "wk" | "w" => value.ceil(),
        "month" | "mo" => (value * 4.0).round(),
        "year" | "yr" | "y" => (value * 52.0).round(),
        _ => return None,
    };

    Some((weeks as u32).max(1))
}

/// Build the canonical duration, preserving the original display string.
pub fn normalize(raw: Option<&RawDuration>) -> CourseDuration {
    match raw {
        Some(d) => CourseDuration {
            weeks: to_weeks(d.value, &d.unit),
            display: Some(d.display.clone()),
        },
        None => CourseDuration::default(),
    }
}
