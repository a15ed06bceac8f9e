use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::Serialize;

use crate::db::models::ClassSchedule;

/// Week as stored in `class_schedule.day_of_week`, Sunday first
pub const DAY_NAMES: [&str; 7] = ["Minggu", "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu"];

const WEEKEND: [&str; 2] = ["Minggu", "Sabtu"];

#[derive(Debug, Serialize)]
pub struct DayView {
    pub day: String,
    pub days: Vec<&'static str>,
    pub classes: Vec<ClassSchedule>,
}

/// Day label for `now` on the campus clock
pub fn today(now: DateTime<Utc>, offset: FixedOffset) -> &'static str {
    let weekday = now.with_timezone(&offset).weekday();
    DAY_NAMES[weekday.num_days_from_sunday() as usize]
}

/// Canonical spelling of a day label, matched case-insensitively
pub fn normalize_day(label: &str) -> Option<&'static str> {
    let label = label.trim();
    DAY_NAMES
        .iter()
        .copied()
        .find(|d| d.eq_ignore_ascii_case(label))
}

/// Weekdays always; a weekend day only when some class falls on it
pub fn visible_days(all: &[ClassSchedule]) -> Vec<&'static str> {
    DAY_NAMES
        .iter()
        .copied()
        .filter(|d| !WEEKEND.contains(d) || all.iter().any(|c| c.day_of_week == *d))
        .collect()
}

/// `all` is expected in start-time order; that order is kept
pub fn day_view(all: Vec<ClassSchedule>, day: &'static str) -> DayView {
    let days = visible_days(&all);
    let classes = all.into_iter().filter(|c| c.day_of_week == day).collect();
    DayView {
        day: day.to_string(),
        days,
        classes,
    }
}
