use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::ical::CalendarEvent;
use crate::db::models::NewBroneTask;

pub const UNTITLED_TASK: &str = "Untitled Task";
pub const DEFAULT_COURSE: &str = "University Task";

static COURSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("static course tag pattern"));

/// Split `"Assignment 1 [CS101]"` into (`"Assignment 1"`, `"CS101"`).
///
/// The first bracketed tag names the course; only its `" [tag]"` form (with
/// the leading space) is cut from the title. Without a tag the placeholder
/// course is used and the summary is kept whole.
pub fn split_course(summary: &str) -> (String, String) {
    let Some(caps) = COURSE_TAG.captures(summary) else {
        return (summary.to_string(), DEFAULT_COURSE.to_string());
    };
    let course = caps[1].to_string();
    let title = summary.replacen(&format!(" [{course}]"), "", 1).trim().to_string();
    (title, course)
}

/// Calendar event to task row; `None` when the event carries no time at all
pub fn event_to_task(event: &CalendarEvent, processed_at: DateTime<Utc>) -> Option<NewBroneTask> {
    let deadline = event.end.or(event.start)?;
    let summary = event
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED_TASK);
    let (task_title, course_name) = split_course(summary);

    Some(NewBroneTask {
        course_name,
        task_title,
        deadline,
        updated_at: processed_at,
    })
}
