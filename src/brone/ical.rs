//! Just enough RFC 5545 to read task deadlines out of a calendar export:
//! line unfolding, property parameters, TEXT escapes, nested components and
//! the three DATE-TIME forms (UTC, floating/TZID, all-day DATE).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IcalError {
    #[error("document is not an iCalendar (missing BEGIN:VCALENDAR)")]
    NotCalendar,
    #[error("line {line}: END:{found} does not close {expected}")]
    MismatchedEnd { line: usize, expected: String, found: String },
    #[error("component {0} is never closed")]
    Unterminated(String),
    #[error("line {line}: malformed content line")]
    MalformedLine { line: usize },
    #[error("line {line}: invalid {property} value {value:?}")]
    InvalidDate { line: usize, property: String, value: String },
}

/// A VEVENT, reduced to the properties the task sync reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEvent {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

struct ContentLine<'a> {
    name: String,
    params: Vec<(String, &'a str)>,
    value: &'a str,
}

impl<'a> ContentLine<'a> {
    fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }
}

/// Join folded lines: a line starting with a space or tab continues the previous one
fn unfold(input: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in input.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match raw.strip_prefix([' ', '\t']) {
            Some(rest) if !lines.is_empty() => {
                if let Some(last) = lines.last_mut() {
                    last.push_str(rest);
                }
            }
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

fn parse_line(line: &str, line_no: usize) -> Result<ContentLine<'_>, IcalError> {
    // The value starts at the first ':' outside a quoted parameter
    let mut in_quotes = false;
    let colon = line
        .char_indices()
        .find(|&(_, c)| {
            if c == '"' {
                in_quotes = !in_quotes;
            }
            c == ':' && !in_quotes
        })
        .map(|(i, _)| i)
        .ok_or(IcalError::MalformedLine { line: line_no })?;

    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut parts = head.split(';');
    let name = parts.next().unwrap_or_default().trim().to_ascii_uppercase();
    if name.is_empty() {
        return Err(IcalError::MalformedLine { line: line_no });
    }

    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.trim().to_ascii_uppercase(), v.trim_matches('"')))
        })
        .collect();

    Ok(ContentLine { name, params, value })
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// DATE-TIME / DATE value to an instant. `local` applies to floating,
/// TZID-qualified and all-day values.
fn parse_date_time(
    prop: &ContentLine<'_>,
    local: FixedOffset,
    line_no: usize,
) -> Result<DateTime<Utc>, IcalError> {
    let invalid = || IcalError::InvalidDate {
        line: line_no,
        property: prop.name.clone(),
        value: prop.value.to_string(),
    };
    let value = prop.value.trim();

    if prop.param("VALUE") == Some("DATE") || value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return local
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(invalid);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    // TZID names would need a zone database; the configured offset stands in
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
    local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Collect every top-level VEVENT (events nested in other components, and
/// sub-components such as VALARM, are skipped).
///
/// Floating times, all-day dates and `TZID=` times are all read in `local`.
/// The named zone is not resolved, so a zone with daylight saving comes out
/// an hour off for part of the year.
pub fn parse_events(input: &str, local: FixedOffset) -> Result<Vec<CalendarEvent>, IcalError> {
    let lines = unfold(input);
    let mut stack: Vec<String> = Vec::new();
    let mut events = Vec::new();
    let mut current: Option<CalendarEvent> = None;
    let mut seen_calendar = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let prop = parse_line(line, line_no)?;

        match prop.name.as_str() {
            "BEGIN" => {
                let component = prop.value.trim().to_ascii_uppercase();
                if component == "VCALENDAR" && stack.is_empty() {
                    seen_calendar = true;
                } else if !seen_calendar {
                    return Err(IcalError::NotCalendar);
                }
                if component == "VEVENT" && stack.len() == 1 {
                    current = Some(CalendarEvent::default());
                }
                stack.push(component);
            }
            "END" => {
                let component = prop.value.trim().to_ascii_uppercase();
                let open = stack.pop().ok_or(IcalError::NotCalendar)?;
                if open != component {
                    return Err(IcalError::MismatchedEnd {
                        line: line_no,
                        expected: open,
                        found: component,
                    });
                }
                if component == "VEVENT" && stack.len() == 1 {
                    if let Some(event) = current.take() {
                        events.push(event);
                    }
                }
            }
            _ if !seen_calendar => return Err(IcalError::NotCalendar),
            name => {
                // Only properties directly inside the VEVENT
                let in_event = stack.len() == 2 && stack[1] == "VEVENT";
                let Some(event) = current.as_mut().filter(|_| in_event) else {
                    continue;
                };
                match name {
                    "UID" => event.uid = Some(unescape_text(prop.value)),
                    "SUMMARY" => event.summary = Some(unescape_text(prop.value)),
                    "DTSTART" => event.start = Some(parse_date_time(&prop, local, line_no)?),
                    "DTEND" => event.end = Some(parse_date_time(&prop, local, line_no)?),
                    _ => {}
                }
            }
        }
    }

    if !seen_calendar {
        return Err(IcalError::NotCalendar);
    }
    if let Some(open) = stack.pop() {
        return Err(IcalError::Unterminated(open));
    }
    Ok(events)
}
