use crate::domain::models::{ExternalEvent, Task};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

const DEFAULT_EVENT_MINUTES: i64 = 60;
const RESCHEDULED_EVENT_MINUTES: i64 = 60;
const UNTITLED_EVENT: &str = "(No title)";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "hangoutLink", skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub start: CalendarEventDateTime,
    #[serde(default)]
    pub end: CalendarEventDateTime,
}

/// Start/end replacement sent with PATCH. Absent fields serialize as `null` so a
/// timed event can become all-day and back.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct EventTimePatch {
    pub start: PatchDateTime,
    pub end: PatchDateTime,
}

#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct PatchDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
}

pub fn is_cancelled(event: &GoogleCalendarEvent) -> bool {
    event
        .status
        .as_deref()
        .map(|status| status.eq_ignore_ascii_case("cancelled"))
        .unwrap_or(false)
}

/// Maps a calendar event to a local-date event. Cancelled or id-less events
/// yield `None`.
pub fn decode_external_event(
    event: &GoogleCalendarEvent,
    timezone: Tz,
) -> Result<Option<ExternalEvent>, InfraError> {
    if is_cancelled(event) {
        return Ok(None);
    }
    let Some(event_id) = event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
    else {
        return Ok(None);
    };

    let title = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNTITLED_EVENT)
        .to_string();
    let meeting_link = event
        .hangout_link
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    if let Some(start_raw) = event.start.date_time.as_deref() {
        let start = parse_rfc3339_in(start_raw, timezone, "start.dateTime")?;
        let duration_minutes = match event.end.date_time.as_deref() {
            Some(end_raw) => {
                let end = parse_rfc3339_in(end_raw, timezone, "end.dateTime")?;
                u32::try_from((end - start).num_minutes()).ok()
            }
            None => None,
        };
        return Ok(Some(ExternalEvent {
            event_id,
            title,
            date: start.date_naive(),
            start_time: Some(start.format("%H:%M").to_string()),
            duration_minutes,
            meeting_link,
        }));
    }

    let Some(date_raw) = event.start.date.as_deref() else {
        return Err(InfraError::InvalidInput(format!(
            "calendar event {event_id} has neither start.dateTime nor start.date"
        )));
    };
    let date = parse_calendar_date(date_raw, "start.date")?;
    Ok(Some(ExternalEvent {
        event_id,
        title,
        date,
        start_time: None,
        duration_minutes: None,
        meeting_link,
    }))
}

/// Builds a new calendar event for a task on its local date.
pub fn encode_task_event(task: &Task, timezone: Tz) -> Result<GoogleCalendarEvent, InfraError> {
    let (start, end) = match task.metadata.parsed_start_time() {
        Some(start_time) => {
            let minutes = task
                .metadata
                .duration_minutes
                .map(i64::from)
                .unwrap_or(DEFAULT_EVENT_MINUTES);
            let start = localize(task.date, start_time, timezone)?;
            let end = start + Duration::minutes(minutes);
            (
                CalendarEventDateTime {
                    date_time: Some(start.to_rfc3339()),
                    date: None,
                    time_zone: Some(timezone.name().to_string()),
                },
                CalendarEventDateTime {
                    date_time: Some(end.to_rfc3339()),
                    date: None,
                    time_zone: Some(timezone.name().to_string()),
                },
            )
        }
        None => (
            CalendarEventDateTime {
                date_time: None,
                date: Some(task.date.to_string()),
                time_zone: None,
            },
            CalendarEventDateTime {
                date_time: None,
                date: Some((task.date + Duration::days(1)).to_string()),
                time_zone: None,
            },
        ),
    };

    Ok(GoogleCalendarEvent {
        id: None,
        summary: Some(task.title.clone()),
        description: task.metadata.note.clone(),
        status: Some("confirmed".to_string()),
        hangout_link: None,
        start,
        end,
    })
}

/// Time range for an event whose task moved to `new_date`. A preserved start
/// time keeps the same wall-clock time with a one-hour end; otherwise the event
/// becomes all-day on `new_date` (end date is exclusive).
pub fn reschedule_patch(
    new_date: NaiveDate,
    start_time: Option<NaiveTime>,
    timezone: Tz,
) -> Result<EventTimePatch, InfraError> {
    match start_time {
        Some(start_time) => {
            let start = localize(new_date, start_time, timezone)?;
            let end = start + Duration::minutes(RESCHEDULED_EVENT_MINUTES);
            Ok(EventTimePatch {
                start: PatchDateTime {
                    date_time: Some(start.to_rfc3339()),
                    date: None,
                    time_zone: Some(timezone.name().to_string()),
                },
                end: PatchDateTime {
                    date_time: Some(end.to_rfc3339()),
                    date: None,
                    time_zone: Some(timezone.name().to_string()),
                },
            })
        }
        None => Ok(EventTimePatch {
            start: PatchDateTime {
                date_time: None,
                date: Some(new_date.to_string()),
                time_zone: None,
            },
            end: PatchDateTime {
                date_time: None,
                date: Some((new_date + Duration::days(1)).to_string()),
                time_zone: None,
            },
        }),
    }
}

pub fn parse_timezone(value: &str) -> Result<Tz, InfraError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{value}': {error}")))
}

fn localize(date: NaiveDate, time: NaiveTime, timezone: Tz) -> Result<DateTime<Tz>, InfraError> {
    let local = date.and_time(time);
    timezone
        .from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| {
            InfraError::InvalidInput(format!(
                "local time {local} does not exist in {}",
                timezone.name()
            ))
        })
}

fn parse_rfc3339_in(value: &str, timezone: Tz, field_name: &str) -> Result<DateTime<Tz>, InfraError> {
    DateTime::parse_from_rfc3339(value)
        .map(|value| value.with_timezone(&timezone))
        .map_err(|error| {
            InfraError::InvalidInput(format!(
                "invalid calendar event {field_name} '{value}': {error}"
            ))
        })
}

fn parse_calendar_date(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!(
            "invalid calendar event {field_name} '{value}': {error}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TaskMetadata, TaskStatus};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn timed_event(id: &str, start: &str, end: &str) -> GoogleCalendarEvent {
        GoogleCalendarEvent {
            id: Some(id.to_string()),
            summary: Some("Design review".to_string()),
            description: None,
            status: Some("confirmed".to_string()),
            hangout_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
            start: CalendarEventDateTime {
                date_time: Some(start.to_string()),
                date: None,
                time_zone: None,
            },
            end: CalendarEventDateTime {
                date_time: Some(end.to_string()),
                date: None,
                time_zone: None,
            },
        }
    }

    #[test]
    fn decode_timed_event_uses_local_date_in_timezone() {
        let event = timed_event("evt-1", "2025-01-16T01:30:00Z", "2025-01-16T02:15:00Z");
        let tz = parse_timezone("America/New_York").expect("tz");

        let decoded = decode_external_event(&event, tz)
            .expect("decode")
            .expect("external event");

        // 01:30 UTC is still the previous evening in New York.
        assert_eq!(decoded.date, date("2025-01-15"));
        assert_eq!(decoded.start_time.as_deref(), Some("20:30"));
        assert_eq!(decoded.duration_minutes, Some(45));
        assert_eq!(
            decoded.meeting_link.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
    }

    #[test]
    fn decode_all_day_event_keeps_calendar_date() {
        let event = GoogleCalendarEvent {
            id: Some("evt-2".to_string()),
            summary: None,
            description: None,
            status: None,
            hangout_link: None,
            start: CalendarEventDateTime {
                date_time: None,
                date: Some("2025-03-10".to_string()),
                time_zone: None,
            },
            end: CalendarEventDateTime {
                date_time: None,
                date: Some("2025-03-11".to_string()),
                time_zone: None,
            },
        };

        let decoded = decode_external_event(&event, Tz::UTC)
            .expect("decode")
            .expect("external event");
        assert_eq!(decoded.date, date("2025-03-10"));
        assert_eq!(decoded.title, "(No title)");
        assert!(decoded.start_time.is_none());
    }

    #[test]
    fn decode_skips_cancelled_events() {
        let mut event = timed_event("evt-3", "2025-01-16T10:00:00Z", "2025-01-16T11:00:00Z");
        event.status = Some("cancelled".to_string());
        assert!(decode_external_event(&event, Tz::UTC).expect("decode").is_none());
    }

    #[test]
    fn decode_rejects_event_without_start() {
        let mut event = timed_event("evt-4", "2025-01-16T10:00:00Z", "2025-01-16T11:00:00Z");
        event.start = CalendarEventDateTime::default();
        assert!(decode_external_event(&event, Tz::UTC).is_err());
    }

    #[test]
    fn reschedule_patch_preserves_wall_clock_time() {
        let tz = parse_timezone("Europe/Berlin").expect("tz");
        let start_time = NaiveTime::from_hms_opt(9, 30, 0).expect("time");
        let patch = reschedule_patch(date("2025-07-04"), Some(start_time), tz).expect("patch");

        assert_eq!(
            patch.start.date_time.as_deref(),
            Some("2025-07-04T09:30:00+02:00")
        );
        assert_eq!(patch.end.date_time.as_deref(), Some("2025-07-04T10:30:00+02:00"));
        assert_eq!(patch.start.time_zone.as_deref(), Some("Europe/Berlin"));
    }

    #[test]
    fn reschedule_patch_without_time_is_all_day() {
        let patch = reschedule_patch(date("2025-12-31"), None, Tz::UTC).expect("patch");
        assert_eq!(patch.start.date.as_deref(), Some("2025-12-31"));
        assert_eq!(patch.end.date.as_deref(), Some("2026-01-01"));

        let json = serde_json::to_value(&patch).expect("serialize patch");
        assert!(json["start"]["dateTime"].is_null());
    }

    #[test]
    fn encode_task_event_uses_duration_from_metadata() {
        let task = Task {
            id: "tsk-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Dentist".to_string(),
            date: date("2025-01-20"),
            status: TaskStatus::Pending,
            position: 0,
            metadata: TaskMetadata {
                start_time: Some("15:00".to_string()),
                duration_minutes: Some(30),
                ..TaskMetadata::default()
            },
        };

        let event = encode_task_event(&task, Tz::UTC).expect("encode");
        assert_eq!(event.summary.as_deref(), Some("Dentist"));
        assert_eq!(event.start.date_time.as_deref(), Some("2025-01-20T15:00:00+00:00"));
        assert_eq!(event.end.date_time.as_deref(), Some("2025-01-20T15:30:00+00:00"));
    }
}
