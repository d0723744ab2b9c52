use crate::domain::week::weekday_name;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const HABIT_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    #[serde(alias = "todo", alias = "in-progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Completed => Self::Pending,
            Self::Pending | Self::InProgress => Self::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "in-progress" | "todo" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unsupported task status: {other}")),
        }
    }
}

/// Optional attributes a task may pick up from an external calendar or email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    /// Local time of day, `HH:MM` 24-hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
}

impl TaskMetadata {
    /// Union of both records; fields present in `incoming` win.
    pub fn merge(&mut self, incoming: &TaskMetadata) {
        merge_field(&mut self.calendar_event_id, &incoming.calendar_event_id);
        merge_field(&mut self.meeting_link, &incoming.meeting_link);
        merge_field(&mut self.start_time, &incoming.start_time);
        merge_field(&mut self.duration_minutes, &incoming.duration_minutes);
        merge_field(&mut self.note, &incoming.note);
        merge_field(&mut self.source_message_id, &incoming.source_message_id);
    }

    /// True when `incoming` carries a field this record is missing.
    pub fn gains_from(&self, incoming: &TaskMetadata) -> bool {
        (self.calendar_event_id.is_none() && incoming.calendar_event_id.is_some())
            || (self.meeting_link.is_none() && incoming.meeting_link.is_some())
            || (self.start_time.is_none() && incoming.start_time.is_some())
            || (self.duration_minutes.is_none() && incoming.duration_minutes.is_some())
            || (self.note.is_none() && incoming.note.is_some())
            || (self.source_message_id.is_none() && incoming.source_message_id.is_some())
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskMetadata::default()
    }

    pub fn parsed_start_time(&self) -> Option<NaiveTime> {
        self.start_time.as_deref().and_then(parse_hhmm)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(start_time) = self.start_time.as_deref() {
            validate_hhmm(start_time, "task.metadata.start_time")?;
        }
        if let Some(event_id) = self.calendar_event_id.as_deref() {
            validate_non_empty(event_id, "task.metadata.calendar_event_id")?;
        }
        Ok(())
    }
}

fn merge_field<T: Clone>(current: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *current = Some(value.clone());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Local calendar date; never derived from a UTC instant.
    pub date: NaiveDate,
    pub status: TaskStatus,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "TaskMetadata::is_empty")]
    pub metadata: TaskMetadata,
}

impl Task {
    pub fn day_name(&self) -> &'static str {
        weekday_name(self.date.weekday())
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.user_id, "task.user_id")?;
        validate_non_empty(&self.title, "task.title")?;
        self.metadata.validate()
    }
}

/// An event read from an external calendar, already resolved to a local date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalEvent {
    pub event_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub duration_minutes: Option<u32>,
    pub meeting_link: Option<String>,
}

impl ExternalEvent {
    pub fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            calendar_event_id: Some(self.event_id.clone()),
            meeting_link: self.meeting_link.clone(),
            start_time: self.start_time.clone(),
            duration_minutes: self.duration_minutes,
            note: None,
            source_message_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Indexed Monday (0) through Sunday (6).
    pub history: [bool; HABIT_DAYS],
}

impl Habit {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            history: [false; HABIT_DAYS],
        }
    }

    pub fn toggle_day(&mut self, day_index: usize) -> Result<bool, String> {
        let Some(slot) = self.history.get_mut(day_index) else {
            return Err(format!(
                "habit day index {day_index} out of range 0..{HABIT_DAYS}"
            ));
        };
        *slot = !*slot;
        Ok(*slot)
    }

    pub fn reset_week(&mut self) {
        self.history = [false; HABIT_DAYS];
    }

    pub fn completed_days(&self) -> usize {
        self.history.iter().filter(|done| **done).count()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "habit.id")?;
        validate_non_empty(&self.user_id, "habit.user_id")?;
        validate_non_empty(&self.name, "habit.name")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalScope {
    General,
    Monthly,
}

impl GoalScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unsupported goal scope: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub position: i64,
    pub scope: GoalScope,
}

impl Goal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.user_id, "goal.user_id")?;
        validate_non_empty(&self.text, "goal.text")?;
        if self.position < 0 {
            return Err("goal.position must be >= 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
}

impl AccessToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

pub(crate) fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))
}

pub(crate) fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}
