use crate::application::task_board::{ImportReport, TaskBoard};
use crate::domain::models::ExternalEvent;
use crate::domain::week::monday_of_week;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{GoogleCalendarEvent, decode_external_event};
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ListEventsRequest};
use crate::infrastructure::task_store::TaskStore;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::{Duration as TokioDuration, sleep};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CalendarImportResult {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub fetched: usize,
    pub skipped: usize,
    pub report: ImportReport,
}

/// Pulls the current week's events from one calendar and merges them onto a
/// task board.
pub struct CalendarImportService<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    timezone: Tz,
    retry_policy: RetryPolicy,
}

impl<C> CalendarImportService<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(calendar_client: Arc<C>, timezone: Tz) -> Self {
        Self {
            calendar_client,
            timezone,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Monday 00:00 through the following Monday 00:00, local time.
    pub fn week_window(&self, today: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), InfraError> {
        let monday = monday_of_week(today);
        let start = self.local_midnight(monday)?;
        let end = self.local_midnight(monday + Duration::days(7))?;
        Ok((start, end))
    }

    pub async fn fetch_week(
        &self,
        access_token: &str,
        calendar_id: &str,
        today: NaiveDate,
    ) -> Result<(Vec<ExternalEvent>, usize), InfraError> {
        let (time_min, time_max) = self.week_window(today)?;
        let events = self
            .list_events_with_retry(
                access_token,
                calendar_id,
                ListEventsRequest { time_min, time_max },
            )
            .await?;

        let mut decoded = Vec::with_capacity(events.len());
        let mut skipped = 0;
        for event in &events {
            match decode_external_event(event, self.timezone) {
                Ok(Some(external)) => decoded.push(external),
                Ok(None) => skipped += 1,
                Err(error) => {
                    log::warn!("calendar import: skipping undecodable event: {error}");
                    skipped += 1;
                }
            }
        }
        Ok((decoded, skipped))
    }

    pub async fn import_week<S, B>(
        &self,
        board: &TaskBoard<S, B>,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<CalendarImportResult, InfraError>
    where
        S: TaskStore,
        B: GoogleCalendarClient,
    {
        let today = board.today();
        let (events, skipped) = self.fetch_week(access_token, calendar_id, today).await?;
        let report = board.import_events(&events).await?;
        let monday = monday_of_week(today);
        Ok(CalendarImportResult {
            window_start: monday,
            window_end: monday + Duration::days(6),
            fetched: events.len() + skipped,
            skipped,
            report,
        })
    }

    async fn list_events_with_retry(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self
                .calendar_client
                .list_events(access_token, calendar_id, request.clone())
                .await
            {
                Ok(events) => return Ok(events),
                Err(error) if should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    log::warn!("calendar import: list attempt {} failed, retrying: {error}", attempt + 1);
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn local_midnight(&self, date: NaiveDate) -> Result<DateTime<Utc>, InfraError> {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            InfraError::InvalidInput(format!("no midnight on {date}"))
        })?;
        self.timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|value| value.with_timezone(&Utc))
            .ok_or_else(|| {
                InfraError::InvalidInput(format!(
                    "midnight of {date} does not exist in {}",
                    self.timezone.name()
                ))
            })
    }
}

fn should_retry(error: &InfraError) -> bool {
    match error {
        InfraError::Remote(message) => {
            let message = message.to_ascii_lowercase();
            message.contains("network error")
                || message.contains("timeout")
                || message.contains("timed out")
                || message.contains("temporarily unavailable")
                || message.contains("connection reset")
        }
        _ => false,
    }
}
