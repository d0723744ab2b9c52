use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{EventTimePatch, GoogleCalendarEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

#[derive(Debug, Clone)]
pub struct ListEventsRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<String, InfraError>;

    async fn patch_event_time(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventTimePatch,
    ) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidInput(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|error| InfraError::Remote(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Remote("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, InfraError> {
        let mut url = Self::events_endpoint(calendar_id)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Remote("calendar events URL cannot be a base".to_string())
            })?;
            segments.push(event_id);
        }
        Ok(url)
    }

    async fn read_body(response: reqwest::Response, action: &str) -> Result<String, InfraError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading {action} response: {error}")))?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "2500"),
                ])
                .query(&[
                    ("timeMin", request.time_min.to_rfc3339()),
                    ("timeMax", request.time_max.to_rfc3339()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await.map_err(|error| {
                InfraError::Remote(format!("network error while listing calendar events: {error}"))
            })?;
            let body = Self::read_body(response, "events list").await?;

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::Remote(format!("invalid events list payload: {error}; body={body}"))
            })?;
            events.extend(parsed.items.take().unwrap_or_default());

            match parsed.next_page_token.take() {
                Some(next_page_token) => page_token = Some(next_page_token),
                None => break,
            }
        }

        Ok(events)
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<String, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = Self::events_endpoint(calendar_id)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while creating event: {error}")))?;
        let body = Self::read_body(response, "event create").await?;

        let parsed: GoogleCalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid event create payload: {error}; body={body}"))
        })?;
        parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InfraError::Remote("event create response did not include id".to_string()))
    }

    async fn patch_event_time(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &EventTimePatch,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = Self::event_endpoint(calendar_id, event_id)?;
        let response = self
            .client
            .patch(endpoint)
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while patching event: {error}")))?;
        Self::read_body(response, "event patch").await?;
        Ok(())
    }
}
