use crate::domain::event_extractor::{CandidateEvent, extract_event};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gmail_client::GmailClient;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSuggestion {
    pub message_id: String,
    pub subject: String,
    pub candidate: CandidateEvent,
}

/// Runs the extractor over recent inbox messages. Messages without any date
/// signal are dropped.
pub async fn suggest_from_inbox<G>(
    gmail: &G,
    access_token: &str,
    query: &str,
    max_results: u32,
    today: NaiveDate,
) -> Result<Vec<EmailSuggestion>, InfraError>
where
    G: GmailClient + ?Sized,
{
    let messages = gmail
        .list_recent_messages(access_token, query, max_results)
        .await?;
    let total = messages.len();

    let suggestions: Vec<EmailSuggestion> = messages
        .into_iter()
        .filter_map(|message| {
            extract_event(&message.subject, &message.snippet, today).map(|candidate| {
                EmailSuggestion {
                    message_id: message.id,
                    subject: message.subject,
                    candidate,
                }
            })
        })
        .collect();

    log::info!(
        "email suggestions: {} of {total} messages carry a date",
        suggestions.len()
    );
    Ok(suggestions)
}
