//! Heuristic extraction of calendar dates from free text (email subject + body).
//!
//! Strategies run in a fixed order. A fuzzy-timeline phrase short-circuits with a
//! fixed three-slot suggestion; otherwise weekday names, month/day literals and
//! relative keywords accumulate into one date-sorted list. A bare `M/D` literal is
//! only consulted when nothing else matched.

use crate::domain::week::weekday_name;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const FUZZY_TIMELINE_PHRASES: [&str; 3] =
    ["within two weeks", "next couple of weeks", "within 2 weeks"];
const FUZZY_TIMELINE_OFFSETS: [i64; 3] = [2, 5, 9];
const FUZZY_TIMELINE_REASON: &str = "Suggested slot within the next two weeks";
const UNTITLED_EVENT: &str = "Untitled event";

const WEEKDAY_KEYWORDS: [(&str, Weekday); 7] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

const MONTHS_SHORT: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MONTHS_FULL: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})\s*(am|pm)?").expect("valid time pattern"));

// Full names come first so the alternation prefers "january" over "jan".
static MONTH_DAY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec)\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .expect("valid month/day pattern")
});

static SLASH_DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})").expect("valid slash date pattern"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Range,
    Single,
    Multiple,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateOption {
    pub date: NaiveDate,
    pub label: String,
    /// `HH:MM`, 24-hour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateEvent {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub options: Vec<DateOption>,
}

/// Returns `None` when the text carries no temporal signal.
pub fn extract_event(subject: &str, body: &str, today: NaiveDate) -> Option<CandidateEvent> {
    let text = format!("{subject} {body}").to_lowercase();
    let title = match subject.trim() {
        "" => UNTITLED_EVENT.to_string(),
        trimmed => trimmed.to_string(),
    };
    let default_time = extract_time(&text);

    if FUZZY_TIMELINE_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
    {
        let options = FUZZY_TIMELINE_OFFSETS
            .iter()
            .map(|offset| {
                let date = today + Duration::days(*offset);
                DateOption {
                    date,
                    label: date.format("%a, %b %-d").to_string(),
                    time: default_time.clone(),
                    reason: FUZZY_TIMELINE_REASON.to_string(),
                }
            })
            .collect();
        return Some(CandidateEvent {
            title,
            kind: SuggestionKind::Range,
            options,
        });
    }

    let mut options: Vec<DateOption> = Vec::new();

    for (keyword, weekday) in WEEKDAY_KEYWORDS {
        if text.contains(keyword) {
            let date = next_occurrence(today, weekday);
            let label = weekday_name(weekday);
            push_unique(
                &mut options,
                DateOption {
                    date,
                    label: label.to_string(),
                    time: default_time.clone(),
                    reason: format!("Mentions {label}"),
                },
            );
        }
    }

    for captures in MONTH_DAY_PATTERN.captures_iter(&text) {
        let Some(month) = month_number(&captures[1]) else {
            continue;
        };
        let Ok(day) = captures[2].parse::<u32>() else {
            continue;
        };
        let Some(date) = resolve_month_day(today, month, day) else {
            continue;
        };
        let label = date.format("%B %-d").to_string();
        push_unique(
            &mut options,
            DateOption {
                date,
                reason: format!("Mentions {label}"),
                label,
                time: default_time.clone(),
            },
        );
    }

    for (keyword, offset, label) in [("tomorrow", 1, "Tomorrow"), ("today", 0, "Today")] {
        if text.contains(keyword) {
            push_unique(
                &mut options,
                DateOption {
                    date: today + Duration::days(offset),
                    label: label.to_string(),
                    time: default_time.clone(),
                    reason: format!("Mentions {keyword}"),
                },
            );
        }
    }

    if !options.is_empty() {
        options.sort_by_key(|option| option.date);
        let kind = if options.len() > 1 {
            SuggestionKind::Multiple
        } else {
            SuggestionKind::Single
        };
        return Some(CandidateEvent {
            title,
            kind,
            options,
        });
    }

    let captures = SLASH_DATE_PATTERN.captures(&text)?;
    let month = captures[1].parse::<u32>().ok()?;
    let day = captures[2].parse::<u32>().ok()?;
    let date = resolve_month_day(today, month, day)?;
    Some(CandidateEvent {
        title,
        kind: SuggestionKind::Single,
        options: vec![DateOption {
            date,
            label: date.format("%B %-d").to_string(),
            time: default_time,
            reason: format!("Mentions {month}/{day}"),
        }],
    })
}

/// First time-of-day literal in `text`, normalised to 24-hour `HH:MM`.
pub fn extract_time(text: &str) -> Option<String> {
    let captures = TIME_PATTERN.captures(text)?;
    let mut hour = captures[1].parse::<u32>().ok()?;
    let minute = captures[2].parse::<u32>().ok()?;
    match captures.get(3).map(|meridiem| meridiem.as_str()) {
        Some("pm") if hour < 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}

/// The coming instance of `weekday`; today itself rolls over to next week.
fn next_occurrence(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let mut diff = i64::from(weekday.num_days_from_sunday())
        - i64::from(today.weekday().num_days_from_sunday());
    if diff <= 0 {
        diff += 7;
    }
    today + Duration::days(diff)
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS_SHORT
        .iter()
        .position(|candidate| *candidate == name)
        .or_else(|| MONTHS_FULL.iter().position(|candidate| *candidate == name))
        .and_then(|index| u32::try_from(index + 1).ok())
}

/// Month/day in the reference year, rolled to next year when already past.
fn resolve_month_day(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        return NaiveDate::from_ymd_opt(today.year() + 1, month, day);
    }
    Some(date)
}

fn push_unique(options: &mut Vec<DateOption>, option: DateOption) {
    if options.iter().any(|existing| existing.date == option.date) {
        return;
    }
    options.push(option);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn weekday_with_pm_time_resolves_next_occurrence() {
        let today = date("2025-01-15");
        let event = extract_event("Sync", "Let's meet Monday at 3:30pm", today).expect("event");

        assert_eq!(event.kind, SuggestionKind::Single);
        assert_eq!(event.title, "Sync");
        assert_eq!(event.options.len(), 1);
        assert_eq!(event.options[0].date, date("2025-01-20"));
        assert_eq!(event.options[0].time.as_deref(), Some("15:30"));
        assert_eq!(event.options[0].label, "Monday");
    }

    #[test]
    fn past_month_day_rolls_to_next_year() {
        let today = date("2025-12-20");
        let event = extract_event("Kickoff", "Planning session on Jan 5th", today).expect("event");

        assert_eq!(event.options.len(), 1);
        assert_eq!(event.options[0].date, date("2026-01-05"));
        assert_eq!(event.options[0].date.year(), 2026);
    }

    #[test]
    fn future_month_day_stays_in_current_year() {
        let today = date("2025-03-01");
        let event = extract_event("", "Deadline is September 12", today).expect("event");

        assert_eq!(event.title, "Untitled event");
        assert_eq!(event.options[0].date, date("2025-09-12"));
        assert_eq!(event.options[0].label, "September 12");
    }

    #[test]
    fn fuzzy_timeline_wins_over_explicit_dates() {
        let today = date("2025-01-15");
        let event = extract_event(
            "Catch up",
            "Can we talk within 2 weeks? Maybe Friday, Jan 30 or tomorrow at 9:00 am",
            today,
        )
        .expect("event");

        assert_eq!(event.kind, SuggestionKind::Range);
        let dates: Vec<NaiveDate> = event.options.iter().map(|option| option.date).collect();
        assert_eq!(
            dates,
            vec![date("2025-01-17"), date("2025-01-20"), date("2025-01-24")]
        );
        assert!(event
            .options
            .iter()
            .all(|option| option.time.as_deref() == Some("09:00")));
    }

    #[test]
    fn weekday_and_matching_month_day_are_deduplicated() {
        let today = date("2025-01-15");
        let event = extract_event("Review", "Friday Jan 17 works", today).expect("event");

        assert_eq!(event.kind, SuggestionKind::Single);
        assert_eq!(event.options.len(), 1);
        assert_eq!(event.options[0].label, "Friday");
    }

    #[test]
    fn multiple_signals_are_sorted_by_date() {
        let today = date("2025-01-15");
        let event = extract_event("Options", "Either Thursday, tomorrow or today", today)
            .expect("event");

        assert_eq!(event.kind, SuggestionKind::Multiple);
        let labels: Vec<&str> = event.options.iter().map(|option| option.label.as_str()).collect();
        // "tomorrow" lands on the same date as Thursday and is dropped.
        assert_eq!(labels, vec!["Today", "Thursday"]);
        assert_eq!(event.options[0].date, date("2025-01-15"));
        assert_eq!(event.options[1].date, date("2025-01-16"));
    }

    #[test]
    fn weekday_matches_inside_other_words() {
        let today = date("2025-01-15");
        let event = extract_event("Notes", "see #mondaymotivation", today).expect("event");
        assert_eq!(event.options[0].date, date("2025-01-20"));
    }

    #[test]
    fn same_weekday_as_today_rolls_to_next_week() {
        let today = date("2025-01-15");
        let event = extract_event("Standup", "every wednesday", today).expect("event");
        assert_eq!(event.options[0].date, date("2025-01-22"));
    }

    #[test]
    fn slash_date_is_fallback_only() {
        let today = date("2025-02-01");
        let event = extract_event("Invoice", "due 1/25 at 5:00 PM", today).expect("event");

        assert_eq!(event.kind, SuggestionKind::Single);
        assert_eq!(event.options[0].date, date("2026-01-25"));
        assert_eq!(event.options[0].time.as_deref(), Some("17:00"));
    }

    #[test]
    fn invalid_calendar_literals_are_skipped() {
        let today = date("2025-01-15");
        assert!(extract_event("Oops", "feb 30 or 13/45", today).is_none());
    }

    #[test]
    fn returns_none_without_temporal_signal() {
        let today = date("2025-01-15");
        assert!(extract_event("Newsletter", "Nothing scheduled here", today).is_none());
    }

    #[test]
    fn time_normalisation_handles_noon_and_midnight() {
        assert_eq!(extract_time("at 12:15 am"), Some("00:15".to_string()));
        assert_eq!(extract_time("at 12:15 pm"), Some("12:15".to_string()));
        assert_eq!(extract_time("at 14:00"), Some("14:00".to_string()));
        assert_eq!(extract_time("at 7:05am then 9:00pm"), Some("07:05".to_string()));
        assert_eq!(extract_time("ratio 99:99"), None);
    }

    fn fuzzy_phrase() -> impl Strategy<Value = &'static str> {
        prop::sample::select(FUZZY_TIMELINE_PHRASES.to_vec())
    }

    fn filler_words() -> impl Strategy<Value = Vec<&'static str>> {
        prop::collection::vec(
            prop::sample::select(vec![
                "please", "join", "the", "call", "at", "3:00", "pm", "agenda", "review",
                "notes", "about", "budget",
            ]),
            0..8,
        )
    }

    // Fuzzy timeline phrases always produce the fixed +2/+5/+9 range.
    proptest! {
        #[test]
        fn fuzzy_phrase_always_yields_fixed_range(
            offset in 0i64..3650,
            phrase in fuzzy_phrase(),
            prefix in "[a-z0-9 /:]{0,40}",
            suffix in "[a-z0-9 /:]{0,40}"
        ) {
            let today = date("2020-01-01") + Duration::days(offset);
            let body = format!("{prefix} {phrase} {suffix} friday jan 3 tomorrow");
            let event = extract_event("Subject", &body, today).expect("range event");

            prop_assert_eq!(event.kind, SuggestionKind::Range);
            let offsets: Vec<i64> = event
                .options
                .iter()
                .map(|option| (option.date - today).num_days())
                .collect();
            prop_assert_eq!(offsets, vec![2, 5, 9]);
        }
    }

    // A single weekday mention resolves to its next occurrence within a week.
    proptest! {
        #[test]
        fn single_weekday_resolves_within_next_week(
            offset in 0i64..3650,
            weekday_index in 0usize..7,
            before in filler_words(),
            after in filler_words(),
            capitalize in any::<bool>()
        ) {
            let today = date("2020-01-01") + Duration::days(offset);
            let (keyword, weekday) = WEEKDAY_KEYWORDS[weekday_index];
            let mention = if capitalize { weekday_name(weekday).to_string() } else { keyword.to_string() };
            let body = format!("{} {} {}", before.join(" "), mention, after.join(" "));
            let event = extract_event("Meeting", &body, today).expect("weekday event");

            prop_assert_eq!(event.kind, SuggestionKind::Single);
            prop_assert_eq!(event.options.len(), 1);
            let days_ahead = (event.options[0].date - today).num_days();
            prop_assert!((1..=7).contains(&days_ahead));
            prop_assert_eq!(event.options[0].date.weekday(), weekday);
        }
    }

    // Extraction is a pure function of its inputs.
    proptest! {
        #[test]
        fn extraction_is_idempotent(
            offset in 0i64..3650,
            subject in "[A-Za-z0-9 :/]{0,30}",
            body in "[A-Za-z0-9 :/]{0,80}"
        ) {
            let today = date("2020-01-01") + Duration::days(offset);
            prop_assert_eq!(
                extract_event(&subject, &body, today),
                extract_event(&subject, &body, today)
            );
        }
    }
}
