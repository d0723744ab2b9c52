use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::parse_timezone;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_USER_ID: &str = "local";
const DEFAULT_CALENDAR_ID: &str = "primary";
const DEFAULT_GMAIL_QUERY: &str = "newer_than:7d";
const DEFAULT_GMAIL_MAX_RESULTS: u32 = 20;

pub const GOOGLE_ACCESS_TOKEN_KEYS: [&str; 2] =
    ["TASKMASTER_GOOGLE_ACCESS_TOKEN", "GOOGLE_ACCESS_TOKEN"];
pub const STRIPE_SECRET_KEY_KEYS: [&str; 2] = ["TASKMASTER_STRIPE_SECRET_KEY", "STRIPE_SECRET_KEY"];

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_name: String,
    pub timezone: Tz,
    pub user_id: String,
    pub calendar_id: String,
    pub gmail_query: String,
    pub gmail_max_results: u32,
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "Task Master",
        "timezone": "UTC",
        "userId": DEFAULT_USER_ID,
        "calendarId": DEFAULT_CALENDAR_ID,
        "gmail": {
            "query": DEFAULT_GMAIL_QUERY,
            "maxResults": DEFAULT_GMAIL_MAX_RESULTS
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn string_field<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let timezone = parse_timezone(string_field(&app, "/timezone").unwrap_or("UTC"))?;
    let gmail_max_results = app
        .pointer("/gmail/maxResults")
        .and_then(serde_json::Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_GMAIL_MAX_RESULTS);

    Ok(AppConfig {
        app_name: string_field(&app, "/appName")
            .unwrap_or("Task Master")
            .to_string(),
        timezone,
        user_id: string_field(&app, "/userId")
            .unwrap_or(DEFAULT_USER_ID)
            .to_string(),
        calendar_id: string_field(&app, "/calendarId")
            .unwrap_or(DEFAULT_CALENDAR_ID)
            .to_string(),
        gmail_query: string_field(&app, "/gmail/query")
            .unwrap_or(DEFAULT_GMAIL_QUERY)
            .to_string(),
        gmail_max_results,
    })
}

pub fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

pub fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::next_id;

    fn temp_config_dir() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "taskmaster-config-{}-{}",
            std::process::id(),
            next_id("cfg")
        ));
        fs::create_dir_all(&path).expect("create config dir");
        path
    }

    #[test]
    fn defaults_are_written_and_loaded() {
        let dir = temp_config_dir();
        ensure_default_configs(&dir).expect("write defaults");
        let config = load_app_config(&dir).expect("load config");

        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.user_id, "local");
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.gmail_max_results, 20);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = temp_config_dir();
        fs::write(dir.join(APP_JSON), r#"{"schema": 2}"#).expect("write config");
        assert!(matches!(
            load_app_config(&dir),
            Err(InfraError::InvalidConfig(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let dir = temp_config_dir();
        fs::write(dir.join(APP_JSON), r#"{"schema": 1, "timezone": "Mars/Olympus"}"#)
            .expect("write config");
        assert!(load_app_config(&dir).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn lookup_prefers_first_non_empty_key() {
        let lookup = |key: &str| match key {
            "TASKMASTER_GOOGLE_ACCESS_TOKEN" => Some("   ".to_string()),
            "GOOGLE_ACCESS_TOKEN" => Some("ya29.fallback".to_string()),
            _ => None,
        };
        assert_eq!(
            optional_lookup_value(&lookup, &GOOGLE_ACCESS_TOKEN_KEYS),
            Some("ya29.fallback".to_string())
        );

        let missing = required_lookup_value(&|_: &str| None, &STRIPE_SECRET_KEY_KEYS, "stripe secret key");
        match missing {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("stripe secret key")),
            _ => panic!("expected invalid config error"),
        }
    }
}
