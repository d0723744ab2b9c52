use crate::domain::models::AccessToken;
use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Cached Google access token. Lifecycle: saved after sign-in, read before each
/// Google call, deleted on sign-out.
pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &AccessToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<AccessToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("taskmaster.google", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &AccessToken) -> Result<(), InfraError> {
        let payload =
            serde_json::to_string(token).map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<AccessToken>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        let token = serde_json::from_str::<AccessToken>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(token))
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<AccessToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &AccessToken) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<AccessToken>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

/// Returns the cached token when it is still usable at `now`.
pub fn usable_token(
    store: &dyn CredentialStore,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Option<String>, InfraError> {
    Ok(store
        .load_token()?
        .filter(|token| token.is_valid_at(now, 60))
        .map(|token| token.access_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn expired_tokens_are_not_usable() {
        let store = InMemoryCredentialStore::default();
        let now = Utc::now();
        store
            .save_token(&AccessToken {
                access_token: "ya29.token".to_string(),
                expires_at: now + Duration::seconds(30),
                scope: None,
            })
            .expect("save");
        assert_eq!(usable_token(&store, now).expect("read"), None);

        store
            .save_token(&AccessToken {
                access_token: "ya29.token".to_string(),
                expires_at: now + Duration::hours(1),
                scope: None,
            })
            .expect("save");
        assert_eq!(
            usable_token(&store, now).expect("read"),
            Some("ya29.token".to_string())
        );

        store.delete_token().expect("delete");
        assert!(store.load_token().expect("load").is_none());
    }
}
