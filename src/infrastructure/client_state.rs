//! Small persisted client flags.
//!
//! Keys (JSON object in `state/client_state.json`):
//! - `subscriptionIntent`: checkout session token recorded when the user starts a
//!   checkout; cleared once the session has been verified either way.
//! - `subscriptionActive`: set after a paid session is verified; cleared only by
//!   `clear_all` (sign-out).

use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_intent: Option<String>,
    #[serde(default)]
    pub subscription_active: bool,
}

pub trait ClientStateStore: Send + Sync {
    fn load(&self) -> Result<ClientState, InfraError>;
    fn store(&self, state: &ClientState) -> Result<(), InfraError>;

    fn set_subscription_intent(&self, session_token: &str) -> Result<(), InfraError> {
        let session_token = session_token.trim();
        if session_token.is_empty() {
            return Err(InfraError::InvalidInput(
                "subscription session token must not be empty".to_string(),
            ));
        }
        let mut state = self.load()?;
        state.subscription_intent = Some(session_token.to_string());
        self.store(&state)
    }

    fn clear_subscription_intent(&self) -> Result<(), InfraError> {
        let mut state = self.load()?;
        state.subscription_intent = None;
        self.store(&state)
    }

    fn set_subscription_active(&self, active: bool) -> Result<(), InfraError> {
        let mut state = self.load()?;
        state.subscription_active = active;
        self.store(&state)
    }

    fn clear_all(&self) -> Result<(), InfraError> {
        self.store(&ClientState::default())
    }
}

#[derive(Debug, Clone)]
pub struct FileClientStateStore {
    path: PathBuf,
}

impl FileClientStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ClientStateStore for FileClientStateStore {
    fn load(&self) -> Result<ClientState, InfraError> {
        if !self.path.exists() {
            return Ok(ClientState::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(ClientState::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn store(&self, state: &ClientState) -> Result<(), InfraError> {
        let formatted = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, format!("{formatted}\n"))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryClientStateStore {
    state: Mutex<ClientState>,
}

impl ClientStateStore for InMemoryClientStateStore {
    fn load(&self) -> Result<ClientState, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("client state lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn store(&self, state: &ClientState) -> Result<(), InfraError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("client state lock poisoned: {error}")))?;
        *guard = state.clone();
        Ok(())
    }
}
