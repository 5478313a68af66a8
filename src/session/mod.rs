//! Session state: the access/refresh token pair and the identity derived
//! from it, mirrored into durable storage so it survives restarts.

pub mod identity;
pub mod storage;

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SessionConfig;

pub use identity::{decode_identity, Identity};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

/// Snapshot of the authentication state.
///
/// The identity is always computed from the access token, so the two are
/// set and cleared together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<Identity>,
}

impl Session {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        let identity = access_token.as_deref().and_then(decode_identity);
        Self {
            access_token,
            refresh_token,
            identity,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Owner of the live session and its persisted copy.
///
/// Storage failures are logged and never fail the caller: the in-memory
/// session stays authoritative for the life of the process.
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    access_key: String,
    refresh_key: String,
    session: RwLock<Session>,
}

impl TokenStore {
    /// Rehydrate the session from storage.
    pub fn open(storage: Arc<dyn Storage>, config: &SessionConfig) -> Self {
        let access = read_key(storage.as_ref(), &config.access_key);
        let refresh = read_key(storage.as_ref(), &config.refresh_key);
        debug!(
            "Session restored (access token: {}, refresh token: {})",
            access.is_some(),
            refresh.is_some()
        );

        Self {
            storage,
            access_key: config.access_key.clone(),
            refresh_key: config.refresh_key.clone(),
            session: RwLock::new(Session::new(access, refresh)),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    /// Replace both tokens in memory and in storage.
    pub fn set_pair(&self, access_token: &str, refresh_token: &str) {
        *self.write() = Session::new(
            Some(access_token.to_string()),
            Some(refresh_token.to_string()),
        );

        if let Err(e) = self.storage.set(&self.access_key, access_token) {
            warn!("Failed to persist access token: {}", e);
        }
        if let Err(e) = self.storage.set(&self.refresh_key, refresh_token) {
            warn!("Failed to persist refresh token: {}", e);
        }
    }

    /// Drop both tokens. Returns whether a session was present.
    pub fn clear(&self) -> bool {
        let was_present = {
            let mut session = self.write();
            let present = !session.is_empty();
            *session = Session::default();
            present
        };

        if let Err(e) = self.storage.remove(&self.access_key) {
            warn!("Failed to remove persisted access token: {}", e);
        }
        if let Err(e) = self.storage.remove(&self.refresh_key) {
            warn!("Failed to remove persisted refresh token: {}", e);
        }

        was_present
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_key(storage: &dyn Storage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read '{}' from session storage: {}", key, e);
            None
        }
    }
}
