use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::auth::{TokenPair, TokenRefresher};
use crate::client::request::RequestDescriptor;
use crate::client::transport::{Dispatch, Failure};
use crate::error::ApiError;
use crate::session::TokenStore;

/// Token refresher with a scripted result, optionally held until `release`.
pub struct FakeRefresher {
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    result: Result<TokenPair, ApiError>,
}

impl FakeRefresher {
    fn build(result: Result<TokenPair, ApiError>, gated: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: gated.then(|| Semaphore::new(0)),
            result,
        }
    }

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 3600,
        }
    }

    pub fn success(access: &str, refresh: &str) -> Self {
        Self::build(Ok(Self::pair(access, refresh)), false)
    }

    pub fn gated_success(access: &str, refresh: &str) -> Self {
        Self::build(Ok(Self::pair(access, refresh)), true)
    }

    pub fn failure(error: ApiError) -> Self {
        Self::build(Err(error), false)
    }

    pub fn gated_failure(error: ApiError) -> Self {
        Self::build(Err(error), true)
    }

    /// Let a gated refresh finish
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| ApiError::network_unreachable("gate closed"))?;
        }
        self.result.clone()
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub token: Option<String>,
    pub replay: bool,
}

/// Accepts exactly one access token, like a server that has rotated keys.
pub struct FakeApi {
    tokens: Arc<TokenStore>,
    valid_token: String,
    rejected_paths: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeApi {
    pub fn new(tokens: Arc<TokenStore>, valid_token: &str) -> Self {
        Self {
            tokens,
            valid_token: valid_token.to_string(),
            rejected_paths: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer 401 on `path` whatever the token
    pub fn always_reject(&self, path: &str) {
        self.rejected_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatch for FakeApi {
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Value, Failure> {
        let token = if descriptor.credentials() {
            self.tokens.access_token()
        } else {
            None
        };
        self.calls.lock().unwrap().push(RecordedCall {
            path: descriptor.path().to_string(),
            token: token.clone(),
            replay: descriptor.is_replay(),
        });

        let rejected = self.rejected_paths.lock().unwrap().contains(descriptor.path());
        if rejected || token.as_deref() != Some(self.valid_token.as_str()) {
            return Err(Failure::Auth {
                sent_with: token,
                message: "token expired".to_string(),
            });
        }
        Ok(json!({ "path": descriptor.path() }))
    }
}
