use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::request::RequestDescriptor;
use crate::client::transport::{Failure, Transport};
use crate::error::ApiError;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

pub fn user_path(user_id: &str) -> String {
    format!("/system/users/{}", user_id)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Token payload returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// `POST /auth/refresh` through the plain transport.
///
/// A 401 here is final: it is never routed back into session recovery.
pub struct HttpTokenRefresher {
    transport: Arc<Transport>,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let descriptor = RequestDescriptor::post(REFRESH_PATH)
            .without_credentials()
            .with_json(&RefreshRequest { refresh_token })?;

        // Not reported here: the coordinator owns the user-facing outcome
        match self.transport.exchange(&descriptor).await {
            Ok(data) => Ok(serde_json::from_value(data)?),
            Err(Failure::Auth { message, .. }) => Err(ApiError::unauthenticated(message)),
            Err(Failure::Rejected(e)) => Err(e),
        }
    }
}
