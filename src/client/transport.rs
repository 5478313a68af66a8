use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::api::envelope::{classify, Outcome};
use crate::client::request::RequestDescriptor;
use crate::config::ApiConfig;
use crate::error::{ApiError, DEFAULT_NETWORK_MESSAGE};
use crate::notify::Notifier;
use crate::session::TokenStore;

pub const SERVER_FAULT_TITLE: &str = "System error";

/// Failure of a single exchange, before any session recovery.
#[derive(Debug, Clone)]
pub enum Failure {
    /// 401 from the server. `sent_with` is the bearer token the call carried.
    Auth {
        sent_with: Option<String>,
        message: String,
    },
    /// Anything else. `dispatch` has reported it to the notifier; `exchange`
    /// leaves that to the caller.
    Rejected(ApiError),
}

/// Issues one call and classifies the response.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Value, Failure>;
}

/// HTTP request pipeline: bearer attachment, envelope unwrapping, and
/// user-facing reporting of non-authentication failures.
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
    notifier: Arc<dyn Notifier>,
    log_requests: bool,
}

impl Transport {
    pub fn new(
        config: &ApiConfig,
        tokens: Arc<TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::configuration(format!("invalid base URL '{}': {}", config.base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            tokens,
            notifier,
            log_requests: config.enable_request_logging,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append an API path to the base URL, keeping any base path prefix.
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ApiError::configuration(format!("invalid request path '{}': {}", path, e)))
    }

    fn reject(&self, error: ApiError) -> Failure {
        match &error {
            ApiError::PermissionDenied(msg) => self.notifier.warning(msg),
            ApiError::ServerFault(msg) => self.notifier.notification(SERVER_FAULT_TITLE, msg),
            other => self.notifier.error(other.message()),
        }
        Failure::Rejected(error)
    }
}

impl Transport {
    /// Issue one call and classify the response without reporting anything
    /// to the notifier. Used for exchanges whose failures the caller reports
    /// itself, such as the token refresh.
    pub async fn exchange(&self, descriptor: &RequestDescriptor) -> Result<Value, Failure> {
        let url = self.url_for(descriptor.path()).map_err(Failure::Rejected)?;

        let sent_with = if descriptor.credentials() {
            self.tokens.access_token()
        } else {
            None
        };

        let mut request = self
            .http
            .request(descriptor.method().clone(), url)
            .headers(descriptor.headers().clone());
        if !descriptor.query().is_empty() {
            request = request.query(descriptor.query());
        }
        if let Some(token) = &sent_with {
            request = request.bearer_auth(token);
        }
        if let Some(body) = descriptor.body() {
            request = request.json(body);
        }

        if self.log_requests {
            debug!(
                "{} {} ({:?}, authenticated: {})",
                descriptor.method(),
                descriptor.path(),
                descriptor.attempt(),
                sent_with.is_some()
            );
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed without a response: {}", descriptor.method(), descriptor.path(), e);
                return Err(Failure::Rejected(ApiError::network_unreachable(DEFAULT_NETWORK_MESSAGE)));
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{} {} body could not be read: {}", descriptor.method(), descriptor.path(), e);
                return Err(Failure::Rejected(ApiError::network_unreachable(DEFAULT_NETWORK_MESSAGE)));
            }
        };

        let body = if bytes.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            )
        };

        match classify(status, body) {
            Outcome::Success(data) => Ok(data),
            Outcome::Unauthenticated(message) => {
                debug!("{} {} rejected as unauthenticated", descriptor.method(), descriptor.path());
                Err(Failure::Auth { sent_with, message })
            }
            Outcome::Forbidden(message) => Err(Failure::Rejected(ApiError::permission_denied(message))),
            Outcome::ServerFault(message) => Err(Failure::Rejected(ApiError::server_fault(message))),
            Outcome::Failed { code, message } => Err(Failure::Rejected(ApiError::request_failed(code, message))),
        }
    }
}

#[async_trait]
impl Dispatch for Transport {
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Value, Failure> {
        match self.exchange(descriptor).await {
            Err(Failure::Rejected(error)) => Err(self.reject(error)),
            other => other,
        }
    }
}
