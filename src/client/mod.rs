pub mod coordinator;
pub mod request;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{self, HttpTokenRefresher, LoginRequest, TokenPair};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::notify::Notifier;
use crate::realtime::{ForceLogoutSignal, Subscription};
use crate::session::{Session, Storage, TokenStore};

pub use coordinator::{AuthCoordinator, RefreshStatus, SESSION_EXPIRED_MESSAGE};
pub use request::{Attempt, RequestDescriptor};
pub use transport::{Dispatch, Failure, Transport};

/// Entry point for every API call the console makes.
///
/// Calls that come back unauthenticated are handed to the
/// [`AuthCoordinator`], so callers only ever see the replayed result or a
/// terminal error.
pub struct ApiClient {
    transport: Arc<Transport>,
    coordinator: Arc<AuthCoordinator>,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let tokens = Arc::new(TokenStore::open(storage, &config.session));
        let transport = Arc::new(Transport::new(&config.api, tokens.clone(), notifier.clone())?);
        let refresher = Arc::new(HttpTokenRefresher::new(transport.clone()));
        let coordinator = Arc::new(AuthCoordinator::new(
            tokens.clone(),
            refresher,
            transport.clone(),
            notifier,
            &config.session,
        ));

        Ok(Self {
            transport,
            coordinator,
            tokens,
        })
    }

    /// Issue a call and return the unwrapped envelope payload.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        match self.transport.dispatch(&descriptor).await {
            Ok(data) => Ok(data),
            Err(Failure::Rejected(e)) => Err(e),
            // Calls made without credentials have nothing to recover
            Err(Failure::Auth { message, .. }) if !descriptor.credentials() => {
                Err(ApiError::unauthenticated(message))
            }
            Err(Failure::Auth { sent_with, message }) => {
                self.coordinator
                    .handle_auth_failure(descriptor, sent_with, message)
                    .await
            }
        }
    }

    pub async fn call<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        let data = self.send(descriptor).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(RequestDescriptor::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call(RequestDescriptor::post(path).with_json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call(RequestDescriptor::put(path).with_json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(RequestDescriptor::delete(path)).await
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let descriptor = RequestDescriptor::post(auth::LOGIN_PATH)
            .without_credentials()
            .with_json(&LoginRequest { username, password })?;
        let pair: TokenPair = self.call(descriptor).await?;

        self.coordinator.begin_session(&pair);
        info!("Logged in as {}", username);
        Ok(self.session())
    }

    /// Explicit logout. The server call is best effort; the local session is
    /// always cleared.
    pub async fn logout(&self) {
        if self.tokens.access_token().is_some() {
            let descriptor = RequestDescriptor::post(auth::LOGOUT_PATH);
            // Straight to the transport: a 401 here must not trigger a refresh
            if let Err(e) = self.transport.dispatch(&descriptor).await {
                warn!("Remote logout failed: {:?}", e);
            }
        }
        self.coordinator.end_session();
        info!("Logged out");
    }

    /// Refresh the token pair now, sharing any refresh already in flight.
    pub async fn refresh_now(&self) -> Result<Session, ApiError> {
        self.coordinator.refresh_now().await?;
        Ok(self.session())
    }

    /// Profile of the logged-in user, looked up by the id in the access token.
    pub async fn current_user(&self) -> Result<Value, ApiError> {
        let user_id = self
            .session()
            .identity()
            .and_then(|identity| identity.user_id.clone())
            .ok_or_else(|| ApiError::unauthenticated("No user identity in the current session"))?;
        self.get(&auth::user_path(&user_id)).await
    }

    pub fn session(&self) -> Session {
        self.tokens.snapshot()
    }

    pub fn coordinator(&self) -> &Arc<AuthCoordinator> {
        &self.coordinator
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Tear the session down whenever the realtime channel pushes a forced
    /// logout, until the returned handle is dropped.
    pub fn attach_force_logout(&self, signal: &ForceLogoutSignal) -> Subscription {
        self.coordinator.attach_force_logout(signal)
    }
}
