//! Single-flight session refresh.
//!
//! Every authentication failure lands here. The first one starts a refresh;
//! the ones that arrive while it is running join its queue. When the refresh
//! settles the queue is drained in arrival order: replayed with the new
//! access token on success, rejected on failure. Refresh state is a plain
//! mutex whose critical sections never await, so the "already refreshing?"
//! check and the enqueue are one step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::auth::{TokenPair, TokenRefresher};
use crate::client::request::RequestDescriptor;
use crate::client::transport::{Dispatch, Failure};
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::notify::Notifier;
use crate::realtime::{ForceLogoutSignal, Subscription};
use crate::session::TokenStore;

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";
pub const NO_REFRESH_TOKEN_MESSAGE: &str = "No refresh token available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Refreshing,
}

enum Pending {
    Request {
        descriptor: RequestDescriptor,
        reply: oneshot::Sender<Result<Value, ApiError>>,
    },
    Refresh {
        reply: oneshot::Sender<Result<(), ApiError>>,
    },
}

impl Pending {
    fn reject(self, error: ApiError) {
        // A closed receiver means the caller went away; nothing to report
        match self {
            Pending::Request { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Pending::Refresh { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Pending>,
    // Bumped on every session teardown or login; a refresh started under an
    // older epoch never writes its tokens.
    epoch: u64,
    // Session-expired notice already shown for the current session
    expiry_announced: bool,
}

enum Decision {
    Replay(RequestDescriptor),
    LoggedOut { announce: bool },
    Wait { start: Option<u64> },
}

pub struct AuthCoordinator {
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    dispatcher: Arc<dyn Dispatch>,
    notifier: Arc<dyn Notifier>,
    logout_on_transient_failure: bool,
    state: Mutex<RefreshState>,
}

impl AuthCoordinator {
    pub fn new(
        tokens: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        dispatcher: Arc<dyn Dispatch>,
        notifier: Arc<dyn Notifier>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            tokens,
            refresher,
            dispatcher,
            notifier,
            logout_on_transient_failure: config.logout_on_transient_refresh_failure,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn status(&self) -> RefreshStatus {
        if self.lock().refreshing {
            RefreshStatus::Refreshing
        } else {
            RefreshStatus::Idle
        }
    }

    /// Number of callers waiting on the current refresh
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Resolve a call that the server rejected as unauthenticated.
    ///
    /// `sent_with` is the access token the failed call carried. The result is
    /// the outcome of the replay, or a terminal `Unauthenticated` error.
    pub async fn handle_auth_failure(
        self: &Arc<Self>,
        descriptor: RequestDescriptor,
        sent_with: Option<String>,
        message: String,
    ) -> Result<Value, ApiError> {
        if descriptor.is_replay() {
            return Err(self.terminal_auth_failure(&descriptor, message));
        }

        let (reply, receiver) = oneshot::channel();
        let decision = {
            let mut state = self.lock();
            let current = self.tokens.access_token();

            if !state.refreshing && current.is_some() && current != sent_with {
                // A refresh finished while this call was in flight
                Decision::Replay(descriptor)
            } else if !state.refreshing && self.tokens.refresh_token().is_none() {
                Decision::LoggedOut {
                    announce: self.teardown(&mut state),
                }
            } else {
                state.queue.push_back(Pending::Request { descriptor, reply });
                if state.refreshing {
                    Decision::Wait { start: None }
                } else {
                    state.refreshing = true;
                    Decision::Wait {
                        start: Some(state.epoch),
                    }
                }
            }
        };

        match decision {
            Decision::Replay(descriptor) => {
                debug!("{} {} carried a superseded token, replaying", descriptor.method(), descriptor.path());
                self.replay(descriptor).await
            }
            Decision::LoggedOut { announce } => {
                warn!("Authentication failed and no refresh token is available");
                if announce {
                    self.announce_expiry();
                }
                Err(ApiError::unauthenticated(message))
            }
            Decision::Wait { start } => {
                if let Some(epoch) = start {
                    self.spawn_refresh(epoch);
                }
                receiver
                    .await
                    .unwrap_or_else(|_| Err(ApiError::unauthenticated(message)))
            }
        }
    }

    /// Refresh now, or join the refresh already running.
    pub async fn refresh_now(self: &Arc<Self>) -> Result<(), ApiError> {
        let (reply, receiver) = oneshot::channel();
        let start = {
            let mut state = self.lock();
            if !state.refreshing && self.tokens.refresh_token().is_none() {
                return Err(ApiError::unauthenticated(NO_REFRESH_TOKEN_MESSAGE));
            }
            state.queue.push_back(Pending::Refresh { reply });
            if state.refreshing {
                None
            } else {
                state.refreshing = true;
                Some(state.epoch)
            }
        };

        if let Some(epoch) = start {
            self.spawn_refresh(epoch);
        }
        receiver
            .await
            .unwrap_or_else(|_| Err(ApiError::unauthenticated(SESSION_EXPIRED_MESSAGE)))
    }

    /// The server ended the session. Same as a failed refresh, without
    /// attempting one.
    pub fn force_logout(&self) {
        info!("Forced logout received");
        let announce = {
            let mut state = self.lock();
            self.teardown(&mut state)
        };
        if announce {
            self.announce_expiry();
        }
    }

    /// Listen for forced logouts until the returned handle is dropped.
    pub fn attach_force_logout(self: &Arc<Self>, signal: &ForceLogoutSignal) -> Subscription {
        let mut receiver = signal.subscribe();
        let coordinator = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => match coordinator.upgrade() {
                        Some(coordinator) => coordinator.force_logout(),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription::new(task)
    }

    /// Install a freshly issued session (login).
    pub(crate) fn begin_session(&self, pair: &TokenPair) {
        let mut state = self.lock();
        self.tokens.set_pair(&pair.access_token, &pair.refresh_token);
        state.epoch += 1;
        state.expiry_announced = false;
    }

    /// Drop the session on an explicit user logout. No notice is shown.
    pub(crate) fn end_session(&self) {
        let mut state = self.lock();
        self.tokens.clear();
        state.epoch += 1;
        state.expiry_announced = false;
    }

    fn spawn_refresh(self: &Arc<Self>, epoch: u64) {
        let coordinator = Arc::clone(self);
        // Detached so that a dropped caller cannot strand the rest of the queue
        tokio::spawn(async move {
            coordinator.run_refresh(epoch).await;
        });
    }

    async fn run_refresh(&self, epoch: u64) {
        let result = match self.tokens.refresh_token() {
            Some(refresh_token) => {
                info!("Access token rejected, refreshing session");
                self.refresher.refresh(&refresh_token).await
            }
            None => Err(ApiError::unauthenticated(NO_REFRESH_TOKEN_MESSAGE)),
        };

        match result {
            Ok(pair) => self.complete_refresh(epoch, pair).await,
            Err(e) if e.is_transient() && !self.logout_on_transient_failure => self.abandon_refresh(e),
            Err(e) => self.fail_refresh(epoch, e),
        }
    }

    async fn complete_refresh(&self, epoch: u64, pair: TokenPair) {
        let (queue, applied) = {
            let mut state = self.lock();
            let applied = state.epoch == epoch;
            if applied {
                self.tokens.set_pair(&pair.access_token, &pair.refresh_token);
                state.expiry_announced = false;
            }
            state.refreshing = false;
            (std::mem::take(&mut state.queue), applied)
        };

        if !applied {
            warn!("Session ended while refreshing; discarding refreshed tokens");
            for pending in queue {
                pending.reject(ApiError::unauthenticated(SESSION_EXPIRED_MESSAGE));
            }
            return;
        }

        info!("Session refreshed, replaying {} queued call(s)", queue.len());
        // join_all polls in queue order, so replays start in arrival order
        join_all(queue.into_iter().map(|pending| self.settle(pending))).await;
    }

    /// The refresh never got a verdict from the server. Keep the session so
    /// a later call can try again.
    fn abandon_refresh(&self, error: ApiError) {
        let queue = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };
        warn!("Session refresh did not reach the server: {}", error);
        self.notifier.error(error.message());
        for pending in queue {
            pending.reject(error.clone());
        }
    }

    fn fail_refresh(&self, epoch: u64, error: ApiError) {
        let (queue, announce) = {
            let mut state = self.lock();
            state.refreshing = false;
            let queue = std::mem::take(&mut state.queue);
            // A newer session may already be in place; leave it alone
            let announce = state.epoch == epoch && self.teardown(&mut state);
            (queue, announce)
        };

        warn!("Session refresh rejected: {}", error);
        for pending in queue {
            pending.reject(ApiError::unauthenticated(SESSION_EXPIRED_MESSAGE));
        }
        if announce {
            self.announce_expiry();
        }
    }

    async fn settle(&self, pending: Pending) {
        match pending {
            Pending::Request { descriptor, reply } => {
                let outcome = self.replay(descriptor).await;
                let _ = reply.send(outcome);
            }
            Pending::Refresh { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn replay(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let descriptor = descriptor.replay();
        match self.dispatcher.dispatch(&descriptor).await {
            Ok(data) => Ok(data),
            Err(Failure::Rejected(e)) => Err(e),
            Err(Failure::Auth { message, .. }) => Err(self.terminal_auth_failure(&descriptor, message)),
        }
    }

    /// A call that already had its one recovery failed again. Never queued.
    fn terminal_auth_failure(&self, descriptor: &RequestDescriptor, message: String) -> ApiError {
        warn!(
            "{} {} rejected as unauthenticated after recovery",
            descriptor.method(),
            descriptor.path()
        );

        let (logged_out, announce) = {
            let mut state = self.lock();
            if !state.refreshing && self.tokens.refresh_token().is_none() {
                (true, self.teardown(&mut state))
            } else {
                (false, false)
            }
        };

        if announce {
            self.announce_expiry();
        } else if !logged_out {
            self.notifier.error(&message);
        }
        ApiError::unauthenticated(message)
    }

    /// Clear the session. Returns whether the expiry notice still has to be
    /// shown for it.
    fn teardown(&self, state: &mut RefreshState) -> bool {
        self.tokens.clear();
        state.epoch += 1;
        !std::mem::replace(&mut state.expiry_announced, true)
    }

    fn announce_expiry(&self) {
        self.notifier.session_expired(SESSION_EXPIRED_MESSAGE);
        if !self.notifier.on_login_surface() {
            self.notifier.redirect_to_login();
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
