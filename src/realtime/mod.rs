//! Routing for frames pushed by the notification server.
//!
//! The transport (STOMP over SockJS in the browser console) is not part of
//! this crate: whatever owns the connection hands each raw frame to
//! [`Dispatcher::dispatch`]. `FORCE_LOGOUT` is published on a
//! [`ForceLogoutSignal`] the session coordinator listens on; everything
//! else fans out to notice and user-message subscribers.

pub mod message;
pub mod reconnect;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use message::{Channel, MessageType, NoticeLevel, SystemNotice, WsMessage};
pub use reconnect::ReconnectPolicy;

const CHANNEL_CAPACITY: usize = 64;

/// The server considers the current session terminated.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceLogout {
    pub module: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct ForceLogoutSignal {
    tx: broadcast::Sender<ForceLogout>,
}

impl ForceLogoutSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Returns how many listeners received the event.
    pub fn publish(&self, event: ForceLogout) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ForceLogout> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ForceLogoutSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered handler. Dropping it, or calling `unsubscribe`, stops the
/// handler; nothing outlives the handle.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Where a frame was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ForceLogout,
    SystemNotice,
    UserMessage,
    Dropped,
}

pub struct Dispatcher {
    system_notices: broadcast::Sender<WsMessage>,
    user_messages: broadcast::Sender<WsMessage>,
    force_logout: ForceLogoutSignal,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (system_notices, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (user_messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            system_notices,
            user_messages,
            force_logout: ForceLogoutSignal::new(),
        }
    }

    pub fn force_logout_signal(&self) -> &ForceLogoutSignal {
        &self.force_logout
    }

    /// Parse one raw frame and deliver it.
    pub fn dispatch(&self, channel: Channel, frame: &str) -> Route {
        let message: WsMessage = match serde_json::from_str(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping unparseable {:?} frame: {}", channel, e);
                return Route::Dropped;
            }
        };
        self.deliver(channel, message)
    }

    pub fn deliver(&self, channel: Channel, message: WsMessage) -> Route {
        debug!("Realtime {:?} message: {:?}", channel, message.kind);

        if message.kind == MessageType::ForceLogout {
            self.force_logout.publish(ForceLogout {
                module: message.module,
                timestamp: message.timestamp,
            });
            return Route::ForceLogout;
        }

        // A send error only means nobody is listening right now
        match channel {
            Channel::Public => {
                let _ = self.system_notices.send(message);
                Route::SystemNotice
            }
            Channel::User => {
                let _ = self.user_messages.send(message);
                Route::UserMessage
            }
        }
    }

    pub fn subscribe_system_notices(&self) -> broadcast::Receiver<WsMessage> {
        self.system_notices.subscribe()
    }

    pub fn subscribe_user_messages(&self) -> broadcast::Receiver<WsMessage> {
        self.user_messages.subscribe()
    }

    /// Run `handler` for every system notice until the subscription is dropped.
    pub fn on_system_notice<F>(&self, handler: F) -> Subscription
    where
        F: Fn(WsMessage) + Send + 'static,
    {
        spawn_handler(self.system_notices.subscribe(), handler)
    }

    pub fn on_user_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(WsMessage) + Send + 'static,
    {
        spawn_handler(self.user_messages.subscribe(), handler)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_handler<F>(mut rx: broadcast::Receiver<WsMessage>, handler: F) -> Subscription
where
    F: Fn(WsMessage) + Send + 'static,
{
    let task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => handler(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Realtime handler lagged, {} message(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Subscription::new(task)
}
