//! User-facing side effects of request failures and session expiry.

use std::sync::Mutex;

/// Surface that shows notices to the user and navigates to the login screen.
pub trait Notifier: Send + Sync {
    /// Transient warning, e.g. permission denied
    fn warning(&self, message: &str);

    /// Transient error message
    fn error(&self, message: &str);

    /// Titled notification for server faults
    fn notification(&self, title: &str, content: &str);

    /// The session is gone and the user has to log in again
    fn session_expired(&self, message: &str);

    fn redirect_to_login(&self);

    /// Whether the login surface is already showing
    fn on_login_surface(&self) -> bool {
        false
    }
}

/// Routes every notice into the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn notification(&self, title: &str, content: &str) {
        tracing::error!("{}: {}", title, content);
    }

    fn session_expired(&self, message: &str) {
        tracing::warn!("Session expired: {}", message);
    }

    fn redirect_to_login(&self) {
        tracing::info!("Login required");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
    Error(String),
    Notification { title: String, content: String },
    SessionExpired(String),
    RedirectToLogin,
}

/// Keeps every notice in memory, for headless embedders and tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    on_login_surface: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that reports the login surface as already showing
    pub fn on_login_surface() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            on_login_surface: true,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Notice) -> bool) -> usize {
        self.lock().iter().filter(|n| matches(n)).count()
    }

    pub fn session_expired_count(&self) -> usize {
        self.count(|n| matches!(n, Notice::SessionExpired(_)))
    }

    pub fn redirect_count(&self) -> usize {
        self.count(|n| matches!(n, Notice::RedirectToLogin))
    }

    fn push(&self, notice: Notice) {
        self.lock().push(notice);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notice>> {
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn warning(&self, message: &str) {
        self.push(Notice::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Notice::Error(message.to_string()));
    }

    fn notification(&self, title: &str, content: &str) {
        self.push(Notice::Notification {
            title: title.to_string(),
            content: content.to_string(),
        });
    }

    fn session_expired(&self, message: &str) {
        self.push(Notice::SessionExpired(message.to_string()));
    }

    fn redirect_to_login(&self) {
        self.push(Notice::RedirectToLogin);
    }

    fn on_login_surface(&self) -> bool {
        self.on_login_surface
    }
}
