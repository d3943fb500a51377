//! The single transient user notification and the error interceptor that
//! feeds it.

use std::time::Duration;

use tracing::debug;

use crate::error::ClientError;

pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub visible: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRequest {
    pub text: String,
    /// Keeps the current timeout when unset.
    pub timeout: Option<Duration>,
}

impl NotificationRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<&str> for NotificationRequest {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for NotificationRequest {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Records whether the notification should be visible now. Whoever renders it
/// owns the timer and calls [`hide`](Self::hide).
#[derive(Debug, Clone)]
pub struct NotificationState {
    current: Notification,
}

impl NotificationState {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            current: Notification {
                text: String::new(),
                visible: false,
                timeout: default_timeout,
            },
        }
    }

    pub fn current(&self) -> &Notification {
        &self.current
    }

    pub fn show(&mut self, request: NotificationRequest) -> Notification {
        self.current = Notification {
            text: request.text,
            visible: true,
            timeout: request.timeout.unwrap_or(self.current.timeout),
        };
        self.current.clone()
    }

    /// Returns whether the notification was visible.
    pub fn hide(&mut self) -> bool {
        std::mem::replace(&mut self.current.visible, false)
    }
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TIMEOUT)
    }
}

/// Message the interceptor posts for a failed call, if any. Session probe
/// failures and local failures stay silent.
pub fn intercepted_message(error: &ClientError) -> Option<String> {
    if error.endpoint().is_some_and(|endpoint| endpoint.is_session_probe()) {
        debug!(error = %error, "notification: suppressed session probe failure");
        return None;
    }
    error.user_message()
}
