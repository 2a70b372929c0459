/*!
 * User-facing Notifications
 * Transient error toasts raised by failed commands
 */

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Receives messages that should be shown to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &str) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Queues notifications for a presentation layer to drain.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        let notification = Notification {
            message: message.to_string(),
            at: Utc::now(),
        };
        // Nobody is listening anymore
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped: {}", message);
        }
    }
}
