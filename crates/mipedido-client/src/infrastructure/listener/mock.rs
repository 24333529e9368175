//! Recording listener for tests.
//!
//! Notifications arrive on the dispatcher task, so tests wait for them with
//! [`RecordingListener::wait_for_count`] instead of sleeping.
//!
//! ```ignore
//! let listener = Arc::new(RecordingListener::new());
//! supervisor.set_listener(listener.clone());
//! supervisor.connect("abc")?;
//! // ... drive the mock peer ...
//! let events = listener.wait_for_count(1, Duration::from_secs(1)).await;
//! assert_eq!(events[0], Notification::Welcome { .. });
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::application::listener::{EventListener, Notification};

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Notification>>,
    changed: Notify,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Only the terminal notifications (closed / connection failure).
    pub fn terminal_events(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter(|n| n.is_terminal())
            .cloned()
            .collect()
    }

    /// Waits until at least `count` notifications were recorded or `within`
    /// elapses, then returns what was recorded.
    pub async fn wait_for_count(&self, count: usize, within: Duration) -> Vec<Notification> {
        let deadline = Instant::now() + within;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a record in between is not missed.
            notified.as_mut().enable();
            {
                let events = self.lock();
                if events.len() >= count {
                    return events.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.events();
            }
        }
    }

    fn record(&self, notification: Notification) {
        self.lock().push(notification);
        self.changed.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for RecordingListener {
    fn on_welcome(&self, order_id: &str, time: &str) {
        self.record(Notification::Welcome {
            order_id: order_id.to_string(),
            time: time.to_string(),
        });
    }

    fn on_order_completed(&self, order_id: &str, restaurant_id: &str, timestamp: &str) {
        self.record(Notification::OrderCompleted {
            order_id: order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            timestamp: timestamp.to_string(),
        });
    }

    fn on_error(&self, message: &str) {
        self.record(Notification::Error(message.to_string()));
    }

    fn on_closed(&self, reason: &str) {
        self.record(Notification::Closed(reason.to_string()));
    }

    fn on_connection_failure(&self, message: &str) {
        self.record(Notification::ConnectionFailure(message.to_string()));
    }
}
