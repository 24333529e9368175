//! The listener contract the UI binds to, and the dispatcher that feeds it.
//!
//! Session tasks never call a listener directly.  They push [`Notification`]s
//! onto an unbounded channel; a single dispatcher task drains it in FIFO order
//! and invokes whichever listener is bound at that moment.  A slow listener
//! therefore delays later notifications but never stalls a session.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receives session notifications.  Called from the dispatcher task, never
/// from the caller's thread.
pub trait EventListener: Send + Sync {
    /// The server accepted the session for `order_id`.
    fn on_welcome(&self, order_id: &str, time: &str);

    /// The restaurant fulfilled the order.
    fn on_order_completed(&self, order_id: &str, restaurant_id: &str, timestamp: &str);

    /// A frame could not be understood.  The session stays open.
    fn on_error(&self, message: &str);

    /// The session ended with a close the caller did not ask for.
    fn on_closed(&self, reason: &str);

    /// The session could not be opened, or broke.
    fn on_connection_failure(&self, message: &str);
}

/// One listener callback, captured as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome {
        order_id: String,
        time: String,
    },
    OrderCompleted {
        order_id: String,
        restaurant_id: String,
        timestamp: String,
    },
    Error(String),
    Closed(String),
    ConnectionFailure(String),
}

impl Notification {
    /// Invokes the matching callback on `listener`.
    pub fn deliver(&self, listener: &dyn EventListener) {
        match self {
            Notification::Welcome { order_id, time } => listener.on_welcome(order_id, time),
            Notification::OrderCompleted {
                order_id,
                restaurant_id,
                timestamp,
            } => listener.on_order_completed(order_id, restaurant_id, timestamp),
            Notification::Error(message) => listener.on_error(message),
            Notification::Closed(reason) => listener.on_closed(reason),
            Notification::ConnectionFailure(message) => listener.on_connection_failure(message),
        }
    }

    /// `true` for the notifications that end a session's observable lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::Closed(_) | Notification::ConnectionFailure(_)
        )
    }
}

type ListenerSlot = Arc<RwLock<Option<Arc<dyn EventListener>>>>;

/// Owns the notification channel and the currently bound listener.
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
    listener: ListenerSlot,
}

impl NotificationDispatcher {
    /// Spawns the dispatcher task on `runtime`.  The task exits once every
    /// sender (this dispatcher and all session tasks) is dropped.
    pub fn spawn(runtime: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let listener: ListenerSlot = Arc::new(RwLock::new(None));
        let slot = Arc::clone(&listener);

        runtime.spawn(async move {
            while let Some(notification) = rx.recv().await {
                let bound = slot
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match bound {
                    Some(listener) => {
                        trace!(?notification, "dispatching notification");
                        notification.deliver(listener.as_ref());
                    }
                    None => debug!(?notification, "no listener bound; notification dropped"),
                }
            }
            debug!("notification dispatcher stopped");
        });

        Self { tx, listener }
    }

    /// A sender session tasks use to queue notifications.
    pub fn sender(&self) -> mpsc::UnboundedSender<Notification> {
        self.tx.clone()
    }

    /// Binds `listener`, replacing any previous one.  Notifications already
    /// queued are delivered to the new listener.
    pub fn set_listener(&self, listener: Arc<dyn EventListener>) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl EventListener for Collect {
        fn on_welcome(&self, order_id: &str, time: &str) {
            self.0.lock().unwrap().push(format!("welcome {order_id} {time}"));
        }
        fn on_order_completed(&self, order_id: &str, restaurant_id: &str, timestamp: &str) {
            self.0
                .lock()
                .unwrap()
                .push(format!("completed {order_id} {restaurant_id} {timestamp}"));
        }
        fn on_error(&self, message: &str) {
            self.0.lock().unwrap().push(format!("error {message}"));
        }
        fn on_closed(&self, reason: &str) {
            self.0.lock().unwrap().push(format!("closed {reason}"));
        }
        fn on_connection_failure(&self, message: &str) {
            self.0.lock().unwrap().push(format!("failure {message}"));
        }
    }

    #[test]
    fn test_deliver_calls_matching_callback() {
        // Arrange
        let listener = Collect::default();
        let notification = Notification::OrderCompleted {
            order_id: "abc".to_string(),
            restaurant_id: "r1".to_string(),
            timestamp: "t".to_string(),
        };

        // Act
        notification.deliver(&listener);

        // Assert
        assert_eq!(*listener.0.lock().unwrap(), vec!["completed abc r1 t"]);
    }

    #[test]
    fn test_only_closed_and_failure_are_terminal() {
        assert!(Notification::Closed("x".into()).is_terminal());
        assert!(Notification::ConnectionFailure("x".into()).is_terminal());
        assert!(!Notification::Error("x".into()).is_terminal());
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_in_fifo_order() {
        // Arrange
        let dispatcher = NotificationDispatcher::spawn(&Handle::current());
        let listener = Arc::new(Collect::default());
        dispatcher.set_listener(listener.clone());
        let tx = dispatcher.sender();

        // Act
        for i in 0..5 {
            tx.send(Notification::Error(i.to_string())).unwrap();
        }
        for _ in 0..50 {
            if listener.0.lock().unwrap().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Assert
        assert_eq!(
            *listener.0.lock().unwrap(),
            vec!["error 0", "error 1", "error 2", "error 3", "error 4"]
        );
    }

    #[tokio::test]
    async fn test_notifications_without_listener_are_dropped() {
        let dispatcher = NotificationDispatcher::spawn(&Handle::current());
        assert!(!dispatcher.has_listener());

        dispatcher
            .sender()
            .send(Notification::Closed("early".into()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let listener = Arc::new(Collect::default());
        dispatcher.set_listener(listener.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(listener.0.lock().unwrap().is_empty());
    }
}
