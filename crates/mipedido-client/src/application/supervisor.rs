//! Connection supervisor: owns at most one live order-notification session.
//!
//! # Task model
//!
//! ```text
//!  caller ──connect/disconnect──▶ ConnectionSupervisor ──SessionCommand──▶ session task
//!                                                                             │  owns the
//!                                                                             │  TransportConnection
//!                      EventListener ◀── dispatcher task ◀──Notification──────┘
//! ```
//!
//! `connect` and `disconnect` only update shared state and send commands;
//! they return immediately.  Each session runs on its own task, which is the
//! only code that touches the transport.  When a session for a different
//! order is requested, the new task first waits for the previous one to
//! finish, so two sessions never hold a transport at the same time.
//!
//! Every session reports at most one terminal notification.  Sessions closed
//! by the caller report nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mipedido_core::protocol::NORMAL_CLOSURE;
use mipedido_core::{decode, ConnectionOutcome, FailureCategory, InboundEvent, OrderId};
use mipedido_core::{OrderIdError, SessionState};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::listener::{EventListener, Notification, NotificationDispatcher};
use crate::application::transport::{
    ConnectRequest, Transport, TransportConnection, TransportEvent,
};
use crate::domain::{ConfigError, SessionConfig};

/// Errors returned synchronously by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid order id: {0}")]
    InvalidOrderId(#[from] OrderIdError),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// `shutdown` was called; this supervisor accepts no new sessions.
    #[error("connection supervisor has been shut down")]
    ShutDown,

    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Point-in-time view of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub order_id: OrderId,
    pub state: SessionState,
    pub manually_closed: bool,
}

#[derive(Debug)]
enum SessionCommand {
    Close { reason: String },
}

/// Per-session state shared between the supervisor and the session task.
#[derive(Debug)]
struct SessionRecord {
    state: SessionState,
    manually_closed: bool,
    order_completed: bool,
}

struct ActiveSession {
    id: Uuid,
    order_id: OrderId,
    record: Arc<Mutex<SessionRecord>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    /// `None` once handed to a successor supervisor.
    task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Marks the session caller-closed and asks its task to close.  Repeated
    /// calls are no-ops.
    fn request_close(&self, reason: &str) {
        {
            let mut record = lock(&self.record);
            if record.manually_closed {
                debug!(session = %self.id, "close already requested");
                return;
            }
            record.manually_closed = true;
        }
        info!(session = %self.id, order_id = %self.order_id, reason, "closing session");
        // The task may already have finished; nothing left to close then.
        let _ = self.commands.send(SessionCommand::Close {
            reason: reason.to_string(),
        });
    }

    /// `true` while the session can still serve its order.
    fn is_reusable(&self) -> bool {
        let record = lock(&self.record);
        !record.manually_closed && !record.state.is_terminal()
    }

    fn snapshot(&self) -> SessionSnapshot {
        let record = lock(&self.record);
        SessionSnapshot {
            session_id: self.id,
            order_id: self.order_id.clone(),
            state: record.state,
            manually_closed: record.manually_closed,
        }
    }
}

#[derive(Default)]
struct SupervisorState {
    active: Option<ActiveSession>,
    /// Last session task of the supervisor this one replaced.  The first
    /// session waits for it before opening a transport.
    predecessor: Option<JoinHandle<()>>,
    shut_down: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Opens, supervises, and tears down order-notification sessions.
pub struct ConnectionSupervisor {
    config: Arc<SessionConfig>,
    transport: Arc<dyn Transport>,
    dispatcher: NotificationDispatcher,
    runtime: Handle,
    state: Arc<Mutex<SupervisorState>>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NoRuntime`] when called outside a runtime.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self, SupervisorError> {
        Ok(Self::with_runtime(config, transport, Handle::try_current()?))
    }

    /// Creates a supervisor that spawns its tasks on `runtime`.
    pub fn with_runtime(config: SessionConfig, transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        let dispatcher = NotificationDispatcher::spawn(&runtime);
        Self {
            config: Arc::new(config),
            transport,
            dispatcher,
            runtime,
            state: Arc::new(Mutex::new(SupervisorState::default())),
        }
    }

    /// Starts a session for `order_id`.
    ///
    /// A no-op if a session for the same order is already idle, connecting,
    /// or open.  A session for another order is closed first; the new one
    /// opens its transport only after the old one has released its own.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::InvalidOrderId`] for an empty or non-URL-safe id,
    /// [`SupervisorError::InvalidConfig`] for a topic that is not URL-safe,
    /// [`SupervisorError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn connect(&self, order_id: &str) -> Result<(), SupervisorError> {
        let order_id = OrderId::parse(order_id)?;
        self.config.validate()?;
        let mut state = lock(&self.state);
        if state.shut_down {
            return Err(SupervisorError::ShutDown);
        }

        let previous = match state.active.take() {
            Some(active) if active.order_id == order_id && active.is_reusable() => {
                debug!(session = %active.id, %order_id, "already connected or connecting");
                state.active = Some(active);
                return Ok(());
            }
            Some(mut active) => {
                active.request_close(&format!("Starting new connection for order {order_id}"));
                active.task.take()
            }
            None => state.predecessor.take(),
        };

        let id = Uuid::new_v4();
        let record = Arc::new(Mutex::new(SessionRecord {
            state: SessionState::Idle,
            manually_closed: false,
            order_completed: false,
        }));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let task = SessionTask {
            id,
            request: ConnectRequest::new(&order_id, &self.config),
            close_timeout: self.config.close_timeout(),
            record: Arc::clone(&record),
            commands: commands_rx,
            transport: Arc::clone(&self.transport),
            notifications: self.dispatcher.sender(),
            supervisor: Arc::clone(&self.state),
        };
        debug!(session = %id, %order_id, "spawning session task");
        let handle = self.runtime.spawn(task.run(previous));

        state.active = Some(ActiveSession {
            id,
            order_id,
            record,
            commands: commands_tx,
            task: Some(handle),
        });
        Ok(())
    }

    /// Closes the active session with a normal-closure code.
    ///
    /// Safe to call at any time and any number of times.  A caller-closed
    /// session produces no terminal notification.
    pub fn disconnect(&self, reason: &str) {
        let state = lock(&self.state);
        match state.active.as_ref() {
            Some(active) => active.request_close(reason),
            None => debug!("disconnect with no active session"),
        }
    }

    /// Binds the listener that receives notifications from now on.
    pub fn set_listener(&self, listener: Arc<dyn EventListener>) {
        self.dispatcher.set_listener(listener);
    }

    pub fn clear_listener(&self) {
        self.dispatcher.clear_listener();
    }

    /// Closes the active session and refuses any further `connect`.
    pub fn shutdown(&self) {
        let mut state = lock(&self.state);
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        if let Some(active) = state.active.as_ref() {
            active.request_close("Supervisor shut down");
        }
        info!("connection supervisor shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.state).shut_down
    }

    /// The session currently held, if any.  `None` means idle.
    pub fn current_session(&self) -> Option<SessionSnapshot> {
        lock(&self.state).active.as_ref().map(ActiveSession::snapshot)
    }

    /// `true` while a session is connecting, open, or closing.
    pub fn is_active(&self) -> bool {
        self.current_session()
            .is_some_and(|session| session.state.is_active())
    }

    /// Hands over the task of the last session so a replacement supervisor
    /// can wait for it.  Returns `None` if there is nothing left to wait for.
    pub(crate) fn take_last_task(&self) -> Option<JoinHandle<()>> {
        let mut state = lock(&self.state);
        let task = state.active.as_mut().and_then(|active| active.task.take());
        task.or_else(|| state.predecessor.take())
    }

    /// Makes the first session of this supervisor wait for `task`.
    pub(crate) fn adopt_predecessor(&self, task: JoinHandle<()>) {
        lock(&self.state).predecessor = Some(task);
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.state).active.as_ref() {
            active.request_close("Supervisor dropped");
        }
    }
}

// ── Session task ──────────────────────────────────────────────────────────────

/// What woke the session loop.
enum Step {
    Command(Option<SessionCommand>),
    Transport(Option<TransportEvent>),
    CloseTimedOut,
}

struct SessionTask {
    id: Uuid,
    request: ConnectRequest,
    close_timeout: Duration,
    record: Arc<Mutex<SessionRecord>>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    transport: Arc<dyn Transport>,
    notifications: mpsc::UnboundedSender<Notification>,
    supervisor: Arc<Mutex<SupervisorState>>,
}

impl SessionTask {
    async fn run(mut self, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                warn!(session = %self.id, "previous session task ended abnormally: {e}");
            }
        }

        if lock(&self.record).manually_closed {
            self.finish(ConnectionOutcome::ClosedNormally {
                reason: "closed before connecting".to_string(),
            });
            return;
        }

        self.set_state(SessionState::Connecting);
        info!(session = %self.id, order_id = %self.request.order_id, url = %self.request.url, "connecting");

        let transport = Arc::clone(&self.transport);
        let opened = tokio::select! {
            result = transport.open(&self.request) => Some(result),
            _ = self.commands.recv() => None,
        };
        let mut connection = match opened {
            Some(Ok(connection)) => connection,
            Some(Err(failure)) => {
                warn!(session = %self.id, "connection failed: {failure}");
                self.finish(failure.into_outcome());
                return;
            }
            None => {
                debug!(session = %self.id, "close requested during handshake");
                lock(&self.record).manually_closed = true;
                self.finish(ConnectionOutcome::ClosedNormally {
                    reason: "closed during handshake".to_string(),
                });
                return;
            }
        };

        self.set_state(SessionState::Open);
        info!(session = %self.id, order_id = %self.request.order_id, "session open");

        let outcome = self.drive(connection.as_mut()).await;
        drop(connection);
        self.finish(outcome);
    }

    /// Runs the open session until it reaches a terminal outcome.
    async fn drive(&mut self, connection: &mut dyn TransportConnection) -> ConnectionOutcome {
        let mut close: Option<(Instant, String)> = None;
        let mut commands_open = true;

        loop {
            let deadline = close
                .as_ref()
                .map_or_else(Instant::now, |(deadline, _)| *deadline);
            let step = tokio::select! {
                command = self.commands.recv(), if commands_open && close.is_none() => Step::Command(command),
                event = connection.next_event() => Step::Transport(event),
                _ = tokio::time::sleep_until(deadline), if close.is_some() => Step::CloseTimedOut,
            };

            match step {
                Step::Command(command) => {
                    let reason = match command {
                        Some(SessionCommand::Close { reason }) => reason,
                        None => {
                            commands_open = false;
                            lock(&self.record).manually_closed = true;
                            "Supervisor released session".to_string()
                        }
                    };
                    if let Err(e) = connection.close(NORMAL_CLOSURE, &reason).await {
                        debug!(session = %self.id, "close frame not sent: {e}");
                        return ConnectionOutcome::ClosedNormally { reason };
                    }
                    self.set_state(SessionState::Closing);
                    close = Some((Instant::now() + self.close_timeout, reason));
                }
                Step::Transport(Some(TransportEvent::Text(text))) => {
                    if close.is_some() {
                        debug!(session = %self.id, "frame dropped while closing");
                    } else {
                        self.handle_frame(&text);
                    }
                }
                Step::Transport(Some(TransportEvent::Binary(len))) => {
                    debug!(session = %self.id, len, "binary frame ignored");
                }
                Step::Transport(Some(TransportEvent::Closed { code, reason })) => {
                    info!(session = %self.id, code, %reason, "connection closed");
                    return if code == NORMAL_CLOSURE {
                        ConnectionOutcome::ClosedNormally { reason }
                    } else {
                        ConnectionOutcome::ClosedByServer { reason, code }
                    };
                }
                Step::Transport(Some(TransportEvent::Failed(failure))) => {
                    warn!(session = %self.id, "connection failed: {failure}");
                    return failure.into_outcome();
                }
                Step::Transport(None) => {
                    return match close {
                        Some((_, reason)) => ConnectionOutcome::ClosedNormally { reason },
                        None => ConnectionOutcome::ConnectionFailed {
                            category: FailureCategory::Network,
                            detail: "connection ended without a close frame".to_string(),
                        },
                    };
                }
                Step::CloseTimedOut => {
                    warn!(session = %self.id, "server did not answer close; releasing connection");
                    let reason = close.map(|(_, reason)| reason).unwrap_or_default();
                    return ConnectionOutcome::ClosedNormally { reason };
                }
            }
        }
    }

    /// Decodes one text frame and forwards the result.  Never ends the session.
    fn handle_frame(&self, text: &str) {
        match decode(text) {
            Ok(InboundEvent::Welcome {
                order_id,
                server_time,
            }) => {
                debug!(session = %self.id, %order_id, "welcome received");
                self.notify(Notification::Welcome {
                    order_id,
                    time: server_time,
                });
            }
            Ok(InboundEvent::OrderCompleted {
                order_id,
                restaurant_id,
                timestamp,
            }) => {
                info!(session = %self.id, %order_id, %restaurant_id, "order completed");
                lock(&self.record).order_completed = true;
                self.notify(Notification::OrderCompleted {
                    order_id,
                    restaurant_id,
                    timestamp,
                });
            }
            Ok(InboundEvent::Unrecognized { raw_type }) => {
                warn!(session = %self.id, %raw_type, "unknown message type");
                self.notify(Notification::Error(format!(
                    "Received unknown message type: {raw_type}"
                )));
            }
            Err(e) => {
                warn!(session = %self.id, frame = %text, "failed to decode frame: {e}");
                self.notify(Notification::Error(format!(
                    "Failed to parse message from server: {e}"
                )));
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        lock(&self.record).state = state;
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            debug!(session = %self.id, "notification dispatcher gone");
        }
    }

    /// Records the terminal state, reports it if due, and releases the slot.
    fn finish(&self, outcome: ConnectionOutcome) {
        let (manually_closed, order_completed) = {
            let mut record = lock(&self.record);
            record.state = outcome.terminal_state();
            (record.manually_closed, record.order_completed)
        };

        match terminal_notification(&outcome, manually_closed, order_completed) {
            Some(notification) => {
                info!(session = %self.id, %outcome, "session ended");
                self.notify(notification);
            }
            None => debug!(session = %self.id, %outcome, "session ended; notification suppressed"),
        }

        let mut state = lock(&self.supervisor);
        if state.active.as_ref().is_some_and(|active| active.id == self.id) {
            state.active = None;
        }
    }
}

/// Chooses the single terminal notification for a session, if any.
///
/// Caller-initiated closes are silent, including when a server close or a
/// failure raced with them.  A normal close after the order completed is
/// silent too: the completion already told the listener how the session ended.
fn terminal_notification(
    outcome: &ConnectionOutcome,
    manually_closed: bool,
    order_completed: bool,
) -> Option<Notification> {
    if manually_closed {
        return None;
    }
    if outcome.is_failure() {
        return Some(Notification::ConnectionFailure(outcome.to_string()));
    }
    match outcome {
        ConnectionOutcome::ClosedNormally { .. } if order_completed => None,
        _ => Some(Notification::Closed(outcome.to_string())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
