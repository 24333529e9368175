//! Session states and terminal outcomes.
//!
//! Every session ends in exactly one [`ConnectionOutcome`].  Its `Display`
//! output is the human-readable text handed to the UI listener.

use std::fmt;

use crate::protocol::messages::NORMAL_CLOSURE;

/// Lifecycle state of one supervised session.
///
/// ```text
/// Idle ─connect─▶ Connecting ─open ack─▶ Open ─disconnect─▶ Closing ─ack─▶ Closed
///                     │                    │
///                     └──── failure ───────┴──────────────▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// `true` while the session still holds (or is acquiring) a transport.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Open | SessionState::Closing
        )
    }

    /// `true` once the session has released its transport.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Classification of a failed connection attempt or a dropped connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Handshake rejected with 404: the order does not exist.
    NotFound,
    /// Handshake rejected with 409: the order was already notified or closed.
    Conflict,
    /// Handshake rejected with 400: malformed order id or missing parameter.
    InvalidRequest,
    /// Low-level I/O failure with no HTTP response.
    Network,
    Unknown,
}

impl FailureCategory {
    /// Maps an HTTP status from a rejected handshake to a category.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => FailureCategory::InvalidRequest,
            404 => FailureCategory::NotFound,
            409 => FailureCategory::Conflict,
            _ => FailureCategory::Unknown,
        }
    }
}

/// The single terminal classification of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Graceful close with the normal-closure code.
    ClosedNormally { reason: String },
    /// The server closed the connection with any other code.
    ClosedByServer { reason: String, code: u16 },
    /// Handshake or network failure.
    ConnectionFailed {
        category: FailureCategory,
        detail: String,
    },
    /// The peer violated the WebSocket protocol.
    ProtocolError { detail: String },
}

impl ConnectionOutcome {
    /// The [`SessionState`] a session ends in after this outcome.
    pub fn terminal_state(&self) -> SessionState {
        match self {
            ConnectionOutcome::ClosedNormally { .. } | ConnectionOutcome::ClosedByServer { .. } => {
                SessionState::Closed
            }
            ConnectionOutcome::ConnectionFailed { .. } | ConnectionOutcome::ProtocolError { .. } => {
                SessionState::Failed
            }
        }
    }

    /// `true` for outcomes reported through `on_connection_failure` rather
    /// than `on_closed`.
    pub fn is_failure(&self) -> bool {
        self.terminal_state() == SessionState::Failed
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionOutcome::ClosedNormally { reason } => {
                write!(f, "Connection closed: {reason} (Code: {NORMAL_CLOSURE})")
            }
            ConnectionOutcome::ClosedByServer { reason, code } => write!(
                f,
                "Server closed connection unexpectedly: {reason} (Code: {code})"
            ),
            ConnectionOutcome::ConnectionFailed { category, detail } => match category {
                FailureCategory::InvalidRequest => write!(
                    f,
                    "Connection failed: Bad Request (Invalid order ID format or missing parameter?). Server detail: {detail}"
                ),
                FailureCategory::NotFound => {
                    write!(f, "Connection failed: Order not found. Server detail: {detail}")
                }
                FailureCategory::Conflict => write!(
                    f,
                    "Connection failed: Conflict (Order already notified?). Server detail: {detail}"
                ),
                FailureCategory::Network => write!(f, "Connection failed: network error: {detail}"),
                FailureCategory::Unknown => write!(f, "WebSocket connection failure: {detail}"),
            },
            ConnectionOutcome::ProtocolError { detail } => write!(f, "Protocol error: {detail}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
