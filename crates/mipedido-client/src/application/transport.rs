//! The transport seam between the session supervisor and the network.
//!
//! The supervisor never sees sockets.  It asks a [`Transport`] to open one
//! connection, then pulls a bounded set of [`TransportEvent`]s from the
//! returned [`TransportConnection`] on its own task.  Production uses the
//! tokio-tungstenite implementation in `infrastructure::transport`; tests use
//! the scripted mock next to it.

use async_trait::async_trait;
use mipedido_core::{ConnectionOutcome, FailureCategory, OrderId};
use thiserror::Error;

use crate::domain::SessionConfig;

/// Everything a transport needs to open one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub order_id: OrderId,
    /// Full endpoint URL including the `order_id` and `topic` query parameters.
    pub url: String,
}

impl ConnectRequest {
    /// Builds `{ws_base_url}?order_id={order_id}&topic={topic}`.
    ///
    /// `OrderId` only admits URL-unreserved characters, so it is placed in the
    /// query string verbatim.
    pub fn new(order_id: &OrderId, config: &SessionConfig) -> Self {
        let separator = if config.ws_base_url.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{separator}order_id={order_id}&topic={}",
            config.ws_base_url, config.topic
        );
        Self {
            order_id: order_id.clone(),
            url,
        }
    }
}

/// Why a connection could not be opened, or broke once open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportFailure {
    /// The server answered the upgrade request with a non-101 status.
    #[error("handshake rejected with HTTP {status}: {body}")]
    Handshake { status: u16, body: String },

    /// Socket-level failure with no HTTP response (DNS, refused, reset).
    #[error("I/O error: {0}")]
    Io(String),

    /// The peer broke the WebSocket protocol (bad framing, invalid UTF-8).
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

impl TransportFailure {
    /// Classifies this failure into the terminal outcome of the session.
    pub fn into_outcome(self) -> ConnectionOutcome {
        match self {
            TransportFailure::Handshake { status, body } => {
                let category = FailureCategory::from_status(status);
                let detail = match category {
                    FailureCategory::Unknown => format!("HTTP {status}: {body}"),
                    _ => body,
                };
                ConnectionOutcome::ConnectionFailed { category, detail }
            }
            TransportFailure::Io(detail) => ConnectionOutcome::ConnectionFailed {
                category: FailureCategory::Network,
                detail,
            },
            TransportFailure::Protocol(detail) => ConnectionOutcome::ProtocolError { detail },
            TransportFailure::Other(detail) => ConnectionOutcome::ConnectionFailed {
                category: FailureCategory::Unknown,
                detail,
            },
        }
    }
}

/// One thing that happened on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// A binary frame of the given length.  The protocol has none; it is ignored.
    Binary(usize),
    /// The peer sent a close frame (or replied to ours).
    Closed { code: u16, reason: String },
    Failed(TransportFailure),
}

/// Opens connections.  Shared by every session a supervisor starts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the handshake for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportFailure`] if the connection cannot be established.
    async fn open(
        &self,
        request: &ConnectRequest,
    ) -> Result<Box<dyn TransportConnection>, TransportFailure>;
}

/// An open connection, exclusively owned by one session task.
#[async_trait]
pub trait TransportConnection: Send {
    /// Waits for the next event.  `None` means the stream ended.
    ///
    /// Implementations keep the connection alive (pings) while waiting.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Starts the close handshake with `code` and `reason`.  The peer's reply
    /// arrives later as [`TransportEvent::Closed`].
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportFailure>;
}
