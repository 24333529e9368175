//! Message types for the order-notification WebSocket protocol.
//!
//! Every text frame the notification engine pushes is a JSON object with the
//! same three top-level fields:
//!
//! ```json
//! {"type":"welcome","topic":"orders","payload":{"message":"hi","order_id":"abc","time":"2024-01-01T00:00:00Z"}}
//! ```
//!
//! The `type` field decides which shape `payload` has.  Decoding therefore
//! happens in two steps: first the generic [`Envelope`] (with the payload kept
//! as an untyped [`serde_json::Value`]), then the payload is re-read against
//! the shape selected by `type`.  See [`crate::protocol::codec::decode`].

use serde::{Deserialize, Serialize};

/// Topic the client subscribes to when opening a session.
pub const DEFAULT_TOPIC: &str = "orders";

/// WebSocket close code for a graceful, intentional closure (RFC 6455 §7.4.1).
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a close frame carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// `type` value of the greeting frame sent right after the upgrade.
pub const WELCOME_TYPE: &str = "welcome";

/// `type` value of the frame announcing that the order was fulfilled.
pub const ORDER_COMPLETED_TYPE: &str = "order_completed";

// ── Wire shapes ───────────────────────────────────────────────────────────────

/// Generic frame envelope, before the payload shape is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminant that selects the payload shape.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Topic the frame was published on.  Older engine builds omit it.
    #[serde(default)]
    pub topic: String,

    /// Untyped payload; re-parsed once `event_type` is known.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Builds an envelope for `event_type` on `topic` with the given payload.
    pub fn new(
        event_type: impl Into<String>,
        topic: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            topic: topic.into(),
            payload,
        }
    }
}

/// Payload of a `welcome` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomePayload {
    /// Free-form greeting text.
    #[serde(default)]
    pub message: String,
    /// Order the session was opened for.
    pub order_id: String,
    /// Server time of the upgrade, RFC 3339.
    pub time: String,
}

/// Payload of an `order_completed` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedPayload {
    pub order_id: String,
    pub restaurant_id: String,
    /// Always `"fulfilled"` in current engine builds.
    #[serde(default)]
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub message: String,
}

// ── Typed events ──────────────────────────────────────────────────────────────

/// A decoded server-pushed event.
///
/// The variant is chosen by the envelope's `type` field, and the fields of
/// the variant always come from a payload that matched that variant's shape.
/// Frames whose payload does not fit are reported as
/// [`crate::protocol::ProtocolError`] instead of ever becoming an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Session is established on the server side.
    Welcome {
        order_id: String,
        server_time: String,
    },
    /// The restaurant fulfilled the order.
    OrderCompleted {
        order_id: String,
        restaurant_id: String,
        timestamp: String,
    },
    /// A `type` this client does not know yet.  Not an error: newer engines
    /// may publish event types older clients ignore.
    Unrecognized { raw_type: String },
}

impl InboundEvent {
    /// Returns the wire `type` string for this event.
    pub fn type_name(&self) -> &str {
        match self {
            InboundEvent::Welcome { .. } => WELCOME_TYPE,
            InboundEvent::OrderCompleted { .. } => ORDER_COMPLETED_TYPE,
            InboundEvent::Unrecognized { raw_type } => raw_type,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
