//! Decoder for order-notification text frames.
//!
//! Decoding is a tagged-union dispatch: read the generic envelope, peek at the
//! `type` tag, then re-read the payload as exactly the shape that tag
//! requires.  Every failure path is a [`ProtocolError`] value.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::protocol::messages::{
    Envelope, InboundEvent, OrderCompletedPayload, WelcomePayload, ORDER_COMPLETED_TYPE,
    WELCOME_TYPE,
};

/// Errors that can occur while decoding a text frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not JSON, or lacks the envelope fields.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope is valid but the payload does not fit the shape its
    /// `type` declares.
    #[error("payload does not match the `{event_type}` shape: {detail}")]
    PayloadShapeMismatch { event_type: String, detail: String },
}

/// Decodes one raw text frame into an [`InboundEvent`].
///
/// Unknown `type` values decode successfully as
/// [`InboundEvent::Unrecognized`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEnvelope`] if the frame is not a JSON
/// envelope, and [`ProtocolError::PayloadShapeMismatch`] if a known `type`
/// carries a payload of the wrong shape.
///
/// # Examples
///
/// ```rust
/// use mipedido_core::protocol::{decode, InboundEvent};
///
/// let frame = r#"{"type":"welcome","topic":"orders","payload":{"message":"hi","order_id":"abc","time":"2024-01-01T00:00:00Z"}}"#;
/// let event = decode(frame).unwrap();
/// assert_eq!(
///     event,
///     InboundEvent::Welcome {
///         order_id: "abc".to_string(),
///         server_time: "2024-01-01T00:00:00Z".to_string(),
///     }
/// );
/// ```
pub fn decode(raw: &str) -> Result<InboundEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;

    match envelope.event_type.as_str() {
        WELCOME_TYPE => {
            let payload: WelcomePayload = payload_as(envelope)?;
            Ok(InboundEvent::Welcome {
                order_id: payload.order_id,
                server_time: payload.time,
            })
        }
        ORDER_COMPLETED_TYPE => {
            let payload: OrderCompletedPayload = payload_as(envelope)?;
            Ok(InboundEvent::OrderCompleted {
                order_id: payload.order_id,
                restaurant_id: payload.restaurant_id,
                timestamp: payload.timestamp,
            })
        }
        _ => Ok(InboundEvent::Unrecognized {
            raw_type: envelope.event_type,
        }),
    }
}

/// Re-reads the envelope's untyped payload as `T`.
fn payload_as<T: DeserializeOwned>(envelope: Envelope) -> Result<T, ProtocolError> {
    let Envelope {
        event_type,
        payload,
        ..
    } = envelope;
    serde_json::from_value(payload).map_err(|e| ProtocolError::PayloadShapeMismatch {
        event_type,
        detail: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
