//! Order-notification wire protocol: envelope types and the text-frame decoder.

pub mod codec;
pub mod messages;

pub use codec::{decode, ProtocolError};
pub use messages::{
    Envelope, InboundEvent, OrderCompletedPayload, WelcomePayload, DEFAULT_TOPIC,
    NORMAL_CLOSURE, NO_STATUS_RECEIVED,
};
