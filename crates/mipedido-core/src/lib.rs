//! # mipedido-core
//!
//! Shared library for the MiPedido ordering client containing the real-time
//! notification wire protocol, the order domain types, and the closed failure
//! taxonomy used by the session supervisor.
//!
//! This crate performs no I/O.  It has zero dependencies on sockets, async
//! runtimes, or UI frameworks, so everything in it can be tested with plain
//! `#[test]` functions.
//!
//! # Architecture overview
//!
//! When a group order is checked out, every participant's device keeps one
//! WebSocket open to the notification engine.  The engine pushes a `welcome`
//! frame right after the upgrade and an `order_completed` frame once the
//! restaurant fulfils the order.
//!
//! - **`protocol`** – The JSON envelope `{type, topic, payload}` and the
//!   [`decode`] step that turns a raw text frame into a typed
//!   [`InboundEvent`].  Malformed frames become [`ProtocolError`] values,
//!   never panics.
//!
//! - **`domain`** – Order identifiers and short codes, the session state
//!   machine states, the classification of connection failures, and the data
//!   shapes exchanged with the REST order service.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `mipedido_core::OrderId` instead of `mipedido_core::domain::order::OrderId`.
pub use domain::models::{
    Ack, JoinedOrder, OrderCreated, OrderLineItem, OrderModification, ReviewError,
    ReviewRequest, ShortCodeResolution,
};
pub use domain::order::{is_unreserved, OrderCode, OrderId, OrderIdError, ShortCode};
pub use domain::outcome::{ConnectionOutcome, FailureCategory, SessionState};
pub use protocol::codec::{decode, ProtocolError};
pub use protocol::messages::InboundEvent;
