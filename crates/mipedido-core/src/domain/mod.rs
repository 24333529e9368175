//! Domain layer: pure order-session types with no I/O.
//!
//! - [`order`] – validated order identifiers and human-typed short codes.
//! - [`outcome`] – session states, failure categories, and the terminal
//!   outcome delivered once per session.
//! - [`models`] – request/response shapes exchanged with the REST order
//!   service.

pub mod models;
pub mod order;
pub mod outcome;

pub use models::{
    Ack, JoinedOrder, OrderCreated, OrderLineItem, OrderModification, ReviewError,
    ReviewRequest, ShortCodeResolution,
};
pub use order::{is_unreserved, OrderCode, OrderId, OrderIdError, ShortCode};
pub use outcome::{ConnectionOutcome, FailureCategory, SessionState};
