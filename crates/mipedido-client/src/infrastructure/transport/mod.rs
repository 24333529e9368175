//! [`Transport`](crate::application::transport::Transport) implementations.
//!
//! - [`websocket`] – production transport over tokio-tungstenite.
//! - [`mock`] – scripted in-memory transport for tests.

pub mod mock;
pub mod websocket;

pub use mock::{MockPeer, MockTransport};
pub use websocket::WsTransport;
