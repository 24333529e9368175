//! Infrastructure layer for mipedido-client.
//!
//! Adapters behind the application-layer seams.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`, and
//! `mipedido_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`transport`** – the tokio-tungstenite WebSocket transport and the
//!   scripted mock transport used by the session tests.
//! - **`listener`** – the tracing listener used by `mipedido-watch` and the
//!   recording listener used by tests.

pub mod listener;
pub mod transport;
