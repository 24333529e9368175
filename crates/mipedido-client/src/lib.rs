//! mipedido-client library crate.
//!
//! The real-time half of the MiPedido ordering client.  After checkout, every
//! participant of a group order keeps one WebSocket open to the notification
//! engine, which greets the session and later announces that the restaurant
//! fulfilled the order.  This crate opens and supervises that session,
//! classifies its failures, and reports typed notifications to the UI.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! UI (EventListener)
//!         ↑ notifications
//! [mipedido-client]
//!   ├── domain/           ClientConfig and its TOML persistence
//!   ├── application/      ConnectionSupervisor, SessionRegistry,
//!   │                     JoinOrderUseCase, Transport / OrderService seams
//!   └── infrastructure/
//!         ├── transport/  tokio-tungstenite WebSocket, scripted mock
//!         └── listener/   tracing listener, recording listener
//! ```
//!
//! The wire protocol and order types live in `mipedido-core`.

/// Domain layer: runtime configuration.
pub mod domain;

/// Application layer: session supervision and the join flow.
pub mod application;

/// Infrastructure layer: transports and listeners.
pub mod infrastructure;
