//! Domain layer for mipedido-client.
//!
//! Holds only runtime configuration; the order and protocol types live in
//! `mipedido-core`.

pub mod config;

pub use config::{ClientConfig, ConfigError, SessionConfig};
