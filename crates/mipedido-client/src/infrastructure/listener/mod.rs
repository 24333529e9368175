//! [`EventListener`] implementations.
//!
//! - [`TracingListener`] logs every notification; used by `mipedido-watch`.
//! - [`mock::RecordingListener`] records notifications for test assertions.

pub mod mock;

use tracing::{error, info, warn};

use crate::application::listener::EventListener;

pub use mock::RecordingListener;

/// Writes each notification to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_welcome(&self, order_id: &str, time: &str) {
        info!(%order_id, server_time = %time, "subscribed to order notifications");
    }

    fn on_order_completed(&self, order_id: &str, restaurant_id: &str, timestamp: &str) {
        info!(%order_id, %restaurant_id, %timestamp, "order completed");
    }

    fn on_error(&self, message: &str) {
        warn!("{message}");
    }

    fn on_closed(&self, reason: &str) {
        info!("{reason}");
    }

    fn on_connection_failure(&self, message: &str) {
        error!("{message}");
    }
}
