//! Join-order use case: turn a scanned or typed code into a joined order.
//!
//! ```text
//! "a1b2-7ya3" ─ShortCode─▶ resolve_short_code ─▶ OrderId ─▶ join_order ─▶ JoinedOrder
//! "665f1c..." ─OrderId───────────────────────────────────▶ join_order ─▶ JoinedOrder
//! ```
//!
//! The REST calls go through the [`OrderService`] trait.  HTTP statuses it
//! reports are classified into user-facing [`JoinError`]s here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mipedido_core::{
    Ack, JoinedOrder, OrderCode, OrderCreated, OrderId, OrderLineItem, OrderModification,
    ReviewRequest, ShortCode, ShortCodeResolution,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::supervisor::{ConnectionSupervisor, SupervisorError};

/// What an [`OrderService`] call can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// No response (DNS, refused, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// The REST order API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, restaurant_id: &str) -> Result<OrderCreated, ServiceError>;

    async fn join_order(&self, order_id: &OrderId) -> Result<JoinedOrder, ServiceError>;

    async fn get_order(
        &self,
        order_id: &OrderId,
        user_id: &str,
    ) -> Result<Vec<OrderLineItem>, ServiceError>;

    /// Adds, updates, or (with quantity 0) removes one product.
    async fn modify_order(
        &self,
        order_id: &OrderId,
        user_id: &str,
        modification: &OrderModification,
    ) -> Result<Ack, ServiceError>;

    async fn resolve_short_code(&self, code: &ShortCode)
        -> Result<ShortCodeResolution, ServiceError>;

    async fn submit_review(&self, review: &ReviewRequest) -> Result<Ack, ServiceError>;
}

/// Why joining an order failed, phrased for the user.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("order does not exist")]
    NotFound,

    #[error("order already fulfilled or closed")]
    AlreadyClosed,

    #[error("invalid code")]
    InvalidCode,

    #[error("connection error: {0}")]
    Network(String),

    /// The join succeeded but the backend returned no restaurant.
    #[error("server returned an order without a restaurant")]
    MissingRestaurant,

    /// Another join is still running; this trigger was ignored.
    #[error("a join attempt is already in progress")]
    AttemptInFlight,

    #[error("could not start order notifications: {0}")]
    Session(#[from] SupervisorError),

    #[error("{0}")]
    Other(String),
}

impl From<ServiceError> for JoinError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Status { code: 404, .. } => JoinError::NotFound,
            ServiceError::Status { code: 409, .. } => JoinError::AlreadyClosed,
            ServiceError::Status { code: 422, .. } => JoinError::InvalidCode,
            ServiceError::Status { message, .. } => JoinError::Other(message),
            ServiceError::Network(detail) => JoinError::Network(detail),
            ServiceError::Decode(detail) => JoinError::Other(detail),
        }
    }
}

/// Releases the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct JoinOrderUseCase {
    service: Arc<dyn OrderService>,
    in_flight: AtomicBool,
}

impl JoinOrderUseCase {
    pub fn new(service: Arc<dyn OrderService>) -> Self {
        Self {
            service,
            in_flight: AtomicBool::new(false),
        }
    }

    /// `true` while a join started by [`join_by_code`](Self::join_by_code) runs.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Joins the order identified by `code` (full id or short code).
    ///
    /// Only one attempt runs at a time; triggers arriving meanwhile get
    /// [`JoinError::AttemptInFlight`].  Dropping the returned future (the user
    /// dismissed the dialog) ends the attempt too.
    ///
    /// # Errors
    ///
    /// See [`JoinError`].  A failed short-code lookup never reaches the join
    /// call.
    pub async fn join_by_code(&self, code: &str) -> Result<JoinedOrder, JoinError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("join trigger ignored; attempt in flight");
            return Err(JoinError::AttemptInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let order_id = self.canonical_order_id(code).await?;
        info!(%order_id, "joining order");

        let mut joined = self.service.join_order(&order_id).await.map_err(|e| {
            warn!(%order_id, "join failed: {e}");
            JoinError::from(e)
        })?;
        if joined.restaurant_id.trim().is_empty() {
            warn!(%order_id, "join response has no restaurant id");
            return Err(JoinError::MissingRestaurant);
        }
        joined.order_id = order_id.to_string();
        Ok(joined)
    }

    /// Joins like [`join_by_code`](Self::join_by_code), then starts the
    /// notification session for the joined order.
    pub async fn join_and_watch(
        &self,
        code: &str,
        supervisor: &ConnectionSupervisor,
    ) -> Result<JoinedOrder, JoinError> {
        let joined = self.join_by_code(code).await?;
        supervisor.connect(&joined.order_id)?;
        Ok(joined)
    }

    async fn canonical_order_id(&self, code: &str) -> Result<OrderId, JoinError> {
        match OrderCode::parse(code).map_err(|_| JoinError::InvalidCode)? {
            OrderCode::Full(order_id) => Ok(order_id),
            OrderCode::Short(short) => {
                debug!(code = %short, "resolving short code");
                let resolution = self.service.resolve_short_code(&short).await.map_err(|e| {
                    warn!(code = %short, "short code lookup failed: {e}");
                    JoinError::from(e)
                })?;
                OrderId::parse(&resolution.object_id).map_err(|e| {
                    JoinError::Other(format!("short code resolved to an unusable id: {e}"))
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
