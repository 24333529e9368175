//! Application layer for mipedido-client.
//!
//! - **`listener`** – the [`EventListener`] contract the UI implements, and the
//!   dispatcher task that delivers notifications to it in order.
//! - **`transport`** – the [`Transport`] seam the supervisor opens sessions
//!   through.
//! - **`supervisor`** – [`ConnectionSupervisor`], which owns at most one live
//!   session and reports exactly one terminal notification per session.
//! - **`registry`** – [`SessionRegistry`], the controlled process-wide holder
//!   of the supervisor.
//! - **`join_order`** – [`JoinOrderUseCase`], short-code resolution and join
//!   with user-facing error classification over the [`OrderService`] seam.
//!
//! Nothing here opens sockets; the infrastructure layer supplies the
//! implementations.

pub mod join_order;
pub mod listener;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use join_order::{JoinError, JoinOrderUseCase, OrderService, ServiceError};
pub use listener::{EventListener, Notification, NotificationDispatcher};
pub use registry::SessionRegistry;
pub use supervisor::{ConnectionSupervisor, SessionSnapshot, SupervisorError};
pub use transport::{ConnectRequest, Transport, TransportConnection, TransportEvent, TransportFailure};
