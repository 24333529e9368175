//! WebSocket transport built on tokio-tungstenite.
//!
//! `WsTransport::open` performs the HTTP upgrade for the session URL.  A
//! rejected upgrade (400/404/409 from the notification engine) surfaces as
//! [`TransportFailure::Handshake`] carrying the status and response body.
//!
//! An open [`WsConnection`] has no read timeout.  Instead it sends a ping
//! every `ping_interval` while the session waits for the next frame.
//! tungstenite answers the server's pings by itself.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use mipedido_core::protocol::NO_STATUS_RECEIVED;
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::application::transport::{
    ConnectRequest, Transport, TransportConnection, TransportEvent, TransportFailure,
};
use crate::domain::SessionConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens order-notification sessions over `ws://` or `wss://`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    ping_interval: Duration,
}

impl WsTransport {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
        }
    }

    /// A transport that pings every `ping_interval`.  Zero disables pings.
    pub fn with_ping_interval(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        request: &ConnectRequest,
    ) -> Result<Box<dyn TransportConnection>, TransportFailure> {
        let (stream, response) = connect_async(request.url.as_str())
            .await
            .map_err(map_ws_error)?;
        debug!(order_id = %request.order_id, status = %response.status(), "websocket upgrade accepted");
        Ok(Box::new(WsConnection::new(stream, self.ping_interval)))
    }
}

/// One open WebSocket, owned by a session task.
pub struct WsConnection {
    stream: WsStream,
    ping: Option<Interval>,
}

impl WsConnection {
    fn new(stream: WsStream, ping_interval: Duration) -> Self {
        let ping = (!ping_interval.is_zero()).then(|| {
            let mut interval = interval_at(Instant::now() + ping_interval, ping_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { stream, ping }
    }
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            tokio::select! {
                _ = next_ping(&mut self.ping) => {
                    trace!("sending keep-alive ping");
                    if let Err(e) = self.stream.send(Message::Ping(Vec::new())).await {
                        return Some(TransportEvent::Failed(map_ws_error(e)));
                    }
                }
                frame = self.stream.next() => {
                    return match frame {
                        None | Some(Err(WsError::ConnectionClosed)) => None,
                        Some(Ok(Message::Text(text))) => Some(TransportEvent::Text(text)),
                        Some(Ok(Message::Binary(data))) => Some(TransportEvent::Binary(data.len())),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.into_owned()))
                                .unwrap_or_else(|| (NO_STATUS_RECEIVED, String::new()));
                            Some(TransportEvent::Closed { code, reason })
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                        Some(Err(e)) => Some(TransportEvent::Failed(map_ws_error(e))),
                    };
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportFailure> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.stream
            .send(Message::Close(Some(frame)))
            .await
            .map_err(map_ws_error)
    }
}

/// Maps a tungstenite error onto the transport failure taxonomy.
fn map_ws_error(error: WsError) -> TransportFailure {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            let body = response
                .into_body()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            TransportFailure::Handshake { status, body }
        }
        WsError::Io(e) => TransportFailure::Io(e.to_string()),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportFailure::Io("connection already closed".to_string())
        }
        WsError::Protocol(e) => TransportFailure::Protocol(e.to_string()),
        e @ WsError::Utf8 { .. } => TransportFailure::Protocol(e.to_string()),
        other => TransportFailure::Other(other.to_string()),
    }
}
