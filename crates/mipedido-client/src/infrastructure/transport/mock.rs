//! Scripted in-memory transport for tests.
//!
//! Every successful `open` hands the test a [`MockPeer`]: the server side of
//! the fake connection.  The test pushes frames, closes, or failures through
//! the peer and observes the close frames the session sends back.
//!
//! ```ignore
//! let (transport, mut peers) = MockTransport::new();
//! let supervisor = ConnectionSupervisor::new(config, Arc::new(transport))?;
//! supervisor.connect("abc")?;
//!
//! let mut peer = peers.recv().await.unwrap();
//! peer.send_text(r#"{"type":"welcome","payload":{"order_id":"abc","time":"t"}}"#);
//! ```
//!
//! By default the connection acknowledges a client close immediately with a
//! matching `Closed` event.  [`MockTransport::silent_close`] turns that off to
//! exercise the close timeout.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::transport::{
    ConnectRequest, Transport, TransportConnection, TransportEvent, TransportFailure,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockTransport {
    peers: mpsc::UnboundedSender<MockPeer>,
    opened: Mutex<Vec<ConnectRequest>>,
    failures: Mutex<VecDeque<TransportFailure>>,
    open_delay: Option<Duration>,
    ack_close: bool,
}

impl MockTransport {
    /// Creates the transport and the receiver on which each opened
    /// connection's [`MockPeer`] arrives.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Self {
            peers,
            opened: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            open_delay: None,
            ack_close: true,
        };
        (transport, rx)
    }

    /// Makes every `open` take `delay` before completing.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Connections no longer answer client close frames.
    pub fn silent_close(mut self) -> Self {
        self.ack_close = false;
        self
    }

    /// The next `open` fails with `failure` instead of connecting.
    pub fn fail_next_open(&self, failure: TransportFailure) {
        lock(&self.failures).push_back(failure);
    }

    /// Every request passed to `open`, failed ones included.
    pub fn opened_requests(&self) -> Vec<ConnectRequest> {
        lock(&self.opened).clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.opened).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        request: &ConnectRequest,
    ) -> Result<Box<dyn TransportConnection>, TransportFailure> {
        lock(&self.opened).push(request.clone());
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let failure = lock(&self.failures).pop_front();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (closes_tx, closes_rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            request: request.clone(),
            events: events_tx,
            closes: closes_rx,
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportFailure::Other("mock peer receiver dropped".to_string()))?;

        Ok(Box::new(MockConnection {
            events: events_rx,
            pending: VecDeque::new(),
            closes: closes_tx,
            ack_close: self.ack_close,
        }))
    }
}

/// Client side of a mock connection.
struct MockConnection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    pending: VecDeque<TransportEvent>,
    closes: mpsc::UnboundedSender<(u16, String)>,
    ack_close: bool,
}

#[async_trait]
impl TransportConnection for MockConnection {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.events.recv().await
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportFailure> {
        // The peer may have been dropped by the test; the close still counts.
        let _ = self.closes.send((code, reason.to_string()));
        if self.ack_close {
            self.pending.push_back(TransportEvent::Closed {
                code,
                reason: reason.to_string(),
            });
        }
        Ok(())
    }
}

/// Server side of a mock connection, held by the test.
pub struct MockPeer {
    pub request: ConnectRequest,
    events: mpsc::UnboundedSender<TransportEvent>,
    closes: mpsc::UnboundedReceiver<(u16, String)>,
}

impl MockPeer {
    pub fn send_text(&self, text: impl Into<String>) {
        self.push(TransportEvent::Text(text.into()));
    }

    pub fn send_binary(&self, len: usize) {
        self.push(TransportEvent::Binary(len));
    }

    /// Server-initiated close with `code`.
    pub fn close(&self, code: u16, reason: &str) {
        self.push(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn fail(&self, failure: TransportFailure) {
        self.push(TransportEvent::Failed(failure));
    }

    /// Ends the stream without a close frame.
    pub fn drop_connection(self) {}

    /// Waits up to `within` for the next close frame the client sent.
    pub async fn client_close(&mut self, within: Duration) -> Option<(u16, String)> {
        tokio::time::timeout(within, self.closes.recv())
            .await
            .ok()
            .flatten()
    }

    /// `true` if the client has sent a close frame that was not yet observed.
    pub fn has_pending_client_close(&mut self) -> bool {
        !self.closes.is_empty()
    }

    fn push(&self, event: TransportEvent) {
        // The session may already be gone; late events are simply lost.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use mipedido_core::OrderId;

    use super::*;
    use crate::domain::SessionConfig;

    fn request() -> ConnectRequest {
        ConnectRequest::new(&OrderId::parse("abc").unwrap(), &SessionConfig::default())
    }

    #[tokio::test]
    async fn test_open_hands_peer_to_test_and_records_request() {
        // Arrange
        let (transport, mut peers) = MockTransport::new();

        // Act
        let mut connection = transport.open(&request()).await.unwrap();
        let peer = peers.recv().await.unwrap();
        peer.send_text("hello");

        // Assert
        assert_eq!(transport.open_count(), 1);
        assert_eq!(peer.request.order_id.as_str(), "abc");
        assert_eq!(
            connection.next_event().await,
            Some(TransportEvent::Text("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fail_next_open_fails_once() {
        let (transport, _peers) = MockTransport::new();
        transport.fail_next_open(TransportFailure::Io("refused".to_string()));

        assert!(transport.open(&request()).await.is_err());
        assert!(transport.open(&request()).await.is_ok());
        assert_eq!(transport.open_count(), 2);
    }

    #[tokio::test]
    async fn test_close_is_acknowledged_and_reported_to_peer() {
        let (transport, mut peers) = MockTransport::new();
        let mut connection = transport.open(&request()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        connection.close(1000, "bye").await.unwrap();

        assert_eq!(
            connection.next_event().await,
            Some(TransportEvent::Closed {
                code: 1000,
                reason: "bye".to_string()
            })
        );
        assert_eq!(
            peer.client_close(Duration::from_secs(1)).await,
            Some((1000, "bye".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dropped_peer_ends_stream() {
        let (transport, mut peers) = MockTransport::new();
        let mut connection = transport.open(&request()).await.unwrap();

        peers.recv().await.unwrap().drop_connection();

        assert_eq!(connection.next_event().await, None);
    }
}
