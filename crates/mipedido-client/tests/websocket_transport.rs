//! Integration tests for `WsTransport` against a local tokio-tungstenite
//! server bound to an ephemeral port.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mipedido_client::application::{
    ConnectRequest, ConnectionSupervisor, Notification, Transport, TransportEvent,
    TransportFailure,
};
use mipedido_client::domain::SessionConfig;
use mipedido_client::infrastructure::listener::RecordingListener;
use mipedido_client::infrastructure::transport::WsTransport;
use mipedido_core::{ConnectionOutcome, FailureCategory, OrderId};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn listen() -> (TcpListener, SessionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = SessionConfig {
        ws_base_url: format!("ws://{}/ws", listener.local_addr().unwrap()),
        ping_interval_secs: 0,
        close_timeout_secs: 1,
        ..SessionConfig::default()
    };
    (listener, config)
}

fn request(config: &SessionConfig) -> ConnectRequest {
    ConnectRequest::new(&OrderId::parse("abc").unwrap(), config)
}

/// Accepts one upgrade and returns the stream plus the requested URI.
async fn accept(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut uri = String::new();
    let ws = accept_hdr_async(
        tcp,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        },
    )
    .await
    .unwrap();
    (ws, uri)
}

/// Answers one upgrade request with a plain HTTP error.
async fn reject(listener: TcpListener, status: u16, body: &'static str) {
    let (tcp, _) = listener.accept().await.unwrap();
    let _ = accept_hdr_async(
        tcp,
        move |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
            Err(http::Response::builder()
                .status(status)
                .body(Some(body.to_string()))
                .unwrap())
        },
    )
    .await;
}

fn welcome_frame() -> Message {
    Message::Text(
        r#"{"type":"welcome","topic":"orders","payload":{"message":"hi","order_id":"abc","time":"2024-01-01T00:00:00Z"}}"#
            .to_string(),
    )
}

fn close_frame(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }))
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upgrade_carries_order_id_and_topic() {
    // Arrange
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (mut ws, uri) = accept(&listener).await;
        ws.send(welcome_frame()).await.unwrap();
        uri
    });
    let transport = WsTransport::new(&config);

    // Act
    let mut connection = transport.open(&request(&config)).await.unwrap();
    let event = tokio::time::timeout(WAIT, connection.next_event()).await.unwrap();

    // Assert
    let uri = server.await.unwrap();
    assert_eq!(uri, "/ws?order_id=abc&topic=orders");
    match event {
        Some(TransportEvent::Text(text)) => assert!(text.contains(r#""type":"welcome""#)),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_upgrade_reports_status() {
    for (status, category) in [
        (404, FailureCategory::NotFound),
        (409, FailureCategory::Conflict),
        (400, FailureCategory::InvalidRequest),
    ] {
        // Arrange
        let (listener, config) = listen().await;
        let server = tokio::spawn(reject(listener, status, "rejected by test server"));
        let transport = WsTransport::new(&config);

        // Act
        let result = transport.open(&request(&config)).await;

        // Assert
        let failure = match result {
            Err(failure) => failure,
            Ok(_) => panic!("status {status}: upgrade should have been rejected"),
        };
        match &failure {
            TransportFailure::Handshake { status: got, .. } => assert_eq!(*got, status),
            other => panic!("status {status}: expected handshake failure, got {other:?}"),
        }
        match failure.into_outcome() {
            ConnectionOutcome::ConnectionFailed { category: got, .. } => {
                assert_eq!(got, category, "status {status}")
            }
            other => panic!("status {status}: unexpected outcome {other:?}"),
        }
        server.await.unwrap();
    }
}

#[tokio::test]
async fn test_refused_connection_is_io_failure() {
    // Arrange: bind then release a port so nothing listens on it.
    let (listener, config) = listen().await;
    drop(listener);
    let transport = WsTransport::new(&config);

    // Act
    let result = transport.open(&request(&config)).await;

    // Assert
    assert!(matches!(result, Err(TransportFailure::Io(_))));
}

// ── Open connection ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_close_frame_is_reported_with_code_and_reason() {
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        ws.send(close_frame(CloseCode::Away, "going away")).await.unwrap();
        // Drain until the client's close reply completes the handshake.
        while ws.next().await.is_some() {}
    });
    let transport = WsTransport::new(&config);
    let mut connection = transport.open(&request(&config)).await.unwrap();

    let event = tokio::time::timeout(WAIT, connection.next_event()).await.unwrap();
    drop(connection);

    assert_eq!(
        event,
        Some(TransportEvent::Closed {
            code: 1001,
            reason: "going away".to_string(),
        })
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_client_close_sends_normal_closure() {
    // Arrange
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        let mut received = None;
        // Keep reading so the close echo is flushed back to the client.
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Close(Some(frame)) = message {
                received = Some((u16::from(frame.code), frame.reason.into_owned()));
            }
        }
        received
    });
    let transport = WsTransport::new(&config);
    let mut connection = transport.open(&request(&config)).await.unwrap();

    // Act
    connection.close(1000, "User left the screen").await.unwrap();
    let echo = tokio::time::timeout(WAIT, connection.next_event()).await.unwrap();
    drop(connection);

    // Assert
    assert_eq!(
        server.await.unwrap(),
        Some((1000, "User left the screen".to_string()))
    );
    assert!(
        matches!(echo, None | Some(TransportEvent::Closed { code: 1000, .. })),
        "unexpected event after close: {echo:?}"
    );
}

#[tokio::test]
async fn test_keep_alive_ping_is_sent_while_waiting() {
    // Arrange
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        let first = ws.next().await;
        let saw_ping = matches!(first, Some(Ok(Message::Ping(_))));
        ws.send(Message::Text("after ping".to_string())).await.unwrap();
        saw_ping
    });
    let transport = WsTransport::with_ping_interval(Duration::from_millis(50));
    let mut connection = transport.open(&request(&config)).await.unwrap();

    // Act
    let event = tokio::time::timeout(WAIT, connection.next_event()).await.unwrap();

    // Assert
    assert!(server.await.unwrap(), "server should see a ping first");
    assert_eq!(event, Some(TransportEvent::Text("after ping".to_string())));
}

#[tokio::test]
async fn test_tcp_drop_without_close_ends_stream() {
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (ws, _) = accept(&listener).await;
        drop(ws);
    });
    let transport = WsTransport::new(&config);
    let mut connection = transport.open(&request(&config)).await.unwrap();
    server.await.unwrap();

    let event = tokio::time::timeout(WAIT, connection.next_event()).await.unwrap();

    assert!(
        matches!(event, None | Some(TransportEvent::Failed(_))),
        "unexpected event: {event:?}"
    );
}

// ── Through the supervisor ────────────────────────────────────────────────────

#[tokio::test]
async fn test_supervised_session_over_real_socket() {
    // Arrange
    let (listener, config) = listen().await;
    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        ws.send(welcome_frame()).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"order_completed","topic":"orders","payload":{"order_id":"abc","restaurant_id":"r1","status":"fulfilled","timestamp":"t","message":"ready"}}"#
                .to_string(),
        ))
        .await
        .unwrap();
        ws.send(close_frame(CloseCode::Normal, "Order fulfilled")).await.unwrap();
        while ws.next().await.is_some() {}
    });
    let transport = Arc::new(WsTransport::new(&config));
    let supervisor = ConnectionSupervisor::new(config, transport).unwrap();
    let listener = Arc::new(RecordingListener::new());
    supervisor.set_listener(listener.clone());

    // Act
    supervisor.connect("abc").unwrap();
    let events = listener.wait_for_count(2, WAIT).await;
    server.await.unwrap();
    let deadline = tokio::time::Instant::now() + WAIT;
    while supervisor.current_session().is_some() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Assert
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Notification::Welcome { .. }));
    assert!(matches!(events[1], Notification::OrderCompleted { .. }));
    assert!(supervisor.current_session().is_none());
    assert!(listener.terminal_events().is_empty());
}
