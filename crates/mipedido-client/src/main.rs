//! mipedido-watch: follow one order's notification session from a terminal.
//!
//! Connects to the notification engine for `--order-id`, logs every
//! notification, and exits once the order completes, the session ends, or
//! Ctrl+C is pressed.
//!
//! # Usage
//!
//! ```text
//! mipedido-watch --order-id <ID> [OPTIONS]
//!
//! Options:
//!   --order-id      <ID>    Order to follow
//!   --config        <PATH>  Config file [default: platform config dir]
//!   --ws-base-url   <URL>   Notification endpoint without query string
//!   --topic         <NAME>  Topic query parameter
//!   --ping-interval <SECS>  Keep-alive ping interval
//!   --log-level     <LEVEL> error | warn | info | debug | trace
//! ```
//!
//! CLI values override the config file.  `RUST_LOG` overrides `--log-level`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mipedido_client::application::{EventListener, SessionRegistry};
use mipedido_client::domain::config::{config_file_path, load_config_from, ClientConfig};
use mipedido_client::infrastructure::listener::TracingListener;
use mipedido_client::infrastructure::transport::WsTransport;

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "mipedido-watch",
    about = "Follow the real-time notifications of one MiPedido order",
    version
)]
struct Cli {
    /// Order identifier (the QR payload).
    #[arg(long, env = "MIPEDIDO_ORDER_ID")]
    order_id: String,

    /// Config file to read instead of the platform default.
    #[arg(long, env = "MIPEDIDO_CONFIG")]
    config: Option<PathBuf>,

    /// Notification endpoint, without the query string.
    #[arg(long, env = "MIPEDIDO_WS_BASE_URL")]
    ws_base_url: Option<String>,

    #[arg(long, env = "MIPEDIDO_TOPIC")]
    topic: Option<String>,

    /// Keep-alive ping interval in seconds.  0 disables pings.
    #[arg(long, env = "MIPEDIDO_PING_INTERVAL")]
    ping_interval: Option<u64>,

    #[arg(long, env = "MIPEDIDO_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies the CLI overrides on top.
    fn resolve_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match config_file_path() {
                Ok(path) => load_config_from(&path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?,
                Err(_) => ClientConfig::default(),
            },
        };
        self.apply_overrides(&mut config);
        config
            .session
            .validate()
            .context("invalid session settings")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.ws_base_url {
            config.session.ws_base_url = url.clone();
        }
        if let Some(topic) = &self.topic {
            config.session.topic = topic.clone();
        }
        if let Some(secs) = self.ping_interval {
            config.session.ping_interval_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Logs through [`TracingListener`] and wakes `main` when the watch is over.
struct WatchListener {
    log: TracingListener,
    done: Arc<Notify>,
}

impl EventListener for WatchListener {
    fn on_welcome(&self, order_id: &str, time: &str) {
        self.log.on_welcome(order_id, time);
    }

    fn on_order_completed(&self, order_id: &str, restaurant_id: &str, timestamp: &str) {
        self.log.on_order_completed(order_id, restaurant_id, timestamp);
        self.done.notify_one();
    }

    fn on_error(&self, message: &str) {
        self.log.on_error(message);
    }

    fn on_closed(&self, reason: &str) {
        self.log.on_closed(reason);
        self.done.notify_one();
    }

    fn on_connection_failure(&self, message: &str) {
        self.log.on_connection_failure(message);
        self.done.notify_one();
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();

    info!(
        order_id = %cli.order_id,
        endpoint = %config.session.ws_base_url,
        "mipedido-watch starting"
    );

    let transport = Arc::new(WsTransport::new(&config.session));
    let registry = SessionRegistry::new(config.session.clone(), transport);
    let supervisor = registry
        .get_or_create_supervisor()
        .context("failed to create connection supervisor")?;

    let done = Arc::new(Notify::new());
    supervisor.set_listener(Arc::new(WatchListener {
        log: TracingListener,
        done: Arc::clone(&done),
    }));
    supervisor
        .connect(&cli.order_id)
        .with_context(|| format!("cannot watch order '{}'", cli.order_id))?;

    tokio::select! {
        _ = done.notified() => info!("watch finished"),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C; closing session"),
            Err(e) => warn!("failed to listen for Ctrl+C signal: {e}"),
        },
    }

    registry.shutdown();

    // Give the close handshake a chance to finish before the runtime stops.
    let grace = config.session.close_timeout() + Duration::from_secs(1);
    let deadline = tokio::time::Instant::now() + grace;
    while supervisor.is_active() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    info!("mipedido-watch stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
