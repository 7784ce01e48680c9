//! TCP line server
//!
//! Echoes every line a client sends. Each connection runs in its own task
//! under a crash reporting recovery point, so a panicking connection is
//! reported and torn down while the server keeps accepting.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use crashline_core::config::ServerConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::id::ServerId;

/// A client line that makes its connection handler panic. Lets operators
/// check crash reporting end to end.
pub const FORCE_PANIC: &str = "force-panic";

/// Tracks open connections and publishes the count to the crash reporter.
struct ConnectionTracker {
    server_id: String,
    open: AtomicU64,
}

impl ConnectionTracker {
    fn open(self: &Arc<Self>) -> ConnectionGuard {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        crashline_telemetry::set_connection_count(&self.server_id, open);
        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    fn count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.tracker.open.fetch_sub(1, Ordering::SeqCst) - 1;
        crashline_telemetry::set_connection_count(&self.tracker.server_id, open);
    }
}

/// A running server instance.
pub struct Server {
    id: ServerId,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: Arc<ConnectionTracker>,
    shutdown: CancellationToken,
}

impl Server {
    /// Binds the listener, assigns the server identity and registers it
    /// with the crash reporter.
    pub async fn start(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
        let local_addr = listener.local_addr()?;

        let id = ServerId::next();
        crashline_telemetry::register_server_identity(id.as_str());
        crashline_telemetry::set_store_count(id.as_str(), u64::from(config.stores));
        info!(server_id = %id, addr = %local_addr, stores = config.stores, "Server started");

        let connections = Arc::new(ConnectionTracker {
            server_id: id.as_str().to_string(),
            open: AtomicU64::new(0),
        });

        Ok(Self {
            id,
            listener,
            local_addr,
            connections,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being served.
    pub fn open_connections(&self) -> u64 {
        self.connections.count()
    }

    /// Token that stops [`Server::run`] and all connections when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Accepts connections until the shutdown token is cancelled.
    pub async fn run(&self) -> Result<()> {
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "Accepted connection");

                    let guard = self.connections.open();
                    let shutdown = self.shutdown.child_token();
                    tokio::spawn(crashline_telemetry::recover_and_report_async(async move {
                        let _guard = guard;
                        if let Err(e) = handle_connection(stream, shutdown).await {
                            debug!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    }));
                }
                _ = self.shutdown.cancelled() => {
                    info!(server_id = %self.id, "Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Echo lines back until the client disconnects or the server stops.
async fn handle_connection(stream: TcpStream, shutdown: CancellationToken) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        let Some(line) = line else {
            return Ok(());
        };

        if line.trim() == FORCE_PANIC {
            panic!("panic forced by client request");
        }

        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
}
