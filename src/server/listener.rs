//! TCP listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{ProtocolErrorKind, ServerError};
use crate::processor::CommandProcessor;

use super::{handle_connection, ReplyRouter};

/// Connection metrics for monitoring.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Total connections accepted.
    pub connections_total: AtomicU64,
    /// Connections that ended with an error.
    pub connections_failed: AtomicU64,
    /// Currently active connections.
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished connection.
    pub fn record_connection(&self, success: bool) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.connections_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_connections(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn failed_connections(&self) -> u64 {
        self.connections_failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Command server accepting client connections over TCP.
pub struct ServerListener {
    listener: TcpListener,
    settings: Arc<Settings>,
    processor: Arc<CommandProcessor>,
    router: Arc<ReplyRouter>,
    metrics: Arc<ConnectionMetrics>,
    connection_semaphore: Arc<Semaphore>,
}

impl ServerListener {
    /// Bind to the configured address.
    ///
    /// `router` must be the reply sink `processor` was built with.
    pub async fn bind(
        settings: Arc<Settings>,
        processor: Arc<CommandProcessor>,
        router: Arc<ReplyRouter>,
    ) -> Result<Self, ServerError> {
        let address = &settings.server.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::Socket {
                message: format!("Failed to bind to {}: {}", address, e),
            })?;

        let connection_semaphore =
            Arc::new(Semaphore::new(settings.limits.max_concurrent_connections));
        info!(
            max_connections = settings.limits.max_concurrent_connections,
            "Connection limiting enabled"
        );

        if let Ok(local) = listener.local_addr() {
            info!(address = %local, "Server listener bound");
        }

        Ok(Self {
            listener,
            settings,
            processor,
            router,
            metrics: Arc::new(ConnectionMetrics::new()),
            connection_semaphore,
        })
    }

    /// The address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Active connections keep running until their clients disconnect.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), ServerError> {
        info!("Server listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        peer = %addr,
                                        max = self.settings.limits.max_concurrent_connections,
                                        "Connection limit reached, rejecting connection"
                                    );
                                    continue;
                                }
                            };

                            let settings = Arc::clone(&self.settings);
                            let processor = Arc::clone(&self.processor);
                            let router = Arc::clone(&self.router);
                            let metrics = Arc::clone(&self.metrics);

                            metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                            debug!(peer = %addr, active = metrics.active(), "New connection accepted");

                            tokio::spawn(async move {
                                let _permit = permit;
                                let success = match handle_connection(stream, settings, processor, router).await {
                                    Ok(()) => true,
                                    Err(ServerError::Protocol {
                                        kind: ProtocolErrorKind::ConnectionClosed,
                                    }) => true,
                                    Err(e) => {
                                        error!(peer = %addr, error = %e, "Connection handler error");
                                        false
                                    }
                                };

                                metrics.record_connection(success);
                                metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
                                debug!(active = metrics.active(), success, "Connection closed");
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait for all active connections to drain.
    pub async fn wait_for_drain(&self) {
        let poll_interval = std::time::Duration::from_millis(100);

        while self.metrics.active() > 0 {
            debug!(active = self.metrics.active(), "Waiting for connections to drain");
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counts() {
        let metrics = ConnectionMetrics::new();
        metrics.record_connection(true);
        metrics.record_connection(false);
        assert_eq!(metrics.total_connections(), 2);
        assert_eq!(metrics.failed_connections(), 1);
        assert_eq!(metrics.active(), 0);
    }
}
