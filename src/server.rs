use crate::auth::CredentialStore;
use crate::config::{ServerConfig, Tables};
use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::quote::RateTable;
use crate::ratelimit::RateLimiter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Shared state for the quote server.
pub struct ServerState {
    /// Username → password table consulted at login.
    pub credentials: CredentialStore,
    /// Currency baseline-value table consulted per request.
    pub rates: RateTable,
    /// Per-user request counter and lockout state.
    pub limiter: RateLimiter,
    /// Runtime server configuration.
    pub config: ServerConfig,
    /// Atomic counter of live connections, checked at accept.
    pub active_connections: AtomicUsize,
}

impl ServerState {
    /// Assemble server state from configuration and the loaded tables.
    #[must_use]
    pub fn new(config: ServerConfig, tables: Tables) -> Self {
        let limiter = RateLimiter::new(
            config.request_limit,
            Duration::from_secs(config.block_secs),
        );
        Self {
            credentials: CredentialStore::new(tables.users),
            rates: RateTable::new(tables.rates),
            limiter,
            config,
            active_connections: AtomicUsize::new(0),
        }
    }
}

/// # Errors
///
/// Returns an error if the accept loop encounters an I/O failure.
pub async fn run(listener: TcpListener, state: Arc<ServerState>) -> Result<(), ServerError> {
    let (shutdown_tx, _) = tokio::sync::watch::channel(());
    run_with_shutdown(listener, state, shutdown_tx).await
}

/// Run the server accept loop with an externally-controlled shutdown signal.
///
/// When the `shutdown_tx` sender is dropped, the accept loop stops accepting
/// new connections and waits for in-flight sessions to finish.
///
/// # Errors
///
/// Returns an error if the accept loop encounters an I/O failure.
pub async fn run_with_shutdown(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown_tx: tokio::sync::watch::Sender<()>,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr().map_err(ServerError::Io)?;
    info!("server listening on {}", local_addr);
    let mut shutdown_rx = shutdown_tx.subscribe();
    let task_tracker = Arc::new(tokio::sync::Notify::new());
    let mut active_tasks: usize = 0;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        if state.active_connections.load(Ordering::Relaxed) >= state.config.max_conns {
                            warn!("max connections reached, rejecting {}", addr);
                            drop(stream);
                            continue;
                        }
                        state.active_connections.fetch_add(1, Ordering::Relaxed);
                        let state = Arc::clone(&state);
                        let tracker = task_tracker.clone();
                        active_tasks += 1;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, Arc::clone(&state)).await {
                                tracing::debug!("connection from {} closed: {}", addr, e);
                            }
                            state.active_connections.fetch_sub(1, Ordering::Relaxed);
                            tracker.notify_one();
                        });
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                info!("shutdown signal received, draining {} sessions", active_tasks);
                break;
            }
        }
    }

    // Wait for in-flight sessions to finish (with timeout)
    let drain_timeout = std::time::Duration::from_secs(30);
    let deadline = tokio::time::Instant::now() + drain_timeout;
    while active_tasks > 0 {
        if tokio::time::timeout_at(deadline, task_tracker.notified())
            .await
            .is_err()
        {
            warn!(
                "drain timeout reached with {} sessions still active",
                active_tasks
            );
            break;
        }
        active_tasks = active_tasks.saturating_sub(1);
    }

    info!("server shut down gracefully");
    Ok(())
}
