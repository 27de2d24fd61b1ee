//! loom-server - HTTP and WebSocket adapter for the loom streaming engine.
//!
//! This crate owns no state of its own beyond process wiring: it builds an
//! [`AppState`] around a [`loom_core::ProcessorRegistry`] and a
//! [`loom_log::EventLog`], exposes the action-ingress route and the
//! Subscription Composer's websocket route, and binds/serves/shuts down.

pub mod error;
pub mod http;
mod state;
pub mod ws;

use std::future::Future;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;

/// A future that resolves when a shutdown signal is received.
///
/// On Unix, this listens for SIGTERM and SIGINT (Ctrl-C).
/// On other platforms, this only listens for Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl-C, initiating graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// The loom HTTP/WS server.
pub struct LoomServer {
    config: ServerConfig,
    state: std::sync::Arc<AppState>,
}

impl LoomServer {
    /// Create a server wrapping an already-constructed [`AppState`] (its
    /// generator and event log choice is the caller's, typically `loom-cli`).
    #[must_use]
    pub fn new(config: ServerConfig, state: std::sync::Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> std::sync::Arc<AppState> {
        std::sync::Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        self.run_with_listener(listener).await
    }

    /// Run the server with a pre-bound listener.
    ///
    /// Useful for testing: bind to port 0 and read back the actual address
    /// before starting the server.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        self.run_with_graceful_shutdown(listener, shutdown_signal())
            .await
    }

    /// Run the server with a pre-bound listener and a custom shutdown
    /// signal. Stops accepting new connections when the signal resolves,
    /// then evicts every live Processor before returning.
    pub async fn run_with_graceful_shutdown<F>(
        self,
        listener: TcpListener,
        shutdown_signal: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("loom server listening on {}", addr);

        let sweeper_shutdown = CancellationToken::new();
        let _sweeper = self.state.registry.spawn_sweeper(sweeper_shutdown.clone());

        let state = self.state();
        let router = create_router(self.state);

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        tracing::info!("server shutdown initiated, cleaning up resources");
        sweeper_shutdown.cancel();
        state.registry.shutdown_all().await;

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7432,
        }
    }
}

impl ServerConfig {
    /// Create a new `ServerConfig` with the specified host and port
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:7432")
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
