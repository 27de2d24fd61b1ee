//! Shared test utilities for loom-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;

use loom_core::{Generator, LoomConfig, MockGenerator};
use loom_log::InMemoryEventLog;
use loom_server::{AppState, LoomServer, ServerConfig};
use tokio::net::TcpListener;

/// Creates a test server backed by a fresh `MockGenerator` and an
/// in-memory event log, returns its state and bound address.
pub async fn create_test_server() -> (Arc<AppState>, SocketAddr, Arc<MockGenerator>) {
    let generator = Arc::new(MockGenerator::new());
    let generator_dyn: Arc<dyn Generator> = generator.clone();
    let event_log = Arc::new(InMemoryEventLog::new());
    let state = Arc::new(AppState::new(generator_dyn, event_log, LoomConfig::default()));

    let addr = spawn_server(state.clone()).await;
    (state, addr, generator)
}

async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = LoomServer::new(ServerConfig::new("127.0.0.1", 0), state);
    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    addr
}
