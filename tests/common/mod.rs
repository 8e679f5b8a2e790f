#![allow(dead_code, reason = "each test binary uses a subset")]
use std::net::SocketAddr;

use ecocompteur_client::simulator::{self, SimulatorState};
use tokio::net::TcpListener;

/// Simulator bound to an ephemeral local port, stopped on drop.
pub struct MockServer {
    pub addr: SocketAddr,
    pub state: SimulatorState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Mock server has no address");
        let state = SimulatorState::default();
        let handle = tokio::spawn({
            let state = state.clone();
            async move {
                simulator::serve(listener, state)
                    .await
                    .expect("Mock server failed");
            }
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    listener.local_addr().expect("Listener has no address")
}

/// Accepts connections and never answers.
pub async fn silent_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Listener has no address");
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (addr, handle)
}
