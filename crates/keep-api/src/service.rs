//! Binds the router to a listener and runs it until shutdown is
//! requested.

use std::net::SocketAddr;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// The running keepstore HTTP service.
pub struct KeepstoreService {
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl KeepstoreService {
    pub fn new(state: AppState) -> Self {
        Self { state, shutdown_tx: None }
    }

    /// Bind and serve until `shutdown()` is called or the listener fails.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let addr = self.state.config.listen;
        let router = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;

        info!(%addr, "keepstore listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        if let Err(e) = server.await {
            error!(error = %e, "keepstore server exited with an error");
            return Err(ServiceError::Serve(e));
        }

        info!("keepstore stopped");
        Ok(())
    }

    /// Request a graceful shutdown of a running `start()` call.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
