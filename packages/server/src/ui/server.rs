//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::net::TcpListener;

use crate::{
    config::RelayConfig,
    usecase::{CreateSessionUseCase, JoinSessionUseCase, LeaveSessionUseCase, SendDataUseCase},
};

use super::{handler::handle_connection, signal::shutdown_signal, state::AppState};

/// Pause after a failed `accept` (e.g. file descriptor exhaustion)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP relay server
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(
        create_session_usecase: Arc<CreateSessionUseCase>,
        join_session_usecase: Arc<JoinSessionUseCase>,
        send_data_usecase: Arc<SendDataUseCase>,
        leave_session_usecase: Arc<LeaveSessionUseCase>,
        config: RelayConfig,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                create_session_usecase,
                join_session_usecase,
                send_data_usecase,
                leave_session_usecase,
                config,
            }),
        }
    }

    /// Run the relay server until Ctrl+C or SIGTERM
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("TCP session relay listening on {}", listener.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Accept connections on `listener` until `shutdown` resolves
    ///
    /// Every connection is handled on its own task. Connections that are
    /// already relaying are not waited for.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Accepted connection from {}", peer);
                        tokio::spawn(handle_connection(Arc::clone(&self.state), stream, peer));
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
        tracing::info!("Stopped accepting connections");
    }
}
