//! Error types for the relay client.

use tcp_session_shared::protocol::{ProtocolError, Status};
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status
    #[error("server rejected the request: {0}")]
    Rejected(Status),

    /// The session code given on the command line can never be valid
    #[error("invalid session code '{0}': expected {1} ASCII letters or digits")]
    InvalidCode(String, usize),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server closed the connection during the handshake
    #[error("connection closed during handshake")]
    ConnectionClosed,

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}
