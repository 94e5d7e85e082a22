//! Relay server tunables.

use std::time::Duration;

use tcp_session_shared::protocol::SESSION_CODE_LENGTH;
use thiserror::Error;

use crate::infrastructure::network_client::ClientConfig;

/// Maximum number of live sessions in the directory
pub const DEFAULT_MAX_SESSIONS: usize = 500;
/// Maximum number of members in one session
pub const DEFAULT_MAX_USERS_PER_SESSION: usize = 5;
/// Bytes read from a member connection per chunk
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;
/// Chunks queued per client before `write` waits
pub const DEFAULT_SEND_QUEUE_DEPTH: usize = 128;
/// Unwritten bytes per client at which the client counts as a slow consumer
pub const DEFAULT_BACKPRESSURE_CEILING: usize = 4 * 1024 * 1024;
/// Deadline for a single socket write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(200);
/// Delay between an error status and closing the connection
pub const DEFAULT_CLOSE_DELAY: Duration = Duration::from_millis(500);
/// Time a new connection has to deliver its complete request
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Random codes tried before session creation gives up
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "backpressure ceiling ({ceiling} bytes) must be larger than one read chunk ({chunk} bytes)"
    )]
    CeilingTooSmall { ceiling: usize, chunk: usize },
}

/// Every tunable of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub max_sessions: usize,
    pub max_users_per_session: usize,
    pub session_code_length: usize,
    pub read_chunk_size: usize,
    pub send_queue_depth: usize,
    pub backpressure_ceiling: usize,
    pub write_timeout: Duration,
    pub close_delay: Duration,
    pub handshake_timeout: Duration,
    pub max_code_attempts: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_users_per_session: DEFAULT_MAX_USERS_PER_SESSION,
            session_code_length: SESSION_CODE_LENGTH,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            send_queue_depth: DEFAULT_SEND_QUEUE_DEPTH,
            backpressure_ceiling: DEFAULT_BACKPRESSURE_CEILING,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            close_delay: DEFAULT_CLOSE_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

impl RelayConfig {
    /// Check the relationships between tunables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("max_sessions", self.max_sessions),
            ("max_users_per_session", self.max_users_per_session),
            ("session_code_length", self.session_code_length),
            ("read_chunk_size", self.read_chunk_size),
            ("send_queue_depth", self.send_queue_depth),
            ("max_code_attempts", self.max_code_attempts),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write_timeout"));
        }
        if self.backpressure_ceiling <= self.read_chunk_size {
            return Err(ConfigError::CeilingTooSmall {
                ceiling: self.backpressure_ceiling,
                chunk: self.read_chunk_size,
            });
        }
        Ok(())
    }

    /// Per-connection settings handed to every `NetworkClient`.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            send_queue_depth: self.send_queue_depth,
            backpressure_ceiling: self.backpressure_ceiling,
            write_timeout: self.write_timeout,
        }
    }
}
