//! Handshake protocol between clients and the relay server.
//!
//! A freshly connected client sends one action byte:
//!
//! ```text
//! create: [0x00]
//! join:   [0x01][code; SESSION_CODE_LENGTH]
//! ```
//!
//! The server answers with one status byte. A successful create is followed by
//! the session code. After a successful response the connection carries raw,
//! unframed bytes in both directions.

use thiserror::Error;

/// Number of bytes in a session code.
pub const SESSION_CODE_LENGTH: usize = 7;

/// Errors raised while decoding handshake bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown action byte: {0:#04x}")]
    UnknownAction(u8),

    #[error("unknown status byte: {0:#04x}")]
    UnknownStatus(u8),
}

/// First byte sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    /// Create a new session (no payload follows)
    CreateSession = 0x00,
    /// Join an existing session (`SESSION_CODE_LENGTH` code bytes follow)
    JoinSession = 0x01,
}

impl Action {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Action {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(Action::CreateSession),
            0x01 => Ok(Action::JoinSession),
            other => Err(ProtocolError::UnknownAction(other)),
        }
    }
}

/// Status byte sent by the server in response to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Error = 0x01,
    SessionNotFound = 0x02,
    SessionFull = 0x03,
    ServerFull = 0x04,
    InvalidAction = 0x05,
}

impl Status {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl TryFrom<u8> for Status {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(Status::Success),
            0x01 => Ok(Status::Error),
            0x02 => Ok(Status::SessionNotFound),
            0x03 => Ok(Status::SessionFull),
            0x04 => Ok(Status::ServerFull),
            0x05 => Ok(Status::InvalidAction),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
            Status::SessionNotFound => "SESSION_NOT_FOUND",
            Status::SessionFull => "SESSION_FULL",
            Status::ServerFull => "SERVER_FULL",
            Status::InvalidAction => "INVALID_ACTION",
        };
        f.write_str(name)
    }
}

/// Encode the response to a successful create: status byte followed by the code.
pub fn encode_created(code: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + code.len());
    response.push(Status::Success.as_byte());
    response.extend_from_slice(code);
    response
}

/// Encode a join request for `code`.
pub fn encode_join(code: &[u8]) -> Vec<u8> {
    let mut request = Vec::with_capacity(1 + code.len());
    request.push(Action::JoinSession.as_byte());
    request.extend_from_slice(code);
    request
}
