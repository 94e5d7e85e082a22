//! Session handshake.

use tcp_session_shared::protocol::{Action, SESSION_CODE_LENGTH, Status, encode_join};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ClientError;

/// What the client asks the server for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create,
    Join(String),
}

impl Request {
    /// Build a join request, rejecting codes the server could never have issued
    pub fn join(code: impl Into<String>) -> Result<Self, ClientError> {
        let code = code.into();
        if code.len() != SESSION_CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ClientError::InvalidCode(code, SESSION_CODE_LENGTH));
        }
        Ok(Request::Join(code))
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Request::Create => vec![Action::CreateSession.as_byte()],
            Request::Join(code) => encode_join(code.as_bytes()),
        }
    }
}

/// Result of a successful handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new session was created under this code
    Created(String),
    Joined,
}

/// Send `request` and wait for the server's answer
///
/// On success the stream is positioned at the start of the relay data.
pub async fn open_session<S>(stream: &mut S, request: &Request) -> Result<Admission, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&request.encode()).await?;
    stream.flush().await?;

    let mut status = [0u8; 1];
    read_exact(stream, &mut status).await?;
    let status = Status::try_from(status[0])?;
    if !status.is_success() {
        return Err(ClientError::Rejected(status));
    }

    match request {
        Request::Create => {
            let mut code = [0u8; SESSION_CODE_LENGTH];
            read_exact(stream, &mut code).await?;
            Ok(Admission::Created(String::from_utf8_lossy(&code).into_owned()))
        }
        Request::Join(_) => Ok(Admission::Joined),
    }
}

async fn read_exact<S>(stream: &mut S, buf: &mut [u8]) -> Result<(), ClientError>
where
    S: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ClientError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}
