//! Per-connection protocol handler.
//!
//! A connection starts with a one-byte action, followed by the session code
//! for a join. The reply is a single status byte (plus the code after a
//! create). On success the connection becomes a raw relay until either side
//! closes it. On failure the status is sent and the connection is closed after
//! `close_delay`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use tcp_session_shared::protocol::{Action, ProtocolError, Status};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    domain::{Member, MessagePusher, Session},
    infrastructure::network_client::{ClientError, NetworkClient},
    ui::state::AppState,
    usecase::{CreateSessionError, JoinSessionError},
};

/// First message of a connection
#[derive(Debug, PartialEq, Eq)]
enum Request {
    Create,
    Join(Vec<u8>),
}

#[derive(Debug, Error)]
enum RequestError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection closed before the request was complete")]
    Truncated,

    #[error(transparent)]
    Io(std::io::Error),
}

pub async fn handle_connection(state: Arc<AppState>, stream: TcpStream, peer: SocketAddr) {
    let label = peer.to_string();
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", label, e);
    }
    let mut stream = stream;

    let request = tokio::time::timeout(
        state.config.handshake_timeout,
        read_request(&mut stream, state.config.session_code_length),
    )
    .await;
    let request = match request {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            tracing::warn!("Invalid request from {}: {}", label, e);
            reject_stream(stream, Status::InvalidAction, state.config.close_delay).await;
            return;
        }
        Err(_) => {
            tracing::warn!(
                "{} sent no complete request within {:?}",
                label,
                state.config.handshake_timeout
            );
            reject_stream(stream, Status::InvalidAction, state.config.close_delay).await;
            return;
        }
    };

    match request {
        Request::Create => create_session(state, stream, label).await,
        Request::Join(raw_code) => join_session(state, stream, label, raw_code).await,
    }
}

async fn create_session(state: Arc<AppState>, stream: TcpStream, label: String) {
    let session = state.create_session_usecase.prepare();
    let client = start_client(&state, &session, stream, label);
    let pusher: Arc<dyn MessagePusher> = client.clone();

    match state.create_session_usecase.execute(&session, pusher).await {
        Ok((_code, member)) => relay(&state, &client, member).await,
        Err(e) => {
            tracing::warn!("Rejected create from {}: {}", client.label(), e);
            reject_client(&client, create_error_status(&e), state.config.close_delay).await;
        }
    }
}

async fn join_session(state: Arc<AppState>, stream: TcpStream, label: String, raw_code: Vec<u8>) {
    let session = match state.join_session_usecase.find(&raw_code).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Rejected join from {}: {}", label, e);
            reject_stream(stream, join_error_status(&e), state.config.close_delay).await;
            return;
        }
    };

    let client = start_client(&state, &session, stream, label);
    let pusher: Arc<dyn MessagePusher> = client.clone();

    match state.join_session_usecase.execute(&session, pusher).await {
        Ok(member) => relay(&state, &client, member).await,
        Err(e) => {
            tracing::warn!("Rejected join from {}: {}", client.label(), e);
            reject_client(&client, join_error_status(&e), state.config.close_delay).await;
        }
    }
}

/// Wrap the connection in a started client whose close removes it from `session`
fn start_client(
    state: &AppState,
    session: &Arc<Session>,
    stream: TcpStream,
    label: String,
) -> Arc<NetworkClient> {
    let close_handler = state.leave_session_usecase.close_handler(session);
    let client = NetworkClient::new(
        stream,
        label,
        state.config.client_config(),
        Some(close_handler),
    );
    client.start();
    client
}

/// Forward everything the member sends to the rest of its session
async fn relay(state: &AppState, client: &Arc<NetworkClient>, member: Member) {
    let mut buf = vec![0u8; state.config.read_chunk_size];
    loop {
        let n = match client.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("{} closed the connection", client.label());
                break;
            }
            Ok(n) => n,
            Err(ClientError::Closed) => break,
            Err(e) => {
                tracing::debug!("Read from {} failed: {}", client.label(), e);
                break;
            }
        };

        let chunk = Bytes::copy_from_slice(&buf[..n]);
        if let Err(e) = state.send_data_usecase.execute(&member, chunk).await {
            tracing::debug!("Stopped relaying for {}: {}", client.label(), e);
            break;
        }
    }

    client.close();
    state.leave_session_usecase.execute(&member).await;
}

async fn read_request<R>(stream: &mut R, code_length: usize) -> Result<Request, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut action = [0u8; 1];
    read_exact(stream, &mut action).await?;
    match Action::try_from(action[0])? {
        Action::CreateSession => Ok(Request::Create),
        Action::JoinSession => {
            let mut code = vec![0u8; code_length];
            read_exact(stream, &mut code).await?;
            Ok(Request::Join(code))
        }
    }
}

async fn read_exact<R>(stream: &mut R, buf: &mut [u8]) -> Result<(), RequestError>
where
    R: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RequestError::Truncated),
        Err(e) => Err(RequestError::Io(e)),
    }
}

/// Send `status` on a connection that never became a client, then close it
async fn reject_stream<W>(mut stream: W, status: Status, close_delay: Duration)
where
    W: AsyncWrite + Unpin,
{
    let sent = async {
        stream.write_all(&[status.as_byte()]).await?;
        stream.flush().await
    }
    .await;
    if let Err(e) = sent {
        tracing::debug!("Failed to send {}: {}", status, e);
        return;
    }
    tokio::time::sleep(close_delay).await;
}

/// Send `status` through a started client, then close it
async fn reject_client(client: &NetworkClient, status: Status, close_delay: Duration) {
    if let Err(e) = client.write(Bytes::copy_from_slice(&[status.as_byte()])).await {
        tracing::debug!("Failed to send {} to {}: {}", status, client.label(), e);
    }
    tokio::time::sleep(close_delay).await;
    client.close();
}

fn create_error_status(error: &CreateSessionError) -> Status {
    match error {
        CreateSessionError::ServerFull(_) => Status::ServerFull,
        CreateSessionError::CodeSpaceExhausted(_)
        | CreateSessionError::AdmissionFailed(_)
        | CreateSessionError::Session(_) => Status::Error,
    }
}

fn join_error_status(error: &JoinSessionError) -> Status {
    match error {
        JoinSessionError::NotFound(_) => Status::SessionNotFound,
        JoinSessionError::SessionFull(_) => Status::SessionFull,
        JoinSessionError::AdmissionFailed(_) | JoinSessionError::Session(_) => Status::Error,
    }
}
