//! Byte pump between local input/output and an admitted session connection.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::ClientError;

/// Copy `input` to the server and everything the server relays to `output`
///
/// When `input` ends, the sending side of the connection is shut down and the
/// pump keeps receiving. Returns the number of bytes written to `output` once
/// the server closes the connection.
pub async fn relay<S, I, O>(stream: S, mut input: I, mut output: O) -> Result<u64, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut from_server, mut to_server) = tokio::io::split(stream);

    let upload = async {
        let sent = tokio::io::copy(&mut input, &mut to_server).await?;
        to_server.shutdown().await?;
        Ok::<u64, std::io::Error>(sent)
    };
    let download = async {
        let received = tokio::io::copy(&mut from_server, &mut output).await?;
        output.flush().await?;
        Ok::<u64, std::io::Error>(received)
    };
    tokio::pin!(upload, download);

    let mut upload_done = false;
    loop {
        tokio::select! {
            result = &mut upload, if !upload_done => {
                upload_done = true;
                match result {
                    Ok(sent) => tracing::debug!("Input finished after {} bytes", sent),
                    Err(e) => tracing::debug!("Stopped sending: {}", e),
                }
            }
            result = &mut download => return Ok(result?),
        }
    }
}
