//! 送信キューをソケットへ書き出す writer タスク

use std::{sync::Weak, time::Duration};

use bytes::Bytes;
use tokio::{
    io::AsyncWriteExt,
    sync::{mpsc, watch},
};

use super::{BoxedWriter, NetworkClient, closed_signal};

/// キューが閉じられるか、クライアントが閉じられるまでチャンクを順番に書き出す
///
/// 1 チャンクの書き込みが `write_timeout` 以内に終わらなければクライアントを閉じる。
pub(super) async fn drain(
    client: Weak<NetworkClient>,
    mut queue: mpsc::Receiver<Bytes>,
    mut writer: BoxedWriter,
    mut closed: watch::Receiver<bool>,
    write_timeout: Duration,
) {
    loop {
        let data = tokio::select! {
            biased;
            _ = closed_signal(&mut closed) => break,
            data = queue.recv() => match data {
                Some(data) => data,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = closed_signal(&mut closed) => break,
            result = tokio::time::timeout(write_timeout, write_chunk(&mut writer, &data)) => result,
        };

        let Some(client) = client.upgrade() else {
            break;
        };
        match result {
            Ok(Ok(())) => client.acknowledge(data.len()),
            Ok(Err(e)) => {
                tracing::debug!("Write to client {} failed: {}", client.label(), e);
                client.close();
                break;
            }
            Err(_) => {
                tracing::warn!(
                    "Write to client {} exceeded {:?}, closing",
                    client.label(),
                    write_timeout
                );
                client.close();
                break;
            }
        }
    }

    let _ = tokio::time::timeout(write_timeout, writer.shutdown()).await;
}

async fn write_chunk(writer: &mut BoxedWriter, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}
