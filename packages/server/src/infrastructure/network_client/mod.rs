//! TCP 接続 1 本分のネットワーククライアント
//!
//! ## 責務
//!
//! - 有限長の送信キューと、それを順番にソケットへ書き出す writer タスク
//! - 未送信バイト数の見積もりによるバックプレッシャー検出
//! - 冪等なクローズと、クローズ通知（`CloseHandler`）の 1 回限りの実行
//!
//! 読み込みは呼び出し側の責務で、同時に読むのは 1 タスクだけという契約です。
//!
//! ## 状態遷移
//!
//! ```text
//! Idle --start()--> Open --close()--> Closed
//!   \______________close()____________/
//! ```

mod writer;

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    sync::{mpsc, watch},
};

use crate::domain::{CloseHandler, MessagePusher, PushError};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// ネットワーククライアントのエラー
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is closed")]
    Closed,

    #[error("client buffer is full ({0} bytes unread)")]
    BufferFull(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 接続ごとの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// 送信キューの長さ（チャンク数）
    pub send_queue_depth: usize,
    /// この未送信バイト数に達したら `write` を `BufferFull` で拒否する
    pub backpressure_ceiling: usize,
    /// ソケットへの 1 回の書き込みの期限
    pub write_timeout: Duration,
}

enum Lifecycle {
    /// 未開始。writer タスクに渡す書き込み側を保持する
    Idle(BoxedWriter),
    /// 送信キューの入口
    Open(mpsc::Sender<Bytes>),
    Closed,
}

/// TCP 接続 1 本分のクライアント
pub struct NetworkClient {
    label: String,
    config: ClientConfig,
    lifecycle: Mutex<Lifecycle>,
    /// キューに受け付けたが、まだ書き込みが完了していないバイト数
    unread: AtomicUsize,
    reader: tokio::sync::Mutex<Option<BoxedReader>>,
    closed: watch::Sender<bool>,
    close_handler: Option<Arc<dyn CloseHandler>>,
    this: Weak<NetworkClient>,
}

impl NetworkClient {
    /// 未開始のクライアントを作成
    ///
    /// `close_handler` はクローズ時に別タスクで 1 回だけ呼ばれる。
    pub fn new<S>(
        stream: S,
        label: impl Into<String>,
        config: ClientConfig,
        close_handler: Option<Arc<dyn CloseHandler>>,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (closed, _) = watch::channel(false);
        Arc::new_cyclic(|this| Self {
            label: label.into(),
            config,
            lifecycle: Mutex::new(Lifecycle::Idle(Box::new(writer))),
            unread: AtomicUsize::new(0),
            reader: tokio::sync::Mutex::new(Some(Box::new(reader))),
            closed,
            close_handler,
            this: this.clone(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.lock_lifecycle(), Lifecycle::Open(_))
    }

    /// 未送信バイト数の見積もり
    pub fn unread_bytes(&self) -> usize {
        self.unread.load(Ordering::Acquire)
    }

    /// writer タスクを起動して Open にする
    ///
    /// 既に Open、または Closed の場合は何もせず `false` を返す。
    pub fn start(&self) -> bool {
        let mut lifecycle = self.lock_lifecycle();
        let writer = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Idle(writer) => writer,
            other => {
                *lifecycle = other;
                return false;
            }
        };

        let (queue_tx, queue_rx) = mpsc::channel(self.config.send_queue_depth);
        *lifecycle = Lifecycle::Open(queue_tx);
        drop(lifecycle);

        tokio::spawn(writer::drain(
            self.this.clone(),
            queue_rx,
            writer,
            self.closed.subscribe(),
            self.config.write_timeout,
        ));
        tracing::debug!("Client {} started", self.label);
        true
    }

    /// データを送信キューに積む
    ///
    /// 閉じていれば即座に `Closed`、未送信バイト数が上限以上なら即座に
    /// `BufferFull` を返す。キューが満杯の場合のみ、空きが出るまで待つ。
    pub async fn write(&self, data: Bytes) -> Result<(), ClientError> {
        let queue = {
            let lifecycle = self.lock_lifecycle();
            match &*lifecycle {
                Lifecycle::Open(queue) => queue.clone(),
                _ => return Err(ClientError::Closed),
            }
        };

        let unread = self.unread.load(Ordering::Acquire);
        if unread >= self.config.backpressure_ceiling {
            return Err(ClientError::BufferFull(unread));
        }

        let len = data.len();
        self.unread.fetch_add(len, Ordering::AcqRel);
        if queue.send(data).await.is_err() {
            self.unread.fetch_sub(len, Ordering::AcqRel);
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    /// 接続から読み込む
    ///
    /// Open の間だけ接続へ委譲する。読み込み中にクローズされた場合も `Closed` を返す。
    /// `Ok(0)` は相手が接続を閉じたことを表す。
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, ClientError> {
        if !self.is_open() {
            return Err(ClientError::Closed);
        }

        let mut closed = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        let Some(stream) = reader.as_mut() else {
            return Err(ClientError::Closed);
        };

        let result = tokio::select! {
            biased;
            _ = closed_signal(&mut closed) => None,
            result = stream.read(buf) => Some(result),
        };

        match result {
            Some(result) => Ok(result?),
            None => {
                // 読み込み側を手放して接続を解放する
                reader.take();
                Err(ClientError::Closed)
            }
        }
    }

    /// クライアントを閉じる
    ///
    /// 送信キューを閉じて writer タスクを止め、接続を解放し、クローズ通知を
    /// 別タスクで実行する。2 回目以降は何もせず `false` を返す。
    pub fn close(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::Closed);
        if matches!(previous, Lifecycle::Closed) {
            return false;
        }
        drop(previous);

        self.closed.send_replace(true);
        // 読み込み中なら read() 側が解放する
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        tracing::debug!("Client {} closed", self.label);

        if let (Some(handler), Some(this)) = (self.close_handler.clone(), self.this.upgrade()) {
            tokio::spawn(async move {
                let pusher: Arc<dyn MessagePusher> = this;
                handler.on_close(pusher).await;
            });
        }
        true
    }

    /// 書き込みが完了したバイト数を見積もりから差し引く
    fn acknowledge(&self, len: usize) {
        self.unread.fetch_sub(len, Ordering::AcqRel);
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `closed` が `true` になる（または送信側が破棄される）まで待つ
async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

#[async_trait]
impl MessagePusher for NetworkClient {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn push(&self, data: Bytes) -> Result<(), PushError> {
        self.write(data).await.map_err(|e| match e {
            ClientError::BufferFull(_) => PushError::BufferFull,
            ClientError::Closed | ClientError::Io(_) => PushError::Closed,
        })
    }

    fn close(&self) -> bool {
        NetworkClient::close(self)
    }
}
