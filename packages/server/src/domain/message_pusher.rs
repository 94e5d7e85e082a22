//! MessagePusher trait 定義
//!
//! セッションのメンバー 1 人分の送信口を抽象化する。Session はこの trait だけに
//! 依存し、ソケットやキューの具体的な実装は Infrastructure 層が提供する。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::PushError;

/// メンバー 1 人への送信口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// ログ出力用のラベル（接続元アドレスなど）
    fn label(&self) -> String;

    /// データを非同期送信キューへ渡す
    ///
    /// 送信完了は待たない。閉じていれば `Closed`、未送信バイトが上限に
    /// 達していれば `BufferFull` を返す。
    async fn push(&self, data: Bytes) -> Result<(), PushError>;

    /// 送信口を閉じる。既に閉じていれば何もせず `false` を返す
    fn close(&self) -> bool;
}

/// 送信口が閉じられたときの通知先
///
/// 通知は閉じた側の呼び出しスタックとは別のタスクで、ちょうど 1 回だけ実行される。
#[async_trait]
pub trait CloseHandler: Send + Sync {
    async fn on_close(&self, pusher: Arc<dyn MessagePusher>);
}

/// 2 つのハンドルが同じ送信口を指しているか
pub fn same_pusher(a: &Arc<dyn MessagePusher>, b: &Arc<dyn MessagePusher>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
