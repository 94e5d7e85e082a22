//! Repository trait 定義
//!
//! ドメイン層が必要とするセッションディレクトリのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use std::sync::Arc;

use async_trait::async_trait;

use super::{RepositoryError, Session, SessionCode};

/// Session Repository trait（セッションディレクトリ）
///
/// セッションコードから Session への容量制限付きマップ。
/// 全ての操作は他の操作に対してアトミックでなければならない。
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// コードが未登録かつ容量に空きがある場合のみ Session を登録
    async fn store(&self, code: SessionCode, session: Arc<Session>) -> Result<(), RepositoryError>;

    /// コードに対応する Session を取得
    async fn get(&self, code: &SessionCode) -> Result<Arc<Session>, RepositoryError>;

    /// コードを削除（未登録なら何もしない）
    async fn delete(&self, code: &SessionCode);

    /// 登録中のセッション数を取得
    async fn count_sessions(&self) -> usize;
}
