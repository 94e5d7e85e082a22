//! UseCase: セッション退出
//!
//! 退出の経路は 2 つあります。
//!
//! - 接続ハンドラーが読み込みループを終えたときの `execute`
//! - クライアントが閉じられたときのクローズ通知（`SessionLeaver`）
//!
//! どちらが先に来ても、メンバーの削除は 1 回だけ行われます。

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::domain::{CloseHandler, Member, MessagePusher, Session, SessionRepository};

/// セッション退出のユースケース
pub struct LeaveSessionUseCase {
    repository: Arc<dyn SessionRepository>,
}

impl LeaveSessionUseCase {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// `member` を Session から削除する
    ///
    /// 削除した場合は `true`。既に削除済みなら `false`。
    pub async fn execute(&self, member: &Member) -> bool {
        let Some(session) = member.session() else {
            return false;
        };
        let removed = session
            .remove_member(member.pusher(), self.repository.as_ref())
            .await;
        if removed {
            tracing::info!("{} ({}) left session", member.pusher().label(), member.id());
        }
        removed
    }

    /// `session` に結びついたクローズ通知を作成する
    pub fn close_handler(&self, session: &Arc<Session>) -> Arc<dyn CloseHandler> {
        Arc::new(SessionLeaver {
            session: Arc::downgrade(session),
            repository: Arc::clone(&self.repository),
        })
    }
}

/// 閉じられたクライアントを Session から削除するクローズ通知
pub struct SessionLeaver {
    session: Weak<Session>,
    repository: Arc<dyn SessionRepository>,
}

#[async_trait]
impl CloseHandler for SessionLeaver {
    async fn on_close(&self, pusher: Arc<dyn MessagePusher>) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        if session
            .remove_member(&pusher, self.repository.as_ref())
            .await
        {
            tracing::info!("{} left session after its connection closed", pusher.label());
        }
    }
}
