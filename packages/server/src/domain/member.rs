//! Member エンティティ

use std::sync::{Arc, Weak};

use super::{MemberId, MessagePusher, Session, same_pusher};

/// セッションへの参加記録
///
/// Session への参照は所有しない（`Weak`）。Session の寿命はディレクトリが管理する。
#[derive(Clone)]
pub struct Member {
    /// 診断用 ID（一意性の判定には使わない）
    id: MemberId,
    session: Weak<Session>,
    pusher: Arc<dyn MessagePusher>,
}

impl Member {
    pub(super) fn new(session: Weak<Session>, pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            id: MemberId::generate(),
            session,
            pusher,
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    /// 所属する Session（既に破棄されていれば `None`）
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    pub fn pusher(&self) -> &Arc<dyn MessagePusher> {
        &self.pusher
    }

    /// このメンバーが `pusher` の送信口を使っているか
    pub fn is_backed_by(&self, pusher: &Arc<dyn MessagePusher>) -> bool {
        same_pusher(&self.pusher, pusher)
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("pusher", &self.pusher.label())
            .finish()
    }
}
