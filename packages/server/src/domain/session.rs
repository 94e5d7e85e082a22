//! Session エンティティ
//!
//! メンバー集合は `RwLock` で保護する。
//!
//! - 参加・離脱（集合の変更）は排他ロック
//! - ブロードキャスト（集合の走査のみ）は共有ロック
//!
//! 共有ロックを保持したまま排他ロックは取得できないため、ブロードキャスト中に
//! 見つかった遅い受信者はロック解放後に閉じる。削除は送信口のクローズ通知
//! （別タスク）が排他ロックを取って行う。

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::{
    Member, MessagePusher, RepositoryError, SessionCode, SessionError, SessionRepository,
};

/// Session の状態遷移
///
/// `Provisional` → `Active` → `Retired`。`Retired` から戻ることはない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// コード未割り当て（ディレクトリ未登録）
    Provisional,
    /// コード割り当て済み、メンバー 1 人以上
    Active,
    /// ディレクトリから削除済み
    Retired,
}

/// ブロードキャスト 1 回分の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// 送信キューに渡せたメンバー数
    pub delivered: usize,
    /// このブロードキャストで閉じたメンバー数（既に閉じていたものは含まない）
    pub evicted: usize,
}

struct SessionState {
    code: Option<SessionCode>,
    /// 参加順
    members: Vec<Member>,
    retired: bool,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        if self.retired {
            SessionPhase::Retired
        } else if self.code.is_some() {
            SessionPhase::Active
        } else {
            SessionPhase::Provisional
        }
    }

    fn position_of(&self, pusher: &Arc<dyn MessagePusher>) -> Option<usize> {
        self.members.iter().position(|m| m.is_backed_by(pusher))
    }
}

/// 同じコードを共有するメンバーの集合
pub struct Session {
    max_members: usize,
    state: RwLock<SessionState>,
}

impl Session {
    /// コード未割り当ての Session を作成
    pub fn new(max_members: usize) -> Arc<Self> {
        Arc::new(Self {
            max_members,
            state: RwLock::new(SessionState {
                code: None,
                members: Vec::with_capacity(max_members),
                retired: false,
            }),
        })
    }

    pub async fn code(&self) -> Option<SessionCode> {
        self.state.read().await.code.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase()
    }

    pub async fn member_count(&self) -> usize {
        self.state.read().await.members.len()
    }

    /// コードを確保し、最初のメンバーとして `pusher` を追加する
    ///
    /// 排他ロックを保持したままディレクトリへ登録するので、他のタスクが
    /// コードだけ登録されてメンバーのいない Session を観測することはない。
    /// `DuplicateKey` は別のコードで最大 `max_attempts` 回まで再試行する。
    ///
    /// 成功時は `ack(&code)` をメンバーの送信キューに積んでからロックを解放する。
    pub async fn activate<F, A>(
        self: &Arc<Self>,
        pusher: Arc<dyn MessagePusher>,
        repository: &dyn SessionRepository,
        mut next_code: F,
        max_attempts: usize,
        ack: A,
    ) -> Result<(SessionCode, Member), SessionError>
    where
        F: FnMut() -> SessionCode + Send,
        A: FnOnce(&SessionCode) -> Bytes + Send,
    {
        let mut state = self.state.write().await;
        match state.phase() {
            SessionPhase::Provisional => {}
            SessionPhase::Active => return Err(SessionError::AlreadyActive),
            SessionPhase::Retired => return Err(SessionError::Retired),
        }

        let mut attempts = 0;
        let code = loop {
            if attempts == max_attempts {
                state.retired = true;
                return Err(SessionError::CodeSpaceExhausted(max_attempts));
            }
            attempts += 1;

            let candidate = next_code();
            match repository.store(candidate.clone(), Arc::clone(self)).await {
                Ok(()) => break candidate,
                Err(RepositoryError::DuplicateKey(code)) => {
                    tracing::debug!("Session code '{}' is taken, retrying", code);
                }
                Err(RepositoryError::MaxCapacity(max)) => {
                    state.retired = true;
                    return Err(SessionError::ServerFull(max));
                }
                Err(e) => {
                    state.retired = true;
                    return Err(SessionError::Repository(e));
                }
            }
        };

        let member = Member::new(Arc::downgrade(self), pusher);
        if let Err(e) = member.pusher().push(ack(&code)).await {
            // 登録を取り消す
            repository.delete(&code).await;
            state.retired = true;
            return Err(SessionError::AdmissionFailed(e));
        }

        state.code = Some(code.clone());
        state.members.push(member.clone());
        Ok((code, member))
    }

    /// `pusher` をメンバーとして追加する
    ///
    /// 成功時は `ack` をメンバーの送信キューに積んでからロックを解放するので、
    /// 他メンバーからのデータが `ack` より先に届くことはない。
    pub async fn add_member(
        self: &Arc<Self>,
        pusher: Arc<dyn MessagePusher>,
        ack: Bytes,
    ) -> Result<Member, SessionError> {
        let mut state = self.state.write().await;
        match state.phase() {
            SessionPhase::Active => {}
            SessionPhase::Provisional => return Err(SessionError::Provisional),
            SessionPhase::Retired => return Err(SessionError::Retired),
        }
        if state.position_of(&pusher).is_some() {
            return Err(SessionError::DuplicateMember);
        }
        if state.members.len() >= self.max_members {
            return Err(SessionError::SessionFull(self.max_members));
        }

        let member = Member::new(Arc::downgrade(self), pusher);
        member
            .pusher()
            .push(ack)
            .await
            .map_err(SessionError::AdmissionFailed)?;

        state.members.push(member.clone());
        Ok(member)
    }

    /// `pusher` を使っているメンバーを削除する
    ///
    /// 見つかった場合は `true`。2 回目以降の呼び出しは何も変更せず `false` を返す。
    /// 最後のメンバーが抜けた場合は、ロックを保持したままディレクトリから削除する。
    pub async fn remove_member(
        &self,
        pusher: &Arc<dyn MessagePusher>,
        repository: &dyn SessionRepository,
    ) -> bool {
        let mut state = self.state.write().await;
        let Some(position) = state.position_of(pusher) else {
            return false;
        };
        let member = state.members.remove(position);
        tracing::debug!(
            "Member {} ({}) removed, {} remaining",
            member.id(),
            member.pusher().label(),
            state.members.len()
        );

        if state.members.is_empty() {
            state.retired = true;
            if let Some(code) = &state.code {
                repository.delete(code).await;
                tracing::info!("Session '{}' retired", code);
            }
        }
        true
    }

    /// `sender` 以外の全メンバーへ `data` を渡す
    ///
    /// 配送は 1 回きりでリトライしない。送信キューが溢れている、または閉じている
    /// メンバーにはこのチャンクを捨て、共有ロック解放後に送信口を閉じる。
    pub async fn broadcast(
        &self,
        sender: &Arc<dyn MessagePusher>,
        data: Bytes,
    ) -> Result<BroadcastOutcome, SessionError> {
        let mut outcome = BroadcastOutcome::default();
        let mut evicted: Vec<Arc<dyn MessagePusher>> = Vec::new();

        {
            let state = self.state.read().await;
            if state.position_of(sender).is_none() {
                return Err(SessionError::NotAMember);
            }

            for member in state.members.iter().filter(|m| !m.is_backed_by(sender)) {
                match member.pusher().push(data.clone()).await {
                    Ok(()) => outcome.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Evicting member {} ({}): {}",
                            member.id(),
                            member.pusher().label(),
                            e
                        );
                        evicted.push(Arc::clone(member.pusher()));
                    }
                }
            }
        }

        for pusher in evicted {
            // 既に別の経路で閉じられていれば数えない
            if pusher.close() {
                outcome.evicted += 1;
            }
        }
        Ok(outcome)
    }
}
