//! UseCase: セッション作成
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateSessionUseCase::prepare() / execute()
//!
//! ### なぜこのテストが必要か
//! - 作成者に返す応答（SUCCESS + コード）の形式を保証する
//! - ディレクトリ満杯などのドメインエラーが UseCase のエラーへ正しく変換されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：コードが登録され、作成者が最初のメンバーになる
//! - 異常系：ディレクトリが満杯

use std::sync::Arc;

use bytes::Bytes;
use tcp_session_shared::protocol::encode_created;

use crate::domain::{
    Member, MessagePusher, Session, SessionCode, SessionCodeFactory, SessionError,
    SessionRepository,
};

use super::error::CreateSessionError;

/// セッション作成のユースケース
pub struct CreateSessionUseCase {
    repository: Arc<dyn SessionRepository>,
    /// 1 セッションあたりのメンバー数の上限
    max_members: usize,
    code_length: usize,
    max_code_attempts: usize,
}

impl CreateSessionUseCase {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        max_members: usize,
        code_length: usize,
        max_code_attempts: usize,
    ) -> Self {
        Self {
            repository,
            max_members,
            code_length,
            max_code_attempts,
        }
    }

    /// コード未確保の Session を用意する
    ///
    /// 作成者のクライアントのクローズ通知をこの Session に結びつけてから
    /// `execute` を呼ぶ。
    pub fn prepare(&self) -> Arc<Session> {
        Session::new(self.max_members)
    }

    /// コードを確保し、作成者を最初のメンバーとして追加する
    ///
    /// 成功時、作成者の送信キューには `SUCCESS` とコードが積まれている。
    pub async fn execute(
        &self,
        session: &Arc<Session>,
        pusher: Arc<dyn MessagePusher>,
    ) -> Result<(SessionCode, Member), CreateSessionError> {
        let code_length = self.code_length;
        let label = pusher.label();
        let (code, member) = session
            .activate(
                pusher,
                self.repository.as_ref(),
                || SessionCodeFactory::generate(code_length),
                self.max_code_attempts,
                |code| Bytes::from(encode_created(code.as_bytes())),
            )
            .await
            .map_err(|e| match e {
                SessionError::ServerFull(max) => CreateSessionError::ServerFull(max),
                SessionError::CodeSpaceExhausted(attempts) => {
                    CreateSessionError::CodeSpaceExhausted(attempts)
                }
                SessionError::AdmissionFailed(e) => CreateSessionError::AdmissionFailed(e),
                other => CreateSessionError::Session(other),
            })?;

        tracing::info!("Session '{}' created by {} ({})", code, label, member.id());
        Ok((code, member))
    }
}
