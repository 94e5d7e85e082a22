//! UseCase: セッション参加
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinSessionUseCase::find() / execute()
//!
//! ### なぜこのテストが必要か
//! - 存在しないコード・形式の不正なコードがどちらも NotFound になることを保証する
//! - 満員と退役済みの Session がそれぞれ正しいエラーになることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：登録済みのコードで参加し、SUCCESS が送られる
//! - 異常系：未登録コード、不正なコード、満員、最後のメンバーが抜けた直後

use std::sync::Arc;

use bytes::Bytes;
use tcp_session_shared::protocol::Status;

use crate::domain::{
    Member, MessagePusher, Session, SessionCode, SessionError, SessionRepository,
};

use super::error::JoinSessionError;

/// セッション参加のユースケース
pub struct JoinSessionUseCase {
    repository: Arc<dyn SessionRepository>,
    code_length: usize,
}

impl JoinSessionUseCase {
    pub fn new(repository: Arc<dyn SessionRepository>, code_length: usize) -> Self {
        Self {
            repository,
            code_length,
        }
    }

    /// 受信したコードのバイト列から Session を探す
    ///
    /// コードとして不正なバイト列はどの Session も指さないので `NotFound` になる。
    pub async fn find(&self, raw_code: &[u8]) -> Result<Arc<Session>, JoinSessionError> {
        let code = SessionCode::from_bytes(raw_code, self.code_length).map_err(|_| {
            JoinSessionError::NotFound(String::from_utf8_lossy(raw_code).into_owned())
        })?;
        self.repository
            .get(&code)
            .await
            .map_err(|_| JoinSessionError::NotFound(code.to_string()))
    }

    /// `pusher` をメンバーとして追加する
    ///
    /// 成功時、新しいメンバーの送信キューには `SUCCESS` が積まれている。
    pub async fn execute(
        &self,
        session: &Arc<Session>,
        pusher: Arc<dyn MessagePusher>,
    ) -> Result<Member, JoinSessionError> {
        let label = pusher.label();
        let ack = Bytes::copy_from_slice(&[Status::Success.as_byte()]);
        match session.add_member(pusher, ack).await {
            Ok(member) => {
                tracing::info!(
                    "{} ({}) joined session {}, {} members",
                    label,
                    member.id(),
                    describe(session).await,
                    session.member_count().await
                );
                Ok(member)
            }
            Err(SessionError::SessionFull(max)) => Err(JoinSessionError::SessionFull(max)),
            // 最後のメンバーが抜けた直後に見つけた Session
            Err(SessionError::Retired | SessionError::Provisional) => {
                Err(JoinSessionError::NotFound(describe(session).await))
            }
            Err(SessionError::AdmissionFailed(e)) => Err(JoinSessionError::AdmissionFailed(e)),
            Err(e) => Err(JoinSessionError::Session(e)),
        }
    }
}

async fn describe(session: &Session) -> String {
    session
        .code()
        .await
        .map(|code| code.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MockMessagePusher, PushError},
        infrastructure::repository::InMemorySessionRepository,
        usecase::CreateSessionUseCase,
    };
    use std::sync::Mutex;

    fn recording_pusher(log: Arc<Mutex<Vec<Bytes>>>) -> Arc<dyn MessagePusher> {
        let mut pusher = MockMessagePusher::new();
        pusher.expect_label().return_const("member".to_string());
        pusher.expect_push().returning(move |data| {
            log.lock().unwrap().push(data);
            Ok(())
        });
        Arc::new(pusher)
    }

    fn accepting_pusher() -> Arc<dyn MessagePusher> {
        recording_pusher(Arc::new(Mutex::new(Vec::new())))
    }

    async fn setup(
        max_members: usize,
    ) -> (Arc<InMemorySessionRepository>, JoinSessionUseCase, SessionCode, Arc<dyn MessagePusher>) {
        let repository = Arc::new(InMemorySessionRepository::new(10));
        let create = CreateSessionUseCase::new(repository.clone(), max_members, 7, 16);
        let session = create.prepare();
        let creator = accepting_pusher();
        let (code, _) = create.execute(&session, creator.clone()).await.unwrap();
        let join = JoinSessionUseCase::new(repository.clone(), 7);
        (repository, join, code, creator)
    }

    #[tokio::test]
    async fn test_join_session_success() {
        // テスト項目: 登録済みのコードで参加でき、SUCCESS だけが送られる
        // given (前提条件):
        let (_repository, usecase, code, _creator) = setup(5).await;
        let log = Arc::new(Mutex::new(Vec::new()));

        // when (操作):
        let session = usecase.find(code.as_bytes()).await.unwrap();
        let result = usecase.execute(&session, recording_pusher(log.clone())).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(session.member_count().await, 2);
        assert_eq!(log.lock().unwrap().as_slice(), &[Bytes::from_static(&[0x00])]);
    }

    #[tokio::test]
    async fn test_find_unknown_code() {
        // テスト項目: 未登録のコードは NotFound になる
        // given (前提条件):
        let (_repository, usecase, _code, _creator) = setup(5).await;

        // when (操作):
        let result = usecase.find(b"Zz9Zz9Z").await;

        // then (期待する結果):
        assert_eq!(
            result.err(),
            Some(JoinSessionError::NotFound("Zz9Zz9Z".to_string()))
        );
    }

    #[tokio::test]
    async fn test_find_malformed_code() {
        // テスト項目: 英数字以外を含むコードも NotFound になる
        // given (前提条件):
        let (_repository, usecase, _code, _creator) = setup(5).await;

        // when (操作):
        let result = usecase.find(b"ab-_!cd").await;

        // then (期待する結果):
        assert!(matches!(result, Err(JoinSessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_join_full_session() {
        // テスト項目: 満員の Session への参加は SessionFull になり、何も送られない
        // given (前提条件):
        let (_repository, usecase, code, _creator) = setup(2).await;
        let session = usecase.find(code.as_bytes()).await.unwrap();
        usecase.execute(&session, accepting_pusher()).await.unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        // when (操作):
        let result = usecase.execute(&session, recording_pusher(log.clone())).await;

        // then (期待する結果):
        assert_eq!(result.err(), Some(JoinSessionError::SessionFull(2)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_join_retired_session() {
        // テスト項目: 検索後に最後のメンバーが抜けた Session への参加は NotFound になる
        // given (前提条件):
        let (repository, usecase, code, creator) = setup(5).await;
        let session = usecase.find(code.as_bytes()).await.unwrap();
        session.remove_member(&creator, repository.as_ref()).await;

        // when (操作):
        let result = usecase.execute(&session, accepting_pusher()).await;

        // then (期待する結果):
        assert_eq!(result.err(), Some(JoinSessionError::NotFound(code.to_string())));
        assert!(usecase.find(code.as_bytes()).await.is_err());
    }

    #[tokio::test]
    async fn test_join_with_closed_client() {
        // テスト項目: 応答を積めないクライアントは参加できない
        // given (前提条件):
        let (_repository, usecase, code, _creator) = setup(5).await;
        let session = usecase.find(code.as_bytes()).await.unwrap();
        let mut closed = MockMessagePusher::new();
        closed.expect_label().return_const("closed".to_string());
        closed.expect_push().returning(|_| Err(PushError::Closed));

        // when (操作):
        let result = usecase.execute(&session, Arc::new(closed)).await;

        // then (期待する結果):
        assert_eq!(
            result.err(),
            Some(JoinSessionError::AdmissionFailed(PushError::Closed))
        );
        assert_eq!(session.member_count().await, 1);
    }
}
