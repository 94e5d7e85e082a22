//! InMemory Session Repository 実装
//!
//! ドメイン層が定義する SessionRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! 全ての操作は 1 つの Mutex で直列化します。セッション数の上限は数百程度で、
//! 各操作は O(1) なので競合は小さい想定です。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RepositoryError, Session, SessionCode, SessionRepository};

/// インメモリ Session Repository 実装
pub struct InMemorySessionRepository {
    /// セッションコード → Session
    sessions: Mutex<HashMap<SessionCode, Arc<Session>>>,
    /// 登録できるセッション数の上限
    max_sessions: usize,
}

impl InMemorySessionRepository {
    /// 新しい InMemorySessionRepository を作成
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::with_capacity(max_sessions)),
            max_sessions,
        }
    }

    /// 登録中の全てのセッションコードを取得
    pub async fn codes(&self) -> Vec<SessionCode> {
        let sessions = self.sessions.lock().await;
        sessions.keys().cloned().collect()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn store(&self, code: SessionCode, session: Arc<Session>) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&code) {
            return Err(RepositoryError::DuplicateKey(code));
        }
        if sessions.len() >= self.max_sessions {
            return Err(RepositoryError::MaxCapacity(self.max_sessions));
        }
        sessions.insert(code, session);
        Ok(())
    }

    async fn get(&self, code: &SessionCode) -> Result<Arc<Session>, RepositoryError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(code)
            .cloned()
            .ok_or_else(|| RepositoryError::KeyNotFound(code.clone()))
    }

    async fn delete(&self, code: &SessionCode) {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(code).is_some() {
            tracing::debug!("Session '{}' deleted from directory", code);
        }
    }

    async fn count_sessions(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.len()
    }
}
