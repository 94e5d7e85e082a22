//! ドメイン層のエラー型

use thiserror::Error;

use super::SessionCode;

/// セッションコードの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionCodeError {
    #[error("session code must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("session code must be ASCII alphanumeric")]
    InvalidCharacter,
}

/// SessionRepository のエラー
///
/// `DuplicateKey` と `MaxCapacity` は区別する。作成処理は前者ならコードを
/// 変えてリトライし、後者なら即座に失敗する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("session code '{0}' is already registered")]
    DuplicateKey(SessionCode),

    #[error("session directory is full ({0} sessions)")]
    MaxCapacity(usize),

    #[error("session '{0}' not found")]
    KeyNotFound(SessionCode),
}

/// MessagePusher への送信エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("client is closed")]
    Closed,

    #[error("client buffer is full")]
    BufferFull,
}

/// Session の操作エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is full ({0} members)")]
    SessionFull(usize),

    #[error("session directory is full ({0} sessions)")]
    ServerFull(usize),

    #[error("session has been retired")]
    Retired,

    #[error("session has no code yet")]
    Provisional,

    #[error("session is already active")]
    AlreadyActive,

    #[error("client is already a member of this session")]
    DuplicateMember,

    #[error("client is not a member of this session")]
    NotAMember,

    #[error("no free session code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("failed to acknowledge admission: {0}")]
    AdmissionFailed(PushError),

    #[error(transparent)]
    Repository(RepositoryError),
}
