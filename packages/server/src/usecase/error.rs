//! UseCase 層のエラー型
//!
//! ワイヤ上のステータスバイトへの変換は UI 層で行います。

use thiserror::Error;

use crate::domain::{PushError, SessionError};

/// セッション作成のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateSessionError {
    #[error("session directory is full ({0} sessions)")]
    ServerFull(usize),

    #[error("no free session code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("failed to acknowledge the creator: {0}")]
    AdmissionFailed(PushError),

    #[error("failed to create session: {0}")]
    Session(SessionError),
}

/// セッション参加のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinSessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session is full ({0} members)")]
    SessionFull(usize),

    #[error("failed to acknowledge the new member: {0}")]
    AdmissionFailed(PushError),

    #[error("failed to join session: {0}")]
    Session(SessionError),
}

/// データ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendDataError {
    /// メンバーの Session が既に破棄されている
    #[error("session is gone")]
    SessionGone,

    #[error("sender is no longer a member of the session")]
    NotAMember,
}
