//! Infrastructure 層
//!
//! ドメイン層が定義する trait の具体的な実装を提供します。
//!
//! - `repository`: セッションディレクトリ（`SessionRepository`）
//! - `network_client`: TCP 接続ごとの送信口（`MessagePusher`）

pub mod network_client;
pub mod repository;
