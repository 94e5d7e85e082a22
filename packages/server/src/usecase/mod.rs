//! UseCase 層
//!
//! 接続ハンドラーから呼ばれるアプリケーションの操作です。
//! Session とディレクトリの整合性はドメイン層が保証し、ここでは
//! ドメインのエラーを呼び出し側が扱いやすい形へまとめます。

mod create_session;
mod error;
mod join_session;
mod leave_session;
mod send_data;

pub use create_session::CreateSessionUseCase;
pub use error::{CreateSessionError, JoinSessionError, SendDataError};
pub use join_session::JoinSessionUseCase;
pub use leave_session::{LeaveSessionUseCase, SessionLeaver};
pub use send_data::SendDataUseCase;
