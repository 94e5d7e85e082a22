//! ドメイン層
//!
//! セッション、メンバー、セッションコードと、ドメイン層が必要とする
//! インターフェース（`SessionRepository`, `MessagePusher`）を定義します。

mod error;
mod member;
mod message_pusher;
mod repository;
mod session;
mod value_object;

pub use error::{PushError, RepositoryError, SessionCodeError, SessionError};
pub use member::Member;
#[cfg(test)]
pub use message_pusher::MockMessagePusher;
pub use message_pusher::{CloseHandler, MessagePusher, same_pusher};
pub use repository::SessionRepository;
pub use session::{BroadcastOutcome, Session, SessionPhase};
pub use value_object::{MemberId, SessionCode, SessionCodeFactory};
