//! UseCase: データ送信
//!
//! メンバーが読み込んだチャンクを、同じ Session の他のメンバー全員へ渡します。

use bytes::Bytes;

use crate::domain::{BroadcastOutcome, Member};

use super::error::SendDataError;

/// データ送信のユースケース
#[derive(Debug, Default)]
pub struct SendDataUseCase;

impl SendDataUseCase {
    pub fn new() -> Self {
        Self
    }

    /// `data` を `member` 以外の全メンバーへ渡す
    ///
    /// 受け取れなかったメンバーは切断される。送信者は待たされない。
    pub async fn execute(
        &self,
        member: &Member,
        data: Bytes,
    ) -> Result<BroadcastOutcome, SendDataError> {
        let session = member.session().ok_or(SendDataError::SessionGone)?;
        let outcome = session
            .broadcast(member.pusher(), data)
            .await
            .map_err(|_| SendDataError::NotAMember)?;

        if outcome.evicted > 0 {
            tracing::debug!(
                "Chunk from {} delivered to {}, {} evicted",
                member.pusher().label(),
                outcome.delivered,
                outcome.evicted
            );
        }
        Ok(outcome)
    }
}
