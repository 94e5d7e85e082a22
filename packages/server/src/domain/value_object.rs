//! 値オブジェクト
//!
//! - `SessionCode`: セッションを識別する固定長の英数字コード
//! - `MemberId`: メンバーの診断用 ID（一意性の判定には使わない）

use rand::{Rng, distributions::Alphanumeric};
use uuid::Uuid;

use super::SessionCodeError;

/// セッションコード
///
/// 作成時に長さと文字種（ASCII 英数字）を検証する。生成後は不変。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCode(String);

impl SessionCode {
    /// 期待する長さ `length` でセッションコードを作成
    pub fn new(value: String, length: usize) -> Result<Self, SessionCodeError> {
        if value.len() != length {
            return Err(SessionCodeError::InvalidLength {
                expected: length,
                actual: value.len(),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SessionCodeError::InvalidCharacter);
        }
        Ok(Self(value))
    }

    /// ワイヤ上のバイト列からセッションコードを作成
    pub fn from_bytes(bytes: &[u8], length: usize) -> Result<Self, SessionCodeError> {
        let value = std::str::from_utf8(bytes).map_err(|_| SessionCodeError::InvalidCharacter)?;
        Self::new(value.to_string(), length)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// セッションコードの生成
pub struct SessionCodeFactory;

impl SessionCodeFactory {
    /// 一様乱数で `length` 文字のセッションコードを生成
    pub fn generate(length: usize) -> SessionCode {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        SessionCode(value)
    }
}

/// メンバーの診断用 ID
///
/// ログ出力にのみ使用する。メンバーの同一性はクライアントの同一性で判定する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(Uuid);

impl MemberId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
