//! ワンタイムパスワード（RFC 4226 / RFC 6238）のコア実装
//!
//! I/O を持たない純粋な計算のみを置く。
//! 永続化・時刻・乱数は呼び出し側から注入する。

pub mod backup;
pub mod base32;
pub mod hotp;
pub mod secret;
pub mod totp;

pub use backup::{BackupCodeHasher, generate_backup_codes, normalize_backup_code};
pub use hotp::{hotp, hotp_code};
pub use secret::{OsRandom, RandomSource, SecretProvisioning, generate_secret, provisioning_uri};
pub use totp::{Clock, FixedClock, SystemClock};

/// コード桁数
pub const DIGITS: u32 = 6;
/// タイムステップ（秒）
pub const PERIOD_SECS: u64 = 30;
/// 許容する前後ステップ数のデフォルト値
pub const DEFAULT_TOLERANCE_STEPS: u64 = 1;
/// 設定で許す許容ステップ数の上限
pub const MAX_TOLERANCE_STEPS: u64 = 10;
/// シークレットのバイト長（160ビット）
pub const SECRET_LEN: usize = 20;

/// OTP コアのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("Base32 エンコーディングが不正です")]
    InvalidEncoding,

    #[error("HMAC 鍵の長さが不正です")]
    InvalidKeyLength,

    #[error("安全な乱数源を利用できません")]
    RandomSourceUnavailable,
}
