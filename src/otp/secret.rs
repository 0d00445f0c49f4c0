use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;

use super::{DIGITS, OtpError, PERIOD_SECS, SECRET_LEN, base32};

/// 暗号論的に安全な乱数源
pub trait RandomSource: Send + Sync {
    /// `dest` を乱数で埋める
    ///
    /// 失敗時に弱い乱数へフォールバックしてはならない。
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), OtpError>;
}

/// OS の CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn try_fill(&self, dest: &mut [u8]) -> Result<(), OtpError> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            tracing::error!(error = %e, "OS 乱数源の読み出しエラー");
            OtpError::RandomSourceUnavailable
        })
    }
}

/// 160ビットのランダムシークレットを生成し Base32 で返す
pub fn generate_secret(rng: &dyn RandomSource) -> Result<String, OtpError> {
    let mut bytes = [0u8; SECRET_LEN];
    rng.try_fill(&mut bytes)?;
    Ok(base32::encode(&bytes))
}

/// 認証アプリ向けの otpauth URI を組み立てる
pub fn provisioning_uri(issuer: &str, account_label: &str, secret: &str) -> String {
    let issuer = urlencoding::encode(issuer);
    let label = urlencoding::encode(account_label);
    format!(
        "otpauth://totp/{issuer}:{label}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={PERIOD_SECS}"
    )
}

/// 手入力用に4文字ずつ区切る
pub fn display_groups(secret: &str) -> Vec<String> {
    secret
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// 登録開始時に一度だけ利用者へ提示する情報
///
/// # Security
/// Debug 出力ではシークレットと URI を伏せる
#[derive(Clone, Serialize)]
pub struct SecretProvisioning {
    pub secret: String,
    pub provisioning_uri: String,
    pub display_groups: Vec<String>,
}

impl SecretProvisioning {
    pub fn generate(
        rng: &dyn RandomSource,
        issuer: &str,
        account_label: &str,
    ) -> Result<Self, OtpError> {
        let secret = generate_secret(rng)?;
        Ok(Self {
            provisioning_uri: provisioning_uri(issuer, account_label, &secret),
            display_groups: display_groups(&secret),
            secret,
        })
    }
}

impl fmt::Debug for SecretProvisioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretProvisioning")
            .field("secret", &"[REDACTED]")
            .field("provisioning_uri", &"[REDACTED]")
            .field("display_groups", &self.display_groups.len())
            .finish()
    }
}
