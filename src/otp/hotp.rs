use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::{DIGITS, OtpError};

type HmacSha1 = Hmac<Sha1>;

const MODULUS: u32 = 10u32.pow(DIGITS);

/// HOTP 値を計算（RFC 4226 の動的切り詰め）
///
/// # Arguments
/// * `key` - Base32 デコード済みのシークレット
/// * `counter` - カウンタ（TOTP ではタイムステップ）
pub fn hotp(key: &[u8], counter: u64) -> Result<u32, OtpError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|e| {
        tracing::error!(error = %e, "HMAC-SHA1 の初期化エラー");
        OtpError::InvalidKeyLength
    })?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[19] & 0x0f) as usize;
    let value = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(value % MODULUS)
}

/// HOTP コードを6桁ゼロ埋め文字列で返す
pub fn hotp_code(key: &[u8], counter: u64) -> Result<String, OtpError> {
    let value = hotp(key, counter)?;
    Ok(format!("{:0width$}", value, width = DIGITS as usize))
}
