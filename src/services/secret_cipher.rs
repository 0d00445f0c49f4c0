use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;

use crate::error::AppError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// TOTP シークレットの保存時暗号化（AES-256-GCM）
///
/// 保存形式は `nonce (12バイト) || 暗号文 + タグ`
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

/// Base64 エンコードされた暗号化キーをデコード
pub fn decode_key(key_base64: &str) -> Result<Vec<u8>, AppError> {
    STANDARD.decode(key_base64.trim()).map_err(|e| {
        tracing::error!(error = ?e, "暗号化キーのBase64デコードエラー");
        AppError::Internal(anyhow::anyhow!("invalid encryption key format"))
    })
}

impl SecretCipher {
    /// Base64 エンコードされた32バイト鍵から作成
    pub fn from_base64_key(key_base64: &str) -> Result<Self, AppError> {
        Self::from_key(&decode_key(key_base64)?)
    }

    pub fn from_key(key: &[u8]) -> Result<Self, AppError> {
        if key.len() != KEY_LEN {
            tracing::error!(
                expected = KEY_LEN,
                actual = key.len(),
                "暗号化キーの長さが不正"
            );
            return Err(AppError::Internal(anyhow::anyhow!(
                "encryption key must be 32 bytes"
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        Ok(Self { cipher })
    }

    /// シークレットを暗号化
    pub fn seal(&self, secret: &str) -> Result<Vec<u8>, AppError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.try_fill_bytes(&mut nonce_bytes).map_err(|e| {
            tracing::error!(error = %e, "nonce 生成エラー");
            AppError::Internal(anyhow::anyhow!("nonce generation error"))
        })?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_bytes())
            .map_err(|e| {
                tracing::error!(error = ?e, "シークレット暗号化エラー");
                AppError::Internal(anyhow::anyhow!("encryption error"))
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// 暗号化されたシークレットを復号
    pub fn open(&self, sealed: &[u8]) -> Result<String, AppError> {
        if sealed.len() <= NONCE_LEN {
            tracing::error!(len = sealed.len(), "暗号化データが短すぎる");
            return Err(AppError::Internal(anyhow::anyhow!(
                "encrypted data too short"
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| {
                tracing::error!(error = ?e, "シークレット復号エラー");
                AppError::Internal(anyhow::anyhow!("decryption error"))
            })?;

        String::from_utf8(plaintext).map_err(|e| {
            tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
            AppError::Internal(anyhow::anyhow!("invalid utf8 after decryption"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> SecretCipher {
        SecretCipher::from_base64_key(&STANDARD.encode([7u8; 32])).unwrap()
    }

    #[test]
    fn test_seal_open() {
        let cipher = test_cipher();
        let sealed = cipher.seal("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
        // 12バイトnonce + 暗号文 + 16バイトtag
        assert_eq!(sealed.len(), 12 + 32 + 16);
        assert_eq!(cipher.open(&sealed).unwrap(), "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let cipher = test_cipher();
        let a = cipher.seal("SECRET").unwrap();
        let b = cipher.seal("SECRET").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_rejects_tampered_data() {
        let cipher = test_cipher();
        let mut sealed = cipher.seal("SECRET").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.open(&sealed).is_err());
        assert!(cipher.open(&sealed[..NONCE_LEN]).is_err());
    }

    #[test]
    fn test_open_with_other_key_fails() {
        let sealed = test_cipher().seal("SECRET").unwrap();
        let other = SecretCipher::from_key(&[8u8; 32]).unwrap();
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = STANDARD.encode([0u8; 16]);
        assert!(SecretCipher::from_base64_key(&short_key).is_err());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(SecretCipher::from_base64_key("not-valid-base64!!!").is_err());
    }
}
