use std::collections::HashSet;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{OtpError, base32::ALPHABET, secret::RandomSource};

/// 発行するバックアップコードの数
pub const BACKUP_CODE_COUNT: usize = 10;
/// バックアップコードの文字数
pub const BACKUP_CODE_LEN: usize = 4;

/// 重複のないバックアップコードを生成
///
/// 各文字は Base32 アルファベットから一様に選ぶ（256 は 32 の倍数）。
pub fn generate_backup_codes(rng: &dyn RandomSource) -> Result<Vec<String>, OtpError> {
    let mut seen = HashSet::with_capacity(BACKUP_CODE_COUNT);
    let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);

    while codes.len() < BACKUP_CODE_COUNT {
        let mut bytes = [0u8; BACKUP_CODE_LEN];
        rng.try_fill(&mut bytes)?;

        let code: String = bytes
            .iter()
            .map(|b| ALPHABET[(b & 0x1f) as usize] as char)
            .collect();

        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }

    Ok(codes)
}

/// 入力をバックアップコード形式に正規化
///
/// 前後の空白を除いて大文字化し、4文字の Base32 でなければ `None`
pub fn normalize_backup_code(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    if code.len() == BACKUP_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b)) {
        Some(code)
    } else {
        None
    }
}

/// 鍵導出時のラベル（暗号化キーと用途を分ける）
const BACKUP_CODE_KEY_LABEL: &[u8] = b"twogate/backup-code-hash/v1";

/// バックアップコードの保存用ハッシュ（HMAC-SHA256）
///
/// コード空間は 32^4 しかないため、鍵なしハッシュだと DB から総当たりで復元できる。
/// 同じ鍵なら同じ値になるので、ストア側は等値比較で消費できる。
#[derive(Clone)]
pub struct BackupCodeHasher {
    mac: Hmac<Sha256>,
}

impl BackupCodeHasher {
    pub fn new(key: &[u8]) -> Result<Self, OtpError> {
        let mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| {
            tracing::error!(error = %e, "HMAC 鍵の初期化に失敗");
            OtpError::InvalidKeyLength
        })?;
        Ok(Self { mac })
    }

    /// マスター鍵からハッシュ用の鍵を導出して作成
    pub fn derive(master_key: &[u8]) -> Result<Self, OtpError> {
        let derived = Self::new(master_key)?.digest(BACKUP_CODE_KEY_LABEL);
        Self::new(&derived)
    }

    /// 正規化済みコードのハッシュ（16進）
    pub fn hash(&self, code: &str) -> String {
        format!("{:x}", self.digest(code.as_bytes()))
    }

    fn digest(&self, data: &[u8]) -> hmac::digest::Output<Hmac<Sha256>> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes()
    }
}
