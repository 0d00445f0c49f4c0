use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// 呼び出し元サービスの共有トークン
///
/// 利用者の認証は前段のアプリが済ませ、このトークン付きでアカウントIDを渡してくる。
/// 比較は SHA-256 ダイジェスト同士を定数時間で行う（長さを漏らさない）。
#[derive(Clone)]
pub struct CallerToken {
    digest: [u8; 32],
}

impl CallerToken {
    pub fn new(token: &str) -> Result<Self, AppError> {
        if token.trim().is_empty() {
            tracing::error!("呼び出し元トークンが空");
            return Err(AppError::Internal(anyhow::anyhow!(
                "internal api token must not be empty"
            )));
        }

        Ok(Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        })
    }

    /// 提示されたトークンが一致するか
    pub fn verify(&self, presented: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        self.digest[..].ct_eq(&digest[..]).into()
    }
}
