use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::AppError;
use crate::otp::{BackupCodeHasher, MAX_TOLERANCE_STEPS};
use crate::repositories::TwoFactorStore;
use crate::services::{CallerToken, SecretCipher, TwoFactorService, secret_cipher};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// ストアの実装（PostgreSQL / メモリ）を型パラメータで差し替える。
#[derive(Clone)]
pub struct AppState<S> {
    /// 二要素認証サービス
    pub two_factor: TwoFactorService<S>,
    /// 前段アプリの共有トークン
    pub caller_token: CallerToken,
}

impl<S: TwoFactorStore> AppState<S> {
    /// 設定からサービスを組み立てる
    pub fn new(store: S, config: &Config) -> Result<Self, AppError> {
        if config.totp_tolerance_steps > MAX_TOLERANCE_STEPS {
            tracing::error!(
                tolerance_steps = config.totp_tolerance_steps,
                max = MAX_TOLERANCE_STEPS,
                "TOTP 許容ステップ数が上限を超えている"
            );
            return Err(AppError::Internal(anyhow::anyhow!(
                "TOTP_TOLERANCE_STEPS must be at most {MAX_TOLERANCE_STEPS}"
            )));
        }

        let key = secret_cipher::decode_key(config.encryption_key.expose_secret())?;
        let cipher = SecretCipher::from_key(&key)?;
        // バックアップコードのハッシュ鍵は暗号化キーから用途別に導出
        let backup_hasher = BackupCodeHasher::derive(&key)?;

        let two_factor =
            TwoFactorService::new(store, cipher, backup_hasher, config.totp_issuer.clone())
                .with_tolerance_steps(config.totp_tolerance_steps);
        let caller_token = CallerToken::new(config.internal_api_token.expose_secret())?;

        Ok(Self {
            two_factor,
            caller_token,
        })
    }

    /// 組み立て済みの部品から作成
    pub fn from_parts(two_factor: TwoFactorService<S>, caller_token: CallerToken) -> Self {
        Self {
            two_factor,
            caller_token,
        }
    }
}
