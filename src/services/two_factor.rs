use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ActionKind, TwoFactorRecord, TwoFactorState};
use crate::otp::{
    BackupCodeHasher, Clock, DEFAULT_TOLERANCE_STEPS, OsRandom, OtpError, RandomSource,
    SECRET_LEN, SecretProvisioning, SystemClock, base32, generate_backup_codes,
    normalize_backup_code, totp,
};
use crate::repositories::TwoFactorStore;
use crate::services::{SecretCipher, qr};

/// 利用者が入力したコードの種別
#[derive(Debug, PartialEq, Eq)]
enum SubmittedCode {
    Totp(String),
    Backup(String),
}

impl SubmittedCode {
    /// 形式だけで判定する（暗号計算の前に弾く）
    fn classify(input: &str) -> Result<Self, AppError> {
        let trimmed = input.trim();
        if totp::is_code_format(trimmed) {
            Ok(Self::Totp(trimmed.to_string()))
        } else if let Some(code) = normalize_backup_code(trimmed) {
            Ok(Self::Backup(code))
        } else {
            Err(AppError::TotpInvalidFormat)
        }
    }
}

/// 二要素認証サービス
///
/// 状態遷移: Disabled → PendingSetup → Enabled → Disabled
///
/// # Security
/// - シークレット・コード・バックアップコードはログに出力しない
/// - 永続化と排他はストアに任せ、サービス自身は状態を持たない
#[derive(Clone)]
pub struct TwoFactorService<S> {
    store: S,
    cipher: SecretCipher,
    backup_hasher: BackupCodeHasher,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    issuer: String,
    tolerance_steps: u64,
}

impl<S: TwoFactorStore> TwoFactorService<S> {
    /// システム時刻・OS 乱数源・許容幅 ±1 ステップで作成
    pub fn new(
        store: S,
        cipher: SecretCipher,
        backup_hasher: BackupCodeHasher,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cipher,
            backup_hasher,
            clock: Arc::new(SystemClock),
            rng: Arc::new(OsRandom),
            issuer: issuer.into(),
            tolerance_steps: DEFAULT_TOLERANCE_STEPS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_random_source(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_tolerance_steps(mut self, tolerance_steps: u64) -> Self {
        self.tolerance_steps = tolerance_steps;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// シークレットと otpauth URI を生成（永続化しない）
    pub fn generate_secret(&self, email: &str) -> Result<SecretProvisioning, AppError> {
        Ok(SecretProvisioning::generate(
            self.rng.as_ref(),
            &self.issuer,
            email,
        )?)
    }

    /// otpauth URI を QR コード (data URL) に変換
    pub fn qr_code(&self, provisioning: &SecretProvisioning) -> Result<String, AppError> {
        qr::render_data_url(&provisioning.provisioning_uri)
    }

    /// TOTP コードを Base32 シークレットに対して検証
    pub fn verify(&self, code: &str, secret: &str) -> Result<bool, AppError> {
        Ok(totp::verify(
            code,
            secret,
            self.tolerance_steps,
            self.clock.as_ref(),
        )?)
    }

    /// 2FA 設定を開始（シークレットを暗号化して未確認状態で保存）
    ///
    /// 未確認のまま再度呼ばれた場合はシークレットを差し替える
    pub async fn begin_setup(
        &self,
        account_id: Uuid,
        email: &str,
    ) -> Result<SecretProvisioning, AppError> {
        if self.state_of(account_id).await? == TwoFactorState::Enabled {
            return Err(AppError::TotpAlreadyEnabled);
        }

        let provisioning = self.generate_secret(email)?;
        let sealed = self.cipher.seal(&provisioning.secret)?;

        if !self.store.save_pending(account_id, &sealed).await? {
            return Err(AppError::TotpAlreadyEnabled);
        }

        tracing::info!(account_id = %account_id, "2FA設定開始");

        Ok(provisioning)
    }

    /// 初回コードを検証して 2FA を有効化
    ///
    /// # Returns
    /// 平文のバックアップコード（表示はこの1回のみ）
    pub async fn enable(
        &self,
        account_id: Uuid,
        code: &str,
        secret: &str,
    ) -> Result<Vec<String>, AppError> {
        let code = code.trim();
        if !totp::is_code_format(code) {
            return Err(AppError::TotpInvalidFormat);
        }

        if self.state_of(account_id).await? == TwoFactorState::Enabled {
            return Err(AppError::TotpAlreadyEnabled);
        }

        // 160ビット以外の鍵は受け付けない
        let key = base32::decode(secret)?;
        if key.len() != SECRET_LEN {
            return Err(OtpError::InvalidEncoding.into());
        }
        let canonical = base32::encode(&key);
        if !self.verify(code, &canonical)? {
            tracing::warn!(account_id = %account_id, "2FA有効化失敗: コード不一致");
            return Err(AppError::TotpInvalid);
        }

        let backup_codes = generate_backup_codes(self.rng.as_ref())?;
        let hashes = self.hash_backup_codes(&backup_codes);
        let sealed = self.cipher.seal(&canonical)?;

        if !self.store.activate(account_id, &sealed, &hashes).await? {
            return Err(AppError::TotpAlreadyEnabled);
        }

        tracing::info!(account_id = %account_id, "2FA有効化完了");

        Ok(backup_codes)
    }

    /// 保存済みの未確認シークレットで有効化
    pub async fn confirm_setup(
        &self,
        account_id: Uuid,
        code: &str,
    ) -> Result<Vec<String>, AppError> {
        if !totp::is_code_format(code.trim()) {
            return Err(AppError::TotpInvalidFormat);
        }

        let record = self
            .store
            .find(account_id)
            .await?
            .ok_or(AppError::TotpNotEnabled)?;

        if record.enabled {
            return Err(AppError::TotpAlreadyEnabled);
        }

        let secret = self.cipher.open(&record.secret_encrypted)?;
        self.enable(account_id, code, &secret).await
    }

    /// 2FA を無効化（TOTP コードまたは未使用のバックアップコード）
    ///
    /// 失敗時は状態を変更しない
    pub async fn disable(&self, account_id: Uuid, code: &str) -> Result<(), AppError> {
        let submitted = SubmittedCode::classify(code)?;
        let record = self.enabled_record(account_id).await?;

        let disabled = match submitted {
            SubmittedCode::Totp(code) => {
                if self.verify_record(&record, &code)? {
                    self.store.delete(account_id).await?;
                    true
                } else {
                    false
                }
            }
            SubmittedCode::Backup(code) => {
                self.store
                    .delete_with_backup_code(account_id, &self.backup_hasher.hash(&code))
                    .await?
            }
        };

        if !disabled {
            tracing::warn!(account_id = %account_id, "2FA無効化失敗: コード不一致");
            return Err(AppError::TotpInvalid);
        }

        tracing::info!(account_id = %account_id, "2FA無効化完了");

        Ok(())
    }

    /// 2FA が有効か
    pub async fn is_enabled(&self, account_id: Uuid) -> Result<bool, AppError> {
        Ok(self.state_of(account_id).await? == TwoFactorState::Enabled)
    }

    /// 現在の状態
    pub async fn status(&self, account_id: Uuid) -> Result<TwoFactorState, AppError> {
        self.state_of(account_id).await
    }

    /// 操作にステップアップ認証が必要か
    pub fn requires_step_up(&self, action: ActionKind) -> bool {
        action.requires_step_up()
    }

    /// ステップアップ認証（TOTP コードまたはバックアップコード）
    ///
    /// バックアップコードは成功時にのみ消費される
    pub async fn verify_step_up(&self, account_id: Uuid, code: &str) -> Result<(), AppError> {
        let submitted = SubmittedCode::classify(code)?;
        let record = self.enabled_record(account_id).await?;

        let verified = match submitted {
            SubmittedCode::Totp(code) => self.verify_record(&record, &code)?,
            SubmittedCode::Backup(code) => {
                let consumed = self
                    .store
                    .consume_backup_code(account_id, &self.backup_hasher.hash(&code))
                    .await?;
                if consumed {
                    tracing::info!(account_id = %account_id, "バックアップコード使用");
                }
                consumed
            }
        };

        if !verified {
            tracing::warn!(account_id = %account_id, "ステップアップ認証失敗");
            return Err(AppError::TotpInvalid);
        }

        Ok(())
    }

    /// 重要操作の前に呼ぶゲート
    ///
    /// 対象外の操作・2FA 未設定のアカウントはそのまま通す
    pub async fn authorize_action(
        &self,
        account_id: Uuid,
        action: ActionKind,
        code: Option<&str>,
    ) -> Result<(), AppError> {
        if !self.requires_step_up(action) || !self.is_enabled(account_id).await? {
            return Ok(());
        }

        match code {
            Some(code) => self.verify_step_up(account_id, code).await,
            None => Err(AppError::TotpRequired),
        }
    }

    /// バックアップコードを再発行（TOTP コードのみ受け付ける）
    pub async fn regenerate_backup_codes(
        &self,
        account_id: Uuid,
        code: &str,
    ) -> Result<Vec<String>, AppError> {
        let SubmittedCode::Totp(code) = SubmittedCode::classify(code)? else {
            return Err(AppError::TotpInvalidFormat);
        };

        let record = self.enabled_record(account_id).await?;
        if !self.verify_record(&record, &code)? {
            tracing::warn!(
                account_id = %account_id,
                "バックアップコード再発行失敗: コード不一致"
            );
            return Err(AppError::TotpInvalid);
        }

        let backup_codes = generate_backup_codes(self.rng.as_ref())?;
        let hashes = self.hash_backup_codes(&backup_codes);

        if !self.store.replace_backup_codes(account_id, &hashes).await? {
            return Err(AppError::TotpNotEnabled);
        }

        tracing::info!(account_id = %account_id, "バックアップコード再発行");

        Ok(backup_codes)
    }

    /// ストアの疎通確認
    pub async fn ready(&self) -> Result<(), AppError> {
        self.store.ping().await
    }

    async fn state_of(&self, account_id: Uuid) -> Result<TwoFactorState, AppError> {
        let record = self.store.find(account_id).await?;
        Ok(TwoFactorState::of(record.as_ref()))
    }

    async fn enabled_record(&self, account_id: Uuid) -> Result<TwoFactorRecord, AppError> {
        self.store
            .find(account_id)
            .await?
            .filter(|r| r.enabled)
            .ok_or(AppError::TotpNotEnabled)
    }

    fn hash_backup_codes(&self, codes: &[String]) -> Vec<String> {
        codes.iter().map(|c| self.backup_hasher.hash(c)).collect()
    }

    fn verify_record(&self, record: &TwoFactorRecord, code: &str) -> Result<bool, AppError> {
        let secret = self.cipher.open(&record.secret_encrypted)?;
        let key = base32::decode(&secret)?;
        Ok(totp::verify_at(
            code,
            &key,
            self.clock.now_unix(),
            self.tolerance_steps,
        )?)
    }
}
