use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// アカウントの二要素認証状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorState {
    /// 未設定（レコードなし）
    Disabled,
    /// シークレット発行済み、初回コード未確認
    PendingSetup,
    /// 有効
    Enabled,
}

impl TwoFactorState {
    /// レコードの有無と enabled フラグから状態を導く
    pub fn of(record: Option<&TwoFactorRecord>) -> Self {
        match record {
            None => Self::Disabled,
            Some(r) if r.enabled => Self::Enabled,
            Some(_) => Self::PendingSetup,
        }
    }
}

/// アカウントの二要素認証レコード
///
/// - レコードが存在する ⇔ シークレットが存在する（Disabled 以外）
/// - シークレットは AES-256-GCM で暗号化されて保存される
/// - バックアップコードは SHA-256 ハッシュのみ保存
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TwoFactorRecord {
    pub account_id: Uuid,
    #[serde(skip)]
    pub secret_encrypted: Vec<u8>,
    pub enabled: bool,
    #[serde(skip)]
    pub backup_code_hashes: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TwoFactorRecord {
    pub fn state(&self) -> TwoFactorState {
        TwoFactorState::of(Some(self))
    }
}
