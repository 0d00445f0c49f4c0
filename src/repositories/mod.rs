use uuid::Uuid;

use crate::error::AppError;
use crate::models::TwoFactorRecord;

pub mod memory;
pub mod two_factor;

pub use memory::InMemoryTwoFactorStore;
pub use two_factor::PgTwoFactorStore;

/// 二要素認証レコードの永続化先
///
/// 各操作はアカウント単位でアトミックであること。
/// 特にバックアップコードの消費は「確認・削除・書き戻し」を1単位で行い、
/// 同時リクエストで同じコードが二度通らないようにする。
pub trait TwoFactorStore: Clone + Send + Sync + 'static {
    /// レコードを取得
    fn find(
        &self,
        account_id: Uuid,
    ) -> impl Future<Output = Result<Option<TwoFactorRecord>, AppError>> + Send;

    /// 設定途中のシークレットを保存（既存の未確認レコードは置き換え）
    ///
    /// 既に有効なアカウントでは何もせず `false`
    fn save_pending(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// シークレットとバックアップコードを保存して有効化
    ///
    /// 既に有効なアカウントでは何もせず `false`
    fn activate(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// 有効なアカウントのバックアップコードを置き換え
    fn replace_backup_codes(
        &self,
        account_id: Uuid,
        backup_code_hashes: &[String],
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// バックアップコードを1つ消費（存在した場合のみ `true`）
    fn consume_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// レコードを削除（Disabled へ）
    fn delete(&self, account_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// バックアップコードを保持している場合に限りレコードを削除
    fn delete_with_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// 疎通確認
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
