use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::TwoFactorStore;
use crate::error::AppError;
use crate::models::TwoFactorRecord;

/// プロセス内メモリ上の二要素認証レコード
///
/// 全操作を1つのロックの中で完結させる。
/// テストや単一プロセスでの組み込み用途向け。
#[derive(Clone, Default)]
pub struct InMemoryTwoFactorStore {
    records: Arc<Mutex<HashMap<Uuid, TwoFactorRecord>>>,
}

impl InMemoryTwoFactorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TwoFactorStore for InMemoryTwoFactorStore {
    async fn find(&self, account_id: Uuid) -> Result<Option<TwoFactorRecord>, AppError> {
        Ok(self.records.lock().await.get(&account_id).cloned())
    }

    async fn save_pending(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        if records.get(&account_id).is_some_and(|r| r.enabled) {
            return Ok(false);
        }

        let now = OffsetDateTime::now_utc();
        records.insert(
            account_id,
            TwoFactorRecord {
                account_id,
                secret_encrypted: secret_encrypted.to_vec(),
                enabled: false,
                backup_code_hashes: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn activate(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let now = OffsetDateTime::now_utc();

        match records.get_mut(&account_id) {
            Some(record) if record.enabled => Ok(false),
            Some(record) => {
                record.secret_encrypted = secret_encrypted.to_vec();
                record.enabled = true;
                record.backup_code_hashes = backup_code_hashes.to_vec();
                record.updated_at = now;
                Ok(true)
            }
            None => {
                records.insert(
                    account_id,
                    TwoFactorRecord {
                        account_id,
                        secret_encrypted: secret_encrypted.to_vec(),
                        enabled: true,
                        backup_code_hashes: backup_code_hashes.to_vec(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn replace_backup_codes(
        &self,
        account_id: Uuid,
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&account_id) {
            Some(record) if record.enabled => {
                record.backup_code_hashes = backup_code_hashes.to_vec();
                record.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&account_id).filter(|r| r.enabled) else {
            return Ok(false);
        };

        match record.backup_code_hashes.iter().position(|h| h == code_hash) {
            Some(index) => {
                record.backup_code_hashes.swap_remove(index);
                record.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, account_id: Uuid) -> Result<(), AppError> {
        self.records.lock().await.remove(&account_id);
        Ok(())
    }

    async fn delete_with_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let holds_code = records
            .get(&account_id)
            .is_some_and(|r| r.enabled && r.backup_code_hashes.iter().any(|h| h == code_hash));

        if holds_code {
            records.remove(&account_id);
        }
        Ok(holds_code)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
