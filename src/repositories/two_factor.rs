use sqlx::PgPool;
use uuid::Uuid;

use super::TwoFactorStore;
use crate::error::AppError;
use crate::models::TwoFactorRecord;

/// PostgreSQL 上の二要素認証レコード
///
/// 条件付き UPDATE / DELETE の1文で確認と更新を行うため、
/// 行ロック以外の排他制御は不要。
#[derive(Clone)]
pub struct PgTwoFactorStore {
    pool: PgPool,
}

impl PgTwoFactorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TwoFactorStore for PgTwoFactorStore {
    async fn find(&self, account_id: Uuid) -> Result<Option<TwoFactorRecord>, AppError> {
        let record = sqlx::query_as::<_, TwoFactorRecord>(
            r#"
            SELECT account_id, secret_encrypted, enabled, backup_code_hashes, created_at, updated_at
            FROM two_factor_accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// # Note
    /// 作成時は enabled = false
    async fn save_pending(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
    ) -> Result<bool, AppError> {
        let saved = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO two_factor_accounts (account_id, secret_encrypted)
            VALUES ($1, $2)
            ON CONFLICT (account_id) DO UPDATE
            SET secret_encrypted = EXCLUDED.secret_encrypted,
                backup_code_hashes = '{}',
                created_at = NOW(),
                updated_at = NOW()
            WHERE two_factor_accounts.enabled = false
            RETURNING account_id
            "#,
        )
        .bind(account_id)
        .bind(secret_encrypted)
        .fetch_optional(&self.pool)
        .await?;

        Ok(saved.is_some())
    }

    async fn activate(
        &self,
        account_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let activated = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO two_factor_accounts
                (account_id, secret_encrypted, enabled, backup_code_hashes)
            VALUES ($1, $2, true, $3)
            ON CONFLICT (account_id) DO UPDATE
            SET secret_encrypted = EXCLUDED.secret_encrypted,
                enabled = true,
                backup_code_hashes = EXCLUDED.backup_code_hashes,
                updated_at = NOW()
            WHERE two_factor_accounts.enabled = false
            RETURNING account_id
            "#,
        )
        .bind(account_id)
        .bind(secret_encrypted)
        .bind(backup_code_hashes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activated.is_some())
    }

    async fn replace_backup_codes(
        &self,
        account_id: Uuid,
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE two_factor_accounts
            SET backup_code_hashes = $2, updated_at = NOW()
            WHERE account_id = $1 AND enabled = true
            "#,
        )
        .bind(account_id)
        .bind(backup_code_hashes)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn consume_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE two_factor_accounts
            SET backup_code_hashes = array_remove(backup_code_hashes, $2), updated_at = NOW()
            WHERE account_id = $1 AND enabled = true AND $2 = ANY(backup_code_hashes)
            "#,
        )
        .bind(account_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, account_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM two_factor_accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_with_backup_code(
        &self,
        account_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM two_factor_accounts
            WHERE account_id = $1 AND enabled = true AND $2 = ANY(backup_code_hashes)
            "#,
        )
        .bind(account_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// 実 DB に対する結合テスト
///
/// `DATABASE_URL` を設定して `cargo test --features pg-tests` で実行する。
/// テストごとに一時データベースが作られ、`migrations/` が適用される。
#[cfg(all(test, feature = "pg-tests"))]
mod tests {
    use super::*;

    fn hashes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_pending_then_activate(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();

        assert!(store.save_pending(id, b"pending").await.unwrap());
        let record = store.find(id).await.unwrap().unwrap();
        assert!(!record.enabled);

        assert!(store.activate(id, b"secret", &hashes(&["h1", "h2"])).await.unwrap());
        let record = store.find(id).await.unwrap().unwrap();
        assert!(record.enabled);
        assert_eq!(record.secret_encrypted, b"secret");

        // 有効なアカウントは上書きしない
        assert!(!store.save_pending(id, b"other").await.unwrap());
        assert!(!store.activate(id, b"other", &hashes(&["h3"])).await.unwrap());
        let record = store.find(id).await.unwrap().unwrap();
        assert_eq!(record.secret_encrypted, b"secret");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_consume_backup_code_once(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();
        store.activate(id, b"s", &hashes(&["h1", "h2"])).await.unwrap();

        assert!(store.consume_backup_code(id, "h1").await.unwrap());
        assert!(!store.consume_backup_code(id, "h1").await.unwrap());

        let record = store.find(id).await.unwrap().unwrap();
        assert_eq!(record.backup_code_hashes, hashes(&["h2"]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_consume_succeeds_once(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();
        store.activate(id, b"s", &hashes(&["h1"])).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.consume_backup_code(id, "h1").await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_pending_record_cannot_consume(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();
        store.save_pending(id, b"pending").await.unwrap();

        assert!(!store.consume_backup_code(id, "h1").await.unwrap());
        assert!(!store.replace_backup_codes(id, &hashes(&["h1"])).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_with_backup_code(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();
        store.activate(id, b"s", &hashes(&["h1"])).await.unwrap();

        assert!(!store.delete_with_backup_code(id, "nope").await.unwrap());
        assert!(store.find(id).await.unwrap().is_some());

        assert!(store.delete_with_backup_code(id, "h1").await.unwrap());
        assert!(store.find(id).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_replace_backup_codes(pool: PgPool) {
        let store = PgTwoFactorStore::new(pool);
        let id = Uuid::new_v4();
        store.activate(id, b"s", &hashes(&["old"])).await.unwrap();

        assert!(store.replace_backup_codes(id, &hashes(&["new"])).await.unwrap());
        assert!(!store.consume_backup_code(id, "old").await.unwrap());
        assert!(store.consume_backup_code(id, "new").await.unwrap());
    }
}
