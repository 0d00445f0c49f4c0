use axum::{extract::FromRequestParts, http::request::Parts};
use http::header::AUTHORIZATION;
use uuid::Uuid;

use crate::error::AppError;
use crate::repositories::TwoFactorStore;
use crate::state::AppState;

/// 前段アプリが認証済みアカウントIDを載せるヘッダー
pub const ACCOUNT_ID_HEADER: &str = "x-account-id";

/// 認証済みの呼び出し元アカウント
///
/// `Authorization: Bearer <共有トークン>` と `X-Account-Id` の両方が揃った場合のみ取り出せる。
/// リクエストボディのアカウントIDは信用しない。
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedAccount(pub Uuid);

impl<S: TwoFactorStore> FromRequestParts<AppState<S>> for AuthenticatedAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        if !state.caller_token.verify(token) {
            tracing::warn!("呼び出し元トークン不一致");
            return Err(AppError::Unauthenticated);
        }

        let account_id = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthenticated)?;

        Ok(Self(account_id))
    }
}
