use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::otp::OtpError;

/// 認証コード不一致時の共通メッセージ
///
/// 形式不正・期限切れ・使用済みバックアップコードを区別しない
const INVALID_CODE_MESSAGE: &str = "認証コードが正しくありません";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("OTP エラー: {0}")]
    Otp(#[from] OtpError),

    #[error("認証コードの形式が不正です")]
    TotpInvalidFormat,

    #[error("認証コードが無効です")]
    TotpInvalid,

    #[error("二要素認証は既に有効です")]
    TotpAlreadyEnabled,

    #[error("二要素認証が有効化されていません")]
    TotpNotEnabled,

    #[error("二要素認証コードが必要です")]
    TotpRequired,

    #[error("認証されていません")]
    Unauthenticated,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Otp(OtpError::InvalidEncoding) => (
                StatusCode::BAD_REQUEST,
                "シークレットの形式が不正です".to_string(),
            ),
            Self::Otp(e) => {
                // 乱数源の障害は設定処理を中断する
                tracing::error!(error = %e, "OTP 処理エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::TotpInvalidFormat | Self::TotpInvalid => {
                (StatusCode::UNAUTHORIZED, INVALID_CODE_MESSAGE.to_string())
            }
            Self::TotpAlreadyEnabled => {
                (StatusCode::CONFLICT, "二要素認証は既に有効です".to_string())
            }
            Self::TotpNotEnabled => (
                StatusCode::BAD_REQUEST,
                "二要素認証が有効化されていません".to_string(),
            ),
            Self::TotpRequired => (
                StatusCode::FORBIDDEN,
                "二要素認証コードが必要です".to_string(),
            ),
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "認証が必要です".to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
