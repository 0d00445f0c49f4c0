use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::AuthenticatedAccount;
use crate::models::{ActionKind, TwoFactorState};
use crate::repositories::TwoFactorStore;
use crate::state::AppState;

// === 2FA Setup ===

#[derive(Debug, Deserialize, Validate)]
pub struct SetupRequest {
    #[garde(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub secret: String,
    pub display_groups: Vec<String>,
    pub provisioning_uri: String,
    pub qr_code: String,
}

/// POST /api/2fa/setup
///
/// 2FA設定を開始（シークレット生成、QRコード返却）
///
/// # Security
/// - 呼び出し元の認証必須（アカウントはヘッダーから取得）
/// - シークレット平文はログ出力禁止
/// - シークレットを返すのはこのレスポンスのみ
pub async fn setup_2fa<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Json(request): Json<SetupRequest>,
) -> Result<Json<SetupResponse>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let provisioning = state
        .two_factor
        .begin_setup(account_id, &request.email)
        .await?;
    let qr_code = state.two_factor.qr_code(&provisioning)?;

    Ok(Json(SetupResponse {
        secret: provisioning.secret,
        display_groups: provisioning.display_groups,
        provisioning_uri: provisioning.provisioning_uri,
        qr_code,
    }))
}

// === 2FA Verify ===

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub enabled: bool,
    pub backup_codes: Vec<String>,
}

/// POST /api/2fa/verify
///
/// 2FA設定確認（初回コード検証で有効化、バックアップコード返却）
///
/// # Security
/// - コードはログ出力禁止
/// - バックアップコードを返すのはこのレスポンスのみ
pub async fn verify_2fa<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Json(request): Json<CodeRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let backup_codes = state
        .two_factor
        .confirm_setup(account_id, &request.code)
        .await?;

    Ok(Json(VerifyResponse {
        enabled: true,
        backup_codes,
    }))
}

// === 2FA Disable ===

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub disabled: bool,
}

/// POST /api/2fa/disable
///
/// 2FA無効化（TOTPコードまたはバックアップコード）
pub async fn disable_2fa<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Json(request): Json<CodeRequest>,
) -> Result<Json<DisableResponse>, AppError> {
    state
        .two_factor
        .disable(account_id, &request.code)
        .await?;

    Ok(Json(DisableResponse { disabled: true }))
}

// === 2FA Status ===

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: TwoFactorState,
    pub enabled: bool,
}

/// GET /api/2fa/status
pub async fn status_2fa<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
) -> Result<Json<StatusResponse>, AppError> {
    let current = state.two_factor.status(account_id).await?;

    Ok(Json(StatusResponse {
        state: current,
        enabled: current == TwoFactorState::Enabled,
    }))
}

// === Step-up ===

#[derive(Debug, Deserialize)]
pub struct StepUpRequest {
    pub action: ActionKind,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StepUpResponse {
    pub authorized: bool,
}

/// POST /api/2fa/step-up
///
/// 購入・設定変更・出金の前に呼ばれる。
/// 2FA 有効アカウントではコードが必要。
pub async fn step_up<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Json(request): Json<StepUpRequest>,
) -> Result<Json<StepUpResponse>, AppError> {
    state
        .two_factor
        .authorize_action(account_id, request.action, request.code.as_deref())
        .await?;

    Ok(Json(StepUpResponse { authorized: true }))
}

// === Backup codes ===

#[derive(Debug, Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}

/// POST /api/2fa/backup-codes
///
/// バックアップコード再発行（TOTPコードのみ受け付ける）
pub async fn regenerate_backup_codes<S: TwoFactorStore>(
    State(state): State<AppState<S>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Json(request): Json<CodeRequest>,
) -> Result<Json<BackupCodesResponse>, AppError> {
    let backup_codes = state
        .two_factor
        .regenerate_backup_codes(account_id, &request.code)
        .await?;

    Ok(Json(BackupCodesResponse { backup_codes }))
}
