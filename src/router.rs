use axum::{
    Router,
    routing::{get, post},
};
use http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::repositories::TwoFactorStore;
use crate::state::AppState;

/// Router の構築
pub fn create_router<S: TwoFactorStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check::<S>))
        .route("/api/2fa/setup", post(handlers::setup_2fa::<S>))
        .route("/api/2fa/verify", post(handlers::verify_2fa::<S>))
        .route("/api/2fa/disable", post(handlers::disable_2fa::<S>))
        .route("/api/2fa/status", get(handlers::status_2fa::<S>))
        .route("/api/2fa/step-up", post(handlers::step_up::<S>))
        .route(
            "/api/2fa/backup-codes",
            post(handlers::regenerate_backup_codes::<S>),
        )
        .with_state(state)
}

/// ブラウザからの呼び出し用 CORS レイヤー
///
/// オリジンが不正な場合は `None`（CORS ヘッダーなし）
pub fn cors_layer(allowed_origin: &str) -> Option<CorsLayer> {
    let origin = match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!(
                error = %e,
                origin = %allowed_origin,
                "CORS オリジンのパースに失敗"
            );
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(handlers::ACCOUNT_ID_HEADER),
            ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer() {
        assert!(cors_layer("https://tools.example.com").is_some());
        assert!(cors_layer("bad\norigin").is_none());
    }
}
