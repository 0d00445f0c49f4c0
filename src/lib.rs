//! twogate: TOTP 二要素認証サービス
//!
//! - `otp`: Base32 / HOTP / TOTP / シークレット / バックアップコード（純粋計算）
//! - `services`: 登録・無効化・ステップアップの状態遷移
//! - `repositories`: 二要素認証レコードの保存先（PostgreSQL / メモリ）
//! - `handlers`: axum の HTTP ハンドラー（呼び出し元の認証を含む）

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod otp;
pub mod repositories;
pub mod router;
pub mod services;
pub mod state;
