use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::error::AppError;

const MIN_DIMENSION: u32 = 200;

/// otpauth URI を QR コード PNG の data URL に変換
pub fn render_data_url(provisioning_uri: &str) -> Result<String, AppError> {
    let code = QrCode::new(provisioning_uri.as_bytes()).map_err(|e| {
        tracing::error!(error = %e, "QRコード生成エラー");
        AppError::Internal(anyhow::anyhow!("qr code generation error"))
    })?;

    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .build();

    let mut cursor = Cursor::new(Vec::<u8>::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| {
            tracing::error!(error = %e, "QRコードのPNGエンコードエラー");
            AppError::Internal(anyhow::anyhow!("qr code encoding error"))
        })?;

    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(cursor.into_inner())
    ))
}
