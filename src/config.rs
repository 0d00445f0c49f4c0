use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // 2FA (TOTP) 設定
    /// TOTP発行者名（認証アプリに表示される）
    pub totp_issuer: String,
    /// 前後に許容するタイムステップ数（上限は `otp::MAX_TOLERANCE_STEPS`）
    #[serde(default = "default_totp_tolerance_steps")]
    pub totp_tolerance_steps: u64,
    /// AES-256暗号化キー（Base64エンコード、32バイト）
    pub encryption_key: SecretBox<String>,

    /// 前段アプリとの共有トークン（Authorization: Bearer）
    pub internal_api_token: SecretBox<String>,

    /// CORS で許可するオリジン（未設定なら CORS ヘッダーを付けない）
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOTP_TOLERANCE_STEPS: u64 = 1;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_totp_tolerance_steps() -> u64 {
    DEFAULT_TOTP_TOLERANCE_STEPS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/twogate"),
            ("TOTP_ISSUER", "AI Tools"),
            ("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
            ("INTERNAL_API_TOKEN", "gateway-token"),
        ]))
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.totp_tolerance_steps, 1);
        assert_eq!(config.totp_issuer, "AI Tools");
        assert_eq!(
            config.database_url.expose_secret(),
            "postgres://localhost/twogate"
        );
        assert!(config.cors_allowed_origin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/twogate"),
            ("TOTP_ISSUER", "AI Tools"),
            ("ENCRYPTION_KEY", "key"),
            ("INTERNAL_API_TOKEN", "gateway-token"),
            ("PORT", "8080"),
            ("TOTP_TOLERANCE_STEPS", "0"),
            ("CORS_ALLOWED_ORIGIN", "https://tools.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.totp_tolerance_steps, 0);
        assert_eq!(
            config.cors_allowed_origin.as_deref(),
            Some("https://tools.example.com")
        );
    }

    #[test]
    fn test_missing_issuer_is_error() {
        let result = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/twogate"),
            ("ENCRYPTION_KEY", "key"),
            ("INTERNAL_API_TOKEN", "gateway-token"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_internal_api_token_is_error() {
        let result = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/twogate"),
            ("TOTP_ISSUER", "AI Tools"),
            ("ENCRYPTION_KEY", "key"),
        ]));
        assert!(result.is_err());
    }
}
