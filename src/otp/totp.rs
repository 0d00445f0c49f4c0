use std::sync::atomic::{AtomicU64, Ordering};

use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use super::{DIGITS, OtpError, PERIOD_SECS, base32, hotp::hotp_code};

/// 時刻の供給元
///
/// 検証時刻を差し替えられるよう、サービスには trait object として渡す。
pub trait Clock: Send + Sync {
    /// 現在の UNIX 時刻（秒）
    fn now_unix(&self) -> u64;
}

/// システム時刻
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        // エポック以前の時刻は 0 に丸める
        u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
    }
}

/// 固定時刻（テスト・再現用）
#[derive(Debug, Default)]
pub struct FixedClock {
    unix: AtomicU64,
}

impl FixedClock {
    pub fn new(unix: u64) -> Self {
        Self {
            unix: AtomicU64::new(unix),
        }
    }

    pub fn set(&self, unix: u64) {
        self.unix.store(unix, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.unix.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.unix.load(Ordering::SeqCst)
    }
}

/// UNIX 時刻からタイムステップを求める
pub fn time_step(unix_secs: u64) -> u64 {
    unix_secs / PERIOD_SECS
}

/// 6桁の数字かどうか
pub fn is_code_format(code: &str) -> bool {
    code.len() == DIGITS as usize && code.bytes().all(|b| b.is_ascii_digit())
}

/// 指定時刻でコードを検証
///
/// 現在ステップの前後 `tolerance_steps` ステップまで許容する。
/// 負のステップは存在しないので飛ばす。
pub fn verify_at(
    code: &str,
    key: &[u8],
    unix_secs: u64,
    tolerance_steps: u64,
) -> Result<bool, OtpError> {
    if !is_code_format(code) {
        return Ok(false);
    }

    let step = time_step(unix_secs);
    let first = step.saturating_sub(tolerance_steps);
    let last = step.saturating_add(tolerance_steps);

    let mut matched = false;
    for counter in first..=last {
        let expected = hotp_code(key, counter)?;
        // 一致しても全ステップを計算する
        matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
    }

    Ok(matched)
}

/// Base32 シークレットと時計を受け取ってコードを検証
///
/// 形式不正のコードは暗号計算を行わずに `false` を返す。
pub fn verify(
    code: &str,
    secret: &str,
    tolerance_steps: u64,
    clock: &dyn Clock,
) -> Result<bool, OtpError> {
    if !is_code_format(code) {
        return Ok(false);
    }

    let key = base32::decode(secret)?;
    verify_at(code, &key, clock.now_unix(), tolerance_steps)
}

/// 指定時刻の TOTP コードを生成
pub fn generate_at(secret: &str, unix_secs: u64) -> Result<String, OtpError> {
    let key = base32::decode(secret)?;
    hotp_code(&key, time_step(unix_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::DEFAULT_TOLERANCE_STEPS;

    // "12345678901234567890" の Base32
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_time_step() {
        assert_eq!(time_step(0), 0);
        assert_eq!(time_step(29), 0);
        assert_eq!(time_step(30), 1);
        assert_eq!(time_step(59), 1);
        assert_eq!(time_step(1_111_111_109), 37_037_036);
    }

    #[test]
    fn test_rfc6238_sha1_vectors_truncated_to_six_digits() {
        // RFC 6238 Appendix B (8桁) の下6桁
        let vectors = [
            (59u64, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
        ];
        for (unix, expected) in vectors {
            assert_eq!(generate_at(RFC_SECRET, unix).unwrap(), expected, "t = {unix}");
        }
    }

    #[test]
    fn test_tolerance_window_boundaries() {
        let key = base32::decode(RFC_SECRET).unwrap();
        let step = 50_000_000u64;
        let code = hotp_code(&key, step).unwrap();
        let at = |s: u64| s * PERIOD_SECS + 7;

        for accepted in [step - 1, step, step + 1] {
            assert!(
                verify_at(&code, &key, at(accepted), DEFAULT_TOLERANCE_STEPS).unwrap(),
                "step {accepted} should accept"
            );
        }
        for rejected in [step - 2, step + 2] {
            assert!(
                !verify_at(&code, &key, at(rejected), DEFAULT_TOLERANCE_STEPS).unwrap(),
                "step {rejected} should reject"
            );
        }
    }

    #[test]
    fn test_zero_tolerance_only_accepts_current_step() {
        let key = base32::decode(RFC_SECRET).unwrap();
        let code = hotp_code(&key, 100).unwrap();
        assert!(verify_at(&code, &key, 100 * PERIOD_SECS, 0).unwrap());
        assert!(!verify_at(&code, &key, 101 * PERIOD_SECS, 0).unwrap());
    }

    #[test]
    fn test_window_at_epoch_does_not_underflow() {
        let key = base32::decode(RFC_SECRET).unwrap();
        let code = hotp_code(&key, 0).unwrap();
        assert!(verify_at(&code, &key, 0, DEFAULT_TOLERANCE_STEPS).unwrap());
    }

    #[test]
    fn test_verify_with_clock() {
        let clock = FixedClock::new(1_234_567_890);
        assert!(verify("005924", RFC_SECRET, 1, &clock).unwrap());

        clock.advance(PERIOD_SECS * 3);
        assert!(!verify("005924", RFC_SECRET, 1, &clock).unwrap());
    }

    #[test]
    fn test_invalid_code_format_is_rejected_before_decoding() {
        let clock = FixedClock::new(59);
        // シークレットが不正でも形式チェックが先
        assert_eq!(verify("12345", "not base32!", 1, &clock), Ok(false));
        assert_eq!(verify("12345a", RFC_SECRET, 1, &clock), Ok(false));
        assert_eq!(verify("1234567", RFC_SECRET, 1, &clock), Ok(false));
        assert_eq!(verify("", RFC_SECRET, 1, &clock), Ok(false));
    }

    #[test]
    fn test_invalid_secret_is_an_error() {
        let clock = FixedClock::new(59);
        assert_eq!(
            verify("287082", "GEZDGNBV!", 1, &clock),
            Err(OtpError::InvalidEncoding)
        );
    }

    #[test]
    fn test_matches_totp_rs() {
        let key = base32::decode(RFC_SECRET).unwrap();
        let reference = totp_rs::TOTP::new_unchecked(
            totp_rs::Algorithm::SHA1,
            6,
            1,
            30,
            key,
            None,
            String::new(),
        );
        for unix in [0u64, 59, 1_000_000_007, 1_700_000_000, 4_102_444_800] {
            assert_eq!(generate_at(RFC_SECRET, unix).unwrap(), reference.generate(unix));
        }
    }
}
