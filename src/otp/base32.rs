use data_encoding::BASE32_NOPAD;

use super::OtpError;

/// RFC 4648 の Base32 アルファベット
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// バイト列を Base32 (パディングなし) にエンコード
pub fn encode(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

/// Base32 文字列をデコード
///
/// 小文字は大文字として扱い、表示用の区切り（空白・ハイフン）は取り除く。
/// それ以外のアルファベット外の文字はスキップせずエラーにする。
pub fn decode(input: &str) -> Result<Vec<u8>, OtpError> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(OtpError::InvalidEncoding);
    }

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| OtpError::InvalidEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_rfc4648_vectors() {
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn test_round_trip_lengths_1_to_64() {
        for len in 1..=64usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + len) as u8).collect();
            let encoded = encode(&bytes);
            assert!(encoded.bytes().all(|b| ALPHABET.contains(&b)));
            assert_eq!(decode(&encoded).unwrap(), bytes, "len = {len}");
        }
    }

    #[test]
    fn test_decode_accepts_lowercase_and_grouping() {
        assert_eq!(decode("mzxw 6ytb-oi").unwrap(), b"foobar");
    }

    #[test]
    fn test_decode_rejects_characters_outside_alphabet() {
        assert_eq!(decode("MZXW6YT1"), Err(OtpError::InvalidEncoding));
        assert_eq!(decode("MZXW6YT="), Err(OtpError::InvalidEncoding));
        assert_eq!(decode("MZXW!6YTB"), Err(OtpError::InvalidEncoding));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert_eq!(decode(""), Err(OtpError::InvalidEncoding));
        assert_eq!(decode("  "), Err(OtpError::InvalidEncoding));
    }

    #[test]
    fn test_decode_rejects_impossible_length() {
        // 1文字では1バイトにならない
        assert_eq!(decode("M"), Err(OtpError::InvalidEncoding));
    }
}
