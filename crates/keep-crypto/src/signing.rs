//! # Permission signatures
//!
//! HMAC-SHA1 signatures authorizing access to a block for a bounded time,
//! per the wire formula:
//!
//! ```text
//! HMAC-SHA1(secret, hash + "@" + expiry_hex + api_token)
//! ```
//!
//! truncated to the first 40 hex characters (the full SHA1 MAC is already
//! exactly 40 hex characters, so this is really "the whole MAC").

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the permission signature for a hash, expiry and API token.
///
/// `expiry_hex` is the lowercase hex Unix timestamp at which the signature
/// stops being valid.
pub fn sign(secret: &[u8], hash: &str, expiry_hex: &str, api_token: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(hash.as_bytes());
    mac.update(b"@");
    mac.update(expiry_hex.as_bytes());
    mac.update(api_token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Outcome of verifying a permission signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// The signature matches and the expiry has not passed.
    Valid,
    /// The signature matches but `now` is past `expiry_hex`.
    Expired,
    /// The signature does not match what this secret/token would produce.
    Invalid,
}

/// Verify a previously-issued signature.
///
/// `now` is the caller's notion of the current Unix timestamp, compared
/// against the decoded `expiry_hex`.
pub fn verify(
    secret: &[u8],
    hash: &str,
    expiry_hex: &str,
    api_token: &str,
    signature: &str,
    now: u64,
) -> VerifyResult {
    let expected = sign(secret, hash, expiry_hex, api_token);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return VerifyResult::Invalid;
    }
    match u64::from_str_radix(expiry_hex, 16) {
        Ok(expiry) if expiry >= now => VerifyResult::Valid,
        Ok(_) => VerifyResult::Expired,
        Err(_) => VerifyResult::Invalid,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_deterministic_and_40_hex_chars() {
        let sig = sign(b"secret", "acbd18db4cc2f85cedef654fccc4a4d8", "5f1234ab", "token123");
        assert_eq!(sig.len(), 40);
        assert_eq!(
            sig,
            sign(b"secret", "acbd18db4cc2f85cedef654fccc4a4d8", "5f1234ab", "token123")
        );
    }

    #[test]
    fn verify_accepts_valid_unexpired_signature() {
        let hash = "acbd18db4cc2f85cedef654fccc4a4d8";
        let expiry_hex = format!("{:x}", 1_000_000u64);
        let sig = sign(b"secret", hash, &expiry_hex, "token123");
        assert_eq!(
            verify(b"secret", hash, &expiry_hex, "token123", &sig, 999_999),
            VerifyResult::Valid
        );
    }

    #[test]
    fn verify_reports_expired() {
        let hash = "acbd18db4cc2f85cedef654fccc4a4d8";
        let expiry_hex = format!("{:x}", 1_000_000u64);
        let sig = sign(b"secret", hash, &expiry_hex, "token123");
        assert_eq!(
            verify(b"secret", hash, &expiry_hex, "token123", &sig, 1_000_001),
            VerifyResult::Expired
        );
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let hash = "acbd18db4cc2f85cedef654fccc4a4d8";
        let expiry_hex = format!("{:x}", 1_000_000u64);
        let mut sig = sign(b"secret", hash, &expiry_hex, "token123");
        sig.replace_range(0..1, if sig.starts_with('a') { "b" } else { "a" });
        assert_eq!(
            verify(b"secret", hash, &expiry_hex, "token123", &sig, 0),
            VerifyResult::Invalid
        );
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let hash = "acbd18db4cc2f85cedef654fccc4a4d8";
        let expiry_hex = format!("{:x}", 1_000_000u64);
        let sig = sign(b"secret", hash, &expiry_hex, "token123");
        assert_eq!(
            verify(b"other-secret", hash, &expiry_hex, "token123", &sig, 0),
            VerifyResult::Invalid
        );
    }
}
