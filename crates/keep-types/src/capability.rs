//! Signed locators: attaching and checking a time-bounded permission hint.

use crate::locator::{Hint, Locator};

pub use keep_crypto::VerifyResult;

/// Attach a permission signature hint to `locator`, returning the signed
/// copy. Any existing signature hint is replaced; other hints are kept in
/// place.
pub fn sign(secret: &[u8], locator: &Locator, api_token: &str, expiry_unix: u64) -> Locator {
    let expiry_hex = format!("{expiry_unix:x}");
    let hmac = keep_crypto::sign(secret, &locator.hash, &expiry_hex, api_token);

    let mut hints: Vec<Hint> = locator
        .hints
        .iter()
        .filter(|h| !matches!(h, Hint::Signature { .. }))
        .cloned()
        .collect();
    hints.push(Hint::Signature { hmac, expiry_hex });

    Locator {
        hash: locator.hash.clone(),
        size: locator.size,
        hints,
    }
}

/// Verify the signature hint on `locator`, if any.
///
/// Returns `VerifyResult::Invalid` when the locator carries no signature
/// hint at all.
pub fn verify(secret: &[u8], locator: &Locator, api_token: &str, now: u64) -> VerifyResult {
    match locator.signature() {
        Some((hmac, expiry_hex)) => {
            keep_crypto::verify(secret, &locator.hash, expiry_hex, api_token, hmac, now)
        }
        None => VerifyResult::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::parse;

    const HASH: &str = "acbd18db4cc2f85cedef654fccc4a4d8";

    #[test]
    fn sign_then_verify_round_trips() {
        let loc = parse(&format!("{HASH}+3")).unwrap();
        let signed = sign(b"secret", &loc, "token123", 2_000_000_000);
        assert!(signed.signature().is_some());
        assert_eq!(verify(b"secret", &signed, "token123", 1_000_000_000), VerifyResult::Valid);
    }

    #[test]
    fn verify_detects_expiry() {
        let loc = parse(&format!("{HASH}+3")).unwrap();
        let signed = sign(b"secret", &loc, "token123", 100);
        assert_eq!(verify(b"secret", &signed, "token123", 200), VerifyResult::Expired);
    }

    #[test]
    fn verify_rejects_unsigned_locator() {
        let loc = parse(HASH).unwrap();
        assert_eq!(verify(b"secret", &loc, "token123", 0), VerifyResult::Invalid);
    }

    #[test]
    fn sign_replaces_existing_signature_and_keeps_other_hints() {
        let loc = parse(&format!("{HASH}+3+K@abcde")).unwrap();
        let signed_once = sign(b"secret", &loc, "token123", 100);
        let signed_twice = sign(b"secret", &signed_once, "token123", 200);
        assert!(matches!(signed_twice.hints[0], Hint::Region(ref r) if r == "abcde"));
        assert_eq!(signed_twice.hints.len(), 2);
    }
}
