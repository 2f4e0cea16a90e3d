//! HMAC-SHA256 callback signatures.
//!
//! Providers sign the raw request body with the shared webhook secret and
//! send the base64 digest in `X-Suno-Signature` / `X-Mureka-Signature`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Result of checking a request against the configured secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Verified,
    /// No secret configured; the request is accepted unverified
    Skipped,
    Missing,
    Invalid,
}

impl SignatureCheck {
    pub fn is_accepted(self) -> bool {
        matches!(self, SignatureCheck::Verified | SignatureCheck::Skipped)
    }
}

fn mac_for(secret: &str) -> Result<HmacSha256, WebhookError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::SigningKey(e.to_string()))
}

/// Base64 HMAC-SHA256 of `body` under `secret`.
pub fn sign(body: &[u8], secret: &str) -> Result<String, WebhookError> {
    let mut mac = mac_for(secret)?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a base64 signature. A `sha256=` prefix is tolerated.
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let encoded = signature.trim();
    let encoded = encoded.strip_prefix("sha256=").unwrap_or(encoded);
    let Ok(expected) = STANDARD.decode(encoded) else {
        return false;
    };

    let Ok(mut mac) = mac_for(secret) else {
        tracing::error!("Webhook secret rejected as HMAC key");
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Decide whether a request may be processed.
pub fn check_signature(
    body: &[u8],
    header: Option<&str>,
    secret: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return SignatureCheck::Skipped;
    };
    match header.map(str::trim).filter(|h| !h.is_empty()) {
        None => SignatureCheck::Missing,
        Some(sig) if verify(body, sig, secret) => SignatureCheck::Verified,
        Some(_) => SignatureCheck::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BODY: &[u8] = br#"{"code":200,"data":{"task_id":"t1"}}"#;

    #[test]
    fn test_roundtrip_with_same_secret() {
        let sig = sign(BODY, "secret-a").unwrap();
        assert!(verify(BODY, &sig, "secret-a"));
        assert!(verify(BODY, &format!("sha256={sig}"), "secret-a"));
    }

    #[test]
    fn test_other_secret_fails() {
        let sig = sign(BODY, "secret-a").unwrap();
        assert!(!verify(BODY, &sig, "secret-b"));
    }

    #[test]
    fn test_tampered_body_fails() {
        let sig = sign(BODY, "secret-a").unwrap();
        assert!(!verify(br#"{"code":200,"data":{"task_id":"t2"}}"#, &sig, "secret-a"));
    }

    #[test]
    fn test_garbage_signature_fails() {
        assert!(!verify(BODY, "not base64 !!", "secret-a"));
        assert!(!verify(BODY, "", "secret-a"));
    }

    #[test]
    fn test_any_secret_length_signs() {
        let long = "k".repeat(4096);
        for secret in ["", "x", long.as_str()] {
            let sig = sign(BODY, secret).unwrap();
            assert!(verify(BODY, &sig, secret));
        }
    }

    #[test]
    fn test_check_signature_outcomes() {
        let sig = sign(BODY, "s").unwrap();
        assert_eq!(check_signature(BODY, Some(&sig), Some("s")), SignatureCheck::Verified);
        assert_eq!(check_signature(BODY, None, Some("s")), SignatureCheck::Missing);
        assert_eq!(check_signature(BODY, Some("  "), Some("s")), SignatureCheck::Missing);
        assert_eq!(check_signature(BODY, Some("AAAA"), Some("s")), SignatureCheck::Invalid);
        assert_eq!(check_signature(BODY, None, None), SignatureCheck::Skipped);
        assert_eq!(check_signature(BODY, None, Some("")), SignatureCheck::Skipped);
        assert!(!SignatureCheck::Invalid.is_accepted());
    }

    proptest! {
        #[test]
        fn prop_signature_binds_secret(
            body in proptest::collection::vec(any::<u8>(), 0..256),
            a in "[a-z0-9]{1,32}",
            b in "[a-z0-9]{1,32}",
        ) {
            let sig = sign(&body, &a).unwrap();
            prop_assert!(verify(&body, &sig, &a));
            if a != b {
                prop_assert!(!verify(&body, &sig, &b));
            }
        }
    }
}
