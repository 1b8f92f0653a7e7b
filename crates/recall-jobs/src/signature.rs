//! HMAC-SHA256 delivery-signature verification with two-key rotation.
//!
//! Inbound fan-out jobs carry a `sha256=<hex>` signature computed by the
//! queue service over the raw request body. Verification accepts either
//! the current or the next signing key so that key rollover never drops
//! in-flight messages. This boundary runs before any payload parsing or
//! store access; rejection is terminal for the request and has no side
//! effects.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use recall_core::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-queue-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifier over the current/next signing key pair.
#[derive(Clone)]
pub struct SignatureVerifier {
    current_key: String,
    next_key: String,
}

impl SignatureVerifier {
    /// Create a verifier with explicit keys.
    pub fn new(current_key: impl Into<String>, next_key: impl Into<String>) -> Self {
        Self {
            current_key: current_key.into(),
            next_key: next_key.into(),
        }
    }

    /// Create from `QUEUE_CURRENT_SIGNING_KEY` / `QUEUE_NEXT_SIGNING_KEY`.
    pub fn from_env() -> Result<Self> {
        let current_key = std::env::var("QUEUE_CURRENT_SIGNING_KEY")
            .map_err(|_| Error::Config("QUEUE_CURRENT_SIGNING_KEY is not set".into()))?;
        let next_key = std::env::var("QUEUE_NEXT_SIGNING_KEY")
            .map_err(|_| Error::Config("QUEUE_NEXT_SIGNING_KEY is not set".into()))?;
        Ok(Self::new(current_key, next_key))
    }

    /// Compute the signature header value for `body` under `key`.
    ///
    /// Exposed so tests (and the queue service shim) can produce valid
    /// deliveries; the format matches what `verify` expects.
    pub fn sign(key: &str, body: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify `signature_header` against the raw body.
    ///
    /// Accepts a signature under either rotation key; comparison is
    /// constant-time via `Mac::verify_slice`.
    pub fn verify(&self, body: &[u8], signature_header: &str) -> Result<()> {
        let hex_part = signature_header
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or_else(|| Error::Unauthorized("malformed delivery signature".into()))?;
        let received = hex::decode(hex_part)
            .map_err(|_| Error::Unauthorized("malformed delivery signature".into()))?;

        for key in [&self.current_key, &self.next_key] {
            let mut mac =
                HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(body);
            if mac.verify_slice(&received).is_ok() {
                return Ok(());
            }
        }

        Err(Error::Unauthorized("invalid delivery signature".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_format() {
        let sig = SignatureVerifier::sign("my-secret", br#"{"userId":"u-1"}"#);

        assert!(sig.starts_with("sha256="));

        // Hex portion must be 64 characters (256 bits = 32 bytes = 64 hex chars)
        let hex_part = &sig["sha256=".len()..];
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_deterministic() {
        let body = br#"{"userId":"u-1","problem":{"url":"https://x"}}"#;

        let sig1 = SignatureVerifier::sign("test-secret", body);
        let sig2 = SignatureVerifier::sign("test-secret", body);
        assert_eq!(sig1, sig2);

        // Different body → different signature
        let sig3 = SignatureVerifier::sign("test-secret", b"{}");
        assert_ne!(sig1, sig3);

        // Different secret → different signature
        let sig4 = SignatureVerifier::sign("other-secret", body);
        assert_ne!(sig1, sig4);
    }

    #[test]
    fn test_verify_accepts_current_key() {
        let verifier = SignatureVerifier::new("current", "next");
        let body = b"payload";
        let sig = SignatureVerifier::sign("current", body);
        assert!(verifier.verify(body, &sig).is_ok());
    }

    #[test]
    fn test_verify_accepts_next_key_during_rotation() {
        let verifier = SignatureVerifier::new("current", "next");
        let body = b"payload";
        let sig = SignatureVerifier::sign("next", body);
        assert!(verifier.verify(body, &sig).is_ok());
    }

    #[test]
    fn test_verify_rejects_unknown_key() {
        let verifier = SignatureVerifier::new("current", "next");
        let body = b"payload";
        let sig = SignatureVerifier::sign("stolen", body);

        let err = verifier.verify(body, &sig).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_verify_rejects_tampered_signature_byte() {
        let verifier = SignatureVerifier::new("current", "next");
        let body = b"payload";
        let mut sig = SignatureVerifier::sign("current", body);

        // Flip one hex digit.
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });

        assert!(verifier.verify(body, &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let verifier = SignatureVerifier::new("current", "next");
        let sig = SignatureVerifier::sign("current", b"payload");
        assert!(verifier.verify(b"payload2", &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_malformed_header() {
        let verifier = SignatureVerifier::new("current", "next");
        assert!(verifier.verify(b"payload", "md5=abc").is_err());
        assert!(verifier.verify(b"payload", "sha256=nothex!").is_err());
        assert!(verifier.verify(b"payload", "").is_err());
    }
}
