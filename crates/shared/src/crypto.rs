//! HMAC signing and webhook signature verification.
//!
//! Inbound payment webhooks use the Stripe scheme: the `Stripe-Signature` header carries
//! `t=<unix seconds>,v1=<hex>` and the signed message is `"<t>.<raw body>"`.
//! Outbound event deliveries are signed as `sha256=<hex>` over the raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default allowed clock difference between the signature timestamp and now.
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Reasons a signature header can be rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Missing timestamp in signature header")]
    MissingTimestamp,

    #[error("No v1 signature in signature header")]
    MissingSignature,

    #[error("Signature timestamp outside tolerance (age {age_secs}s)")]
    TimestampOutOfTolerance { age_secs: i64 },

    #[error("Signature does not match payload")]
    Mismatch,

    #[error("Signing secret is not configured")]
    InvalidSecret,
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Decoded `v1` signatures. A header may carry several during secret rotation.
    pub signatures: Vec<Vec<u8>>,
}

fn new_mac(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidSecret)
}

/// Computes HMAC-SHA256 of `message` and returns it hex encoded.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> Result<String, SignatureError> {
    let mut mac = new_mac(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signed_message(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(payload);
    message
}

/// Builds a `Stripe-Signature` header value for `payload` at `timestamp`.
pub fn sign_stripe_payload(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let signature = hmac_sha256_hex(secret.as_bytes(), &signed_message(timestamp, payload))?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Signs an outbound payload as `sha256=<hex>`.
pub fn sign_event_payload(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    Ok(format!("sha256={}", hmac_sha256_hex(secret.as_bytes(), payload)?))
}

/// Parses a `t=...,v1=...` header. Unknown schemes (`v0`, future versions) are skipped.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;

        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| SignatureError::MalformedHeader)?;
                timestamp = Some(parsed);
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Verifies a Stripe-style signature header against the raw request body.
///
/// Fails closed: a missing or malformed header, an empty secret, a stale timestamp or a
/// mismatch are all errors. A `tolerance_secs` of zero disables the timestamp check.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_signature_header(header)?;

    // Header timestamps are untrusted, so the age must not overflow.
    let age_secs = now_unix.saturating_sub(parsed.timestamp);
    if tolerance_secs > 0 && age_secs.unsigned_abs() > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::TimestampOutOfTolerance { age_secs });
    }

    let message = signed_message(parsed.timestamp, payload);
    for candidate in &parsed.signatures {
        let mut mac = new_mac(secret.as_bytes())?;
        mac.update(&message);
        // verify_slice compares in constant time
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_760_000_000;

    #[test]
    fn test_hmac_sha256_hex_length() {
        let signature = hmac_sha256_hex(b"my-secret-key", b"payload").unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_hmac_sha256_hex_known_vector() {
        // RFC 4231 test case 2
        let signature =
            hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            hmac_sha256_hex(b"", b"payload").unwrap_err(),
            SignatureError::InvalidSecret
        );
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = sign_stripe_payload(payload, SECRET, NOW).unwrap();
        assert!(verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_stripe_payload(payload, "wrong_secret", NOW).unwrap();
        assert_eq!(
            verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_modified_payload_rejected() {
        let header = sign_stripe_payload(br#"{"amount_total":100}"#, SECRET, NOW).unwrap();
        assert_eq!(
            verify_stripe_signature(br#"{"amount_total":1}"#, Some(&header), SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign_stripe_payload(payload, SECRET, NOW - 600).unwrap();
        assert_eq!(
            verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW),
            Err(SignatureError::TimestampOutOfTolerance { age_secs: 600 })
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected_without_overflow() {
        let oldest = format!("t={},v1=00", i64::MIN);
        assert_eq!(
            verify_stripe_signature(b"{}", Some(&oldest), "whsec", 300, NOW),
            Err(SignatureError::TimestampOutOfTolerance { age_secs: i64::MAX })
        );

        let newest = format!("t={},v1=00", i64::MAX);
        assert!(matches!(
            verify_stripe_signature(b"{}", Some(&newest), "whsec", 300, NOW),
            Err(SignatureError::TimestampOutOfTolerance { .. })
        ));
    }

    #[test]
    fn test_zero_tolerance_skips_timestamp_check() {
        let payload = b"{}";
        let header = sign_stripe_payload(payload, SECRET, NOW - 86_400).unwrap();
        assert!(verify_stripe_signature(payload, Some(&header), SECRET, 0, NOW).is_ok());
    }

    #[test]
    fn test_missing_header_rejected() {
        assert_eq!(
            verify_stripe_signature(b"{}", None, SECRET, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_stripe_signature(b"{}", Some("  "), SECRET, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        assert_eq!(
            parse_signature_header("v1=abcd"),
            Err(SignatureError::MissingTimestamp)
        );
    }

    #[test]
    fn test_missing_v1_rejected() {
        assert_eq!(
            parse_signature_header("t=123,v0=abcd"),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert_eq!(
            parse_signature_header("garbage"),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            parse_signature_header("t=notanumber,v1=ab"),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = b"{}";
        let valid = sign_stripe_payload(payload, SECRET, NOW).unwrap();
        let valid_sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), valid_sig);
        assert!(verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        let payload = b"{}";
        let header = sign_stripe_payload(payload, SECRET, NOW).unwrap();
        assert_eq!(
            verify_stripe_signature(payload, Some(&header), "", 300, NOW),
            Err(SignatureError::InvalidSecret)
        );
    }

    #[test]
    fn test_sign_event_payload_prefix() {
        let signature = sign_event_payload(b"{}", "event-secret").unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
    }
}
