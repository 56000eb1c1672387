//! Stripe webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The expected
//! signature is `hex(HMAC-SHA256(secret, "<t>." + raw_body))`, computed over the
//! exact bytes received; any `v1` entry may match.

use std::time::Duration;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Reasons a webhook signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The header has no `t=` entry or it is not an integer.
    #[error("missing or malformed timestamp")]
    MissingTimestamp,

    /// The header has no `v1=` entry.
    #[error("no v1 signatures in header")]
    NoSignatures,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance ({age_seconds}s)")]
    Expired {
        /// Absolute distance from now, in seconds.
        age_seconds: u64,
    },

    /// No signature matched.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a `stripe-signature` header against the raw payload.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns a `SignatureError` describing why verification failed.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MissingTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }

    let expected = hmac_sha256_hex(secret.as_bytes(), &signed_payload(timestamp, payload));
    if !signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        return Err(SignatureError::Mismatch);
    }

    let age_seconds = now.abs_diff(ts);
    if age_seconds > tolerance.as_secs() {
        return Err(SignatureError::Expired { age_seconds });
    }

    Ok(())
}

/// Build a valid `stripe-signature` header for `payload`.
///
/// Used to sign fixtures and by local tooling that replays events.
#[must_use]
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let timestamp = timestamp.to_string();
    let signature = hmac_sha256_hex(secret.as_bytes(), &signed_payload(&timestamp, payload));
    format!("t={timestamp},v1={signature}")
}

fn signed_payload(timestamp: &str, payload: &[u8]) -> Vec<u8> {
    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    signed
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const TOLERANCE: Duration = Duration::from_secs(300);
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_own_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, NOW, payload);
        assert_eq!(verify_signature(payload, &header, SECRET, TOLERANCE, NOW), Ok(()));
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = b"{}";
        let good = signature_header(SECRET, NOW, payload);
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={sig}");
        assert_eq!(verify_signature(payload, &header, SECRET, TOLERANCE, NOW), Ok(()));
    }

    #[test]
    fn rejects_modified_payload() {
        let header = signature_header(SECRET, NOW, br#"{"credits":"25"}"#);
        assert_eq!(
            verify_signature(br#"{"credits":"2500"}"#, &header, SECRET, TOLERANCE, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = signature_header("whsec_other", NOW, b"{}");
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, TOLERANCE, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = signature_header(SECRET, NOW - 301, b"{}");
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, TOLERANCE, NOW),
            Err(SignatureError::Expired { age_seconds: 301 })
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(
            verify_signature(b"{}", "v1=abc", SECRET, TOLERANCE, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(b"{}", "t=abc,v1=abc", SECRET, TOLERANCE, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(b"{}", &format!("t={NOW}"), SECRET, TOLERANCE, NOW),
            Err(SignatureError::NoSignatures)
        );
        assert_eq!(
            verify_signature(b"{}", "", SECRET, TOLERANCE, NOW),
            Err(SignatureError::MissingTimestamp)
        );
    }
}
