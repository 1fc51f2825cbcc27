//! Webhook request signing.
//!
//! Slack signs each delivery with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! and sends the result as `v0=<hex>`. Requests older than the replay window
//! are rejected before any MAC work.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const REPLAY_WINDOW_SECS: i64 = 300;

const SIGNATURE_PREFIX: &str = "v0=";

/// Compute the `v0=<hex>` signature for a timestamp + raw body.
pub fn sign(timestamp: i64, body: &str, signing_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify an inbound signature against the raw body. Never panics; any
/// malformed input (bad prefix, non-hex digest, wrong digest length) is a
/// plain `false`.
pub fn verify(signature: &str, timestamp: i64, body: &str, signing_secret: &str) -> bool {
    verify_at(Utc::now().timestamp(), signature, timestamp, body, signing_secret)
}

fn verify_at(
    now: i64,
    signature: &str,
    timestamp: i64,
    body: &str,
    signing_secret: &str,
) -> bool {
    if timestamp < now - REPLAY_WINDOW_SECS {
        return false;
    }

    let Some(provided_hex) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    // verify_slice is constant-time over the digest bytes.
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::{sign, verify_at, REPLAY_WINDOW_SECS};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &str = r#"{"type":"event_callback","event":{"type":"reaction_added"}}"#;

    #[test]
    fn valid_signature_verifies() {
        let now = 1_700_000_000;
        let signature = sign(now, BODY, SECRET);
        assert!(verify_at(now, &signature, now, BODY, SECRET));
    }

    #[test]
    fn tampered_body_fails() {
        let now = 1_700_000_000;
        let signature = sign(now, BODY, SECRET);
        assert!(!verify_at(now, &signature, now, "{}", SECRET));
    }

    #[test]
    fn wrong_secret_fails() {
        let now = 1_700_000_000;
        let signature = sign(now, BODY, SECRET);
        assert!(!verify_at(now, &signature, now, BODY, "other-secret"));
    }

    #[test]
    fn stale_timestamp_is_rejected_even_when_validly_signed() {
        let now = 1_700_000_000;
        let stale = now - REPLAY_WINDOW_SECS - 1;
        let signature = sign(stale, BODY, SECRET);
        assert!(!verify_at(now, &signature, stale, BODY, SECRET));
    }

    #[test]
    fn timestamp_at_window_edge_is_accepted() {
        let now = 1_700_000_000;
        let edge = now - REPLAY_WINDOW_SECS;
        let signature = sign(edge, BODY, SECRET);
        assert!(verify_at(now, &signature, edge, BODY, SECRET));
    }

    #[test]
    fn malformed_signatures_are_rejected_without_panicking() {
        let now = 1_700_000_000;
        assert!(!verify_at(now, "", now, BODY, SECRET));
        assert!(!verify_at(now, "v1=abcdef", now, BODY, SECRET));
        assert!(!verify_at(now, "v0=not-hex", now, BODY, SECRET));
        assert!(!verify_at(now, "v0=abcd", now, BODY, SECRET));
    }
}
