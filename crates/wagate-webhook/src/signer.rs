// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 body signing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use wagate_core::GatewayError;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of the request body. Omitted when unsigned.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Unix time in seconds at send time.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// `hex(HMAC-SHA256(secret, body))`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        GatewayError::Webhook {
            message: format!("invalid signing key: {e}"),
            source: None,
        }
    })?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature, as a receiver would do it.
pub fn verify(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_rfc4231_case_2() {
        let sig = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_is_lowercase_hex_of_32_bytes() {
        let sig = sign("abc", br#"{"id":"1"}"#).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn verify_accepts_own_signature_and_rejects_tampering() {
        let body = br#"{"type":"message.received"}"#;
        let sig = sign("secret", body).unwrap();
        assert!(verify("secret", body, &sig));
        assert!(!verify("other", body, &sig));
        assert!(!verify("secret", br#"{"type":"message.sent"}"#, &sig));
        assert!(!verify("secret", body, "not-hex"));
    }
}
