//! HMAC-SHA256 webhook signature verification shared by both adapters.
//!
//! `Hmac::verify_slice` performs the byte comparison in constant time, so
//! neither adapter needs to hand-roll a timing-safe equality.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Linear's `Linear-Signature` header: a bare lowercase hex digest.
pub fn verify_hex_digest(body: &[u8], secret: &str, header_value: &str) -> bool {
    let Ok(provided) = hex::decode(header_value.trim()) else {
        return false;
    };
    verify(body, secret, &provided)
}

/// GitHub's `X-Hub-Signature-256` header: `sha256=` followed by a hex digest.
pub fn verify_prefixed_digest(body: &[u8], secret: &str, header_value: &str) -> bool {
    let Some(hex_part) = header_value.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(hex_part) else {
        return false;
    };
    verify(body, secret, &provided)
}

fn verify(body: &[u8], secret: &str, provided: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn hex_digest_roundtrip() {
        let body = b"{\"hello\":true}";
        let digest = sign(body, "s3cret");
        assert!(verify_hex_digest(body, "s3cret", &digest));
        assert!(!verify_hex_digest(body, "s3cret", "0000"));
        assert!(!verify_hex_digest(body, "wrong", &digest));
    }

    #[test]
    fn prefixed_digest_roundtrip() {
        let body = b"{\"action\":\"labeled\"}";
        let digest = sign(body, "gh-secret");
        let header = format!("sha256={digest}");
        assert!(verify_prefixed_digest(body, "gh-secret", &header));
        assert!(!verify_prefixed_digest(body, "gh-secret", &digest));
        assert!(!verify_prefixed_digest(body, "gh-secret", "sha256=00"));
    }

    #[test]
    fn malformed_header_rejected() {
        assert!(!verify_hex_digest(b"x", "s", "not-hex!!"));
        assert!(!verify_prefixed_digest(b"x", "s", "md5=abcd"));
    }
}
