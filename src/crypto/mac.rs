//! HMAC-SHA-256 tags for session texts.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the 32-byte HMAC-SHA-256 tag of `message` under `key`.
pub fn sign(message: &[u8], key: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Verify `signature` against `message`. Comparison is constant-time.
pub fn verify(signature: &[u8], message: &[u8], key: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let tag = sign(b"payload", b"key");
        assert_eq!(tag.len(), 32);
        assert!(verify(&tag, b"payload", b"key"));
    }

    #[test]
    fn rejects_tampered_message() {
        let tag = sign(b"payload", b"key");
        assert!(!verify(&tag, b"payloae", b"key"));
    }

    #[test]
    fn rejects_wrong_key() {
        let tag = sign(b"payload", b"key");
        assert!(!verify(&tag, b"payload", b"yek"));
    }

    #[test]
    fn rejects_truncated_tag() {
        let tag = sign(b"payload", b"key");
        assert!(!verify(&tag[..31], b"payload", b"key"));
    }
}
