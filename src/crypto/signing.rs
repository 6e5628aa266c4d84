//! Long-term ed25519 identity keys.
//!
//! Each peer holds exactly one signing key pair for the life of its profile;
//! it signs handshake requests and responses, never texts. The private key is
//! persisted as a JSON string holding the base64 of the 64-byte keypair form
//! (seed followed by public key).

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::ChatError;
use crate::profile::write_atomic;

/// Generate a new long-term signing key pair.
pub fn generate() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Sign `message`, returning the 64-byte signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; 64] {
    key.sign(message).to_bytes()
}

/// Verify a 64-byte signature over `message` with a 32-byte public key.
///
/// Malformed keys and malformed signatures count as invalid rather than
/// erroring; the caller only ever needs the yes/no.
pub fn valid_signature(signature: &[u8], message: &[u8], public_key: &[u8; 32]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

/// Read a JSON-encoded ed25519 private key from `path`.
pub fn read_private_key(path: &Path) -> Result<SigningKey, ChatError> {
    let data = std::fs::read_to_string(path)?;
    let encoded: String =
        serde_json::from_str(&data).map_err(|e| ChatError::BadFormat(format!("key file: {e}")))?;
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| ChatError::BadFormat(format!("key file: {e}")))?;
    let keypair: [u8; 64] = bytes
        .try_into()
        .map_err(|_| ChatError::BadFormat("key file: expected 64 bytes".into()))?;
    SigningKey::from_keypair_bytes(&keypair)
        .map_err(|e| ChatError::BadFormat(format!("key file: {e}")))
}

/// Write an ed25519 private key to `path` as JSON.
pub fn write_private_key(key: &SigningKey, path: &Path) -> Result<(), ChatError> {
    let encoded = BASE64.encode(key.to_keypair_bytes());
    let data = serde_json::to_string(&encoded)
        .map_err(|e| ChatError::BadFormat(format!("key file: {e}")))?;
    write_atomic(path, data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = generate();
        let public = key.verifying_key().to_bytes();

        let signature = sign(&key, b"hello");
        assert_eq!(signature.len(), 64);
        assert!(valid_signature(&signature, b"hello", &public));
    }

    #[test]
    fn rejects_wrong_message() {
        let key = generate();
        let public = key.verifying_key().to_bytes();

        let signature = sign(&key, b"hello");
        assert!(!valid_signature(&signature, b"hullo", &public));
    }

    #[test]
    fn rejects_wrong_key() {
        let key = generate();
        let other = generate().verifying_key().to_bytes();

        let signature = sign(&key, b"hello");
        assert!(!valid_signature(&signature, b"hello", &other));
    }

    #[test]
    fn rejects_malformed_signature() {
        let key = generate();
        let public = key.verifying_key().to_bytes();
        assert!(!valid_signature(&[0u8; 12], b"hello", &public));
    }

    #[test]
    fn key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.key.json");

        let key = generate();
        write_private_key(&key, &path).unwrap();
        let loaded = read_private_key(&path).unwrap();

        assert_eq!(key.to_keypair_bytes(), loaded.to_keypair_bytes());
    }
}
