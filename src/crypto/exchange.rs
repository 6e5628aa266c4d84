//! Ephemeral X25519 key agreement.
//!
//! Each session gets a fresh key pair on both sides; the private halves never
//! persist beyond the session. The raw 32 private bytes are kept (and later
//! zeroized) by the session so the shared key can be derived once the peer's
//! response arrives.

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::ChatError;

/// Generate an ephemeral key pair as raw `(private, public)` bytes.
pub fn keypair() -> Result<([u8; 32], [u8; 32]), ChatError> {
    let mut private = [0u8; 32];
    OsRng.try_fill_bytes(&mut private).map_err(|_| ChatError::Rng)?;
    let public = PublicKey::from(&StaticSecret::from(private));
    Ok((private, *public.as_bytes()))
}

/// Derive the 32-byte ECDH shared key from our private key and the peer's
/// public key.
pub fn shared_key(private: &[u8; 32], peer_public: &[u8; 32]) -> [u8; 32] {
    let secret = StaticSecret::from(*private);
    *secret.diffie_hellman(&PublicKey::from(*peer_public)).as_bytes()
}
