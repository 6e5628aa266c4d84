//! Cryptographic primitives adapter.
//!
//! Thin wrappers around the dalek and RustCrypto crates, exposing exactly the
//! operations the session subsystem needs: long-term ed25519 identity
//! signatures, ephemeral X25519 key agreement, AES-256-CBC with zero padding,
//! and HMAC-SHA-256 tags.
//!
//! Texts deliberately use encrypt-then-MAC over the decrypted, still-padded
//! plaintext rather than a standard AEAD; see [`crate::envelope`] for why the
//! order matters on the wire.

pub mod aes;
pub mod exchange;
pub mod mac;
pub mod signing;
