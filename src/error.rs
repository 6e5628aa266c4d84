//! Crate-wide error types.

use thiserror::Error;

/// Errors produced by the session subsystem and its collaborators.
#[derive(Error, Debug)]
pub enum ChatError {
    /// An envelope or record failed to decode.
    #[error("malformed record: {0}")]
    BadFormat(String),

    /// An ed25519 signature or HMAC tag did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// Ciphertext violates the CBC length constraints.
    #[error("bad ciphertext length")]
    BadCiphertext,

    /// Request older than the session idle timeout at accept time.
    #[error("request is stale")]
    StaleRequest,

    /// Operation requires a pending session.
    #[error("session is not pending")]
    NotPending,

    /// Operation requires an active session.
    #[error("session is not active")]
    NotActive,

    /// Session is past its expiration.
    #[error("session expired")]
    Expired,

    /// Index out of range, or no matching item.
    #[error("not found: {0}")]
    NotFound(String),

    /// Socket-level failure while binding, resolving, or sending.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// The system random source was unavailable.
    #[error("random source unavailable")]
    Rng,
}
