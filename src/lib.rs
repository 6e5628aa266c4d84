//! # Parley - serverless peer-to-peer chat over UDP
//!
//! Two peers, each running the client on a reachable endpoint, negotiate an
//! authenticated, encrypted session and exchange text inside it. There is no
//! relay, no account registry, and no store-and-forward: if the peer is
//! unreachable, delivery fails. Every record travels as exactly one UDP
//! datagram.
//!
//! ## Protocol sketch
//!
//! 1. The initiator signs and sends a [`session::Request`] carrying a fresh
//!    ephemeral X25519 public key; the first eight bytes of that key,
//!    little-endian, name the session on both ends.
//! 2. The accepting peer answers with a signed [`session::Response`] carrying
//!    its own ephemeral key; both sides derive a 32-byte shared key by ECDH.
//! 3. Texts travel AES-256-CBC encrypted and HMAC-SHA-256 authenticated
//!    under the shared key. Texts carry no session identifier to keep
//!    metadata off the wire; the receiver matches them by trial decryption
//!    against its active sessions.
//!
//! Peers are identified by their long-term ed25519 verification key, not by
//! their source address. Sessions idle out after thirty minutes without
//! traffic.
//!
//! ## Modules
//!
//! - [`crypto`]: primitives adapter (ed25519, X25519, AES-CBC, HMAC)
//! - [`profile`]: peer identity, timestamps, text records, JSON persistence
//! - [`envelope`]: the wire record and its packaging operations
//! - [`session`]: handshake state machine and expiration
//! - [`engine`]: inbound dispatch and the books of contacts/sessions/requests
//! - [`transport`]: UDP listener and best-effort sender

pub mod crypto;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod profile;
pub mod session;
pub mod transport;

pub use engine::{ChatEngine, EngineEvent};
pub use envelope::{Message, PayloadKind};
pub use error::ChatError;
pub use profile::{Profile, Text, TimeStamp};
pub use session::{Request, Response, Session, SessionStatus};
