//! Session state machine and handshake.
//!
//! A session is the durable cryptographic context between two peers. The
//! initiator sends a signed [`Request`] carrying a fresh ephemeral X25519
//! public key and holds a `Pending` session; the accepting side derives the
//! shared key immediately in [`Session::begin`] and answers with a signed
//! [`Response`]; the initiator completes its half in [`Session::upgrade`].
//! The first eight bytes of the initiator's ephemeral public key, read
//! little-endian, name the session on both ends.
//!
//! All key material is zeroized when the session is dropped.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::exchange;
use crate::envelope;
use crate::error::ChatError;
use crate::profile::{Profile, Text, TimeStamp};
use crate::transport;

/// Inactivity window, in seconds, after which a session expires and a request
/// is considered stale.
pub const IDLE_TIMEOUT_SECS: i64 = 30 * 60;

fn idle_timeout() -> Duration {
    Duration::seconds(IDLE_TIMEOUT_SECS)
}

/// Chat-initiation record, signed on the wire by the originator's long-term
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Who is asking, and where to answer.
    pub profile: Profile,
    /// Originator's ephemeral X25519 public key.
    pub public_session_key: [u8; 32],
    /// When the request was built.
    pub timestamp: TimeStamp,
}

/// Chat-acceptance record, signed on the wire by the responder's long-term
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Who accepted.
    pub profile: Profile,
    /// Responder's ephemeral X25519 public key.
    pub public_session_key: [u8; 32],
    /// Equals the id the initiator derived from its own ephemeral key.
    pub session_id: u64,
    /// When the response was built.
    pub timestamp: TimeStamp,
}

/// Handshake progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for the peer's response; no shared key yet.
    Pending,
    /// Shared key derived; texts may flow.
    Active,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Active => write!(f, "active"),
        }
    }
}

/// Session IDs are the first eight bytes of the initiator's ephemeral public
/// key, little-endian.
fn session_id_from(public_session_key: &[u8; 32]) -> u64 {
    let mut id = [0u8; 8];
    id.copy_from_slice(&public_session_key[..8]);
    u64::from_le_bytes(id)
}

/// Durable per-peer chat state.
pub struct Session {
    /// Handshake progress.
    pub status: SessionStatus,
    /// Constant for the session lifetime and identical on both peers.
    pub id: u64,
    /// Our ephemeral X25519 public key.
    pub session_pub: [u8; 32],
    session_priv: [u8; 32],
    shared_key: Option<[u8; 32]>,
    /// Our own profile.
    pub me: Profile,
    /// The peer. Provisional until the handshake completes on our side.
    pub other: Profile,
    /// Wall-clock expiration, pushed forward by traffic.
    pub expires: DateTime<Utc>,
    /// Local message history, in real-time order.
    pub msgs: Vec<Text>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.session_priv.zeroize();
        if let Some(key) = self.shared_key.as_mut() {
            key.zeroize();
        }
    }
}

impl Session {
    /// Start a handshake toward `other`. Returns the pending session and the
    /// request to be packaged and sent.
    pub fn initiate(me: Profile, other: Profile) -> Result<(Session, Request), ChatError> {
        let (private, public) = exchange::keypair()?;
        let request = Request {
            profile: me.clone(),
            public_session_key: public,
            timestamp: TimeStamp::now(),
        };
        let session = Session {
            status: SessionStatus::Pending,
            id: session_id_from(&public),
            session_pub: public,
            session_priv: private,
            shared_key: None,
            me,
            other,
            expires: Utc::now() + idle_timeout(),
            msgs: Vec::new(),
        };
        Ok((session, request))
    }

    /// Accept a request: derive the shared key and produce the response.
    /// The new session is already `Active`.
    ///
    /// Fails with [`ChatError::StaleRequest`] when the request timestamp is
    /// older than the idle timeout.
    pub fn begin(me: Profile, request: &Request) -> Result<(Session, Response), ChatError> {
        if Utc::now() - request.timestamp.to_wall_time() > idle_timeout() {
            return Err(ChatError::StaleRequest);
        }

        let (private, public) = exchange::keypair()?;
        let shared = exchange::shared_key(&private, &request.public_session_key);
        let response = Response {
            profile: me.clone(),
            public_session_key: public,
            session_id: session_id_from(&request.public_session_key),
            timestamp: TimeStamp::now(),
        };
        let session = Session {
            status: SessionStatus::Active,
            id: response.session_id,
            session_pub: public,
            session_priv: private,
            shared_key: Some(shared),
            me,
            other: request.profile.clone(),
            expires: Utc::now() + idle_timeout(),
            msgs: Vec::new(),
        };
        Ok((session, response))
    }

    /// Complete the handshake on the initiating side: derive the shared key
    /// from the response and go `Active`. The session is left untouched on
    /// failure.
    pub fn upgrade(&mut self, response: &Response) -> Result<(), ChatError> {
        if self.status != SessionStatus::Pending {
            return Err(ChatError::NotPending);
        }

        let shared = exchange::shared_key(&self.session_priv, &response.public_session_key);
        self.status = SessionStatus::Active;
        self.shared_key = Some(shared);
        self.other = response.profile.clone();
        self.extend();
        Ok(())
    }

    /// The derived shared key, present once `Active`.
    pub fn shared_key(&self) -> Option<&[u8; 32]> {
        self.shared_key.as_ref()
    }

    /// Push expiration to now plus the idle timeout.
    pub fn extend(&mut self) {
        self.expires = Utc::now() + idle_timeout();
    }

    /// Whether the session is past its expiration.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    /// Package and transmit one text, then append it to local history.
    /// Requires an active, unexpired session; nothing is sent otherwise.
    pub async fn send_text(&mut self, message: impl Into<String>) -> Result<(), ChatError> {
        if self.status != SessionStatus::Active {
            return Err(ChatError::NotActive);
        }
        if self.is_expired() {
            return Err(ChatError::Expired);
        }
        let key = self.shared_key.as_ref().ok_or(ChatError::NotActive)?;

        let text = Text::new(message);
        let wire = envelope::package_text(&text, key)?;
        transport::send(&self.other.full_address(), &wire).await?;
        self.push_out(text);
        Ok(())
    }

    /// Package and transmit the handshake request.
    pub async fn send_request(
        &self,
        request: &Request,
        signing_key: &SigningKey,
    ) -> Result<(), ChatError> {
        let wire = envelope::package_request(request, signing_key)?;
        transport::send(&self.other.full_address(), &wire).await
    }

    /// Package and transmit the handshake response.
    pub async fn send_response(
        &self,
        response: &Response,
        signing_key: &SigningKey,
    ) -> Result<(), ChatError> {
        let wire = envelope::package_response(response, signing_key)?;
        transport::send(&self.other.full_address(), &wire).await
    }

    /// Record an inbound text from the peer and keep the session alive.
    pub fn push_in(&mut self, mut text: Text) {
        text.author = Some(self.other.clone());
        self.msgs.push(text);
        self.extend();
    }

    /// Record an outbound text of ours. Outbound traffic extends expiration
    /// the same as inbound.
    pub fn push_out(&mut self, mut text: Text) {
        text.author = Some(self.me.clone());
        self.msgs.push(text);
        self.extend();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = self.expires - Utc::now();
        write!(
            f,
            "[{}][{}] {}\tleft: {}m{:02}s",
            self.status,
            self.id,
            self.other,
            left.num_minutes(),
            (left.num_seconds() % 60).abs()
        )
    }
}
