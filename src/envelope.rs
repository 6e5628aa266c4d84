//! The wire envelope and its packaging operations.
//!
//! Exactly one [`Message`] travels per UDP datagram, as a deterministic
//! length-prefixed binary record. Request and response payloads are signed
//! with the sender's long-term ed25519 key; text payloads are AES-256-CBC
//! ciphertext authenticated by an HMAC-SHA-256 tag computed over the
//! decrypted, still-padded plaintext.
//!
//! That tag placement is a wire-compat quirk, not a recommendation: both
//! peers must pad identically before MAC-ing, which is why [`package_text`]
//! runs its own ciphertext back through the decryptor before signing. Unpack
//! order is equally load-bearing: decrypt, verify the padded plaintext, then
//! deserialize.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{aes, mac, signing};
use crate::error::ChatError;
use crate::profile::Text;
use crate::session::{Request, Response};

/// Discriminates the payload carried by a [`Message`]. Encoded as one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PayloadKind {
    /// Encrypted session text.
    Text = 0,
    /// Signed chat-initiation record.
    Request = 1,
    /// Signed chat-acceptance record.
    Response = 2,
}

impl From<PayloadKind> for u8 {
    fn from(kind: PayloadKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for PayloadKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PayloadKind::Text),
            1 => Ok(PayloadKind::Request),
            2 => Ok(PayloadKind::Response),
            other => Err(format!("unknown payload kind {other}")),
        }
    }
}

/// The single wire record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Record bytes for requests and responses, ciphertext for texts.
    pub payload: Vec<u8>,
    /// 64-byte ed25519 signature, or 32-byte HMAC tag for texts.
    pub signature: Vec<u8>,
    /// What the payload decodes to.
    pub kind: PayloadKind,
}

impl Message {
    /// Serialize for transmission as one datagram.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChatError> {
        bincode::serialize(self).map_err(|e| ChatError::BadFormat(e.to_string()))
    }

    /// Deserialize from one datagram's bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChatError> {
        bincode::deserialize(bytes).map_err(|e| ChatError::BadFormat(e.to_string()))
    }
}

/// Wrap a request: serialized payload signed with the long-term key.
pub fn package_request(request: &Request, signing_key: &SigningKey) -> Result<Message, ChatError> {
    let payload =
        bincode::serialize(request).map_err(|e| ChatError::BadFormat(e.to_string()))?;
    let signature = signing::sign(signing_key, &payload).to_vec();
    Ok(Message {
        payload,
        signature,
        kind: PayloadKind::Request,
    })
}

/// Wrap a response: serialized payload signed with the long-term key.
pub fn package_response(
    response: &Response,
    signing_key: &SigningKey,
) -> Result<Message, ChatError> {
    let payload =
        bincode::serialize(response).map_err(|e| ChatError::BadFormat(e.to_string()))?;
    let signature = signing::sign(signing_key, &payload).to_vec();
    Ok(Message {
        payload,
        signature,
        kind: PayloadKind::Response,
    })
}

/// Wrap a text: encrypt under the session shared key, then MAC the padded
/// plaintext the receiver will actually see after decryption.
pub fn package_text(text: &Text, shared_key: &[u8; 32]) -> Result<Message, ChatError> {
    let plaintext = bincode::serialize(text).map_err(|e| ChatError::BadFormat(e.to_string()))?;
    let ciphertext = aes::encrypt(&plaintext, shared_key)?;
    let padded = aes::decrypt(&ciphertext, shared_key)?;
    let signature = mac::sign(&padded, shared_key).to_vec();
    Ok(Message {
        payload: ciphertext,
        signature,
        kind: PayloadKind::Text,
    })
}

/// Decode and verify a request. The embedded originator profile carries the
/// verification key.
pub fn unpackage_request(message: &Message) -> Result<Request, ChatError> {
    if message.kind != PayloadKind::Request {
        return Err(ChatError::BadFormat("not a request".into()));
    }
    let request: Request =
        bincode::deserialize(&message.payload).map_err(|e| ChatError::BadFormat(e.to_string()))?;
    if !signing::valid_signature(
        &message.signature,
        &message.payload,
        &request.profile.public_signing_key,
    ) {
        return Err(ChatError::InvalidSignature);
    }
    Ok(request)
}

/// Decode and verify a response. The embedded responder profile carries the
/// verification key.
pub fn unpackage_response(message: &Message) -> Result<Response, ChatError> {
    if message.kind != PayloadKind::Response {
        return Err(ChatError::BadFormat("not a response".into()));
    }
    let response: Response =
        bincode::deserialize(&message.payload).map_err(|e| ChatError::BadFormat(e.to_string()))?;
    if !signing::valid_signature(
        &message.signature,
        &message.payload,
        &response.profile.public_signing_key,
    ) {
        return Err(ChatError::InvalidSignature);
    }
    Ok(response)
}

/// Decrypt and verify a text with a session shared key.
///
/// Decrypts first, verifies the tag over the padded plaintext, and only then
/// deserializes; the trailing zero padding is ignored by the decoder.
pub fn unpackage_text(message: &Message, shared_key: &[u8; 32]) -> Result<Text, ChatError> {
    if message.kind != PayloadKind::Text {
        return Err(ChatError::BadFormat("not a text".into()));
    }
    let padded = aes::decrypt(&message.payload, shared_key)?;
    if !mac::verify(&message.signature, &padded, shared_key) {
        return Err(ChatError::InvalidSignature);
    }
    bincode::deserialize(&padded).map_err(|e| ChatError::BadFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::exchange;
    use crate::profile::{Profile, TimeStamp};

    fn originator() -> (Profile, SigningKey) {
        let key = signing::generate();
        let profile = Profile {
            name: "ana".into(),
            address: "127.0.0.1".into(),
            port: "6001".into(),
            public_signing_key: key.verifying_key().to_bytes(),
        };
        (profile, key)
    }

    fn sample_request() -> (Request, SigningKey) {
        let (profile, key) = originator();
        let (_, public) = exchange::keypair().unwrap();
        let request = Request {
            profile,
            public_session_key: public,
            timestamp: TimeStamp::now(),
        };
        (request, key)
    }

    fn sample_response() -> (Response, SigningKey) {
        let (profile, key) = originator();
        let (_, public) = exchange::keypair().unwrap();
        let response = Response {
            profile,
            public_session_key: public,
            session_id: 77,
            timestamp: TimeStamp::now(),
        };
        (response, key)
    }

    #[test]
    fn message_bytes_roundtrip() {
        let (request, key) = sample_request();
        let message = package_request(&request, &key).unwrap();

        let bytes = message.to_bytes().unwrap();
        let back = Message::from_bytes(&bytes).unwrap();
        assert_eq!(back.kind, PayloadKind::Request);
        assert_eq!(back.payload, message.payload);
        assert_eq!(back.signature, message.signature);
    }

    #[test]
    fn request_roundtrip() {
        let (request, key) = sample_request();
        let message = package_request(&request, &key).unwrap();
        assert_eq!(message.signature.len(), 64);

        let back = unpackage_request(&message).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn request_tamper_fails() {
        let (request, key) = sample_request();
        let clean = package_request(&request, &key).unwrap();

        for byte in 0..clean.payload.len() {
            let mut message = clean.clone();
            message.payload[byte] ^= 0x01;
            assert!(
                unpackage_request(&message).is_err(),
                "payload byte {byte} accepted after tamper"
            );
        }
    }

    #[test]
    fn request_wrong_kind_fails() {
        let (request, key) = sample_request();
        let mut message = package_request(&request, &key).unwrap();
        message.kind = PayloadKind::Text;
        assert!(matches!(
            unpackage_request(&message),
            Err(ChatError::BadFormat(_))
        ));
    }

    #[test]
    fn response_roundtrip() {
        let (response, key) = sample_response();
        let message = package_response(&response, &key).unwrap();

        let back = unpackage_response(&message).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn response_tampered_signature_fails() {
        let (response, key) = sample_response();
        let mut message = package_response(&response, &key).unwrap();
        message.signature[0] ^= 0x80;
        assert!(matches!(
            unpackage_response(&message),
            Err(ChatError::InvalidSignature)
        ));
    }

    #[test]
    fn text_roundtrip() {
        let key = crate::crypto::aes::generate_key().unwrap();
        let text = Text::new("hello over there");
        let message = package_text(&text, &key).unwrap();
        assert_eq!(message.signature.len(), 32);

        let back = unpackage_text(&message, &key).unwrap();
        assert_eq!(back.message, text.message);
        assert_eq!(back.timestamp, text.timestamp);
        assert!(back.author.is_none());
    }

    #[test]
    fn text_payload_flip_fails() {
        let key = crate::crypto::aes::generate_key().unwrap();
        let message = package_text(&Text::new("hello"), &key).unwrap();

        for byte in 0..message.payload.len() {
            let mut tampered = message.clone();
            tampered.payload[byte] ^= 0x01;
            assert!(matches!(
                unpackage_text(&tampered, &key),
                Err(ChatError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn text_signature_flip_fails() {
        let key = crate::crypto::aes::generate_key().unwrap();
        let mut message = package_text(&Text::new("hello"), &key).unwrap();
        message.signature[31] ^= 0x01;
        assert!(matches!(
            unpackage_text(&message, &key),
            Err(ChatError::InvalidSignature)
        ));
    }

    #[test]
    fn text_wrong_key_fails() {
        let key = crate::crypto::aes::generate_key().unwrap();
        let mut other = key;
        other[0] ^= 0x01;

        let message = package_text(&Text::new("hello"), &key).unwrap();
        assert!(matches!(
            unpackage_text(&message, &other),
            Err(ChatError::InvalidSignature)
        ));
    }

    #[test]
    fn text_truncated_payload_fails() {
        let key = crate::crypto::aes::generate_key().unwrap();
        let mut message = package_text(&Text::new("hello"), &key).unwrap();
        message.payload.truncate(15);
        assert!(matches!(
            unpackage_text(&message, &key),
            Err(ChatError::BadCiphertext)
        ));
    }

    #[test]
    fn unknown_kind_byte_rejected() {
        let (request, key) = sample_request();
        let mut bytes = package_request(&request, &key)
            .unwrap()
            .to_bytes()
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 9; // kind is the final field
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ChatError::BadFormat(_))
        ));
    }
}
