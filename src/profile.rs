//! Peer identity, timestamps, and text records.
//!
//! A [`Profile`] is how one peer names and reaches another: a display name, a
//! transport locator, and the long-term ed25519 verification key that actually
//! identifies them. Profiles, the contacts list, and the private key all
//! persist as JSON files.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        TimeStamp(Utc::now().timestamp())
    }

    /// Convert to a wall-clock time.
    pub fn to_wall_time(self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Peer identity and transport locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Display name. May contain spaces.
    pub name: String,
    /// IPv4 (`61.2.73.242`), bracketed IPv6 (`[::1]`), or DNS name.
    pub address: String,
    /// UDP port, kept in string form.
    pub port: String,
    /// Long-term ed25519 verification key.
    #[serde(with = "b64_key")]
    pub public_signing_key: [u8; 32],
}

impl Profile {
    /// Parse `name@address:port`.
    ///
    /// Splits the name at the first `@` and the port at the last `:`, so
    /// names with spaces and bracketed IPv6 addresses both survive. The
    /// verification key is not part of the textual form and is left zeroed
    /// until learned from the peer's signed records.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let (name, location) = raw
            .split_once('@')
            .ok_or_else(|| ChatError::BadFormat("profile: no name".into()))?;
        let (address, port) = location
            .rsplit_once(':')
            .ok_or_else(|| ChatError::BadFormat("profile: no port".into()))?;

        if name.is_empty() || address.is_empty() {
            return Err(ChatError::BadFormat("profile: no name or address".into()));
        }
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChatError::BadFormat("profile: port must be numeric".into()));
        }

        Ok(Profile {
            name: name.to_string(),
            address: address.to_string(),
            port: port.to_string(),
            public_signing_key: [0u8; 32],
        })
    }

    /// `address:port`, as handed to the sender.
    pub fn full_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.full_address())
    }
}

impl PartialEq for Profile {
    /// Profiles are equal when address, port, and verification key all match;
    /// the name is display-only.
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.port == other.port
            && self.public_signing_key == other.public_signing_key
    }
}

impl Eq for Profile {}

/// A human message exchanged inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    /// Message body. Recommended maximum of 1024 bytes.
    pub message: String,
    /// When the author wrote it.
    pub timestamp: TimeStamp,
    /// Who wrote it. Attached on session delivery, never wire-encoded.
    #[serde(skip)]
    pub author: Option<Profile>,
}

impl Text {
    /// Build a text stamped now, with no author yet.
    pub fn new(message: impl Into<String>) -> Self {
        Text {
            message: message.into(),
            timestamp: TimeStamp::now(),
            author: None,
        }
    }
}

//
// File persistence
//

/// Read a profile from a JSON file.
pub fn read_profile(path: &Path) -> Result<Profile, ChatError> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| ChatError::BadFormat(format!("profile file: {e}")))
}

/// Write a profile to a JSON file.
pub fn write_profile(profile: &Profile, path: &Path) -> Result<(), ChatError> {
    let data = serde_json::to_string_pretty(profile)
        .map_err(|e| ChatError::BadFormat(format!("profile file: {e}")))?;
    write_atomic(path, data.as_bytes())
}

/// Read the contacts array from a JSON file.
pub fn read_contacts(path: &Path) -> Result<Vec<Profile>, ChatError> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| ChatError::BadFormat(format!("contacts file: {e}")))
}

/// Write the contacts array to a JSON file.
pub fn write_contacts(contacts: &[Profile], path: &Path) -> Result<(), ChatError> {
    let data = serde_json::to_string_pretty(contacts)
        .map_err(|e| ChatError::BadFormat(format!("contacts file: {e}")))?;
    write_atomic(path, data.as_bytes())
}

/// Write `data` to a temp file beside `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ChatError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

mod b64_key {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let encoded = String::deserialize(de)?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Profile {
        Profile {
            name: "ana maria".into(),
            address: "203.0.113.9".into(),
            port: "5190".into(),
            public_signing_key: [42u8; 32],
        }
    }

    #[test]
    fn parse_plain() {
        let p = Profile::parse("bob@198.51.100.4:6001").unwrap();
        assert_eq!(p.name, "bob");
        assert_eq!(p.address, "198.51.100.4");
        assert_eq!(p.port, "6001");
        assert_eq!(p.full_address(), "198.51.100.4:6001");
    }

    #[test]
    fn parse_keeps_spaces_and_ipv6() {
        let p = Profile::parse("ana maria@[::1]:9000").unwrap();
        assert_eq!(p.name, "ana maria");
        assert_eq!(p.address, "[::1]");
        assert_eq!(p.port, "9000");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Profile::parse("nobody").is_err());
        assert!(Profile::parse("a@hostonly").is_err());
        assert!(Profile::parse("a@host:port").is_err());
        assert!(Profile::parse("@host:1:").is_err());
    }

    #[test]
    fn equality_ignores_name() {
        let a = sample();
        let mut b = sample();
        b.name = "somebody else".into();
        assert_eq!(a, b);

        b.port = "5191".into();
        assert_ne!(a, b);
    }

    #[test]
    fn profile_json_roundtrip() {
        let a = sample();
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("public_signing_key"));

        let b: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn contacts_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");

        let contacts = vec![sample(), Profile::parse("bob@[::1]:7000").unwrap()];
        write_contacts(&contacts, &path).unwrap();
        assert_eq!(read_contacts(&path).unwrap(), contacts);
    }

    #[test]
    fn timestamp_wall_time() {
        let ts = TimeStamp(0);
        assert_eq!(ts.to_wall_time().timestamp(), 0);

        let now = TimeStamp::now();
        assert!(now.0 > 0);
        assert_eq!(now.to_wall_time().timestamp(), now.0);
    }
}
