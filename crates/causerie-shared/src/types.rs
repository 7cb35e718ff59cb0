use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::constants::GENERAL_ROOM;

/// Message identity: an opaque caller-generated string, globally unique via
/// time + randomness.  Within one room the id is unique; the reconciler
/// deduplicates on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh id from the current wall clock and a random suffix.
    pub fn generate() -> Self {
        let now = Utc::now().timestamp_millis();
        let suffix: u32 = OsRng.gen();
        Self(format!("{now}-{suffix:08x}"))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identity: the room name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The distinguished default room that can never be left.
    pub fn general() -> Self {
        Self(GENERAL_ROOM.to_string())
    }

    pub fn is_general(&self) -> bool {
        self.0 == GENERAL_ROOM
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's keypair: an Ed25519 signing pair plus an X25519 encryption pair,
/// hex-encoded.  Only `verify_public` is published with the presence record;
/// per-user asymmetric encryption is not exercised yet (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyPair {
    /// Ed25519 verifying key
    pub verify_public: String,
    /// Ed25519 signing key
    pub sign_secret: String,
    /// X25519 public key
    pub encrypt_public: String,
    /// X25519 secret key
    pub encrypt_secret: String,
}

impl KeyPair {
    /// Generate a fresh signing + encryption keypair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let enc_secret = StaticSecret::random_from_rng(OsRng);
        let enc_public = X25519Public::from(&enc_secret);

        Self {
            verify_public: hex::encode(signing.verifying_key().to_bytes()),
            sign_secret: hex::encode(signing.to_bytes()),
            encrypt_public: hex::encode(enc_public.to_bytes()),
            encrypt_secret: hex::encode(enc_secret.to_bytes()),
        }
    }
}

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_general_room() {
        assert!(RoomId::general().is_general());
        assert!(!RoomId::new("lounge").is_general());
    }

    #[test]
    fn test_keypair_shape() {
        let pair = KeyPair::generate();
        // 32-byte keys, hex-encoded
        assert_eq!(pair.verify_public.len(), 64);
        assert_eq!(pair.sign_secret.len(), 64);
        assert_eq!(pair.encrypt_public.len(), 64);
        assert_eq!(pair.encrypt_secret.len(), 64);
        assert_ne!(pair.verify_public, pair.encrypt_public);
    }
}
