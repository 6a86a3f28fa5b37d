use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

pub(crate) const KEY_LEN: usize = 32;

/// X25519 public key, base64-encoded at rest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyBytes([u8; KEY_LEN]);

impl PublicKeyBytes {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({})", STANDARD.encode(self.0))
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let decoded = STANDARD
            .decode(encoded.as_bytes())
            .map_err(D::Error::custom)?;
        let bytes: [u8; KEY_LEN] = decoded
            .try_into()
            .map_err(|_| D::Error::custom("public key must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

/// X25519 private key held in zeroizing memory.
///
/// Exists in plaintext only transiently inside a provisioning or upgrade
/// call; it is never serialized, logged, or returned in caller-visible
/// results. Only the sealed form produced by the custody engine persists.
#[derive(Clone)]
pub struct SecretKeyBytes(Zeroizing<[u8; KEY_LEN]>);

impl SecretKeyBytes {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKeyBytes(<redacted>)")
    }
}

impl PartialEq for SecretKeyBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretKeyBytes {}

/// Asymmetric keypair of a custodian account (or, during tests, any
/// principal registered with the directory).
#[derive(Debug, Clone)]
pub struct CustodianKeypair {
    pub public: PublicKeyBytes,
    pub secret: SecretKeyBytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_round_trips_through_serde() {
        let key = PublicKeyBytes::from_bytes([42u8; KEY_LEN]);
        let json = serde_json::to_string(&key).unwrap();
        let back: PublicKeyBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn secret_key_debug_is_redacted() {
        let key = SecretKeyBytes::from_bytes([42u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SecretKeyBytes(<redacted>)");
    }
}
