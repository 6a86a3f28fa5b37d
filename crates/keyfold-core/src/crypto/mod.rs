//! Key custody: workspace root-key generation, envelope wrapping, and
//! symmetric sealing of custodian private keys for at-rest storage.

pub mod custody;
pub mod keys;

use rand::RngCore;

pub use custody::{KeyCustodyEngine, SealAlgorithm, SealEncoding, SealedKey, WrapAlgorithm, WrappedKey};
pub use keys::{CustodianKeypair, PublicKeyBytes, SecretKeyBytes};

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; len];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut buffer);
    buffer
}

/// Base64 (standard alphabet) serde adapter for ciphertext fields at rest.
pub(crate) mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
