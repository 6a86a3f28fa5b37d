use crate::config::CustodyConfig;
use crate::crypto::keys::{CustodianKeypair, PublicKeyBytes, SecretKeyBytes, KEY_LEN};
use crate::crypto::{b64, random_bytes};
use crate::errors::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use crypto_box::aead::{Aead as _, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

const PROJECT_KEY_LEN: usize = 32;
const BOX_NONCE_LEN: usize = 24;
const SEAL_IV_LEN: usize = 12;
const SEAL_TAG_LEN: usize = 16;
const SEAL_KEY_INFO: &[u8] = b"keyfold/custodian-seal/v1";

/// Envelope-wrapping algorithm identifier persisted with every grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapAlgorithm {
    #[serde(rename = "x25519-xsalsa20-poly1305")]
    X25519XSalsa20Poly1305,
}

/// Symmetric sealing algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SealAlgorithm {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

/// Byte encoding used for sealed fields at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealEncoding {
    Base64,
}

/// Workspace root key wrapped under a recipient's public key.
///
/// Only this form ever leaves the custody engine; the unwrapped root key
/// exists in memory inside a single engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    pub algorithm: WrapAlgorithm,
}

/// A custodian private key sealed for at-rest storage.
///
/// Ciphertext, IV, tag, algorithm and encoding must be persisted together;
/// a record missing any of them is unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
    pub algorithm: SealAlgorithm,
    pub encoding: SealEncoding,
}

/// Generates and moves workspace root keys without ever persisting them
/// unwrapped, and seals custodian private keys under a key derived from the
/// server master secret.
pub struct KeyCustodyEngine {
    seal_key: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyCustodyEngine {
    /// Derive the sealing key from the configured master secret.
    pub fn new(config: &CustodyConfig) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, config.master_secret());
        let mut okm = [0u8; KEY_LEN];
        hkdf.expand(SEAL_KEY_INFO, &mut okm)
            .map_err(|_| Error::Crypto("failed to derive sealing key".into()))?;
        Ok(Self {
            seal_key: Zeroizing::new(okm),
        })
    }

    /// Generate a fresh X25519 keypair for a custodian account.
    pub fn generate_keypair() -> CustodianKeypair {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        CustodianKeypair {
            public: PublicKeyBytes::from_bytes(*public.as_bytes()),
            secret: SecretKeyBytes::from_bytes(secret.to_bytes()),
        }
    }

    /// Produce a fresh workspace root key, immediately wrapped under the
    /// custodian's own public key. The unwrapped form never escapes this
    /// call.
    pub fn generate_project_key(&self, custodian: &CustodianKeypair) -> Result<WrappedKey> {
        let root = Zeroizing::new(random_bytes(PROJECT_KEY_LEN));
        wrap(&root, &custodian.secret, &custodian.public)
    }

    /// Envelope-encrypt the root key for a new recipient. The sender must
    /// currently hold the key (during provisioning the custodian is the
    /// universal sender, since it always holds the latest copy).
    pub fn wrap_for_recipient(
        &self,
        wrapped: &WrappedKey,
        sender: &CustodianKeypair,
        recipient_public: &PublicKeyBytes,
    ) -> Result<WrappedKey> {
        let root = self.unwrap_project_key(wrapped, &sender.public, &sender.secret)?;
        wrap(&root, &sender.secret, recipient_public)
    }

    /// Recover a wrapped root key. Used by grant holders and by tests
    /// proving that every grant of a project decrypts to the same value.
    pub fn unwrap_project_key(
        &self,
        wrapped: &WrappedKey,
        sender_public: &PublicKeyBytes,
        recipient_secret: &SecretKeyBytes,
    ) -> Result<Zeroizing<Vec<u8>>> {
        if wrapped.nonce.len() != BOX_NONCE_LEN {
            return Err(Error::Crypto("wrapped key nonce has invalid length".into()));
        }
        let sender = PublicKey::from(*sender_public.as_bytes());
        let recipient = SecretKey::from(*recipient_secret.as_bytes());
        let sbox = SalsaBox::new(&sender, &recipient);
        let nonce = crypto_box::Nonce::clone_from_slice(&wrapped.nonce);
        let root = sbox
            .decrypt(&nonce, wrapped.ciphertext.as_slice())
            .map_err(|_| Error::Crypto("failed to unwrap workspace root key".into()))?;
        Ok(Zeroizing::new(root))
    }

    /// Symmetrically seal a custodian private key for at-rest storage.
    pub fn seal_private_key(&self, secret: &SecretKeyBytes) -> Result<SealedKey> {
        let cipher = Aes256Gcm::new_from_slice(self.seal_key.as_slice())
            .map_err(|_| Error::Crypto("invalid sealing key".into()))?;
        let iv = random_bytes(SEAL_IV_LEN);
        let nonce = aes_gcm::Nonce::from_slice(&iv);
        let mut ciphertext = cipher
            .encrypt(nonce, secret.as_bytes().as_slice())
            .map_err(|_| Error::Crypto("failed to seal custodian private key".into()))?;
        let tag = ciphertext.split_off(ciphertext.len() - SEAL_TAG_LEN);
        Ok(SealedKey {
            ciphertext,
            iv,
            tag,
            algorithm: SealAlgorithm::Aes256Gcm,
            encoding: SealEncoding::Base64,
        })
    }

    /// Reverse [`Self::seal_private_key`].
    pub fn open_private_key(&self, sealed: &SealedKey) -> Result<SecretKeyBytes> {
        if sealed.iv.len() != SEAL_IV_LEN || sealed.tag.len() != SEAL_TAG_LEN {
            return Err(Error::Crypto("sealed record metadata is malformed".into()));
        }
        let cipher = Aes256Gcm::new_from_slice(self.seal_key.as_slice())
            .map_err(|_| Error::Crypto("invalid sealing key".into()))?;
        let nonce = aes_gcm::Nonce::from_slice(&sealed.iv);
        let mut combined = Vec::with_capacity(sealed.ciphertext.len() + sealed.tag.len());
        combined.extend_from_slice(&sealed.ciphertext);
        combined.extend_from_slice(&sealed.tag);
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(nonce, combined.as_slice())
                .map_err(|_| Error::Crypto("failed to open sealed custodian key".into()))?,
        );
        let bytes: [u8; KEY_LEN] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| Error::Crypto("sealed key has unexpected length".into()))?;
        Ok(SecretKeyBytes::from_bytes(bytes))
    }
}

fn wrap(
    root: &[u8],
    sender_secret: &SecretKeyBytes,
    recipient_public: &PublicKeyBytes,
) -> Result<WrappedKey> {
    let sender = SecretKey::from(*sender_secret.as_bytes());
    let recipient = PublicKey::from(*recipient_public.as_bytes());
    let sbox = SalsaBox::new(&recipient, &sender);
    let nonce_bytes = random_bytes(BOX_NONCE_LEN);
    let nonce = crypto_box::Nonce::clone_from_slice(&nonce_bytes);
    let ciphertext = sbox
        .encrypt(&nonce, root)
        .map_err(|_| Error::Crypto("failed to wrap workspace root key".into()))?;
    Ok(WrappedKey {
        ciphertext,
        nonce: nonce_bytes,
        algorithm: WrapAlgorithm::X25519XSalsa20Poly1305,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyCustodyEngine {
        let config = CustodyConfig::new(vec![9u8; 32]).unwrap();
        KeyCustodyEngine::new(&config).unwrap()
    }

    #[test]
    fn custodian_can_unwrap_its_own_grant() {
        let engine = engine();
        let custodian = KeyCustodyEngine::generate_keypair();
        let wrapped = engine.generate_project_key(&custodian).unwrap();

        let root = engine
            .unwrap_project_key(&wrapped, &custodian.public, &custodian.secret)
            .unwrap();
        assert_eq!(root.len(), PROJECT_KEY_LEN);
    }

    #[test]
    fn rewrapped_grant_decrypts_to_same_root_key() {
        let engine = engine();
        let custodian = KeyCustodyEngine::generate_keypair();
        let member = KeyCustodyEngine::generate_keypair();

        let custodian_copy = engine.generate_project_key(&custodian).unwrap();
        let member_copy = engine
            .wrap_for_recipient(&custodian_copy, &custodian, &member.public)
            .unwrap();
        assert_ne!(custodian_copy.nonce, member_copy.nonce);

        let via_custodian = engine
            .unwrap_project_key(&custodian_copy, &custodian.public, &custodian.secret)
            .unwrap();
        let via_member = engine
            .unwrap_project_key(&member_copy, &custodian.public, &member.secret)
            .unwrap();
        assert_eq!(via_custodian, via_member);
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let engine = engine();
        let custodian = KeyCustodyEngine::generate_keypair();
        let outsider = KeyCustodyEngine::generate_keypair();
        let wrapped = engine.generate_project_key(&custodian).unwrap();

        let err = engine
            .unwrap_project_key(&wrapped, &custodian.public, &outsider.secret)
            .unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn seal_open_round_trip() {
        let engine = engine();
        let custodian = KeyCustodyEngine::generate_keypair();

        let sealed = engine.seal_private_key(&custodian.secret).unwrap();
        assert_eq!(sealed.iv.len(), SEAL_IV_LEN);
        assert_eq!(sealed.tag.len(), SEAL_TAG_LEN);
        assert_eq!(sealed.algorithm, SealAlgorithm::Aes256Gcm);

        let opened = engine.open_private_key(&sealed).unwrap();
        assert_eq!(opened, custodian.secret);
    }

    #[test]
    fn tampered_seal_fails_to_open() {
        let engine = engine();
        let custodian = KeyCustodyEngine::generate_keypair();

        let mut sealed = engine.seal_private_key(&custodian.secret).unwrap();
        sealed.ciphertext[0] ^= 0xFF;
        let err = engine.open_private_key(&sealed).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn different_master_secret_cannot_open() {
        let engine = engine();
        let other = KeyCustodyEngine::new(&CustodyConfig::new(vec![1u8; 32]).unwrap()).unwrap();
        let custodian = KeyCustodyEngine::generate_keypair();

        let sealed = engine.seal_private_key(&custodian.secret).unwrap();
        assert!(other.open_private_key(&sealed).is_err());
    }
}
