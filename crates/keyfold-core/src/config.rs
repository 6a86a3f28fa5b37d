use crate::errors::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::env;
use std::fmt;
use zeroize::Zeroizing;

const MASTER_SECRET_ENV: &str = "KEYFOLD_MASTER_SECRET";
const MIN_MASTER_SECRET_LEN: usize = 32;

/// Immutable key-custody configuration threaded through the engine at
/// construction time. Never read from ambient globals past this point.
#[derive(Clone)]
pub struct CustodyConfig {
    master_secret: Zeroizing<Vec<u8>>,
}

impl CustodyConfig {
    /// Construct from raw master-secret bytes (at least 32 bytes).
    pub fn new(master_secret: impl Into<Vec<u8>>) -> Result<Self> {
        let master_secret = Zeroizing::new(master_secret.into());
        if master_secret.len() < MIN_MASTER_SECRET_LEN {
            return Err(Error::InvalidInput {
                field: "master_secret",
                reason: format!("must be at least {MIN_MASTER_SECRET_LEN} bytes"),
            });
        }
        Ok(Self { master_secret })
    }

    /// Build from the `KEYFOLD_MASTER_SECRET` environment variable
    /// (base64, standard alphabet).
    pub fn from_env() -> Result<Self> {
        let encoded = env::var(MASTER_SECRET_ENV).map_err(|_| Error::InvalidInput {
            field: "master_secret",
            reason: format!("{MASTER_SECRET_ENV} is not set"),
        })?;
        let decoded = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|_| Error::InvalidInput {
                field: "master_secret",
                reason: format!("{MASTER_SECRET_ENV} is not valid base64"),
            })?;
        Self::new(decoded)
    }

    pub(crate) fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }
}

impl fmt::Debug for CustodyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyConfig")
            .field("master_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sufficiently_long_secret() {
        let config = CustodyConfig::new(vec![7u8; 32]).unwrap();
        assert_eq!(config.master_secret().len(), 32);
    }

    #[test]
    fn rejects_short_secret() {
        let err = CustodyConfig::new(vec![7u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidInput {
                field: "master_secret",
                ..
            }
        ));
    }

    #[test]
    fn debug_redacts_material() {
        let config = CustodyConfig::new(vec![7u8; 32]).unwrap();
        assert!(!format!("{config:?}").contains('7'));
    }
}
