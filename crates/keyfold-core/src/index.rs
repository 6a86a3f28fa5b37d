//! Blind-index collaborator contract.
//!
//! The cryptographic computation of blind-index values happens upstream;
//! this core only decides when a workspace's index parameters are created
//! (once, at provisioning) and supplies the organization whose key material
//! seeds them.

use crate::crypto::SealedKey;
use crate::errors::Result;
use crate::types::OrgId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque salted parameters enabling deterministic-but-unrevealing lookups
/// over secret names. Created once per workspace, never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindIndexParams {
    pub sealed_salt: SealedKey,
}

#[async_trait]
pub trait BlindIndexProvider: Send + Sync {
    /// Derive index parameters from the organization's key material.
    async fn derive_params(&self, org_id: OrgId) -> Result<BlindIndexParams>;
}
