//! Hand-off to the asynchronous workspace-upgrade executor.

use crate::crypto::SealedKey;
use crate::errors::Result;
use crate::types::{ProjectId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload handed to the background execution facility. The initiating
/// user's private key travels only in sealed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeJob {
    pub project_id: ProjectId,
    pub started_by: UserId,
    pub sealed_private_key: SealedKey,
}

/// Background execution facility. Enqueue returns immediately; the executor
/// owns every subsequent upgrade-status transition.
#[async_trait]
pub trait UpgradeExecutor: Send + Sync {
    async fn enqueue(&self, job: UpgradeJob) -> Result<()>;
}
