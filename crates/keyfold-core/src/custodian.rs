//! Custodian ("ghost") account management.
//!
//! Every workspace gets exactly one synthetic account that permanently holds
//! a wrapped copy of the root key and backs automated operations. Its
//! private key is returned transiently for immediate wrapping work and must
//! never reach a caller-visible result or a log line.

use crate::crypto::{CustodianKeypair, KeyCustodyEngine};
use crate::errors::Result;
use crate::store::{CustodianAccountRecord, WorkspaceTx};
use crate::types::{AccountId, OrgId, ProjectId};
use tracing::debug;

/// Create the custodian account for a workspace being provisioned, inside
/// the active unit of work.
pub async fn create_custodian<T: WorkspaceTx>(
    tx: &mut T,
    org_id: OrgId,
    workspace_name: &str,
) -> Result<(CustodianAccountRecord, CustodianKeypair)> {
    let keypair = KeyCustodyEngine::generate_keypair();
    let account = CustodianAccountRecord {
        id: AccountId::new(),
        org_id,
        label: format!("custodian of {workspace_name}"),
    };
    tx.create_custodian_account(account.clone()).await?;
    debug!(account = %account.id, "created workspace custodian account");
    Ok((account, keypair))
}

/// Remove the custodian bound to a project's Admin membership. A project
/// can, in degenerate states, lack a custodian; absence is a no-op, not an
/// error. Must run before the project tree is deleted so the binding
/// membership is still visible.
pub async fn destroy_custodian<T: WorkspaceTx>(
    tx: &mut T,
    project_id: ProjectId,
) -> Result<Option<AccountId>> {
    match tx.admin_custodian(project_id).await? {
        Some(account) => {
            tx.delete_custodian_account(account.id).await?;
            debug!(account = %account.id, "removed workspace custodian account");
            Ok(Some(account.id))
        }
        None => {
            debug!(project = %project_id, "no custodian bound to workspace; nothing to remove");
            Ok(None)
        }
    }
}
