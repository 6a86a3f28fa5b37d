//! Persistence contracts and the record types they move.
//!
//! Query mechanics belong to the storage layer; this module fixes the rows
//! the core reads and writes and the unit-of-work seam the provisioning and
//! teardown sequences run inside.

use crate::crypto::{PublicKeyBytes, SealedKey, WrappedKey};
use crate::errors::Result;
use crate::index::BlindIndexParams;
use crate::types::{
    unix_now, AccountId, ActorContext, CustomRoleId, EnvironmentId, FolderId, GrantId, IdentityId,
    MembershipId, OrgId, OrgRole, ProjectId, ProjectSelector, RoleBinding, UpgradeStatus, UserId,
    DEFAULT_VERSION_RETENTION, LATEST_SCHEMA_VERSION,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Workspace row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub org_id: OrgId,
    pub name: String,
    pub slug: String,
    pub schema_version: u32,
    pub version_retention: u32,
    pub auto_capitalization: bool,
    pub upgrade_status: Option<UpgradeStatus>,
    pub created_at: u64,
}

impl ProjectRecord {
    pub fn new(org_id: OrgId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            org_id,
            name: name.into(),
            slug: slug.into(),
            schema_version: LATEST_SCHEMA_VERSION,
            version_retention: DEFAULT_VERSION_RETENTION,
            auto_capitalization: true,
            upgrade_status: None,
            created_at: unix_now(),
        }
    }
}

/// Synthetic custodian account living in the organization's identity space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodianAccountRecord {
    pub id: AccountId,
    pub org_id: OrgId,
    pub label: String,
}

/// Principal bound to a project by a membership or key grant: a human user
/// or the workspace custodian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectPrincipal {
    User { id: UserId },
    Custodian { id: AccountId },
}

/// Human (or custodian) project membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub project_id: ProjectId,
    pub principal: ProjectPrincipal,
    pub role: RoleBinding,
}

/// Machine-identity project membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMembershipRecord {
    pub id: MembershipId,
    pub project_id: ProjectId,
    pub identity_id: IdentityId,
    pub role: RoleBinding,
}

/// Organization membership of a human principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembershipRecord {
    pub id: MembershipId,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: OrgRole,
}

/// Organization membership of a machine identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOrgMembershipRecord {
    pub id: MembershipId,
    pub org_id: OrgId,
    pub identity_id: IdentityId,
    pub role: OrgRole,
}

/// Organization-defined custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleRecord {
    pub id: CustomRoleId,
    pub org_id: OrgId,
    pub slug: String,
}

/// Registered public key of a human principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublicKeyRecord {
    pub user_id: UserId,
    pub public_key: PublicKeyBytes,
}

/// One wrapped copy of the workspace root key per (project, recipient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGrantRecord {
    pub id: GrantId,
    pub project_id: ProjectId,
    pub recipient: ProjectPrincipal,
    pub sender: ProjectPrincipal,
    pub wrapped: WrappedKey,
}

/// Exactly one per project: the custodian's private key sealed for at-rest
/// storage, together with the custodian's own wrapped root-key copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodianKeyRecord {
    pub id: GrantId,
    pub project_id: ProjectId,
    pub account_id: AccountId,
    pub public_key: PublicKeyBytes,
    pub sealed_secret_key: SealedKey,
    pub wrapped_project_key: WrappedKey,
}

/// One per project, created at provisioning, never mutated by this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindIndexRecord {
    pub id: GrantId,
    pub project_id: ProjectId,
    pub params: BlindIndexParams,
}

/// Named environment with stable ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: EnvironmentId,
    pub project_id: ProjectId,
    pub name: String,
    pub slug: String,
    pub position: u32,
}

/// Secret folder; each environment gets one root folder at provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub environment_id: EnvironmentId,
    pub name: String,
}

/// Fully constructed workspace returned to the caller after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAggregate {
    pub project: ProjectRecord,
    pub environments: Vec<EnvironmentRecord>,
}

/// Field patch for workspace settings updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub auto_capitalization: Option<bool>,
}

/// Shared relational store. Each lifecycle operation is an independent unit
/// of work; no in-process state is shared between calls beyond this store.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    type Tx: WorkspaceTx;

    /// Open a unit of work covering a provisioning or teardown sequence.
    async fn begin(&self) -> Result<Self::Tx>;

    async fn find_project(&self, selector: &ProjectSelector) -> Result<Option<ProjectRecord>>;

    /// Workspaces visible to the principal; visibility filtering happens
    /// upstream of this core.
    async fn list_projects(&self, actor: &ActorContext) -> Result<Vec<ProjectRecord>>;

    async fn update_project(&self, id: ProjectId, patch: ProjectPatch) -> Result<ProjectRecord>;

    async fn update_version_retention(&self, id: ProjectId, limit: u32) -> Result<ProjectRecord>;

    async fn user_public_key(&self, user_id: UserId) -> Result<Option<UserPublicKeyRecord>>;

    async fn identity_org_membership(
        &self,
        identity_id: IdentityId,
        org_id: OrgId,
    ) -> Result<Option<IdentityOrgMembershipRecord>>;
}

/// Active unit-of-work handle. Every provisioning step receives this handle
/// rather than opening its own scope; `commit`/`rollback` consume it, so a
/// partially applied sequence cannot leak.
#[async_trait]
pub trait WorkspaceTx: Send {
    async fn create_custodian_account(&mut self, record: CustodianAccountRecord) -> Result<()>;
    async fn insert_project(&mut self, record: ProjectRecord) -> Result<()>;
    async fn insert_membership(&mut self, record: MembershipRecord) -> Result<()>;
    async fn insert_identity_membership(&mut self, record: IdentityMembershipRecord) -> Result<()>;
    async fn insert_blind_index(&mut self, record: BlindIndexRecord) -> Result<()>;
    async fn insert_environment(&mut self, record: EnvironmentRecord) -> Result<()>;
    async fn insert_folder(&mut self, record: FolderRecord) -> Result<()>;
    async fn insert_key_grant(&mut self, record: KeyGrantRecord) -> Result<()>;
    async fn insert_custodian_key_record(&mut self, record: CustodianKeyRecord) -> Result<()>;

    /// Whether a slug is already taken inside the organization.
    async fn slug_taken(&mut self, org_id: OrgId, slug: &str) -> Result<bool>;

    /// Custodian account bound to the project's Admin membership, if any.
    async fn admin_custodian(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Option<CustodianAccountRecord>>;

    async fn delete_custodian_account(&mut self, account_id: AccountId) -> Result<()>;

    /// Delete the project row and every row it owns (memberships, grants,
    /// custodian key record, blind index, environments, folders).
    async fn delete_project_tree(&mut self, project_id: ProjectId) -> Result<()>;

    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}
