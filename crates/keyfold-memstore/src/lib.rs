//! In-memory implementation of the keyfold storage contracts.
//!
//! Snapshot isolation: `begin` clones the committed state, writes land on
//! the clone, and `commit` swaps it back in. Concurrent transactions are
//! last-writer-wins, which is acceptable for a dev/test backend; readers
//! always observe either the pre-state or the fully committed post-state.
//!
//! A named failpoint can be armed to make a single operation fail, which is
//! how the rollback tests exercise every provisioning step in turn.

use async_trait::async_trait;
use keyfold_core::errors::{Error, Result};
use keyfold_core::store::{
    BlindIndexRecord, CustodianAccountRecord, CustodianKeyRecord, EnvironmentRecord, FolderRecord,
    IdentityMembershipRecord, IdentityOrgMembershipRecord, KeyGrantRecord, MembershipRecord,
    ProjectPatch, ProjectPrincipal, ProjectRecord, UserPublicKeyRecord, WorkspaceStore,
    WorkspaceTx,
};
use keyfold_core::types::{
    AccountId, Actor, ActorContext, IdentityId, OrgId, ProjectId, ProjectSelector, RoleBinding,
    UpgradeStatus, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Committed rows. Exposed for test inspection via [`MemoryStore::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub accounts: HashMap<AccountId, CustodianAccountRecord>,
    pub projects: HashMap<ProjectId, ProjectRecord>,
    pub memberships: Vec<MembershipRecord>,
    pub identity_memberships: Vec<IdentityMembershipRecord>,
    pub key_grants: Vec<KeyGrantRecord>,
    pub custodian_keys: Vec<CustodianKeyRecord>,
    pub blind_indexes: Vec<BlindIndexRecord>,
    pub environments: Vec<EnvironmentRecord>,
    pub folders: Vec<FolderRecord>,
    pub user_keys: HashMap<UserId, UserPublicKeyRecord>,
    pub identity_org_memberships: Vec<IdentityOrgMembershipRecord>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failpoint: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the committed state, for assertions.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Arm a one-shot failure for the named transaction operation.
    pub async fn fail_on(&self, op: impl Into<String>) {
        *self.failpoint.lock().await = Some(op.into());
    }

    pub async fn clear_failpoint(&self) {
        *self.failpoint.lock().await = None;
    }

    /// Register a human principal's public key in the directory.
    pub async fn register_user_key(&self, record: UserPublicKeyRecord) {
        self.state
            .lock()
            .await
            .user_keys
            .insert(record.user_id, record);
    }

    /// Register a machine identity's organization membership.
    pub async fn register_identity_org_membership(&self, record: IdentityOrgMembershipRecord) {
        self.state
            .lock()
            .await
            .identity_org_memberships
            .push(record);
    }

    /// Out-of-band custodian removal, used to model degenerate workspaces.
    pub async fn remove_account(&self, account_id: AccountId) {
        self.state.lock().await.accounts.remove(&account_id);
    }

    /// Backfill an older schema version, modelling a workspace provisioned
    /// before the current schema.
    pub async fn set_schema_version(&self, project_id: ProjectId, version: u32) -> Result<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| Error::not_found("workspace"))?;
        project.schema_version = version;
        Ok(())
    }

    /// Executor-side hook: write the upgrade-status marker the external
    /// facility drives.
    pub async fn set_upgrade_status(
        &self,
        project_id: ProjectId,
        status: Option<UpgradeStatus>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| Error::not_found("workspace"))?;
        project.upgrade_status = status;
        Ok(())
    }
}

pub struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    failpoint: Arc<Mutex<Option<String>>>,
    pending: MemoryState,
}

impl MemoryTx {
    async fn trip(&self, op: &str) -> Result<()> {
        let armed = self.failpoint.lock().await;
        match armed.as_deref() {
            Some(target) if target == op => Err(Error::Storage(format!(
                "injected failure at {op}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl WorkspaceTx for MemoryTx {
    async fn create_custodian_account(&mut self, record: CustodianAccountRecord) -> Result<()> {
        self.trip("create_custodian_account").await?;
        self.pending.accounts.insert(record.id, record);
        Ok(())
    }

    async fn insert_project(&mut self, record: ProjectRecord) -> Result<()> {
        self.trip("insert_project").await?;
        self.pending.projects.insert(record.id, record);
        Ok(())
    }

    async fn insert_membership(&mut self, record: MembershipRecord) -> Result<()> {
        self.trip("insert_membership").await?;
        self.pending.memberships.push(record);
        Ok(())
    }

    async fn insert_identity_membership(
        &mut self,
        record: IdentityMembershipRecord,
    ) -> Result<()> {
        self.trip("insert_identity_membership").await?;
        self.pending.identity_memberships.push(record);
        Ok(())
    }

    async fn insert_blind_index(&mut self, record: BlindIndexRecord) -> Result<()> {
        self.trip("insert_blind_index").await?;
        self.pending.blind_indexes.push(record);
        Ok(())
    }

    async fn insert_environment(&mut self, record: EnvironmentRecord) -> Result<()> {
        self.trip("insert_environment").await?;
        self.pending.environments.push(record);
        Ok(())
    }

    async fn insert_folder(&mut self, record: FolderRecord) -> Result<()> {
        self.trip("insert_folder").await?;
        self.pending.folders.push(record);
        Ok(())
    }

    async fn insert_key_grant(&mut self, record: KeyGrantRecord) -> Result<()> {
        self.trip("insert_key_grant").await?;
        self.pending.key_grants.push(record);
        Ok(())
    }

    async fn insert_custodian_key_record(&mut self, record: CustodianKeyRecord) -> Result<()> {
        self.trip("insert_custodian_key_record").await?;
        self.pending.custodian_keys.push(record);
        Ok(())
    }

    async fn slug_taken(&mut self, org_id: OrgId, slug: &str) -> Result<bool> {
        Ok(self
            .pending
            .projects
            .values()
            .any(|p| p.org_id == org_id && p.slug == slug))
    }

    async fn admin_custodian(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Option<CustodianAccountRecord>> {
        self.trip("admin_custodian").await?;
        let account_id = self.pending.memberships.iter().find_map(|m| {
            match (&m.principal, &m.role) {
                (ProjectPrincipal::Custodian { id }, RoleBinding::Admin)
                    if m.project_id == project_id =>
                {
                    Some(*id)
                }
                _ => None,
            }
        });
        Ok(account_id.and_then(|id| self.pending.accounts.get(&id).cloned()))
    }

    async fn delete_custodian_account(&mut self, account_id: AccountId) -> Result<()> {
        self.trip("delete_custodian_account").await?;
        self.pending.accounts.remove(&account_id);
        Ok(())
    }

    async fn delete_project_tree(&mut self, project_id: ProjectId) -> Result<()> {
        self.trip("delete_project_tree").await?;
        let state = &mut self.pending;
        state.projects.remove(&project_id);
        state.memberships.retain(|m| m.project_id != project_id);
        state
            .identity_memberships
            .retain(|m| m.project_id != project_id);
        state.key_grants.retain(|g| g.project_id != project_id);
        state.custodian_keys.retain(|k| k.project_id != project_id);
        state.blind_indexes.retain(|b| b.project_id != project_id);
        let environment_ids: Vec<_> = state
            .environments
            .iter()
            .filter(|e| e.project_id == project_id)
            .map(|e| e.id)
            .collect();
        state.environments.retain(|e| e.project_id != project_id);
        state
            .folders
            .retain(|f| !environment_ids.contains(&f.environment_id));
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.trip("commit").await?;
        *self.state.lock().await = self.pending;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        // Pending writes are simply dropped.
        Ok(())
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let pending = self.state.lock().await.clone();
        Ok(MemoryTx {
            state: Arc::clone(&self.state),
            failpoint: Arc::clone(&self.failpoint),
            pending,
        })
    }

    async fn find_project(&self, selector: &ProjectSelector) -> Result<Option<ProjectRecord>> {
        let state = self.state.lock().await;
        let found = match selector {
            ProjectSelector::Id(id) => state.projects.get(id).cloned(),
            ProjectSelector::Slug { org_id, slug } => state
                .projects
                .values()
                .find(|p| p.org_id == *org_id && p.slug == *slug)
                .cloned(),
        };
        Ok(found)
    }

    async fn list_projects(&self, actor: &ActorContext) -> Result<Vec<ProjectRecord>> {
        let state = self.state.lock().await;
        let mut visible: Vec<ProjectRecord> = state
            .projects
            .values()
            .filter(|p| p.org_id == actor.org_id && is_member(&state, p.id, actor.actor))
            .cloned()
            .collect();
        visible.sort_by_key(|p| p.created_at);
        Ok(visible)
    }

    async fn update_project(&self, id: ProjectId, patch: ProjectPatch) -> Result<ProjectRecord> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("workspace"))?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(flag) = patch.auto_capitalization {
            project.auto_capitalization = flag;
        }
        Ok(project.clone())
    }

    async fn update_version_retention(&self, id: ProjectId, limit: u32) -> Result<ProjectRecord> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("workspace"))?;
        project.version_retention = limit;
        Ok(project.clone())
    }

    async fn user_public_key(&self, user_id: UserId) -> Result<Option<UserPublicKeyRecord>> {
        Ok(self.state.lock().await.user_keys.get(&user_id).cloned())
    }

    async fn identity_org_membership(
        &self,
        identity_id: IdentityId,
        org_id: OrgId,
    ) -> Result<Option<IdentityOrgMembershipRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .identity_org_memberships
            .iter()
            .find(|m| m.identity_id == identity_id && m.org_id == org_id)
            .cloned())
    }
}

fn is_member(state: &MemoryState, project_id: ProjectId, actor: Actor) -> bool {
    match actor {
        Actor::User { id } => state.memberships.iter().any(|m| {
            m.project_id == project_id
                && matches!(m.principal, ProjectPrincipal::User { id: uid } if uid == id)
        }),
        Actor::Identity { id } => state
            .identity_memberships
            .iter()
            .any(|m| m.project_id == project_id && m.identity_id == id),
    }
}
