//! Public lifecycle surface: create, read, update, delete, and upgrade
//! workspaces. Every operation authorizes first; denials short-circuit
//! before any mutation.

use crate::access::{AccessGate, OrgAction, ProjectAction};
use crate::crypto::{KeyCustodyEngine, SecretKeyBytes};
use crate::custodian;
use crate::errors::{Error, Result};
use crate::index::BlindIndexProvider;
use crate::provision::{provision_workspace, ProvisionRequest};
use crate::quota::{plan_usage_key, PlanGate, UsageCache};
use crate::store::{ProjectAggregate, ProjectPatch, ProjectRecord, WorkspaceStore, WorkspaceTx};
use crate::types::{
    Actor, ActorContext, ProjectRole, ProjectSelector, UpgradeStatus, LATEST_SCHEMA_VERSION,
};
use crate::upgrade::{UpgradeExecutor, UpgradeJob};
use std::sync::Arc;
use tracing::{info, warn};

/// External collaborators of the lifecycle service.
#[derive(Clone)]
pub struct Collaborators {
    pub plans: Arc<dyn PlanGate>,
    pub usage_cache: Arc<dyn UsageCache>,
    pub upgrades: Arc<dyn UpgradeExecutor>,
    pub blind_index: Arc<dyn BlindIndexProvider>,
}

/// Workspace lifecycle orchestration over a store, an authorization gate,
/// and the key-custody engine.
pub struct WorkspaceService<S, G>
where
    S: WorkspaceStore,
    G: AccessGate,
{
    store: S,
    gate: G,
    custody: KeyCustodyEngine,
    collaborators: Collaborators,
}

impl<S, G> WorkspaceService<S, G>
where
    S: WorkspaceStore,
    G: AccessGate,
{
    pub fn new(store: S, gate: G, custody: KeyCustodyEngine, collaborators: Collaborators) -> Self {
        Self {
            store,
            gate,
            custody,
            collaborators,
        }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Provision a new workspace for the actor's organization.
    pub async fn create(
        &self,
        actor: &ActorContext,
        request: ProvisionRequest,
    ) -> Result<ProjectAggregate> {
        let org_id = actor.org_id;
        let grant = self
            .gate
            .org_access(actor, org_id, OrgAction::CreateWorkspace)
            .await?
            .require(OrgAction::CreateWorkspace)?;

        let plan = self.collaborators.plans.plan(org_id).await?;
        if plan.at_capacity() {
            return Err(Error::QuotaExceeded {
                limit: plan.workspace_limit.unwrap_or(0),
                used: plan.workspaces_used,
            });
        }

        let aggregate = provision_workspace(
            &self.store,
            &self.gate,
            &self.custody,
            self.collaborators.blind_index.as_ref(),
            actor,
            &grant.permission,
            &request,
        )
        .await?;

        self.collaborators
            .usage_cache
            .invalidate(&plan_usage_key(org_id))
            .await?;
        Ok(aggregate)
    }

    /// Fetch a workspace by identifier or org-scoped slug.
    pub async fn get(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
    ) -> Result<ProjectRecord> {
        let project = self.resolve(selector).await?;
        self.gate
            .project_access(actor, &project, ProjectAction::Read)
            .await?
            .require(ProjectAction::Read)?;
        Ok(project)
    }

    /// All workspaces visible to the principal.
    pub async fn list(&self, actor: &ActorContext) -> Result<Vec<ProjectRecord>> {
        self.store.list_projects(actor).await
    }

    /// Patch workspace settings (name, auto-capitalization).
    pub async fn update_settings(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
        patch: ProjectPatch,
    ) -> Result<ProjectRecord> {
        let project = self.resolve(selector).await?;
        self.gate
            .project_access(actor, &project, ProjectAction::EditSettings)
            .await?
            .require(ProjectAction::EditSettings)?;
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput {
                    field: "name",
                    reason: "must not be empty".into(),
                });
            }
        }
        self.store.update_project(project.id, patch).await
    }

    /// Patch the point-in-time version retention limit. Requires the Admin
    /// role on top of the settings capability.
    pub async fn update_version_retention(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
        limit: u32,
    ) -> Result<ProjectRecord> {
        let project = self.resolve(selector).await?;
        let grant = self
            .gate
            .project_access(actor, &project, ProjectAction::EditSettings)
            .await?
            .require(ProjectAction::EditSettings)?;
        grant.require_role(ProjectRole::Admin, "changing version retention")?;
        if limit == 0 {
            return Err(Error::InvalidInput {
                field: "version_retention",
                reason: "must retain at least one version".into(),
            });
        }
        self.store.update_version_retention(project.id, limit).await
    }

    /// Delete a workspace and everything it owns, then tear down its
    /// custodian account (tolerating prior out-of-band removal).
    pub async fn delete(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
    ) -> Result<ProjectRecord> {
        let project = self.resolve(selector).await?;
        self.gate
            .project_access(actor, &project, ProjectAction::Delete)
            .await?
            .require(ProjectAction::Delete)?;

        let mut tx = self.store.begin().await?;
        let teardown = async {
            custodian::destroy_custodian(&mut tx, project.id).await?;
            tx.delete_project_tree(project.id).await
        }
        .await;
        match teardown {
            Ok(()) => tx.commit().await?,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback of failed workspace deletion failed");
                }
                return Err(err);
            }
        }

        self.collaborators
            .usage_cache
            .invalidate(&plan_usage_key(project.org_id))
            .await?;
        info!(project = %project.id, org = %project.org_id, "workspace deleted");
        Ok(project)
    }

    /// Kick off an asynchronous schema upgrade. The initiating user's
    /// private key is sealed before it leaves this call; the upgrade itself
    /// executes in the background facility.
    pub async fn upgrade(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
        user_private_key: SecretKeyBytes,
    ) -> Result<()> {
        let project = self.resolve(selector).await?;
        let grant = self
            .gate
            .project_access(actor, &project, ProjectAction::Delete)
            .await?
            .require(ProjectAction::Delete)?;
        grant.require_role(ProjectRole::Admin, "workspace upgrade")?;

        let user_id = match actor.actor {
            Actor::User { id } => id,
            Actor::Identity { .. } => {
                return Err(Error::denied(
                    "workspace upgrades must be initiated by a user session",
                ));
            }
        };

        if project.schema_version >= LATEST_SCHEMA_VERSION {
            return Err(Error::InvalidInput {
                field: "schema_version",
                reason: "workspace is already at the latest version".into(),
            });
        }
        if project.upgrade_status == Some(UpgradeStatus::InProgress) {
            return Err(Error::InvalidInput {
                field: "upgrade_status",
                reason: "an upgrade is already in progress".into(),
            });
        }

        let sealed_private_key = self.custody.seal_private_key(&user_private_key)?;
        self.collaborators
            .upgrades
            .enqueue(UpgradeJob {
                project_id: project.id,
                started_by: user_id,
                sealed_private_key,
            })
            .await?;
        info!(project = %project.id, user = %user_id, "workspace upgrade enqueued");
        Ok(())
    }

    /// Current upgrade-status marker, if any.
    pub async fn upgrade_status(
        &self,
        actor: &ActorContext,
        selector: &ProjectSelector,
    ) -> Result<Option<UpgradeStatus>> {
        let project = self.resolve(selector).await?;
        self.gate
            .project_access(actor, &project, ProjectAction::ReadSecrets)
            .await?
            .require(ProjectAction::ReadSecrets)?;
        Ok(project.upgrade_status)
    }

    async fn resolve(&self, selector: &ProjectSelector) -> Result<ProjectRecord> {
        self.store
            .find_project(selector)
            .await?
            .ok_or_else(|| Error::not_found("workspace"))
    }
}
