//! The atomic workspace provisioning sequence.
//!
//! Creates the custodian, the project row, memberships, the blind-index
//! record, default environments, and the key distribution records inside a
//! single unit of work. Any failure rolls back every prior step; a
//! partially provisioned workspace is worse than none, because it would be
//! inaccessible or key-less.

use crate::access::{AccessGate, OrgPermission};
use crate::crypto::KeyCustodyEngine;
use crate::custodian;
use crate::errors::{Error, Result};
use crate::index::BlindIndexProvider;
use crate::slug;
use crate::store::{
    BlindIndexRecord, CustodianKeyRecord, EnvironmentRecord, FolderRecord,
    IdentityMembershipRecord, KeyGrantRecord, MembershipRecord, ProjectAggregate,
    ProjectPrincipal, ProjectRecord, WorkspaceStore, WorkspaceTx,
};
use crate::types::{
    Actor, ActorContext, EnvironmentId, FolderId, GrantId, MembershipId, OrgId, RoleBinding,
};
use tracing::{info, warn};

/// Environments every new workspace starts with, in display order.
pub const DEFAULT_ENVIRONMENTS: [(&str, &str); 3] = [
    ("Development", "dev"),
    ("Staging", "staging"),
    ("Production", "prod"),
];

const ROOT_FOLDER_NAME: &str = "root";
const SLUG_ATTEMPTS: usize = 8;

/// Parameters of a workspace-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub name: String,
    pub slug: Option<String>,
    pub version_retention: Option<u32>,
}

impl ProvisionRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            version_retention: None,
        }
    }
}

/// Run the full provisioning sequence for an already-authorized request.
/// `creator` is the initiating actor's own effective organization
/// permission, used to stop machine identities from escalating.
pub(crate) async fn provision_workspace<S, G>(
    store: &S,
    gate: &G,
    custody: &KeyCustodyEngine,
    indexer: &dyn BlindIndexProvider,
    actor: &ActorContext,
    creator: &OrgPermission,
    request: &ProvisionRequest,
) -> Result<ProjectAggregate>
where
    S: WorkspaceStore,
    G: AccessGate,
{
    if request.name.trim().is_empty() {
        return Err(Error::InvalidInput {
            field: "name",
            reason: "must not be empty".into(),
        });
    }

    let mut tx = store.begin().await?;
    match run_steps(store, gate, custody, indexer, actor, creator, request, &mut tx).await {
        Ok(aggregate) => {
            tx.commit().await?;
            info!(
                project = %aggregate.project.id,
                org = %aggregate.project.org_id,
                slug = %aggregate.project.slug,
                "workspace provisioned"
            );
            Ok(aggregate)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback of failed provisioning attempt failed");
            }
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_steps<S, G>(
    store: &S,
    gate: &G,
    custody: &KeyCustodyEngine,
    indexer: &dyn BlindIndexProvider,
    actor: &ActorContext,
    creator: &OrgPermission,
    request: &ProvisionRequest,
    tx: &mut S::Tx,
) -> Result<ProjectAggregate>
where
    S: WorkspaceStore,
    G: AccessGate,
{
    let org_id = actor.org_id;

    let (account, keypair) = custodian::create_custodian(tx, org_id, &request.name).await?;

    let slug = allocate_slug(tx, org_id, request).await?;
    let mut project = ProjectRecord::new(org_id, request.name.clone(), slug);
    if let Some(limit) = request.version_retention {
        project.version_retention = limit;
    }
    tx.insert_project(project.clone()).await?;

    tx.insert_membership(MembershipRecord {
        id: MembershipId::new(),
        project_id: project.id,
        principal: ProjectPrincipal::Custodian { id: account.id },
        role: RoleBinding::Admin,
    })
    .await?;

    let params = indexer.derive_params(org_id).await?;
    tx.insert_blind_index(BlindIndexRecord {
        id: GrantId::new(),
        project_id: project.id,
        params,
    })
    .await?;

    let mut environments = Vec::with_capacity(DEFAULT_ENVIRONMENTS.len());
    for (position, (name, env_slug)) in DEFAULT_ENVIRONMENTS.iter().enumerate() {
        let environment = EnvironmentRecord {
            id: EnvironmentId::new(),
            project_id: project.id,
            name: (*name).to_string(),
            slug: (*env_slug).to_string(),
            position: position as u32 + 1,
        };
        tx.insert_environment(environment.clone()).await?;
        tx.insert_folder(FolderRecord {
            id: FolderId::new(),
            environment_id: environment.id,
            name: ROOT_FOLDER_NAME.to_string(),
        })
        .await?;
        environments.push(environment);
    }

    let custodian_copy = custody.generate_project_key(&keypair)?;
    tx.insert_key_grant(KeyGrantRecord {
        id: GrantId::new(),
        project_id: project.id,
        recipient: ProjectPrincipal::Custodian { id: account.id },
        sender: ProjectPrincipal::Custodian { id: account.id },
        wrapped: custodian_copy.clone(),
    })
    .await?;

    let sealed_secret_key = custody.seal_private_key(&keypair.secret)?;
    tx.insert_custodian_key_record(CustodianKeyRecord {
        id: GrantId::new(),
        project_id: project.id,
        account_id: account.id,
        public_key: keypair.public,
        sealed_secret_key,
        wrapped_project_key: custodian_copy.clone(),
    })
    .await?;

    match actor.actor {
        Actor::User { id: user_id } => {
            let registered = store
                .user_public_key(user_id)
                .await?
                .ok_or_else(|| Error::not_found("initiating user public key"))?;
            let actor_copy =
                custody.wrap_for_recipient(&custodian_copy, &keypair, &registered.public_key)?;
            tx.insert_membership(MembershipRecord {
                id: MembershipId::new(),
                project_id: project.id,
                principal: ProjectPrincipal::User { id: user_id },
                role: RoleBinding::Admin,
            })
            .await?;
            tx.insert_key_grant(KeyGrantRecord {
                id: GrantId::new(),
                project_id: project.id,
                recipient: ProjectPrincipal::User { id: user_id },
                sender: ProjectPrincipal::Custodian { id: account.id },
                wrapped: actor_copy,
            })
            .await?;
        }
        Actor::Identity { id: identity_id } => {
            let membership = store
                .identity_org_membership(identity_id, org_id)
                .await?
                .ok_or_else(|| Error::not_found("identity organization membership"))?;
            let (effective, custom_role) =
                gate.org_permission_by_role(&membership.role, org_id).await?;
            if !creator.is_at_least_as_privileged(&effective) {
                return Err(Error::PrivilegeEscalationDenied {
                    detail: format!(
                        "identity {identity_id} would receive a role exceeding the creating actor's organization privilege"
                    ),
                });
            }
            let role = match custom_role {
                Some(custom) => RoleBinding::Custom { id: custom.id },
                None => RoleBinding::Admin,
            };
            // Identity secret access is brokered through the custodian at
            // read time; no wrapped-key grant row is written on this path.
            tx.insert_identity_membership(IdentityMembershipRecord {
                id: MembershipId::new(),
                project_id: project.id,
                identity_id,
                role,
            })
            .await?;
        }
    }

    Ok(ProjectAggregate {
        project,
        environments,
    })
}

async fn allocate_slug<T: WorkspaceTx>(
    tx: &mut T,
    org_id: OrgId,
    request: &ProvisionRequest,
) -> Result<String> {
    if let Some(supplied) = &request.slug {
        slug::validate(supplied)?;
        if tx.slug_taken(org_id, supplied).await? {
            return Err(Error::InvalidInput {
                field: "slug",
                reason: format!("{supplied:?} is already in use in this organization"),
            });
        }
        return Ok(supplied.clone());
    }

    for _ in 0..SLUG_ATTEMPTS {
        let candidate = slug::randomized(&request.name);
        if !tx.slug_taken(org_id, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(Error::Integrity(
        "could not allocate a unique workspace slug".into(),
    ))
}

