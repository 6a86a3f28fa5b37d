//! Authorization contracts consumed by the lifecycle core.
//!
//! The permission-rule engine itself lives upstream; this core consumes its
//! typed decisions and the privilege-comparison primitive, and never branches
//! on untyped permission shapes.

use crate::errors::{Error, Result};
use crate::store::{CustomRoleRecord, OrgMembershipRecord, ProjectRecord};
use crate::types::{ActorContext, OrgId, OrgRole, ProjectRole, RoleBinding};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization-level capability checked before provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgAction {
    CreateWorkspace,
}

impl fmt::Display for OrgAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrgAction::CreateWorkspace => f.write_str("create workspace"),
        }
    }
}

/// Project-level capability checked by lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Read,
    EditSettings,
    Delete,
    ReadSecrets,
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProjectAction::Read => "read workspace",
            ProjectAction::EditSettings => "edit workspace settings",
            ProjectAction::Delete => "delete workspace",
            ProjectAction::ReadSecrets => "read secrets",
        };
        f.write_str(label)
    }
}

/// Ordered privilege tier backing the escalation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeTier {
    NoAccess,
    Member,
    Admin,
}

/// Effective organization permission of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgPermission {
    tier: PrivilegeTier,
    role: OrgRole,
}

impl OrgPermission {
    pub fn new(tier: PrivilegeTier, role: OrgRole) -> Self {
        Self { tier, role }
    }

    pub fn tier(&self) -> PrivilegeTier {
        self.tier
    }

    pub fn role(&self) -> &OrgRole {
        &self.role
    }

    /// Privilege-comparison primitive: whether a granter holding `self` may
    /// hand out a role carrying `grantee` without escalating. Must be called
    /// before any role is persisted for a machine-identity actor.
    pub fn is_at_least_as_privileged(&self, grantee: &OrgPermission) -> bool {
        self.tier >= grantee.tier
    }
}

/// Outcome of an organization-level authorization check.
#[derive(Debug, Clone)]
pub enum OrgDecision {
    Granted {
        permission: OrgPermission,
        membership: Option<OrgMembershipRecord>,
    },
    Denied {
        reason: String,
    },
}

/// Granted organization access, extracted from a decision.
#[derive(Debug, Clone)]
pub struct OrgGrant {
    pub permission: OrgPermission,
    pub membership: Option<OrgMembershipRecord>,
}

impl OrgDecision {
    /// Convert into the error taxonomy, denying before any mutation.
    pub fn require(self, action: OrgAction) -> Result<OrgGrant> {
        match self {
            OrgDecision::Granted {
                permission,
                membership,
            } => Ok(OrgGrant {
                permission,
                membership,
            }),
            OrgDecision::Denied { reason } => Err(Error::denied(format!("{action}: {reason}"))),
        }
    }
}

/// Outcome of a project-level authorization check.
#[derive(Debug, Clone)]
pub enum ProjectDecision {
    Granted { roles: Vec<RoleBinding> },
    Denied { reason: String },
}

/// Granted project access with the actor's role bindings for role-level
/// gates layered on top of the capability check.
#[derive(Debug, Clone)]
pub struct ProjectGrant {
    roles: Vec<RoleBinding>,
}

impl ProjectGrant {
    pub fn has_role(&self, role: ProjectRole) -> bool {
        self.roles.iter().any(|binding| binding.satisfies(role))
    }

    /// Second-level gate: require an explicit fixed role beyond the
    /// capability decision.
    pub fn require_role(&self, role: ProjectRole, operation: &str) -> Result<()> {
        if self.has_role(role) {
            return Ok(());
        }
        Err(Error::denied(format!("{operation} requires the {role:?} role")))
    }
}

impl ProjectDecision {
    pub fn require(self, action: ProjectAction) -> Result<ProjectGrant> {
        match self {
            ProjectDecision::Granted { roles } => Ok(ProjectGrant { roles }),
            ProjectDecision::Denied { reason } => Err(Error::denied(format!("{action}: {reason}"))),
        }
    }
}

/// Permission evaluation consumed from the upstream rule engine. Lookups may
/// perform I/O (role and membership queries) and can suspend.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// Evaluate an organization-level action for the actor.
    async fn org_access(
        &self,
        actor: &ActorContext,
        org_id: OrgId,
        action: OrgAction,
    ) -> Result<OrgDecision>;

    /// Evaluate a project-level action for the actor.
    async fn project_access(
        &self,
        actor: &ActorContext,
        project: &ProjectRecord,
        action: ProjectAction,
    ) -> Result<ProjectDecision>;

    /// Effective organization permission conferred by a role, plus the
    /// custom-role record when the role is organization-defined.
    async fn org_permission_by_role(
        &self,
        role: &OrgRole,
        org_id: OrgId,
    ) -> Result<(OrgPermission, Option<CustomRoleRecord>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(tier: PrivilegeTier) -> OrgPermission {
        let role = match tier {
            PrivilegeTier::Admin => OrgRole::Admin,
            PrivilegeTier::Member => OrgRole::Member,
            PrivilegeTier::NoAccess => OrgRole::NoAccess,
        };
        OrgPermission::new(tier, role)
    }

    #[test]
    fn privilege_lattice_ordering() {
        let admin = permission(PrivilegeTier::Admin);
        let member = permission(PrivilegeTier::Member);
        let none = permission(PrivilegeTier::NoAccess);

        assert!(admin.is_at_least_as_privileged(&member));
        assert!(admin.is_at_least_as_privileged(&admin));
        assert!(member.is_at_least_as_privileged(&none));
        assert!(!member.is_at_least_as_privileged(&admin));
        assert!(!none.is_at_least_as_privileged(&member));
    }

    #[test]
    fn denied_decision_maps_to_authorization_error() {
        let decision = OrgDecision::Denied {
            reason: "no membership".into(),
        };
        let err = decision.require(OrgAction::CreateWorkspace).unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied { .. }));
    }

    #[test]
    fn project_grant_role_gate() {
        let grant = ProjectDecision::Granted {
            roles: vec![RoleBinding::Member],
        }
        .require(ProjectAction::Delete)
        .unwrap();

        assert!(grant.has_role(ProjectRole::Member));
        assert!(grant
            .require_role(ProjectRole::Admin, "workspace upgrade")
            .is_err());
    }
}
