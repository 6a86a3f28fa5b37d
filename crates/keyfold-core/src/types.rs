use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing identifier value.
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Underlying identifier value.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Tenant boundary owning workspaces and memberships.
    OrgId
);
id_type!(
    /// Isolated secret-storage workspace under an organization.
    ProjectId
);
id_type!(
    /// Human principal.
    UserId
);
id_type!(
    /// Machine identity principal.
    IdentityId
);
id_type!(
    /// Synthetic custodian ("ghost") account.
    AccountId
);
id_type!(
    /// Organization-defined custom role.
    CustomRoleId
);
id_type!(
    /// Workspace environment.
    EnvironmentId
);
id_type!(
    /// Secret folder.
    FolderId
);
id_type!(
    /// Project or organization membership row.
    MembershipId
);
id_type!(
    /// Wrapped-key grant row.
    GrantId
);

/// Initiating principal of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    User { id: UserId },
    Identity { id: IdentityId },
}

/// How the actor authenticated; forwarded to permission lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiToken,
    IdentityAccessToken,
}

/// Actor descriptor attached to every public operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub actor: Actor,
    pub org_id: OrgId,
    pub auth_method: AuthMethod,
}

impl ActorContext {
    pub fn new(actor: Actor, org_id: OrgId, auth_method: AuthMethod) -> Self {
        Self {
            actor,
            org_id,
            auth_method,
        }
    }
}

/// Fixed project role used by role-level gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Admin,
    Member,
}

/// Role persisted on a project membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleBinding {
    Admin,
    Member,
    Custom { id: CustomRoleId },
}

impl RoleBinding {
    /// Whether this binding satisfies the given fixed role.
    pub fn satisfies(&self, role: ProjectRole) -> bool {
        matches!(
            (self, role),
            (RoleBinding::Admin, ProjectRole::Admin) | (RoleBinding::Member, ProjectRole::Member)
        )
    }
}

/// Organization-level role of a membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum OrgRole {
    Admin,
    Member,
    NoAccess,
    Custom { id: CustomRoleId },
}

/// Marker for an asynchronous workspace schema migration.
///
/// Transitions are driven entirely by the external upgrade executor; this
/// core reads and reports the marker and only enqueues the initial job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    InProgress,
    Completed,
    Failed,
}

/// Workspace lookup key: direct identifier or org-scoped slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSelector {
    Id(ProjectId),
    Slug { org_id: OrgId, slug: String },
}

/// Latest workspace schema version provisioned for new projects.
pub const LATEST_SCHEMA_VERSION: u32 = 3;

/// Default point-in-time version retention for new projects.
pub const DEFAULT_VERSION_RETENTION: u32 = 10;

/// Seconds since the Unix epoch, saturating at zero on clock skew.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_binding_satisfies_fixed_roles() {
        assert!(RoleBinding::Admin.satisfies(ProjectRole::Admin));
        assert!(RoleBinding::Member.satisfies(ProjectRole::Member));
        assert!(!RoleBinding::Member.satisfies(ProjectRole::Admin));
        assert!(!RoleBinding::Custom {
            id: CustomRoleId::new()
        }
        .satisfies(ProjectRole::Admin));
    }

    #[test]
    fn actor_serializes_with_kind_tag() {
        let actor = Actor::User { id: UserId::new() };
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["kind"], "user");
    }
}
