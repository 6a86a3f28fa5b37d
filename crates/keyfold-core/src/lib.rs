//! Provisioning and key-custody core of the keyfold secret-management
//! platform. Creates isolated workspaces and establishes custody of their
//! root key material behind role-based authorization, with every
//! provisioning attempt running as a single all-or-nothing transaction.

pub mod access;
pub mod config;
pub mod crypto;
pub mod custodian;
pub mod errors;
pub mod index;
pub mod lifecycle;
pub mod provision;
pub mod quota;
pub mod slug;
pub mod store;
pub mod types;
pub mod upgrade;

pub use access::{
    AccessGate, OrgAction, OrgDecision, OrgGrant, OrgPermission, PrivilegeTier, ProjectAction,
    ProjectDecision, ProjectGrant,
};
pub use config::CustodyConfig;
pub use crypto::{
    CustodianKeypair, KeyCustodyEngine, PublicKeyBytes, SealAlgorithm, SealEncoding, SealedKey,
    SecretKeyBytes, WrapAlgorithm, WrappedKey,
};
pub use errors::{Error, Result};
pub use index::{BlindIndexParams, BlindIndexProvider};
pub use lifecycle::{Collaborators, WorkspaceService};
pub use provision::{ProvisionRequest, DEFAULT_ENVIRONMENTS};
pub use quota::{plan_usage_key, Plan, PlanGate, UsageCache};
pub use store::{
    BlindIndexRecord, CustodianAccountRecord, CustodianKeyRecord, CustomRoleRecord,
    EnvironmentRecord, FolderRecord, IdentityMembershipRecord, IdentityOrgMembershipRecord,
    KeyGrantRecord, MembershipRecord, OrgMembershipRecord, ProjectAggregate, ProjectPatch,
    ProjectPrincipal, ProjectRecord, UserPublicKeyRecord, WorkspaceStore, WorkspaceTx,
};
pub use types::{
    AccountId, Actor, ActorContext, AuthMethod, CustomRoleId, EnvironmentId, FolderId, GrantId,
    IdentityId, MembershipId, OrgId, OrgRole, ProjectId, ProjectRole, ProjectSelector,
    RoleBinding, UpgradeStatus, UserId, DEFAULT_VERSION_RETENTION, LATEST_SCHEMA_VERSION,
};
pub use upgrade::{UpgradeExecutor, UpgradeJob};
