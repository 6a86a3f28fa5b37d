//! Fixtures shared by the provisioning and lifecycle suites.
#![allow(dead_code)]

use async_trait::async_trait;
use keyfold_core::access::{
    AccessGate, OrgAction, OrgDecision, OrgPermission, PrivilegeTier, ProjectAction,
    ProjectDecision,
};
use keyfold_core::errors::Result;
use keyfold_core::index::{BlindIndexParams, BlindIndexProvider};
use keyfold_core::quota::{Plan, PlanGate, UsageCache};
use keyfold_core::store::{CustomRoleRecord, ProjectRecord, UserPublicKeyRecord};
use keyfold_core::types::{
    Actor, ActorContext, AuthMethod, CustomRoleId, IdentityId, OrgId, OrgRole, RoleBinding,
    UserId,
};
use keyfold_core::upgrade::{UpgradeExecutor, UpgradeJob};
use keyfold_core::{
    Collaborators, CustodianKeypair, CustodyConfig, KeyCustodyEngine, SealAlgorithm, SealEncoding,
    SealedKey, WorkspaceService,
};
use keyfold_memstore::MemoryStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const TEST_MASTER_SECRET: [u8; 32] = [42u8; 32];

pub fn engine() -> KeyCustodyEngine {
    let config = CustodyConfig::new(TEST_MASTER_SECRET.to_vec()).expect("config");
    KeyCustodyEngine::new(&config).expect("engine")
}

/// Canned authorization gate: fixed answers instead of a rule engine.
#[derive(Clone)]
pub struct StaticGate {
    pub allow_org: bool,
    pub org_tier: PrivilegeTier,
    pub allow_project: bool,
    pub project_roles: Vec<RoleBinding>,
    pub custom_roles: HashMap<CustomRoleId, (PrivilegeTier, CustomRoleRecord)>,
}

impl StaticGate {
    pub fn admin() -> Self {
        Self {
            allow_org: true,
            org_tier: PrivilegeTier::Admin,
            allow_project: true,
            project_roles: vec![RoleBinding::Admin],
            custom_roles: HashMap::new(),
        }
    }

    pub fn with_org_tier(mut self, tier: PrivilegeTier) -> Self {
        self.org_tier = tier;
        self
    }

    pub fn with_project_roles(mut self, roles: Vec<RoleBinding>) -> Self {
        self.project_roles = roles;
        self
    }

    pub fn deny_org(mut self) -> Self {
        self.allow_org = false;
        self
    }

    pub fn with_custom_role(mut self, record: CustomRoleRecord, tier: PrivilegeTier) -> Self {
        self.custom_roles.insert(record.id, (tier, record));
        self
    }
}

fn role_for_tier(tier: PrivilegeTier) -> OrgRole {
    match tier {
        PrivilegeTier::Admin => OrgRole::Admin,
        PrivilegeTier::Member => OrgRole::Member,
        PrivilegeTier::NoAccess => OrgRole::NoAccess,
    }
}

#[async_trait]
impl AccessGate for StaticGate {
    async fn org_access(
        &self,
        _actor: &ActorContext,
        _org_id: OrgId,
        _action: OrgAction,
    ) -> Result<OrgDecision> {
        if self.allow_org {
            Ok(OrgDecision::Granted {
                permission: OrgPermission::new(self.org_tier, role_for_tier(self.org_tier)),
                membership: None,
            })
        } else {
            Ok(OrgDecision::Denied {
                reason: "no organization membership".into(),
            })
        }
    }

    async fn project_access(
        &self,
        _actor: &ActorContext,
        _project: &ProjectRecord,
        _action: ProjectAction,
    ) -> Result<ProjectDecision> {
        if self.allow_project {
            Ok(ProjectDecision::Granted {
                roles: self.project_roles.clone(),
            })
        } else {
            Ok(ProjectDecision::Denied {
                reason: "no workspace membership".into(),
            })
        }
    }

    async fn org_permission_by_role(
        &self,
        role: &OrgRole,
        _org_id: OrgId,
    ) -> Result<(OrgPermission, Option<CustomRoleRecord>)> {
        match role {
            OrgRole::Admin => Ok((
                OrgPermission::new(PrivilegeTier::Admin, OrgRole::Admin),
                None,
            )),
            OrgRole::Member => Ok((
                OrgPermission::new(PrivilegeTier::Member, OrgRole::Member),
                None,
            )),
            OrgRole::NoAccess => Ok((
                OrgPermission::new(PrivilegeTier::NoAccess, OrgRole::NoAccess),
                None,
            )),
            OrgRole::Custom { id } => {
                let (tier, record) = self
                    .custom_roles
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| panic!("unregistered custom role {id}"));
                Ok((
                    OrgPermission::new(tier, OrgRole::Custom { id: *id }),
                    Some(record),
                ))
            }
        }
    }
}

pub struct StaticPlans(pub Plan);

#[async_trait]
impl PlanGate for StaticPlans {
    async fn plan(&self, _org_id: OrgId) -> Result<Plan> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub struct RecordingCache {
    keys: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().expect("cache lock").clone()
    }
}

#[async_trait]
impl UsageCache for RecordingCache {
    async fn invalidate(&self, key: &str) -> Result<()> {
        self.keys.lock().expect("cache lock").push(key.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingUpgrades {
    jobs: Mutex<Vec<UpgradeJob>>,
}

impl RecordingUpgrades {
    pub fn jobs(&self) -> Vec<UpgradeJob> {
        self.jobs.lock().expect("jobs lock").clone()
    }
}

#[async_trait]
impl UpgradeExecutor for RecordingUpgrades {
    async fn enqueue(&self, job: UpgradeJob) -> Result<()> {
        self.jobs.lock().expect("jobs lock").push(job);
        Ok(())
    }
}

/// Deterministic stand-in for the blind-index collaborator.
pub struct StubIndexer;

#[async_trait]
impl BlindIndexProvider for StubIndexer {
    async fn derive_params(&self, _org_id: OrgId) -> Result<BlindIndexParams> {
        Ok(BlindIndexParams {
            sealed_salt: SealedKey {
                ciphertext: vec![0x5a; 32],
                iv: vec![0; 12],
                tag: vec![0; 16],
                algorithm: SealAlgorithm::Aes256Gcm,
                encoding: SealEncoding::Base64,
            },
        })
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub service: WorkspaceService<MemoryStore, StaticGate>,
    pub cache: Arc<RecordingCache>,
    pub upgrades: Arc<RecordingUpgrades>,
}

pub fn harness(gate: StaticGate, plan: Plan) -> Harness {
    let store = MemoryStore::new();
    let cache = Arc::new(RecordingCache::default());
    let upgrades = Arc::new(RecordingUpgrades::default());
    let collaborators = Collaborators {
        plans: Arc::new(StaticPlans(plan)),
        usage_cache: cache.clone(),
        upgrades: upgrades.clone(),
        blind_index: Arc::new(StubIndexer),
    };
    let service = WorkspaceService::new(store.clone(), gate, engine(), collaborators);
    Harness {
        store,
        service,
        cache,
        upgrades,
    }
}

pub fn unlimited_plan() -> Plan {
    Plan {
        workspace_limit: None,
        workspaces_used: 0,
    }
}

pub fn user_actor(org_id: OrgId) -> (ActorContext, UserId) {
    let user_id = UserId::new();
    (
        ActorContext::new(Actor::User { id: user_id }, org_id, AuthMethod::Session),
        user_id,
    )
}

pub fn identity_actor(org_id: OrgId) -> (ActorContext, IdentityId) {
    let identity_id = IdentityId::new();
    (
        ActorContext::new(
            Actor::Identity { id: identity_id },
            org_id,
            AuthMethod::IdentityAccessToken,
        ),
        identity_id,
    )
}

/// Register a user's public key in the directory and hand back the full
/// keypair so tests can prove grant decryptability.
pub async fn register_user(store: &MemoryStore, user_id: UserId) -> CustodianKeypair {
    let keypair = KeyCustodyEngine::generate_keypair();
    store
        .register_user_key(UserPublicKeyRecord {
            user_id,
            public_key: keypair.public,
        })
        .await;
    keypair
}
