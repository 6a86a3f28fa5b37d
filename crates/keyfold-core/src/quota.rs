//! Plan-limit facts and the plan-usage cache consumed around provisioning.

use crate::errors::Result;
use crate::types::OrgId;
use async_trait::async_trait;

/// Plan usage facts for an organization, supplied by the licensing
/// collaborator before provisioning. `workspace_limit` of `None` means
/// unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub workspace_limit: Option<u32>,
    pub workspaces_used: u32,
}

impl Plan {
    pub fn at_capacity(&self) -> bool {
        matches!(self.workspace_limit, Some(limit) if self.workspaces_used >= limit)
    }
}

/// Licensing lookup. Checked before the provisioning transaction opens so a
/// denial leaves no partial state.
#[async_trait]
pub trait PlanGate: Send + Sync {
    async fn plan(&self, org_id: OrgId) -> Result<Plan>;
}

/// Cached plan-usage invalidation. The cache is the only consistency
/// mechanism for the plan-limit check under concurrent creations; a brief
/// overshoot is tolerated rather than serialized.
#[async_trait]
pub trait UsageCache: Send + Sync {
    async fn invalidate(&self, key: &str) -> Result<()>;
}

/// Cache key for an organization's plan-usage counter.
pub fn plan_usage_key(org_id: OrgId) -> String {
    format!("plan-usage-{org_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_checks() {
        assert!(Plan {
            workspace_limit: Some(1),
            workspaces_used: 1
        }
        .at_capacity());
        assert!(!Plan {
            workspace_limit: Some(2),
            workspaces_used: 1
        }
        .at_capacity());
        assert!(!Plan {
            workspace_limit: None,
            workspaces_used: 999
        }
        .at_capacity());
    }

    #[test]
    fn usage_key_format() {
        let org = OrgId::new();
        assert_eq!(plan_usage_key(org), format!("plan-usage-{org}"));
    }
}
