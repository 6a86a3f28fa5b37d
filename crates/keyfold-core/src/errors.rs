use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for provisioning and lifecycle operations.
///
/// Authorization and quota failures are raised before the provisioning
/// transaction opens and leave no side effects. Errors raised inside the
/// transaction cause a full rollback; nothing is retried automatically.
/// Messages carry enough context to act on without leaking key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("authorization denied: {reason}")]
    AuthorizationDenied { reason: String },
    #[error("privilege escalation denied: {detail}")]
    PrivilegeEscalationDenied { detail: String },
    #[error("workspace limit reached ({used}/{limit}); upgrade the plan to create more workspaces")]
    QuotaExceeded { limit: u32, used: u32 },
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("{field} is invalid: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("integrity failure: {0}")]
    Integrity(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for a missing referenced entity.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Shorthand for a denied permission check.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }
}
