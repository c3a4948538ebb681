use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Role, RoleId};

/// Persisted role plus the bookkeeping needed for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRole {
    pub role: Role,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Implementations must make `compare_and_swap` a single atomic step: the write lands only
/// when the stored version still equals `expected_version`.
pub trait RoleStore: Send + Sync {
    fn insert(&self, role: Role) -> Result<StoredRole, StoreError>;
    fn fetch(&self, id: &RoleId) -> Result<Option<StoredRole>, StoreError>;
    fn compare_and_swap(&self, expected_version: u64, role: Role)
        -> Result<StoredRole, StoreError>;
    fn remove(&self, id: &RoleId) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,
    #[error("record not found")]
    NotFound,
    #[error("version mismatch (expected {expected}, found {found})")]
    VersionMismatch { expected: u64, found: u64 },
    #[error("store timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
