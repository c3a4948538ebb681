use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::directory::{enrich, ApplicantView, DirectoryError, UserDirectory};
use super::domain::{Applicant, ApplicantStatus, Role, RoleId, UserId};
use super::engine::{self, AllocationError, OpeningsDelta, Operation};
use super::store::{RoleStore, StoreError, StoredRole};

const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Bounds how often a conditional write is re-decided after losing a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    max_attempts: u32,
}

impl CommitPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMIT_ATTEMPTS)
    }
}

/// Committed role state plus anyone removed on the way there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committed {
    pub record: StoredRole,
    pub removed: Vec<Applicant>,
}

impl Committed {
    pub fn role(&self) -> &Role {
        &self.record.role
    }
}

/// Service composing the allocation engine, role store, and user directory.
pub struct RoleApplicationService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    policy: CommitPolicy,
}

static ROLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_role_id() -> RoleId {
    let id = ROLE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RoleId(format!("role-{id:06}"))
}

impl<S, D> RoleApplicationService<S, D>
where
    S: RoleStore + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, policy: CommitPolicy) -> Self {
        Self {
            store,
            directory,
            policy,
        }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Open a new role with every position available.
    pub fn create_role(&self, positions: u32) -> Result<StoredRole, ApplicationServiceError> {
        let role = Role::new(next_role_id(), positions);
        let stored = self.store.insert(role)?;
        info!(role_id = %stored.role.id(), positions, "role created");
        Ok(stored)
    }

    pub fn get_role(&self, role_id: &RoleId) -> Result<StoredRole, ApplicationServiceError> {
        self.load(role_id)
    }

    pub fn delete_role(&self, role_id: &RoleId) -> Result<(), ApplicationServiceError> {
        match self.store.remove(role_id) {
            Ok(()) => {
                info!(%role_id, "role deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                Err(ApplicationServiceError::RoleNotFound(role_id.clone()))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Record a new application after confirming the user may apply.
    pub fn apply(
        &self,
        role_id: &RoleId,
        user_id: &UserId,
    ) -> Result<Committed, ApplicationServiceError> {
        let profile = self
            .directory
            .find(user_id)?
            .ok_or_else(|| ApplicationServiceError::UserNotFound(user_id.clone()))?;
        if profile.account_role.is_administrator() {
            return Err(ApplicationServiceError::Forbidden(user_id.clone()));
        }

        self.commit(role_id, Operation::Apply(user_id.clone()))
    }

    pub fn set_status(
        &self,
        role_id: &RoleId,
        user_id: &UserId,
        status: ApplicantStatus,
    ) -> Result<Committed, ApplicationServiceError> {
        let committed = self.commit(
            role_id,
            Operation::SetStatus {
                user_id: user_id.clone(),
                status,
            },
        )?;

        let cascaded = committed
            .removed
            .iter()
            .filter(|applicant| &applicant.user_id != user_id)
            .count();
        if cascaded > 0 {
            info!(%role_id, cascaded, "positions exhausted, pending applicants removed");
        }
        Ok(committed)
    }

    pub fn increase_openings(&self, role_id: &RoleId) -> Result<Committed, ApplicationServiceError> {
        self.commit(role_id, Operation::AdjustOpenings(OpeningsDelta::Increase))
    }

    pub fn decrease_openings(&self, role_id: &RoleId) -> Result<Committed, ApplicationServiceError> {
        self.commit(role_id, Operation::AdjustOpenings(OpeningsDelta::Decrease))
    }

    /// Applicants joined with directory profiles; unknown users are left out.
    pub fn list_applicants(
        &self,
        role_id: &RoleId,
    ) -> Result<Vec<ApplicantView>, ApplicationServiceError> {
        let stored = self.load(role_id)?;
        let ids: Vec<UserId> = stored
            .role
            .applicants()
            .iter()
            .map(|applicant| applicant.user_id.clone())
            .collect();
        let profiles = self.directory.find_many(&ids)?;
        Ok(enrich(stored.role.applicants(), profiles))
    }

    fn load(&self, role_id: &RoleId) -> Result<StoredRole, ApplicationServiceError> {
        self.store
            .fetch(role_id)?
            .ok_or_else(|| ApplicationServiceError::RoleNotFound(role_id.clone()))
    }

    /// Read, decide, and conditionally write until the write lands or attempts run out.
    fn commit(
        &self,
        role_id: &RoleId,
        operation: Operation,
    ) -> Result<Committed, ApplicationServiceError> {
        let attempts = self.policy.max_attempts();

        for attempt in 1..=attempts {
            let current = self.load(role_id)?;
            let transition = engine::decide(&current.role, &operation)?;

            if !transition.changed {
                return Ok(Committed {
                    record: current,
                    removed: Vec::new(),
                });
            }

            match self.store.compare_and_swap(current.version, transition.role) {
                Ok(record) => {
                    debug!(
                        %role_id,
                        version = record.version,
                        available = record.role.positions_available(),
                        original = record.role.original_positions(),
                        "role update committed"
                    );
                    return Ok(Committed {
                        record,
                        removed: transition.removed,
                    });
                }
                Err(StoreError::VersionMismatch { expected, found }) => {
                    debug!(%role_id, attempt, expected, found, "concurrent update, retrying");
                }
                Err(StoreError::NotFound) => {
                    return Err(ApplicationServiceError::RoleNotFound(role_id.clone()));
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(%role_id, attempts, "gave up after repeated concurrent updates");
        Err(ApplicationServiceError::Conflict {
            role_id: role_id.clone(),
            attempts,
        })
    }
}

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvariantGuard,
    Conflict,
    Infrastructure,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvariantGuard => "invariant_guard",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

/// Error raised by the role application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("role {0} not found")]
    RoleNotFound(RoleId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("administrators cannot apply for roles (user {0})")]
    Forbidden(UserId),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("role {role_id} kept changing underneath {attempts} update attempts")]
    Conflict { role_id: RoleId, attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ApplicationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationServiceError::RoleNotFound(_)
            | ApplicationServiceError::UserNotFound(_)
            | ApplicationServiceError::Allocation(AllocationError::ApplicantNotFound(_)) => {
                ErrorKind::NotFound
            }
            ApplicationServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ApplicationServiceError::Allocation(_) => ErrorKind::InvariantGuard,
            ApplicationServiceError::Conflict { .. }
            | ApplicationServiceError::Store(StoreError::AlreadyExists)
            | ApplicationServiceError::Store(StoreError::VersionMismatch { .. }) => {
                ErrorKind::Conflict
            }
            ApplicationServiceError::Store(_) | ApplicationServiceError::Directory(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}
