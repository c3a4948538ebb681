use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for capacity-limited roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque user identifier issued by the external user directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an application. `Rejected` is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicantStatus {
    Applied,
    Interviewing,
    Accepted,
    Rejected,
}

impl ApplicantStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicantStatus::Applied => "applied",
            ApplicantStatus::Interviewing => "interviewing",
            ApplicantStatus::Accepted => "accepted",
            ApplicantStatus::Rejected => "rejected",
        }
    }

    pub const fn is_accepted(self) -> bool {
        matches!(self, ApplicantStatus::Accepted)
    }
}

/// Application record embedded in its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub user_id: UserId,
    pub status: ApplicantStatus,
}

/// Aggregate tracking capacity and the applicants competing for it.
///
/// The capacity counters are private: only the allocation engine moves them, so every
/// `Role` handed out by this crate satisfies
/// `positions_available + accepted == original_positions`. Deserialization goes through
/// [`Role::restore`] as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoleRecord")]
pub struct Role {
    id: RoleId,
    original_positions: u32,
    positions_available: u32,
    applicants: Vec<Applicant>,
}

impl Role {
    /// Fresh role with every opening available and nobody applied.
    pub fn new(id: RoleId, positions: u32) -> Self {
        Self {
            id,
            original_positions: positions,
            positions_available: positions,
            applicants: Vec::new(),
        }
    }

    /// Rebuild a role from persisted parts, refusing states that break the capacity invariant.
    pub fn restore(
        id: RoleId,
        original_positions: u32,
        positions_available: u32,
        applicants: Vec<Applicant>,
    ) -> Result<Self, RoleStateError> {
        let role = Self {
            id,
            original_positions,
            positions_available,
            applicants,
        };
        role.check_invariants()?;
        Ok(role)
    }

    pub fn id(&self) -> &RoleId {
        &self.id
    }

    pub fn original_positions(&self) -> u32 {
        self.original_positions
    }

    pub fn positions_available(&self) -> u32 {
        self.positions_available
    }

    pub fn applicants(&self) -> &[Applicant] {
        &self.applicants
    }

    pub fn applicant(&self, user_id: &UserId) -> Option<&Applicant> {
        self.applicants
            .iter()
            .find(|applicant| &applicant.user_id == user_id)
    }

    pub fn accepted_count(&self) -> u32 {
        self.applicants
            .iter()
            .filter(|applicant| applicant.status.is_accepted())
            .count() as u32
    }

    pub fn check_invariants(&self) -> Result<(), RoleStateError> {
        if self.positions_available > self.original_positions {
            return Err(RoleStateError::AvailableExceedsOriginal {
                available: self.positions_available,
                original: self.original_positions,
            });
        }

        let accepted = self.accepted_count();
        let occupied = self.positions_available.checked_add(accepted);
        if occupied != Some(self.original_positions) {
            return Err(RoleStateError::CapacityMismatch {
                available: self.positions_available,
                accepted,
                original: self.original_positions,
            });
        }

        let mut seen = HashSet::with_capacity(self.applicants.len());
        for applicant in &self.applicants {
            if applicant.status == ApplicantStatus::Rejected {
                return Err(RoleStateError::RejectedRetained(applicant.user_id.clone()));
            }
            if !seen.insert(&applicant.user_id) {
                return Err(RoleStateError::DuplicateApplicant(applicant.user_id.clone()));
            }
        }

        Ok(())
    }

    pub(crate) fn position_of(&self, user_id: &UserId) -> Option<usize> {
        self.applicants
            .iter()
            .position(|applicant| &applicant.user_id == user_id)
    }

    pub(crate) fn applicants_mut(&mut self) -> &mut Vec<Applicant> {
        &mut self.applicants
    }

    pub(crate) fn set_counters(&mut self, original_positions: u32, positions_available: u32) {
        self.original_positions = original_positions;
        self.positions_available = positions_available;
    }
}

/// Wire shape of a role before its invariants are checked.
#[derive(Deserialize)]
struct RoleRecord {
    id: RoleId,
    original_positions: u32,
    positions_available: u32,
    applicants: Vec<Applicant>,
}

impl TryFrom<RoleRecord> for Role {
    type Error = RoleStateError;

    fn try_from(record: RoleRecord) -> Result<Self, Self::Error> {
        Role::restore(
            record.id,
            record.original_positions,
            record.positions_available,
            record.applicants,
        )
    }
}

/// Reasons a persisted role cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleStateError {
    #[error("positions available ({available}) exceed original positions ({original})")]
    AvailableExceedsOriginal { available: u32, original: u32 },
    #[error("{available} available + {accepted} accepted does not match {original} positions")]
    CapacityMismatch {
        available: u32,
        accepted: u32,
        original: u32,
    },
    #[error("applicant {0} appears more than once")]
    DuplicateApplicant(UserId),
    #[error("rejected applicant {0} was retained")]
    RejectedRetained(UserId),
}
