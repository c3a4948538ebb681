//! Pure capacity accounting for role applications.
//!
//! Nothing here performs I/O. Every operation takes the current [`Role`] by reference and
//! either produces the next state or a typed [`AllocationError`], leaving the input intact.

use serde::{Deserialize, Serialize};

use super::domain::{Applicant, ApplicantStatus, Role, UserId};

/// State change requested against a single role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Apply(UserId),
    SetStatus {
        user_id: UserId,
        status: ApplicantStatus,
    },
    AdjustOpenings(OpeningsDelta),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpeningsDelta {
    Increase,
    Decrease,
}

/// Business rejections produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("no positions available")]
    NoPositionsAvailable,
    #[error("user {0} has already applied for this role")]
    DuplicateApplication(UserId),
    #[error("user {0} has not applied for this role")]
    ApplicantNotFound(UserId),
    #[error("cannot reduce openings to {requested} while {accepted} applicants are accepted")]
    BelowAcceptedCount { requested: u32, accepted: u32 },
    #[error("openings cannot grow beyond {max}", max = u32::MAX)]
    CapacityOverflow,
}

/// Result of a successful decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub role: Role,
    /// Applicants dropped by this step, explicit rejections and cascade removals alike.
    pub removed: Vec<Applicant>,
    pub changed: bool,
}

impl Transition {
    fn unchanged(role: &Role) -> Self {
        Self {
            role: role.clone(),
            removed: Vec::new(),
            changed: false,
        }
    }

    fn changed(role: Role, removed: Vec<Applicant>) -> Self {
        Self {
            role,
            removed,
            changed: true,
        }
    }
}

/// Slots released (+1) or consumed (-1) when an applicant moves from `old` to `new`.
pub fn capacity_delta(old: ApplicantStatus, new: ApplicantStatus) -> i8 {
    match (old.is_accepted(), new.is_accepted()) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    }
}

pub fn decide(role: &Role, operation: &Operation) -> Result<Transition, AllocationError> {
    match operation {
        Operation::Apply(user_id) => apply(role, user_id),
        Operation::SetStatus { user_id, status } => set_status(role, user_id, *status),
        Operation::AdjustOpenings(delta) => adjust_openings(role, *delta),
    }
}

pub fn apply(role: &Role, user_id: &UserId) -> Result<Transition, AllocationError> {
    if role.positions_available() == 0 {
        return Err(AllocationError::NoPositionsAvailable);
    }
    if role.applicant(user_id).is_some() {
        return Err(AllocationError::DuplicateApplication(user_id.clone()));
    }

    let mut next = role.clone();
    next.applicants_mut().push(Applicant {
        user_id: user_id.clone(),
        status: ApplicantStatus::Applied,
    });
    Ok(Transition::changed(next, Vec::new()))
}

pub fn set_status(
    role: &Role,
    user_id: &UserId,
    status: ApplicantStatus,
) -> Result<Transition, AllocationError> {
    let index = role.position_of(user_id);

    // A full role answers every new accept the same way, even for applicants the
    // exhaustion cascade already removed.
    let already_accepted =
        index.is_some_and(|index| role.applicants()[index].status.is_accepted());
    if status.is_accepted() && !already_accepted && role.positions_available() == 0 {
        return Err(AllocationError::NoPositionsAvailable);
    }

    let index = index.ok_or_else(|| AllocationError::ApplicantNotFound(user_id.clone()))?;
    let old = role.applicants()[index].status;

    if old == status {
        return Ok(Transition::unchanged(role));
    }

    let available = match capacity_delta(old, status) {
        1 => role
            .positions_available()
            .checked_add(1)
            .ok_or(AllocationError::CapacityOverflow)?,
        -1 => role
            .positions_available()
            .checked_sub(1)
            .ok_or(AllocationError::NoPositionsAvailable)?,
        _ => role.positions_available(),
    };

    let mut next = role.clone();
    next.set_counters(role.original_positions(), available);

    let mut removed = Vec::new();
    if status == ApplicantStatus::Rejected {
        removed.push(next.applicants_mut().remove(index));
    } else {
        next.applicants_mut()[index].status = status;
    }

    if status.is_accepted() && available == 0 {
        let (kept, dropped): (Vec<_>, Vec<_>) = next
            .applicants_mut()
            .drain(..)
            .partition(|applicant| applicant.status.is_accepted());
        *next.applicants_mut() = kept;
        removed.extend(dropped);
    }

    Ok(Transition::changed(next, removed))
}

pub fn adjust_openings(role: &Role, delta: OpeningsDelta) -> Result<Transition, AllocationError> {
    let mut next = role.clone();
    match delta {
        OpeningsDelta::Increase => {
            let original = role
                .original_positions()
                .checked_add(1)
                .ok_or(AllocationError::CapacityOverflow)?;
            let available = role
                .positions_available()
                .checked_add(1)
                .ok_or(AllocationError::CapacityOverflow)?;
            next.set_counters(original, available);
        }
        OpeningsDelta::Decrease => {
            if role.positions_available() == 0 {
                return Err(AllocationError::NoPositionsAvailable);
            }
            let requested = role.original_positions() - 1;
            let accepted = role.accepted_count();
            if requested < accepted {
                return Err(AllocationError::BelowAcceptedCount {
                    requested,
                    accepted,
                });
            }
            next.set_counters(requested, role.positions_available() - 1);
        }
    }
    Ok(Transition::changed(next, Vec::new()))
}
