use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{Applicant, ApplicantStatus, UserId};

/// Account tier recorded by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRole {
    Student,
    BoardAdmin,
    SuperAdmin,
}

impl AccountRole {
    pub const fn is_administrator(self) -> bool {
        matches!(self, AccountRole::BoardAdmin | AccountRole::SuperAdmin)
    }
}

/// Public profile fields. Credentials never leave the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub account_role: AccountRole,
    /// Board managed by a `BoardAdmin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_of: Option<String>,
}

/// Lookup hooks into the external user directory.
pub trait UserDirectory: Send + Sync {
    fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, DirectoryError>;

    /// Batch lookup; ids without a profile are simply absent from the result.
    fn find_many(&self, user_ids: &[UserId]) -> Result<Vec<UserProfile>, DirectoryError> {
        let mut profiles = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(profile) = self.find(user_id)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Applicant profile merged with the application status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub application_status: ApplicantStatus,
}

/// Join applicants with their profiles, preserving application order.
pub fn enrich(applicants: &[Applicant], profiles: Vec<UserProfile>) -> Vec<ApplicantView> {
    let mut by_id: HashMap<UserId, UserProfile> = profiles
        .into_iter()
        .map(|profile| (profile.user_id.clone(), profile))
        .collect();

    applicants
        .iter()
        .filter_map(|applicant| {
            by_id
                .remove(&applicant.user_id)
                .map(|profile| ApplicantView {
                    profile,
                    application_status: applicant.status,
                })
        })
        .collect()
}
