//! Role applications and position allocation.
//!
//! [`engine`] holds the pure capacity accounting, [`service`] commits its decisions through a
//! [`store::RoleStore`] with compare-and-swap retries, and [`router`] exposes the operations
//! over HTTP.

pub mod directory;
pub mod domain;
pub mod engine;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use directory::{
    enrich, AccountRole, ApplicantView, DirectoryError, UserDirectory, UserProfile,
};
pub use domain::{Applicant, ApplicantStatus, Role, RoleId, RoleStateError, UserId};
pub use engine::{decide, AllocationError, OpeningsDelta, Operation, Transition};
pub use router::{role_router, RoleView};
pub use service::{
    ApplicationServiceError, CommitPolicy, Committed, ErrorKind, RoleApplicationService,
};
pub use store::{RoleStore, StoreError, StoredRole};
