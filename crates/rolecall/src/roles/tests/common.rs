use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::roles::directory::{AccountRole, DirectoryError, UserDirectory, UserProfile};
use crate::roles::domain::{Role, RoleId, UserId};
use crate::roles::store::{RoleStore, StoreError, StoredRole};
use crate::roles::{role_router, CommitPolicy, RoleApplicationService};

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn profile(id: &str, account_role: AccountRole) -> UserProfile {
    UserProfile {
        user_id: user(id),
        username: format!("student-{id}"),
        email: format!("{id}@campus.example"),
        skills: vec!["design".to_string()],
        account_role,
        admin_of: match account_role {
            AccountRole::BoardAdmin => Some("Technical".to_string()),
            _ => None,
        },
    }
}

pub(super) fn role_with(positions: u32) -> Role {
    Role::new(RoleId("role-fixture".to_string()), positions)
}

pub(super) fn build_service() -> (
    RoleApplicationService<MemoryStore, MemoryDirectory>,
    Arc<MemoryStore>,
    Arc<MemoryDirectory>,
) {
    let store = Arc::new(MemoryStore::default());
    let directory = Arc::new(MemoryDirectory::with_students(&[
        "alice", "bob", "carol", "dave", "erin",
    ]));
    let service = RoleApplicationService::new(
        store.clone(),
        directory.clone(),
        CommitPolicy::default(),
    );
    (service, store, directory)
}

pub(super) fn role_router_with_service(
    service: RoleApplicationService<MemoryStore, MemoryDirectory>,
) -> axum::Router {
    role_router(Arc::new(service))
}

#[derive(Default)]
pub(super) struct MemoryStore {
    pub(super) records: Mutex<HashMap<RoleId, StoredRole>>,
}

impl MemoryStore {
    pub(super) fn snapshot(&self, id: &RoleId) -> Option<StoredRole> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl RoleStore for MemoryStore {
    fn insert(&self, role: Role) -> Result<StoredRole, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.contains_key(role.id()) {
            return Err(StoreError::AlreadyExists);
        }
        let now = Utc::now();
        let stored = StoredRole {
            role,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        guard.insert(stored.role.id().clone(), stored.clone());
        Ok(stored)
    }

    fn fetch(&self, id: &RoleId) -> Result<Option<StoredRole>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(&self, expected_version: u64, role: Role) -> Result<StoredRole, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let current = guard.get_mut(role.id()).ok_or(StoreError::NotFound)?;
        if current.version != expected_version {
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                found: current.version,
            });
        }
        current.role = role;
        current.version += 1;
        current.updated_at = Utc::now();
        Ok(current.clone())
    }

    fn remove(&self, id: &RoleId) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Loses the first `conflicts` conditional writes as if another writer got there first.
pub(super) struct ContendedStore {
    pub(super) inner: MemoryStore,
    conflicts: AtomicU32,
    pub(super) swaps_attempted: AtomicU32,
}

impl ContendedStore {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::default(),
            conflicts: AtomicU32::new(conflicts),
            swaps_attempted: AtomicU32::new(0),
        }
    }
}

impl RoleStore for ContendedStore {
    fn insert(&self, role: Role) -> Result<StoredRole, StoreError> {
        self.inner.insert(role)
    }

    fn fetch(&self, id: &RoleId) -> Result<Option<StoredRole>, StoreError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(&self, expected_version: u64, role: Role) -> Result<StoredRole, StoreError> {
        self.swaps_attempted.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                found: expected_version + 1,
            });
        }
        self.inner.compare_and_swap(expected_version, role)
    }

    fn remove(&self, id: &RoleId) -> Result<(), StoreError> {
        self.inner.remove(id)
    }
}

pub(super) struct UnavailableStore;

impl RoleStore for UnavailableStore {
    fn insert(&self, _role: Role) -> Result<StoredRole, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RoleId) -> Result<Option<StoredRole>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(&self, _expected_version: u64, _role: Role) -> Result<StoredRole, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &RoleId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Serves reads but times out every write.
#[derive(Default)]
pub(super) struct SlowWriteStore {
    pub(super) inner: MemoryStore,
}

impl RoleStore for SlowWriteStore {
    fn insert(&self, role: Role) -> Result<StoredRole, StoreError> {
        self.inner.insert(role)
    }

    fn fetch(&self, id: &RoleId) -> Result<Option<StoredRole>, StoreError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(&self, _expected_version: u64, _role: Role) -> Result<StoredRole, StoreError> {
        Err(StoreError::Timeout)
    }

    fn remove(&self, id: &RoleId) -> Result<(), StoreError> {
        self.inner.remove(id)
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    profiles: Mutex<HashMap<UserId, UserProfile>>,
}

impl MemoryDirectory {
    pub(super) fn with_students(ids: &[&str]) -> Self {
        let directory = Self::default();
        for id in ids {
            directory.add(profile(id, AccountRole::Student));
        }
        directory
    }

    pub(super) fn add(&self, profile: UserProfile) {
        self.profiles
            .lock()
            .expect("directory mutex poisoned")
            .insert(profile.user_id.clone(), profile);
    }

    pub(super) fn forget(&self, id: &str) {
        self.profiles
            .lock()
            .expect("directory mutex poisoned")
            .remove(&user(id));
    }
}

impl UserDirectory for MemoryDirectory {
    fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        let guard = self.profiles.lock().expect("directory mutex poisoned");
        Ok(guard.get(user_id).cloned())
    }
}

pub(super) struct UnavailableDirectory;

impl UserDirectory for UnavailableDirectory {
    fn find(&self, _user_id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
