use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use rolecall::roles::{
    AccountRole, DirectoryError, Role, RoleId, RoleStore, StoreError, StoredRole, UserDirectory,
    UserId, UserProfile,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

type RoleEntry = Arc<Mutex<Option<StoredRole>>>;

/// Role store with one lock per record. The map lock is only held to find or add an entry,
/// so compare-and-swap on one role never waits on writes to another.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRoleStore {
    records: Arc<RwLock<HashMap<RoleId, RoleEntry>>>,
}

impl InMemoryRoleStore {
    fn entry(&self, id: &RoleId) -> Option<RoleEntry> {
        let guard = self.records.read().expect("store map lock poisoned");
        guard.get(id).cloned()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn insert(&self, role: Role) -> Result<StoredRole, StoreError> {
        let mut guard = self.records.write().expect("store map lock poisoned");
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
        guard.insert(
            stored.role.id().clone(),
            Arc::new(Mutex::new(Some(stored.clone()))),
        );
        Ok(stored)
    }

    fn fetch(&self, id: &RoleId) -> Result<Option<StoredRole>, StoreError> {
        let Some(entry) = self.entry(id) else {
            return Ok(None);
        };
        let record = entry.lock().expect("role entry poisoned");
        Ok(record.clone())
    }

    fn compare_and_swap(&self, expected_version: u64, role: Role) -> Result<StoredRole, StoreError> {
        let entry = self.entry(role.id()).ok_or(StoreError::NotFound)?;
        let mut record = entry.lock().expect("role entry poisoned");
        // A removal that raced this write leaves the entry emptied.
        let current = record.as_mut().ok_or(StoreError::NotFound)?;
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
        let entry = {
            let mut guard = self.records.write().expect("store map lock poisoned");
            guard.remove(id).ok_or(StoreError::NotFound)?
        };
        entry.lock().expect("role entry poisoned").take();
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUserDirectory {
    profiles: Arc<RwLock<HashMap<UserId, UserProfile>>>,
}

impl InMemoryUserDirectory {
    /// Directory seeded with the accounts used by the demo and local runs.
    pub(crate) fn seeded() -> Self {
        let directory = Self::default();
        for (id, username, account_role, admin_of) in [
            ("u-1001", "asha", AccountRole::Student, None),
            ("u-1002", "bruno", AccountRole::Student, None),
            ("u-1003", "chen", AccountRole::Student, None),
            ("u-1004", "dana", AccountRole::Student, None),
            ("u-9001", "tech-board", AccountRole::BoardAdmin, Some("Technical")),
            ("u-9999", "root", AccountRole::SuperAdmin, None),
        ] {
            directory.upsert(UserProfile {
                user_id: UserId(id.to_string()),
                username: username.to_string(),
                email: format!("{username}@campus.example"),
                skills: Vec::new(),
                account_role,
                admin_of: admin_of.map(str::to_string),
            });
        }
        directory
    }

    pub(crate) fn upsert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .expect("directory lock poisoned")
            .insert(profile.user_id.clone(), profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, DirectoryError> {
        let guard = self.profiles.read().expect("directory lock poisoned");
        Ok(guard.get(user_id).cloned())
    }

    fn find_many(&self, user_ids: &[UserId]) -> Result<Vec<UserProfile>, DirectoryError> {
        let guard = self.profiles.read().expect("directory lock poisoned");
        Ok(user_ids
            .iter()
            .filter_map(|id| guard.get(id).cloned())
            .collect())
    }
}
