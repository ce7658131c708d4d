use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    Identity, IdentityDraft, IdentityPatch, RecordStore, StoreError, StoreResult, TimeEntry, TimeEntryDraft,
    UserKey,
};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    next_user_id: u64,
    next_entry_id: u64,
    users: BTreeMap<u64, Identity>,
    entries: BTreeMap<u64, TimeEntry>,
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    created_ms: i64,
    tables: &'a Tables,
}

#[derive(Deserialize)]
struct SnapshotIn {
    version: u32,
    tables: Tables,
}

impl Tables {
    fn check_unique(&self, email: &str, username: &str, except: Option<u64>) -> StoreResult<()> {
        for u in self.users.values().filter(|u| Some(u.id) != except) {
            if u.email == email {
                return Err(StoreError::Conflict { field: "email" });
            }
            if u.username == username {
                return Err(StoreError::Conflict { field: "username" });
            }
        }
        Ok(())
    }

    fn tenant_user_ids(&self, company: &str) -> Vec<u64> {
        self.users
            .values()
            .filter(|u| u.company.as_deref() == Some(company))
            .map(|u| u.id)
            .collect()
    }
}

/// In-memory `RecordStore`.
///
/// All tables sit behind one lock, so every check-then-write runs inside a
/// single critical section. When opened with a snapshot path the whole table
/// set is rewritten (temp file + rename) after each mutation, while the write
/// lock is still held.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("users", &t.users.len())
            .field("entries", &t.entries.len())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl MemoryStore {
    /// Volatile store; contents are lost on drop.
    pub fn new() -> Self {
        Self { tables: RwLock::new(Tables { next_user_id: 1, next_entry_id: 1, ..Default::default() }), snapshot: None }
    }

    /// Store backed by a JSON snapshot at `path`. Loads it if present.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let snap: SnapshotIn = serde_json::from_slice(&bytes)?;
            if snap.version != SNAPSHOT_VERSION {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unsupported snapshot version {}", snap.version),
                )));
            }
            info!(
                target: "timesheet::storage",
                "loaded snapshot {}: users={}, entries={}",
                path.display(), snap.tables.users.len(), snap.tables.entries.len()
            );
            snap.tables
        } else {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            Tables { next_user_id: 1, next_entry_id: 1, ..Default::default() }
        };
        Ok(Self { tables: RwLock::new(tables), snapshot: Some(path) })
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let Some(path) = &self.snapshot else { return Ok(()) };
        let snap = SnapshotOut { version: SNAPSHOT_VERSION, created_ms: chrono::Utc::now().timestamp_millis(), tables };
        let bytes = serde_json::to_vec_pretty(&snap)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        debug!(target: "timesheet::storage", "snapshot written: {}", path.display());
        Ok(())
    }

    /// Apply `f` to the tables and persist.
    ///
    /// `f` must fail before it writes anything. Without a snapshot the change is
    /// made in place; with one it is made on a copy that replaces the tables only
    /// after the file is written, so a failed write keeps memory and disk equal.
    fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.tables.write();
        if self.snapshot.is_none() {
            return f(&mut guard);
        }
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }
}

impl RecordStore for MemoryStore {
    fn insert_user(&self, draft: IdentityDraft) -> StoreResult<Identity> {
        self.mutate(|t| {
            t.check_unique(&draft.email, &draft.username, None)?;
            let id = t.next_user_id;
            t.next_user_id += 1;
            let user = Identity {
                id,
                username: draft.username,
                email: draft.email,
                password_hash: draft.password_hash,
                role: draft.role,
                company: draft.company,
            };
            t.users.insert(id, user.clone());
            Ok(user)
        })
    }

    fn find_user(&self, key: UserKey<'_>) -> StoreResult<Option<Identity>> {
        let t = self.tables.read();
        let found = match key {
            UserKey::Id(id) => t.users.get(&id).cloned(),
            UserKey::Email(email) => t.users.values().find(|u| u.email == email).cloned(),
            UserKey::Username(name) => t.users.values().find(|u| u.username == name).cloned(),
        };
        Ok(found)
    }

    fn update_user(&self, id: u64, patch: IdentityPatch) -> StoreResult<Identity> {
        self.mutate(|t| {
            let Some(current) = t.users.get(&id).cloned() else {
                return Err(StoreError::NotFound { what: format!("user {}", id) });
            };
            let email = patch.email.unwrap_or(current.email);
            let username = patch.username.unwrap_or(current.username);
            t.check_unique(&email, &username, Some(id))?;
            let updated = Identity {
                id,
                username,
                email,
                password_hash: patch.password_hash.unwrap_or(current.password_hash),
                role: patch.role.unwrap_or(current.role),
                company: patch.company.or(current.company),
            };
            t.users.insert(id, updated.clone());
            Ok(updated)
        })
    }

    fn delete_user(&self, id: u64) -> StoreResult<()> {
        self.mutate(|t| {
            if t.users.remove(&id).is_none() {
                return Err(StoreError::NotFound { what: format!("user {}", id) });
            }
            t.entries.retain(|_, e| e.user_id != id);
            Ok(())
        })
    }

    fn list_users(&self, company: Option<&str>) -> StoreResult<Vec<Identity>> {
        let t = self.tables.read();
        Ok(t.users
            .values()
            .filter(|u| company.is_none() || u.company.as_deref() == company)
            .cloned()
            .collect())
    }

    fn count_users(&self) -> StoreResult<usize> {
        Ok(self.tables.read().users.len())
    }

    fn insert_entry(&self, draft: TimeEntryDraft) -> StoreResult<TimeEntry> {
        self.mutate(|t| {
            if !t.users.contains_key(&draft.user_id) {
                return Err(StoreError::NotFound { what: format!("user {}", draft.user_id) });
            }
            let id = t.next_entry_id;
            t.next_entry_id += 1;
            let entry = TimeEntry {
                id,
                user_id: draft.user_id,
                date: draft.date,
                hours: draft.hours,
                description: draft.description,
            };
            t.entries.insert(id, entry.clone());
            Ok(entry)
        })
    }

    fn entries_for_user(&self, user_id: u64) -> StoreResult<Vec<TimeEntry>> {
        let t = self.tables.read();
        Ok(t.entries.values().filter(|e| e.user_id == user_id).cloned().collect())
    }

    fn entries_for_tenant(&self, company: &str) -> StoreResult<Vec<TimeEntry>> {
        let t = self.tables.read();
        let ids = t.tenant_user_ids(company);
        Ok(t.entries.values().filter(|e| ids.contains(&e.user_id)).cloned().collect())
    }

    fn all_entries(&self) -> StoreResult<Vec<TimeEntry>> {
        Ok(self.tables.read().entries.values().cloned().collect())
    }

    fn total_hours(&self, company: Option<&str>) -> StoreResult<f64> {
        let t = self.tables.read();
        let total = match company {
            Some(c) => {
                let ids = t.tenant_user_ids(c);
                t.entries.values().filter(|e| ids.contains(&e.user_id)).map(|e| e.hours).sum()
            }
            None => t.entries.values().map(|e| e.hours).sum(),
        };
        Ok(total)
    }
}
