//!
//! timesheet storage module
//! ------------------------
//! The record store is a collaborator of the gateway: it owns identity and time
//! entry rows and answers a fixed set of queries. `RecordStore` is the contract;
//! `MemoryStore` is the bundled implementation (in-memory tables with an optional
//! JSON snapshot on disk).
//!
//! Contract every implementation must honour:
//! - `insert_user` / `update_user` check email and username uniqueness and write
//!   the row in one atomic step, so concurrent registrations cannot both succeed.
//! - Ids are assigned by the store and never reused.
//! - Deleting an identity deletes its time entries in the same step.
//! - Tenant queries join through the owning identity's `company`, compared by
//!   exact string equality.
//! - Mutating calls may block on file IO; async callers run them on the
//!   blocking pool.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Role;

mod memory;

pub use memory::MemoryStore;

/// A registered principal as stored. `password_hash` is always an Argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub company: Option<String>,
}

/// Identity row before the store assigns an id.
#[derive(Debug, Clone)]
pub struct IdentityDraft {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub company: Option<String>,
}

/// Partial identity update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub hours: f64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TimeEntryDraft {
    pub user_id: u64,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
}

/// Unique keys an identity can be looked up by.
#[derive(Debug, Clone, Copy)]
pub enum UserKey<'a> {
    Id(u64),
    Email(&'a str),
    Username(&'a str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key is already taken. `field` is for logs, not for callers.
    #[error("unique constraint violated on {field}")]
    Conflict { field: &'static str },
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait RecordStore: Send + Sync {
    fn insert_user(&self, draft: IdentityDraft) -> StoreResult<Identity>;
    fn find_user(&self, key: UserKey<'_>) -> StoreResult<Option<Identity>>;
    fn update_user(&self, id: u64, patch: IdentityPatch) -> StoreResult<Identity>;
    fn delete_user(&self, id: u64) -> StoreResult<()>;
    /// All identities, or only those whose company equals `company`.
    fn list_users(&self, company: Option<&str>) -> StoreResult<Vec<Identity>>;
    fn count_users(&self) -> StoreResult<usize>;

    /// Fails with `NotFound` when `draft.user_id` names no identity.
    fn insert_entry(&self, draft: TimeEntryDraft) -> StoreResult<TimeEntry>;
    fn entries_for_user(&self, user_id: u64) -> StoreResult<Vec<TimeEntry>>;
    fn entries_for_tenant(&self, company: &str) -> StoreResult<Vec<TimeEntry>>;
    fn all_entries(&self) -> StoreResult<Vec<TimeEntry>>;
    /// Sum of hours for one tenant, or for every entry when `company` is `None`.
    /// An empty selection sums to `0.0`.
    fn total_hours(&self, company: Option<&str>) -> StoreResult<f64>;
}

/// Store handle passed to the gateway at construction.
pub type SharedStore = Arc<dyn RecordStore>;
