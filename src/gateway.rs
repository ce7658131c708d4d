//!
//! Identity & record gateway
//! -------------------------
//! One method per service operation. Each method runs the same steps:
//! resolve the caller's claim, ask the authorizer, validate input, then call
//! the record store. No allow/deny logic lives here; every decision goes
//! through `identity::authorize`.
//!
//! Password hashing, verification and store writes run on tokio's blocking
//! pool. Hash cost is set by configuration and can reach hundreds of
//! milliseconds; a store with a snapshot file writes it on every mutation.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{authorize, Action, Claims, Decision, Role, Scope, SessionManager};
use crate::model::{
    IdentityUpdate, LoginRequest, NewIdentity, NewTimeEntry, TimeEntryView, TokenResponse, TotalHours, UserView,
    ALL_COMPANIES,
};
use crate::security::{CredentialError, CredentialHasher};
use crate::storage::{
    Identity, IdentityDraft, IdentityPatch, RecordStore, SharedStore, StoreResult, TimeEntryDraft, UserKey,
};

const MAX_HOURS_PER_ENTRY: f64 = 24.0;

/// Pull the token out of an `Authorization` header value.
///
/// Exactly two whitespace-separated parts, the first being `bearer` in any
/// case. Anything else yields `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Scope a tenant read targets when the caller may or may not name a company.
/// Admins default to every tenant, everyone else to their own.
fn requested_scope<'a>(claims: &'a Claims, company: Option<&'a str>) -> Scope<'a> {
    match company {
        Some(c) => Scope::Tenant(c),
        None if claims.role == Role::Admin => Scope::AllTenants,
        None => claims.company.as_deref().map_or(Scope::AllTenants, Scope::Tenant),
    }
}

fn non_empty(field: &str, value: &str) -> AppResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(v.to_string())
}

fn valid_email(value: &str) -> AppResult<String> {
    let v = value.trim();
    let well_formed = match v.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !v.chars().any(char::is_whitespace),
        None => false,
    };
    if !well_formed {
        return Err(AppError::bad_request("email is not a valid address"));
    }
    Ok(v.to_string())
}

fn valid_password(value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::bad_request("password must not be empty"));
    }
    Ok(())
}

fn valid_role(value: &str) -> AppResult<Role> {
    Role::parse_assignable(value.trim())
        .ok_or_else(|| AppError::bad_request("role must be one of user, manager, admin"))
}

fn valid_company(value: Option<String>) -> Option<String> {
    value.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Only admins may exist without a tenant.
fn tenant_required(role: Role, company: Option<&str>) -> AppResult<()> {
    if role != Role::Admin && company.is_none() {
        return Err(AppError::bad_request(format!("a {} must belong to a company", role)));
    }
    Ok(())
}

fn valid_entry(entry: &NewTimeEntry, today: NaiveDate) -> AppResult<()> {
    if !entry.hours.is_finite() || entry.hours < 0.0 || entry.hours > MAX_HOURS_PER_ENTRY {
        return Err(AppError::bad_request(format!("hours must be between 0 and {}", MAX_HOURS_PER_ENTRY)));
    }
    if entry.date > today {
        return Err(AppError::bad_request("date must not be in the future"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct Gateway {
    store: SharedStore,
    hasher: Arc<CredentialHasher>,
    sessions: Arc<SessionManager>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").field("hasher", &self.hasher).field("sessions", &self.sessions).finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(store: SharedStore, hasher: CredentialHasher, sessions: SessionManager) -> Self {
        Self { store, hasher: Arc::new(hasher), sessions: Arc::new(sessions) }
    }

    pub fn store(&self) -> &SharedStore { &self.store }

    async fn hash_secret(&self, secret: String) -> AppResult<String> {
        let hasher = self.hasher.clone();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {}", e)))??;
        Ok(digest)
    }

    async fn secret_matches(&self, secret: String, digest: String) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        let outcome = tokio::task::spawn_blocking(move || hasher.verify(&secret, &digest))
            .await
            .map_err(|e| AppError::internal(format!("verification task failed: {}", e)))?;
        match outcome {
            Ok(matched) => Ok(matched),
            Err(CredentialError::MalformedDigest(reason)) => {
                warn!(target: "timesheet::auth", %reason, "stored digest unreadable, treating as mismatch");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_store<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RecordStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let out = tokio::task::spawn_blocking(move || f(&*store))
            .await
            .map_err(|e| AppError::internal(format!("store task failed: {}", e)))??;
        Ok(out)
    }

    fn require(&self, claims: &Claims, action: Action<'_>) -> AppResult<()> {
        match authorize(claims, action) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                debug!(target: "timesheet::policy", sub = %claims.sub, role = %claims.role, ?action, reason, "denied");
                Err(AppError::Forbidden)
            }
        }
    }

    /// The stored identity behind a claim. A valid token for an identity that
    /// has since been deleted no longer authenticates.
    fn current_identity(&self, claims: &Claims) -> AppResult<Identity> {
        match self.store.find_user(UserKey::Email(&claims.sub))? {
            Some(user) => Ok(user),
            None => {
                warn!(target: "timesheet::auth", sub = %claims.sub, "token subject no longer exists");
                Err(AppError::Unauthenticated)
            }
        }
    }

    /// Verify email + password and issue a bearer token.
    ///
    /// An unknown email still costs one verification against a dummy digest,
    /// and produces the same error as a wrong password.
    pub async fn login(&self, req: LoginRequest) -> AppResult<TokenResponse> {
        let email = req.email.trim();
        let found = self.store.find_user(UserKey::Email(email))?;
        let digest = match &found {
            Some(user) => user.password_hash.clone(),
            None => self.hasher.dummy_digest().to_string(),
        };
        let matched = self.secret_matches(req.password, digest).await?;
        let user = match found {
            Some(user) if matched => user,
            Some(_) => {
                warn!(target: "timesheet::auth", email, reason = "wrong_password", "login rejected");
                return Err(AppError::InvalidCredentials);
            }
            None => {
                warn!(target: "timesheet::auth", email, reason = "unknown_email", "login rejected");
                return Err(AppError::InvalidCredentials);
            }
        };
        let token = self
            .sessions
            .issue(&user.email, user.role, user.company.as_deref(), Utc::now().timestamp())
            .map_err(|e| AppError::internal(e.to_string()))?;
        info!(target: "timesheet::auth", user_id = user.id, role = %user.role, "login ok");
        Ok(TokenResponse::bearer(token))
    }

    /// Resolve an `Authorization` header value to a claim.
    pub fn authenticate(&self, header: Option<&str>) -> AppResult<Claims> {
        self.authenticate_at(header, Utc::now().timestamp())
    }

    pub fn authenticate_at(&self, header: Option<&str>, now: i64) -> AppResult<Claims> {
        let Some(token) = bearer_token(header) else {
            debug!(target: "timesheet::auth", present = header.is_some(), "missing or malformed authorization header");
            return Err(AppError::Unauthenticated);
        };
        self.sessions.validate(token, now).map_err(|e| {
            warn!(target: "timesheet::auth", reason = e.reason(), "token rejected: {}", e);
            AppError::Unauthenticated
        })
    }

    pub async fn create_identity(&self, claims: &Claims, req: NewIdentity) -> AppResult<UserView> {
        self.require(claims, Action::ManageIdentities)?;
        let username = non_empty("username", &req.username)?;
        let email = valid_email(&req.email)?;
        valid_password(&req.password)?;
        let role = valid_role(&req.role)?;
        let company = valid_company(req.company);
        tenant_required(role, company.as_deref())?;

        // cheap pre-check so a duplicate does not pay for a hash; the store
        // repeats the check atomically on insert
        if self.store.find_user(UserKey::Email(&email))?.is_some()
            || self.store.find_user(UserKey::Username(&username))?.is_some()
        {
            return Err(AppError::conflict("email or username already exists"));
        }
        let password_hash = self.hash_secret(req.password).await?;
        let draft = IdentityDraft { username, email, password_hash, role, company };
        let user = self.write_store(move |s| s.insert_user(draft)).await?;
        info!(target: "timesheet::identity", by = %claims.sub, user_id = user.id, role = %user.role, "identity created");
        Ok(UserView::from(&user))
    }

    pub async fn get_identity(&self, claims: &Claims, user_id: u64) -> AppResult<UserView> {
        let Some(target) = self.store.find_user(UserKey::Id(user_id))? else {
            // only callers who may see every identity learn that an id is unused
            self.require(claims, Action::ListIdentities(Scope::AllTenants))?;
            return Err(AppError::not_found(format!("user {} not found", user_id)));
        };
        self.require(claims, Action::ReadIdentity { owner: &target.email, tenant: target.company.as_deref() })?;
        Ok(UserView::from(&target))
    }

    pub async fn update_identity(&self, claims: &Claims, user_id: u64, req: IdentityUpdate) -> AppResult<UserView> {
        self.require(claims, Action::ManageIdentities)?;
        let Some(current) = self.store.find_user(UserKey::Id(user_id))? else {
            return Err(AppError::not_found(format!("user {} not found", user_id)));
        };
        let mut patch = IdentityPatch {
            username: req.username.as_deref().map(|u| non_empty("username", u)).transpose()?,
            email: req.email.as_deref().map(valid_email).transpose()?,
            password_hash: None,
            role: req.role.as_deref().map(valid_role).transpose()?,
            company: valid_company(req.company),
        };
        let role = patch.role.unwrap_or(current.role);
        tenant_required(role, patch.company.as_deref().or(current.company.as_deref()))?;
        if let Some(password) = req.password {
            valid_password(&password)?;
            patch.password_hash = Some(self.hash_secret(password).await?);
        }
        let user = self.write_store(move |s| s.update_user(user_id, patch)).await?;
        info!(target: "timesheet::identity", by = %claims.sub, user_id = user.id, "identity updated");
        Ok(UserView::from(&user))
    }

    pub async fn delete_identity(&self, claims: &Claims, user_id: u64) -> AppResult<()> {
        self.require(claims, Action::ManageIdentities)?;
        self.write_store(move |s| s.delete_user(user_id)).await?;
        info!(target: "timesheet::identity", by = %claims.sub, user_id, "identity deleted");
        Ok(())
    }

    pub async fn list_identities(&self, claims: &Claims, company: Option<&str>) -> AppResult<Vec<UserView>> {
        let scope = requested_scope(claims, company);
        self.require(claims, Action::ListIdentities(scope))?;
        let tenant = match scope {
            Scope::Tenant(t) => Some(t),
            Scope::AllTenants => None,
        };
        Ok(self.store.list_users(tenant)?.iter().map(UserView::from).collect())
    }

    /// Log time for the caller. The owner is always the token's subject.
    pub async fn log_time(&self, claims: &Claims, req: NewTimeEntry) -> AppResult<TimeEntryView> {
        self.require(claims, Action::CreateOwnEntry)?;
        let me = self.current_identity(claims)?;
        valid_entry(&req, Utc::now().date_naive())?;
        let draft = TimeEntryDraft { user_id: me.id, date: req.date, hours: req.hours, description: req.description };
        let entry = self.write_store(move |s| s.insert_entry(draft)).await?;
        debug!(target: "timesheet::entries", user_id = me.id, entry_id = entry.id, hours = entry.hours, "time logged");
        Ok(TimeEntryView::from(entry))
    }

    pub async fn my_entries(&self, claims: &Claims) -> AppResult<Vec<TimeEntryView>> {
        self.require(claims, Action::ReadOwnEntries)?;
        let me = self.current_identity(claims)?;
        Ok(self.store.entries_for_user(me.id)?.into_iter().map(TimeEntryView::from).collect())
    }

    pub async fn tenant_entries(&self, claims: &Claims, company: Option<&str>) -> AppResult<Vec<TimeEntryView>> {
        let scope = requested_scope(claims, company);
        self.require(claims, Action::ReadEntries(scope))?;
        let entries = match scope {
            Scope::Tenant(t) => self.store.entries_for_tenant(t)?,
            Scope::AllTenants => self.store.all_entries()?,
        };
        Ok(entries.into_iter().map(TimeEntryView::from).collect())
    }

    pub async fn total_hours(&self, claims: &Claims, company: Option<&str>) -> AppResult<TotalHours> {
        let scope = requested_scope(claims, company);
        self.require(claims, Action::ReadTotalHours(scope))?;
        let (label, tenant) = match scope {
            Scope::Tenant(t) => (t.to_string(), Some(t)),
            Scope::AllTenants => (ALL_COMPANIES.to_string(), None),
        };
        let total_hours = self.store.total_hours(tenant)?;
        Ok(TotalHours { company: label, total_hours })
    }

    /// Create the first admin when the store holds no identities at all.
    /// Returns whether an identity was created.
    pub async fn ensure_bootstrap_admin(&self, username: &str, email: &str, password: &str) -> AppResult<bool> {
        if self.store.count_users()? > 0 {
            return Ok(false);
        }
        let username = non_empty("username", username)?;
        let email = valid_email(email)?;
        valid_password(password)?;
        let password_hash = self.hash_secret(password.to_string()).await?;
        let draft = IdentityDraft { username, email, password_hash, role: Role::Admin, company: None };
        let user = self.write_store(move |s| s.insert_user(draft)).await?;
        info!(target: "timesheet::identity", user_id = user.id, "bootstrap admin created");
        Ok(true)
    }
}
