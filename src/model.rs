//! Request and response bodies exchanged with the HTTP layer.
//! Views never carry a password digest.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::{Identity, TimeEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self { access_token, token_type: "bearer".to_string() }
    }
}

/// Registration body. `role` stays a raw string here and is parsed by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
}

/// Time log body. The owner is the identity behind the bearer token; a `user_id`
/// in the body is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimeEntry {
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyQuery {
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub company: Option<String>,
}

impl From<&Identity> for UserView {
    fn from(u: &Identity) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role.as_str().to_string(),
            company: u.company.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryView {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
}

impl From<TimeEntry> for TimeEntryView {
    fn from(e: TimeEntry) -> Self {
        Self { id: e.id, user_id: e.user_id, date: e.date, hours: e.hours, description: e.description }
    }
}

pub const ALL_COMPANIES: &str = "All Companies";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalHours {
    pub company: String,
    pub total_hours: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_optional_fields_are_none() {
        let e: NewTimeEntry = serde_json::from_str(r#"{"date":"2024-03-01","hours":2.5}"#).unwrap();
        assert_eq!(e.description, None);
        let n: NewIdentity =
            serde_json::from_str(r#"{"username":"a","email":"a@x.io","password":"p","role":"admin"}"#).unwrap();
        assert_eq!(n.company, None);
        let u: IdentityUpdate = serde_json::from_str("{}").unwrap();
        assert!(u.username.is_none() && u.company.is_none());
    }
}
