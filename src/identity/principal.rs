use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Role carried by an identity and by every claim issued for it.
///
/// `Unknown` absorbs any role string this build does not recognise, so a claim
/// with an odd role still parses and is then denied by the authorizer instead of
/// being mistaken for something more permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Parse a role that may be assigned to a stored identity.
    pub fn parse_assignable(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed claim body. Exactly these four fields; anything else fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Subject: the identity's email.
    pub sub: String,
    pub role: Role,
    /// Tenant label. Present in every token, `null` for identities without one.
    #[serde(deserialize_with = "required_nullable")]
    pub company: Option<String>,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

// With a custom deserializer serde no longer treats the Option as optional,
// so a token that omits `company` entirely is rejected.
fn required_nullable<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d)
}
