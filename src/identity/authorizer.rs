//! Access policy. Every allow/deny decision in the service is made here.
//!
//! `authorize` is a pure function of the claim and the requested action; it
//! never touches storage. Callers resolve whatever the action needs (target
//! tenant, target owner) before asking.

use super::principal::{Claims, Role};

/// Tenant reach of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Tenant(&'a str),
    AllTenants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    /// Log time for the caller's own identity.
    CreateOwnEntry,
    ReadOwnEntries,
    ReadEntries(Scope<'a>),
    ReadTotalHours(Scope<'a>),
    ListIdentities(Scope<'a>),
    /// View one identity, owned by `owner` (email) in `tenant`.
    ReadIdentity { owner: &'a str, tenant: Option<&'a str> },
    /// Create, update or delete any identity.
    ManageIdentities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Reason is for logs only.
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool { matches!(self, Decision::Allow) }
}

fn tenant_matches(claims: &Claims, tenant: &str) -> bool {
    claims.company.as_deref() == Some(tenant)
}

/// Manager reach: exactly their own tenant, never all tenants.
fn manager_scope(claims: &Claims, scope: Scope<'_>) -> Decision {
    match scope {
        Scope::Tenant(t) if tenant_matches(claims, t) => Decision::Allow,
        Scope::Tenant(_) => Decision::Deny("manager outside own tenant"),
        Scope::AllTenants => Decision::Deny("all-tenant scope requires admin"),
    }
}

pub fn authorize(claims: &Claims, action: Action<'_>) -> Decision {
    let role = claims.role;
    if role == Role::Unknown {
        return Decision::Deny("unrecognised role");
    }
    if role == Role::Admin {
        return Decision::Allow;
    }
    match action {
        Action::CreateOwnEntry | Action::ReadOwnEntries => Decision::Allow,
        Action::ReadEntries(scope) | Action::ReadTotalHours(scope) | Action::ListIdentities(scope) => match role {
            Role::Manager => manager_scope(claims, scope),
            _ => Decision::Deny("tenant reads require manager"),
        },
        Action::ReadIdentity { owner, tenant } => {
            if owner == claims.sub {
                return Decision::Allow;
            }
            match (role, tenant) {
                (Role::Manager, Some(t)) => manager_scope(claims, Scope::Tenant(t)),
                (Role::Manager, None) => Decision::Deny("identity has no tenant"),
                _ => Decision::Deny("identity belongs to someone else"),
            }
        }
        Action::ManageIdentities => Decision::Deny("identity management requires admin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(role: Role, company: Option<&str>) -> Claims {
        Claims { sub: format!("{}@example.com", role), role, company: company.map(str::to_string), exp: i64::MAX }
    }

    fn every_action<'a>(t: &'a str) -> Vec<Action<'a>> {
        vec![
            Action::CreateOwnEntry,
            Action::ReadOwnEntries,
            Action::ReadEntries(Scope::Tenant(t)),
            Action::ReadEntries(Scope::AllTenants),
            Action::ReadTotalHours(Scope::Tenant(t)),
            Action::ReadTotalHours(Scope::AllTenants),
            Action::ListIdentities(Scope::Tenant(t)),
            Action::ListIdentities(Scope::AllTenants),
            Action::ReadIdentity { owner: "someone@example.com", tenant: Some(t) },
            Action::ReadIdentity { owner: "someone@example.com", tenant: None },
            Action::ManageIdentities,
        ]
    }

    #[test]
    fn unknown_role_denies_everything() {
        for company in [None, Some("Acme")] {
            let c = claim(Role::Unknown, company);
            for a in every_action("Acme") {
                assert!(!authorize(&c, a).is_allowed(), "{:?} allowed for unknown role", a);
            }
            let own = Action::ReadIdentity { owner: &c.sub, tenant: company };
            assert!(!authorize(&c, own).is_allowed());
        }
    }

    #[test]
    fn admin_allowed_everywhere() {
        for company in [None, Some("Acme")] {
            let c = claim(Role::Admin, company);
            for t in ["Acme", "Widgets", ""] {
                for a in every_action(t) {
                    assert!(authorize(&c, a).is_allowed(), "{:?} denied for admin", a);
                }
            }
        }
    }

    #[test]
    fn user_denied_every_tenant_read() {
        let c = claim(Role::User, Some("Acme"));
        for scope in [Scope::Tenant("Acme"), Scope::Tenant("Widgets"), Scope::AllTenants] {
            assert!(!authorize(&c, Action::ReadEntries(scope)).is_allowed());
            assert!(!authorize(&c, Action::ReadTotalHours(scope)).is_allowed());
            assert!(!authorize(&c, Action::ListIdentities(scope)).is_allowed());
        }
        assert!(!authorize(&c, Action::ManageIdentities).is_allowed());
        assert!(authorize(&c, Action::CreateOwnEntry).is_allowed());
        assert!(authorize(&c, Action::ReadOwnEntries).is_allowed());
    }

    #[test]
    fn manager_is_confined_to_own_tenant() {
        let c = claim(Role::Manager, Some("Acme"));
        assert!(authorize(&c, Action::ReadEntries(Scope::Tenant("Acme"))).is_allowed());
        assert!(authorize(&c, Action::ReadTotalHours(Scope::Tenant("Acme"))).is_allowed());
        assert!(authorize(&c, Action::ListIdentities(Scope::Tenant("Acme"))).is_allowed());

        assert_eq!(
            authorize(&c, Action::ReadEntries(Scope::Tenant("Widgets"))),
            Decision::Deny("manager outside own tenant")
        );
        assert!(!authorize(&c, Action::ReadTotalHours(Scope::Tenant("Widgets"))).is_allowed());
        assert!(!authorize(&c, Action::ReadTotalHours(Scope::AllTenants)).is_allowed());
        assert!(!authorize(&c, Action::ReadEntries(Scope::AllTenants)).is_allowed());
        assert!(!authorize(&c, Action::ManageIdentities).is_allowed());
    }

    #[test]
    fn tenant_match_is_exact() {
        let c = claim(Role::Manager, Some("Acme"));
        for near in ["acme", "Acme ", "Acm", "AcmeCorp", " Acme"] {
            assert!(!authorize(&c, Action::ReadEntries(Scope::Tenant(near))).is_allowed(), "{:?}", near);
        }
    }

    #[test]
    fn manager_without_tenant_has_no_tenant_reach() {
        let c = claim(Role::Manager, None);
        assert!(!authorize(&c, Action::ReadEntries(Scope::Tenant(""))).is_allowed());
        assert!(!authorize(&c, Action::ListIdentities(Scope::Tenant("Acme"))).is_allowed());
        assert!(authorize(&c, Action::ReadOwnEntries).is_allowed());
    }

    #[test]
    fn identity_reads() {
        let user = claim(Role::User, Some("Acme"));
        let own = Action::ReadIdentity { owner: &user.sub, tenant: Some("Acme") };
        assert!(authorize(&user, own).is_allowed());
        let peer = Action::ReadIdentity { owner: "peer@example.com", tenant: Some("Acme") };
        assert!(!authorize(&user, peer).is_allowed());

        let mgr = claim(Role::Manager, Some("Acme"));
        assert!(authorize(&mgr, peer).is_allowed());
        let outsider = Action::ReadIdentity { owner: "w@example.com", tenant: Some("Widgets") };
        assert!(!authorize(&mgr, outsider).is_allowed());
    }
}
