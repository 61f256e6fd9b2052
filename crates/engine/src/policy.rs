//! Which roles may apply a mutation without going through approval.

use std::collections::{HashMap, HashSet};

use crate::{EngineError, MutationKind, ResultEngine, Role};

/// Per-kind authority table.
///
/// Admins are authoritative for every kind regardless of configuration; the
/// table only widens authority to other roles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorityPolicy {
    grants: HashMap<MutationKind, HashSet<Role>>,
}

impl AuthorityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `role` apply `kind` directly.
    pub fn grant(mut self, kind: MutationKind, role: Role) -> Self {
        self.grants.entry(kind).or_default().insert(role);
        self
    }

    pub fn is_authoritative(&self, role: Role, kind: MutationKind) -> bool {
        role.is_admin()
            || self
                .grants
                .get(&kind)
                .is_some_and(|roles| roles.contains(&role))
    }

    /// Build a policy from `KIND = ["role", ...]` pairs as found in settings.
    pub fn from_table<'a, I, R>(table: I) -> ResultEngine<Self>
    where
        I: IntoIterator<Item = (&'a str, R)>,
        R: IntoIterator<Item = &'a str>,
    {
        let mut policy = Self::new();
        for (kind, roles) in table {
            let kind = MutationKind::try_from(kind)?;
            for role in roles {
                policy = policy.grant(kind, Role::try_from(role)?);
            }
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_always_authoritative() {
        let policy = AuthorityPolicy::new();
        for kind in MutationKind::ALL {
            assert!(policy.is_authoritative(Role::Admin, kind));
            assert!(!policy.is_authoritative(Role::Employee, kind));
            assert!(!policy.is_authoritative(Role::Manager, kind));
        }
    }

    #[test]
    fn grants_are_per_kind() {
        let policy = AuthorityPolicy::new().grant(MutationKind::AdjustStock, Role::Manager);
        assert!(policy.is_authoritative(Role::Manager, MutationKind::AdjustStock));
        assert!(!policy.is_authoritative(Role::Manager, MutationKind::DeleteProduct));
        assert!(!policy.is_authoritative(Role::Employee, MutationKind::AdjustStock));
    }

    #[test]
    fn from_table_parses_settings() {
        let policy = AuthorityPolicy::from_table([("ADJUST_STOCK", ["employee", "manager"])])
            .unwrap();
        assert!(policy.is_authoritative(Role::Employee, MutationKind::AdjustStock));

        let err = AuthorityPolicy::from_table([("ADJUST_STOCK", ["owner"])]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRole(_)));
    }
}
