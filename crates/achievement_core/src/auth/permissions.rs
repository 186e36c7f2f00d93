//! crates/achievement_core/src/auth/permissions.rs
//!
//! Role → permission-set mapping. Built once at startup and handed to the gate;
//! authorization is set membership with default deny.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

pub const USERS_CREATE: &str = "users:create";
pub const USERS_READ: &str = "users:read";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";
pub const STUDENTS_READ: &str = "students:read";
pub const STUDENTS_UPDATE: &str = "students:update";
pub const LECTURERS_READ: &str = "lecturers:read";
pub const ACHIEVEMENTS_CREATE: &str = "achievements:create";
pub const ACHIEVEMENTS_READ: &str = "achievements:read";
pub const ACHIEVEMENTS_UPDATE: &str = "achievements:update";
pub const ACHIEVEMENTS_DELETE: &str = "achievements:delete";
pub const ACHIEVEMENTS_VERIFY: &str = "achievements:verify";

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_STUDENT: &str = "Mahasiswa";
pub const ROLE_ADVISOR: &str = "Dosen Wali";

/// Which permissions each role holds. Deserializes from a JSON object of
/// role name → array of permission strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RolePermissions {
    roles: HashMap<String, HashSet<String>>,
}

impl RolePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `permissions` to `role`, creating the role if needed.
    pub fn grant<I, S>(mut self, role: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles
            .entry(role.to_string())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// The built-in table for the three roles of the records system.
    pub fn defaults() -> Self {
        Self::new()
            .grant(
                ROLE_ADMIN,
                [
                    USERS_CREATE,
                    USERS_READ,
                    USERS_UPDATE,
                    USERS_DELETE,
                    STUDENTS_READ,
                    STUDENTS_UPDATE,
                    LECTURERS_READ,
                    ACHIEVEMENTS_CREATE,
                    ACHIEVEMENTS_READ,
                    ACHIEVEMENTS_UPDATE,
                    ACHIEVEMENTS_DELETE,
                    ACHIEVEMENTS_VERIFY,
                ],
            )
            .grant(
                ROLE_STUDENT,
                [
                    ACHIEVEMENTS_CREATE,
                    ACHIEVEMENTS_READ,
                    ACHIEVEMENTS_UPDATE,
                    ACHIEVEMENTS_DELETE,
                ],
            )
            .grant(
                ROLE_ADVISOR,
                [ACHIEVEMENTS_READ, ACHIEVEMENTS_VERIFY, STUDENTS_READ],
            )
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

/// Answers "may this role do that?". Holds no mutable state.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    table: RolePermissions,
}

impl PermissionGate {
    pub fn new(table: RolePermissions) -> Self {
        Self { table }
    }

    pub fn authorize(&self, role: &str, permission: &str) -> bool {
        self.table
            .roles
            .get(role)
            .is_some_and(|granted| granted.contains(permission))
    }

    /// The capability set of `role`, sorted. Empty for unknown roles.
    pub fn capabilities(&self, role: &str) -> Vec<&str> {
        let mut granted: Vec<&str> = self
            .table
            .roles
            .get(role)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default();
        granted.sort_unstable();
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [&str; 12] = [
        USERS_CREATE,
        USERS_READ,
        USERS_UPDATE,
        USERS_DELETE,
        STUDENTS_READ,
        STUDENTS_UPDATE,
        LECTURERS_READ,
        ACHIEVEMENTS_CREATE,
        ACHIEVEMENTS_READ,
        ACHIEVEMENTS_UPDATE,
        ACHIEVEMENTS_DELETE,
        ACHIEVEMENTS_VERIFY,
    ];

    #[test]
    fn only_explicit_grants_pass() {
        let gate = PermissionGate::new(RolePermissions::new().grant(ROLE_STUDENT, [ACHIEVEMENTS_CREATE]));

        for role in [ROLE_ADMIN, ROLE_STUDENT, ROLE_ADVISOR, "mahasiswa", "", "Guest"] {
            for permission in ALL.iter().copied().chain(["achievements:*", "", "ACHIEVEMENTS:CREATE"]) {
                let expected = role == ROLE_STUDENT && permission == ACHIEVEMENTS_CREATE;
                assert_eq!(
                    gate.authorize(role, permission),
                    expected,
                    "{role} / {permission}"
                );
            }
        }
    }

    #[test]
    fn empty_table_denies_everything() {
        let gate = PermissionGate::new(RolePermissions::new());
        assert!(ALL.iter().all(|p| !gate.authorize(ROLE_ADMIN, p)));
    }

    #[test]
    fn default_table_separates_roles() {
        let gate = PermissionGate::new(RolePermissions::defaults());

        assert!(gate.authorize(ROLE_STUDENT, ACHIEVEMENTS_CREATE));
        assert!(gate.authorize(ROLE_STUDENT, ACHIEVEMENTS_DELETE));
        assert!(!gate.authorize(ROLE_STUDENT, USERS_READ));
        assert!(!gate.authorize(ROLE_STUDENT, ACHIEVEMENTS_VERIFY));

        assert!(gate.authorize(ROLE_ADVISOR, ACHIEVEMENTS_READ));
        assert!(!gate.authorize(ROLE_ADVISOR, ACHIEVEMENTS_CREATE));
        assert!(!gate.authorize(ROLE_ADVISOR, ACHIEVEMENTS_UPDATE));

        assert!(ALL.iter().all(|p| gate.authorize(ROLE_ADMIN, p)));
    }

    #[test]
    fn table_loads_from_json() {
        let table = RolePermissions::from_json(
            r#"{ "Mahasiswa": ["achievements:create", "achievements:read"], "Tamu": [] }"#,
        )
        .unwrap();
        let gate = PermissionGate::new(table.clone());

        assert_eq!(table.role_count(), 2);
        assert_eq!(
            gate.capabilities(ROLE_STUDENT),
            vec![ACHIEVEMENTS_CREATE, ACHIEVEMENTS_READ]
        );
        assert!(gate.capabilities("Tamu").is_empty());
        assert!(!gate.authorize("Tamu", ACHIEVEMENTS_READ));
    }
}
