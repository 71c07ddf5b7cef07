//! Seed data for built-in warehouse objects that always exist and are
//! never created by a plan, grounded on the original `builtins.py`'s
//! `SYSTEM_ROLES`/`SYSTEM_DATABASES` constants (SPEC_FULL.md §4). Kept as
//! plain data rather than branches scattered through the scheduler, so
//! `global_priv_default_owner` (privilege.rs) can look a role up instead of
//! matching string literals inline.

/// The account-level system roles every Snowflake account ships with.
pub const SYSTEM_ROLES: &[&str] = &[
    "ACCOUNTADMIN",
    "SECURITYADMIN",
    "SYSADMIN",
    "USERADMIN",
    "PUBLIC",
];

/// The system databases present in every account, never created or
/// dropped by a plan.
pub const SYSTEM_DATABASES: &[&str] = &["SNOWFLAKE"];

pub fn is_system_role(name: &str) -> bool {
    SYSTEM_ROLES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES.iter().any(|d| d.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_system_roles_case_insensitively() {
        assert!(is_system_role("sysadmin"));
        assert!(is_system_role("SYSADMIN"));
        assert!(!is_system_role("CUSTOMROLE"));
    }
}
