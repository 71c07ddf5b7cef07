//! The privilege map (spec.md §4.2): which privileges apply to each kind,
//! which privilege creating an instance of a kind requires, and which
//! built-in system role holds each account-level privilege by default.

use crate::builtins;
use crate::kind::ResourceKind;

/// The full set of privileges the catalog recognizes for a kind. Used by
/// the planner to expand `priv: ALL` into its canonical members (spec.md
/// §4.6 step 3, §8.2 "ALL-privilege expansion").
pub fn privs_for(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Database => &["USAGE", "MONITOR", "MODIFY", "CREATE SCHEMA", "OWNERSHIP"],
        ResourceKind::Schema => &[
            "USAGE",
            "MONITOR",
            "MODIFY",
            "CREATE TABLE",
            "CREATE VIEW",
            "CREATE STAGE",
            "CREATE TASK",
            "OWNERSHIP",
        ],
        ResourceKind::Warehouse => &["USAGE", "MONITOR", "OPERATE", "MODIFY", "OWNERSHIP"],
        ResourceKind::Role | ResourceKind::DatabaseRole => &["USAGE", "OWNERSHIP"],
        ResourceKind::Stage => &["USAGE", "READ", "WRITE", "OWNERSHIP"],
        ResourceKind::Task => &["MONITOR", "OPERATE", "OWNERSHIP"],
        ResourceKind::User => &["MONITOR", "OWNERSHIP"],
        ResourceKind::NetworkPolicy => &["APPLY", "OWNERSHIP"],
        ResourceKind::ResourceMonitor => &["MONITOR", "MODIFY", "OWNERSHIP"],
        // Grants and role-grants aren't themselves privilege-bearing
        // objects; they carry a `priv` parameter instead of declaring one.
        ResourceKind::Grant | ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant => &[],
    }
}

/// The privilege required on the containing scope to create an instance
/// of `kind`.
pub fn create_priv_for(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Database => "CREATE DATABASE",
        ResourceKind::Schema => "CREATE SCHEMA",
        ResourceKind::Role => "CREATE ROLE",
        ResourceKind::DatabaseRole => "CREATE DATABASE ROLE",
        ResourceKind::Warehouse => "CREATE WAREHOUSE",
        ResourceKind::User => "CREATE USER",
        ResourceKind::Stage => "CREATE STAGE",
        ResourceKind::Task => "CREATE TASK",
        ResourceKind::NetworkPolicy => "CREATE NETWORK POLICY",
        ResourceKind::ResourceMonitor => "CREATE RESOURCE MONITOR",
        // Granting a privilege requires the privilege itself (with grant
        // option) rather than a dedicated "create" privilege.
        ResourceKind::Grant => "MANAGE GRANTS",
        ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant => "MANAGE GRANTS",
    }
}

/// Which built-in system role canonically holds `priv` by default, used
/// by the scheduler's role-selection step (spec.md §4.7 step 1) when no
/// explicit owner grants the privilege to a custom role.
pub fn global_priv_default_owner(priv_name: &str) -> &'static str {
    match priv_name.to_ascii_uppercase().as_str() {
        "CREATE ROLE" | "CREATE USER" | "CREATE DATABASE ROLE" => "USERADMIN",
        "MANAGE GRANTS" | "CREATE NETWORK POLICY" | "APPLY" => "SECURITYADMIN",
        "CREATE RESOURCE MONITOR" => "ACCOUNTADMIN",
        _ => "SYSADMIN",
    }
}

/// True if `priv_name` is the `ALL` wildcard, case-insensitively.
pub fn is_all_privilege(priv_name: &str) -> bool {
    priv_name.eq_ignore_ascii_case("ALL")
}

/// Expand `ALL` into the canonical privilege set for `kind`; any other
/// privilege name passes through unchanged as a single-element set.
pub fn expand_privilege<'a>(kind: ResourceKind, priv_name: &'a str) -> Vec<&'a str>
where
    'static: 'a,
{
    if is_all_privilege(priv_name) {
        privs_for(kind).to_vec()
    } else {
        vec![priv_name]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_expands_to_full_set() {
        let expanded = expand_privilege(ResourceKind::Database, "ALL");
        assert_eq!(expanded, privs_for(ResourceKind::Database));
    }

    #[test]
    fn non_all_passes_through() {
        assert_eq!(expand_privilege(ResourceKind::Database, "USAGE"), vec!["USAGE"]);
    }

    #[test]
    fn default_owners_match_builtin_roles() {
        let owner = global_priv_default_owner("CREATE ROLE");
        assert!(builtins::is_system_role(owner));
    }
}
