use std::collections::HashMap;
use std::sync::RwLock;

use snowcap_catalog::{Resource, ResourceKind};
use snowcap_ident::Urn;

use crate::rows::GrantRow;

#[derive(Default)]
struct RoleCache {
    fetched: HashMap<Urn, Option<Resource>>,
    listed: HashMap<ResourceKind, Vec<Urn>>,
    bulk_grants: Option<Vec<GrantRow>>,
    bulk_role_grants: Option<Vec<GrantRow>>,
    parameter_inherited_databases: Vec<snowcap_ident::Name>,
}

/// Session-scoped, role-keyed cache of remote-state reads (spec.md §4.5
/// "Caching": "All fetches/lists are cached under the session's current
/// role"). A mutation invalidates the *entire* cache for the current role
/// — spec.md calls this "coarse but correct" — rather than tracking which
/// individual URNs a statement could have affected.
///
/// Per spec.md §5 "Shared resources": parallel readers may compute the
/// same entry concurrently; the last writer wins and both writers produce
/// equivalent values, so a plain `RwLock<HashMap<_>>` is sufficient — no
/// compare-and-swap or generation counting is needed.
#[derive(Default)]
pub struct ReaderCache {
    roles: RwLock<HashMap<String, RoleCache>>,
}

impl ReaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_fetch(&self, role: &str, urn: &Urn) -> Option<Option<Resource>> {
        self.roles.read().unwrap().get(role).and_then(|c| c.fetched.get(urn).cloned())
    }

    pub fn put_fetch(&self, role: &str, urn: Urn, resource: Option<Resource>) {
        self.roles
            .write()
            .unwrap()
            .entry(role.to_string())
            .or_default()
            .fetched
            .insert(urn, resource);
    }

    pub fn get_list(&self, role: &str, kind: ResourceKind) -> Option<Vec<Urn>> {
        self.roles.read().unwrap().get(role).and_then(|c| c.listed.get(&kind).cloned())
    }

    pub fn put_list(&self, role: &str, kind: ResourceKind, urns: Vec<Urn>) {
        self.roles
            .write()
            .unwrap()
            .entry(role.to_string())
            .or_default()
            .listed
            .insert(kind, urns);
    }

    pub fn get_bulk_grants(&self, role: &str) -> Option<Vec<GrantRow>> {
        self.roles.read().unwrap().get(role).and_then(|c| c.bulk_grants.clone())
    }

    pub fn put_bulk_grants(&self, role: &str, rows: Vec<GrantRow>) {
        self.roles.write().unwrap().entry(role.to_string()).or_default().bulk_grants = Some(rows);
    }

    pub fn get_bulk_role_grants(&self, role: &str) -> Option<Vec<GrantRow>> {
        self.roles.read().unwrap().get(role).and_then(|c| c.bulk_role_grants.clone())
    }

    pub fn put_bulk_role_grants(&self, role: &str, rows: Vec<GrantRow>) {
        self.roles.write().unwrap().entry(role.to_string()).or_default().bulk_role_grants = Some(rows);
    }

    /// Mark `database` as having explicit parameter fields in the desired
    /// manifest, so its implicit PUBLIC schema is also fetched with
    /// `SHOW PARAMETERS` (spec.md §4.5 "Inheritance of parameters").
    pub fn mark_parameter_inherited(&self, role: &str, database: snowcap_ident::Name) {
        let mut roles = self.roles.write().unwrap();
        let entry = roles.entry(role.to_string()).or_default();
        if !entry.parameter_inherited_databases.contains(&database) {
            entry.parameter_inherited_databases.push(database);
        }
    }

    pub fn is_parameter_inherited(&self, role: &str, database: &snowcap_ident::Name) -> bool {
        self.roles
            .read()
            .unwrap()
            .get(role)
            .map(|c| c.parameter_inherited_databases.contains(database))
            .unwrap_or(false)
    }

    /// Invalidate the entire cache for `role` (spec.md §4.8: "After each
    /// successful mutating statement it invalidates the reader cache for
    /// the current role.").
    pub fn invalidate(&self, role: &str) {
        self.roles.write().unwrap().remove(role);
    }

    pub fn invalidate_all(&self) {
        self.roles.write().unwrap().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_ident::{Fqn, Name};

    fn urn() -> Urn {
        Urn::new("ab12345", "database", Fqn::bare(Name::unquoted("DB1")))
    }

    #[test]
    fn fetch_cache_round_trips() {
        let cache = ReaderCache::new();
        assert_eq!(cache.get_fetch("SYSADMIN", &urn()), None);
        cache.put_fetch("SYSADMIN", urn(), None);
        assert_eq!(cache.get_fetch("SYSADMIN", &urn()), Some(None));
    }

    #[test]
    fn invalidate_clears_only_that_role() {
        let cache = ReaderCache::new();
        cache.put_fetch("SYSADMIN", urn(), None);
        cache.put_fetch("USERADMIN", urn(), None);
        cache.invalidate("SYSADMIN");
        assert_eq!(cache.get_fetch("SYSADMIN", &urn()), None);
        assert_eq!(cache.get_fetch("USERADMIN", &urn()), Some(None));
    }

    #[test]
    fn parameter_inheritance_is_tracked_per_database() {
        let cache = ReaderCache::new();
        let db = Name::unquoted("DB1");
        assert!(!cache.is_parameter_inherited("SYSADMIN", &db));
        cache.mark_parameter_inherited("SYSADMIN", db.clone());
        assert!(cache.is_parameter_inherited("SYSADMIN", &db));
    }
}
