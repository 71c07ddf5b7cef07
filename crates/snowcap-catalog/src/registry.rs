use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::attr::AttrMeta;
use crate::kind::ResourceKind;
use crate::privilege::{create_priv_for, privs_for};
use crate::scope::{Edition, Scope};

/// The catalog's per-kind record (spec.md §4.2): scope, whether the kind
/// is polymorphic, default owner, edition gate, and attribute schema.
///
/// Grounded on the teacher's `tables!` macro (`models/src/tables/mod.rs`),
/// which enumerates every row type's shape through one declarative table
/// rather than scattering kind-specific logic through each consumer. Here
/// the "table" is a runtime `KindRegistry` instead of a macro-generated SQL
/// schema, since Snowcap's per-kind data is metadata consulted by several
/// independent components (diff, resolver, scheduler) rather than rows
/// persisted to a database.
#[derive(Debug, Clone, Copy)]
pub struct KindRecord {
    pub kind: ResourceKind,
    pub scope: Scope,
    pub polymorphic: bool,
    /// The system role that owns instances of this kind when no explicit
    /// owner is given (spec.md §3.2 "Default owner role").
    pub default_owner: &'static str,
    pub edition_required: Option<Edition>,
    pub attrs: &'static [AttrMeta],
    pub create_priv: &'static str,
    pub privs: &'static [&'static str],
    /// Attribute names that hold a reference to another resource of the
    /// paired kind (spec.md §4.6 step 4: "referenced → referrer for
    /// references declared by the catalog"), e.g. a `Task`'s `predecessor`
    /// attribute names another `Task`. The planner walks these to add
    /// dependency edges beyond plain containment/ownership.
    pub reference_attrs: &'static [(&'static str, ResourceKind)],
}

impl KindRecord {
    pub fn attr(&self, name: &str) -> Option<&'static AttrMeta> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

const DATABASE_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("data_retention_time_in_days"),
    AttrMeta::new("default_ddl_collation"),
    AttrMeta::new("comment"),
    AttrMeta::new("transient").ignore_changes(),
];

const SCHEMA_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("data_retention_time_in_days"),
    AttrMeta::new("default_ddl_collation"),
    AttrMeta::new("comment"),
    AttrMeta::new("managed_access"),
];

const ROLE_ATTRS: &[AttrMeta] = &[AttrMeta::new("comment")];

const ROLE_GRANT_ATTRS: &[AttrMeta] = &[];

const WAREHOUSE_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("warehouse_size"),
    AttrMeta::new("auto_suspend"),
    AttrMeta::new("auto_resume"),
    AttrMeta::new("comment"),
    AttrMeta::new("min_cluster_count").requires_edition(Edition::Enterprise),
    AttrMeta::new("max_cluster_count").requires_edition(Edition::Enterprise),
    AttrMeta::new("scaling_policy").requires_edition(Edition::Enterprise),
];

const GRANT_ATTRS: &[AttrMeta] = &[AttrMeta::new("with_grant_option")];

const USER_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("login_name"),
    AttrMeta::new("email"),
    AttrMeta::new("default_role"),
    AttrMeta::new("default_warehouse"),
    AttrMeta::new("must_change_password"),
    AttrMeta::new("disabled"),
    AttrMeta::new("password").not_fetchable().known_after_apply(),
];

const STAGE_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("url"),
    AttrMeta::new("storage_integration"),
    AttrMeta::new("encryption"),
    AttrMeta::new("directory_enabled"),
];

const TASK_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("schedule"),
    AttrMeta::new("warehouse"),
    AttrMeta::new("predecessor"),
    AttrMeta::new("state"),
];

const NETWORK_POLICY_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("allowed_ip_list").unordered(),
    AttrMeta::new("blocked_ip_list").unordered(),
];

const RESOURCE_MONITOR_ATTRS: &[AttrMeta] = &[
    AttrMeta::new("credit_quota"),
    AttrMeta::new("frequency"),
    AttrMeta::new("notify_at").unordered(),
];

fn record_for(kind: ResourceKind) -> KindRecord {
    let (scope, polymorphic, default_owner, edition_required, attrs) = match kind {
        ResourceKind::Database => (Scope::Account, false, "SYSADMIN", None, DATABASE_ATTRS),
        ResourceKind::Schema => (Scope::Database, false, "SYSADMIN", None, SCHEMA_ATTRS),
        ResourceKind::Role => (Scope::Account, false, "USERADMIN", None, ROLE_ATTRS),
        ResourceKind::DatabaseRole => (Scope::Database, false, "USERADMIN", None, ROLE_ATTRS),
        ResourceKind::RoleGrant => (Scope::Account, false, "SECURITYADMIN", None, ROLE_GRANT_ATTRS),
        ResourceKind::DatabaseRoleGrant => {
            (Scope::Database, false, "SECURITYADMIN", None, ROLE_GRANT_ATTRS)
        }
        ResourceKind::Warehouse => (Scope::Account, false, "SYSADMIN", None, WAREHOUSE_ATTRS),
        ResourceKind::Grant => (Scope::Account, false, "SECURITYADMIN", None, GRANT_ATTRS),
        ResourceKind::User => (Scope::Account, false, "USERADMIN", None, USER_ATTRS),
        ResourceKind::Stage => (Scope::Schema, true, "SYSADMIN", None, STAGE_ATTRS),
        ResourceKind::Task => (Scope::Schema, false, "SYSADMIN", None, TASK_ATTRS),
        ResourceKind::NetworkPolicy => {
            (Scope::Account, false, "SECURITYADMIN", None, NETWORK_POLICY_ATTRS)
        }
        ResourceKind::ResourceMonitor => {
            (Scope::Account, false, "ACCOUNTADMIN", None, RESOURCE_MONITOR_ATTRS)
        }
    };

    let reference_attrs: &'static [(&'static str, ResourceKind)] = match kind {
        ResourceKind::Task => &[("predecessor", ResourceKind::Task)],
        _ => &[],
    };

    KindRecord {
        kind,
        scope,
        polymorphic,
        default_owner,
        edition_required,
        attrs,
        create_priv: create_priv_for(kind),
        privs: privs_for(kind),
        reference_attrs,
    }
}

/// The runtime-populated table of every kind the catalog knows about.
/// Adding a kind means adding one `record_for` arm (and the const attr
/// table it references), not touching the resolver, planner, or
/// scheduler — they all consult this registry rather than matching on
/// `ResourceKind` themselves.
pub struct KindRegistry {
    records: HashMap<ResourceKind, KindRecord>,
}

impl KindRegistry {
    pub fn get(&self, kind: ResourceKind) -> &KindRecord {
        self.records
            .get(&kind)
            .expect("every ResourceKind variant has a KindRecord by construction")
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindRecord> {
        self.records.values()
    }
}

lazy_static! {
    pub static ref REGISTRY: KindRegistry = KindRegistry {
        records: ResourceKind::ALL
            .iter()
            .map(|&kind| (kind, record_for(kind)))
            .collect(),
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_kind_has_a_record() {
        for kind in ResourceKind::ALL {
            let record = REGISTRY.get(*kind);
            assert_eq!(record.kind, *kind);
        }
    }

    #[test]
    fn warehouse_multicluster_fields_require_enterprise() {
        let record = REGISTRY.get(ResourceKind::Warehouse);
        let attr = record.attr("min_cluster_count").unwrap();
        assert_eq!(attr.edition_required, Some(Edition::Enterprise));
    }

    #[test]
    fn stage_is_polymorphic() {
        assert!(REGISTRY.get(ResourceKind::Stage).polymorphic);
    }
}
