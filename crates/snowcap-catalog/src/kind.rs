use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CatalogError;

/// The closed set of resource kinds this catalog ships, per SPEC_FULL.md §2.
/// `KindRegistry` (registry.rs) is the extension point for adding more
/// without touching the planner/scheduler/resolver; this enum is the
/// concrete tag set those components match against today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Database,
    Schema,
    Role,
    DatabaseRole,
    RoleGrant,
    DatabaseRoleGrant,
    Warehouse,
    Grant,
    User,
    Stage,
    Task,
    NetworkPolicy,
    ResourceMonitor,
}

impl ResourceKind {
    /// All kinds the catalog ships, in a fixed order used wherever a stable
    /// enumeration is needed (e.g. building the registry).
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Database,
        ResourceKind::Schema,
        ResourceKind::Role,
        ResourceKind::DatabaseRole,
        ResourceKind::RoleGrant,
        ResourceKind::DatabaseRoleGrant,
        ResourceKind::Warehouse,
        ResourceKind::Grant,
        ResourceKind::User,
        ResourceKind::Stage,
        ResourceKind::Task,
        ResourceKind::NetworkPolicy,
        ResourceKind::ResourceMonitor,
    ];

    /// The URN `kind` segment and the manifest's singular tag.
    pub fn tag(self) -> &'static str {
        match self {
            ResourceKind::Database => "database",
            ResourceKind::Schema => "schema",
            ResourceKind::Role => "role",
            ResourceKind::DatabaseRole => "database_role",
            ResourceKind::RoleGrant => "role_grant",
            ResourceKind::DatabaseRoleGrant => "database_role_grant",
            ResourceKind::Warehouse => "warehouse",
            ResourceKind::Grant => "grant",
            ResourceKind::User => "user",
            ResourceKind::Stage => "stage",
            ResourceKind::Task => "task",
            ResourceKind::NetworkPolicy => "network_policy",
            ResourceKind::ResourceMonitor => "resource_monitor",
        }
    }

    /// The pluralized manifest section key (spec.md §6.1's "`<plural
    /// resource tag>`").
    pub fn plural_tag(self) -> &'static str {
        match self {
            ResourceKind::Database => "databases",
            ResourceKind::Schema => "schemas",
            ResourceKind::Role => "roles",
            ResourceKind::DatabaseRole => "database_roles",
            ResourceKind::RoleGrant => "role_grants",
            ResourceKind::DatabaseRoleGrant => "database_role_grants",
            ResourceKind::Warehouse => "warehouses",
            ResourceKind::Grant => "grants",
            ResourceKind::User => "users",
            ResourceKind::Stage => "stages",
            ResourceKind::Task => "tasks",
            ResourceKind::NetworkPolicy => "network_policies",
            ResourceKind::ResourceMonitor => "resource_monitors",
        }
    }

    pub fn from_plural_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.plural_tag() == tag)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for ResourceKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == s)
            .ok_or_else(|| CatalogError::UnknownKind(s.to_string()))
    }
}

/// The polymorphic subtypes of `Stage` (spec.md §4.2 "Polymorphic
/// resolution"): an internal stage backed by warehouse-managed storage, or
/// an external stage pointing at a cloud storage URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageSubtype {
    InternalStage,
    ExternalStage,
}

impl fmt::Display for StageSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageSubtype::InternalStage => "internal_stage",
            StageSubtype::ExternalStage => "external_stage",
        };
        write!(f, "{s}")
    }
}

/// Inspects a compiled stage record's attribute set and picks its concrete
/// subtype. A stage record with a `url` attribute is external; otherwise
/// it's internal. Returns `None` when the record is ambiguous, which the
/// manifest compiler turns into a fatal "missing resolver" error per
/// spec.md §4.2: "A missing resolver for an ambiguous tag is a fatal
/// error."
pub fn resolve_stage_subtype(attrs: &crate::attr::AttrRecord) -> Option<StageSubtype> {
    if attrs.contains_key("url") {
        Some(StageSubtype::ExternalStage)
    } else {
        Some(StageSubtype::InternalStage)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_round_trips_through_from_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.tag().parse::<ResourceKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn plural_tag_round_trips() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_plural_tag(kind.plural_tag()), Some(*kind));
        }
    }

    #[test]
    fn unknown_tag_errors() {
        assert!("not_a_kind".parse::<ResourceKind>().is_err());
    }
}
