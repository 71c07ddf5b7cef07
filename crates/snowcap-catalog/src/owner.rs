use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snowcap_ident::Name;

/// An owner reference, distinguishing an account-level `Role` from a
/// database-scoped `DatabaseRole` grantee.
///
/// Grounded on the original `_get_owner_identifier`, which renders
/// `GRANT OWNERSHIP ... TO ROLE x` differently from `... TO DATABASE ROLE
/// db.x` depending on which kind of role owns the resource; collapsing both
/// to a bare name (as a single `Name` field would) would lose the
/// information the renderer needs to pick the right statement form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnerRef {
    Role(Name),
    DatabaseRole { database: Name, role: Name },
    /// Owner is a name string the resolver hasn't matched to an in-manifest
    /// role yet (spec.md §4.4 "Ownership chain resolution" — resolved to an
    /// external pointer when no in-manifest match exists).
    External(Name),
}

impl OwnerRef {
    pub fn role(name: impl Into<Name>) -> Self {
        OwnerRef::Role(name.into())
    }

    pub fn database_role(database: impl Into<Name>, role: impl Into<Name>) -> Self {
        OwnerRef::DatabaseRole {
            database: database.into(),
            role: role.into(),
        }
    }

    /// The bare role name, ignoring which database (if any) scopes it.
    /// Used for role-equality comparisons that don't care about the
    /// distinction (e.g. "did the owner field change at all").
    pub fn bare_name(&self) -> &Name {
        match self {
            OwnerRef::Role(n) => n,
            OwnerRef::DatabaseRole { role, .. } => role,
            OwnerRef::External(n) => n,
        }
    }
}

impl From<Name> for OwnerRef {
    fn from(name: Name) -> Self {
        OwnerRef::Role(name)
    }
}
