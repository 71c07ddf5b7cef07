use std::collections::BTreeMap;

use snowcap_catalog::{AttrRecord, AttrValue, OwnerRef, Resource, ResourceKind, REGISTRY};
use snowcap_ident::{parse_name, Fqn, Name, Params};

use crate::session::Row;

/// Looks up a column by name, falling back to a case-insensitive scan.
/// Snowflake's `SHOW`/`DESC` output is not consistent about casing across
/// statement families, so an exact match is tried first and a
/// case-insensitive fallback second (spec.md's "Normalization" step).
pub fn match_named_field<'a>(row: &'a Row, name: &str) -> Option<&'a serde_json::Value> {
    row.get(name)
        .or_else(|| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
}

fn json_to_attr_value(value: &serde_json::Value) -> AttrValue {
    match value {
        serde_json::Value::String(s) => AttrValue::Str(s.clone()),
        serde_json::Value::Bool(b) => AttrValue::Bool(*b),
        serde_json::Value::Number(n) => {
            n.as_i64().map(AttrValue::Int).unwrap_or_else(|| AttrValue::Str(n.to_string()))
        }
        serde_json::Value::Array(items) => AttrValue::List(items.iter().map(json_to_attr_value).collect()),
        serde_json::Value::Null => AttrValue::Null,
        serde_json::Value::Object(_) => AttrValue::Null,
    }
}

/// Reshapes one `DESCRIBE`/`SHOW` row into the attribute record the
/// catalog expects for `kind`, consulting `KindRecord.attrs` so only
/// fields the catalog declares `fetchable` are pulled across (spec.md
/// §4.2's attribute schema; fields the catalog doesn't know about are
/// silently dropped rather than surfaced as spurious drift).
pub fn row_to_attrs(kind: ResourceKind, row: &Row) -> AttrRecord {
    let record = REGISTRY.get(kind);
    let mut attrs = AttrRecord::new();
    for meta in record.attrs {
        if !meta.fetchable {
            continue;
        }
        if let Some(value) = match_named_field(row, meta.name) {
            if !value.is_null() {
                attrs.insert(meta.name.to_string(), json_to_attr_value(value));
            }
        }
    }
    attrs
}

/// Parses the owner columns a `SHOW`/`DESC` row carries. Snowflake
/// distinguishes a database-role owner via a sibling `owner_role_type`
/// column; absent that column, the owner is assumed to be an ordinary
/// role (spec.md §3.2's default shape for `OwnerRef`).
pub fn row_to_owner(row: &Row) -> Option<OwnerRef> {
    let owner_field = match_named_field(row, "owner")?;
    let owner_str = owner_field.as_str()?;
    let owner_name = parse_name(owner_str).ok()?;
    let is_database_role = match_named_field(row, "owner_role_type")
        .and_then(|v| v.as_str())
        .map(|s| s.eq_ignore_ascii_case("DATABASE_ROLE"))
        .unwrap_or(false);
    if is_database_role {
        let database = match_named_field(row, "database_name")
            .and_then(|v| v.as_str())
            .and_then(|s| parse_name(s).ok())?;
        Some(OwnerRef::DatabaseRole { database, role: owner_name })
    } else {
        Some(OwnerRef::Role(owner_name))
    }
}

/// Builds the bare-object `Fqn` a listing row names, inside `container`
/// (the database/schema the `SHOW ... IN ...` statement was scoped to).
pub fn fqn_in_container(
    scope: snowcap_catalog::Scope,
    name: Name,
    container: Option<&Fqn>,
) -> Fqn {
    match scope {
        snowcap_catalog::Scope::Schema => {
            let database = container.and_then(|c| c.database.clone());
            let schema = container.map(|c| c.name.clone());
            Fqn {
                database,
                schema,
                name,
                arg_types: None,
                params: Params::new(),
            }
        }
        snowcap_catalog::Scope::Database => {
            let database = container.map(|c| c.name.clone());
            Fqn {
                database,
                schema: None,
                name,
                arg_types: None,
                params: Params::new(),
            }
        }
        _ => Fqn::bare(name),
    }
}

/// One normalized grant-or-role-grant row, the common shape both the bulk
/// audit-view path and the per-object `SHOW GRANTS` path are rewritten
/// into (spec.md §4.5 "Normalization").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    /// `role` for a `RoleGrant`/`DatabaseRoleGrant`'s subject role, or the
    /// grantee of a `Grant`.
    pub subject: Name,
    pub to_kind: String,
    pub to: Name,
    pub privilege: Option<String>,
    pub on: Option<Name>,
    pub database: Option<Name>,
    pub with_grant_option: bool,
}

impl GrantRow {
    pub fn is_role_grant(&self) -> bool {
        self.privilege.is_none()
    }

    pub fn into_resource(self, database_scoped: bool) -> Resource {
        let mut params = BTreeMap::new();
        match &self.privilege {
            Some(priv_name) => {
                params.insert("priv".to_string(), priv_name.clone());
                let on = self.on.clone().unwrap_or_else(|| self.subject.clone());
                params.insert("on".to_string(), on.render());
                params.insert("to".to_string(), self.to.render());
                params.insert("to_kind".to_string(), self.to_kind.clone());
                let fqn = Fqn::bare(on).with_params(params);
                let mut resource = Resource::new(ResourceKind::Grant, fqn, snowcap_catalog::Scope::Account);
                if self.with_grant_option {
                    resource.attrs.insert("with_grant_option".to_string(), AttrValue::Bool(true));
                }
                resource
            }
            None => {
                params.insert("role".to_string(), self.subject.render());
                params.insert("granted_to".to_string(), self.to_kind.clone());
                params.insert("to".to_string(), self.to.render());
                let kind =
                    if database_scoped { ResourceKind::DatabaseRoleGrant } else { ResourceKind::RoleGrant };
                let scope =
                    if database_scoped { snowcap_catalog::Scope::Database } else { snowcap_catalog::Scope::Account };
                let fqn = Fqn::bare(self.subject.clone()).with_params(params);
                let mut resource = Resource::new(kind, fqn, scope);
                resource.attrs.insert("role".to_string(), AttrValue::Ident(self.subject));
                resource.attrs.insert("granted_to".to_string(), AttrValue::Str(self.to_kind));
                resource.attrs.insert("to".to_string(), AttrValue::Ident(self.to));
                resource
            }
        }
    }
}

/// Parses one raw `SHOW GRANTS`/audit-view row into a `GrantRow`, trying
/// the column names both paths use in practice. Returns `None` for rows
/// this reader doesn't recognize (e.g. future grant kinds), which the
/// caller skips rather than treating as a hard failure.
pub fn row_to_grant_row(row: &Row) -> Option<GrantRow> {
    if let Some(role_field) = match_named_field(row, "granted_to").and_then(|v| v.as_str()) {
        let role = match_named_field(row, "role").and_then(|v| v.as_str()).and_then(|s| parse_name(s).ok())?;
        let grantee = match_named_field(row, "grantee_name").and_then(|v| v.as_str()).and_then(|s| parse_name(s).ok())?;
        return Some(GrantRow {
            subject: role,
            to_kind: role_field.to_uppercase(),
            to: grantee,
            privilege: None,
            on: None,
            database: None,
            with_grant_option: false,
        });
    }
    let privilege = match_named_field(row, "privilege").and_then(|v| v.as_str())?.to_uppercase();
    let grantee = match_named_field(row, "grantee_name").and_then(|v| v.as_str()).and_then(|s| parse_name(s).ok())?;
    let grant_on = match_named_field(row, "name").and_then(|v| v.as_str()).and_then(|s| parse_name(s).ok())?;
    let grant_to = match_named_field(row, "granted_to").and_then(|v| v.as_str()).unwrap_or("ROLE").to_uppercase();
    let with_grant_option = match_named_field(row, "grant_option")
        .and_then(|v| v.as_str())
        .map(|s| s.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    Some(GrantRow {
        subject: grant_on.clone(),
        to_kind: grant_to,
        to: grantee,
        privilege: Some(privilege),
        on: Some(grant_on),
        database: None,
        with_grant_option,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn match_named_field_is_case_insensitive() {
        let row = row(&[("Owner", json!("SYSADMIN"))]);
        assert_eq!(match_named_field(&row, "owner").and_then(|v| v.as_str()), Some("SYSADMIN"));
    }

    #[test]
    fn row_to_attrs_skips_unknown_columns() {
        let row = row(&[
            ("comment", json!("hello")),
            ("some_other_vendor_column", json!("ignored")),
        ]);
        let attrs = row_to_attrs(ResourceKind::Database, &row);
        assert_eq!(attrs.get("comment").and_then(|v| v.as_str()), Some("hello"));
        assert!(!attrs.contains_key("some_other_vendor_column"));
    }

    #[test]
    fn role_grant_row_round_trips_to_resource() {
        let row = row(&[
            ("role", json!("CUSTOMROLE")),
            ("granted_to", json!("ROLE")),
            ("grantee_name", json!("SYSADMIN")),
        ]);
        let parsed = row_to_grant_row(&row).unwrap();
        assert!(parsed.is_role_grant());
        let resource = parsed.into_resource(false);
        assert_eq!(resource.kind, ResourceKind::RoleGrant);
    }
}
