use lazy_static::lazy_static;
use regex::Regex;
use snowcap_catalog::{AttrValue, OwnerRef, Resource, ResourceKind};
use snowcap_ident::{parse_name, Fqn, Params};

use crate::error::CompileError;

lazy_static! {
    // GRANT <priv> ON <KIND> <fqn> TO [DATABASE] ROLE <name>
    static ref GRANT_RE: Regex = Regex::new(
        r"(?i)^GRANT\s+(?P<priv>[A-Z_ ]+?)\s+ON\s+(?P<kind>[A-Z_]+)\s+(?P<object>\S+)\s+TO\s+(?P<granttype>DATABASE ROLE|ROLE)\s+(?P<grantee>\S+)$"
    )
    .unwrap();

    // GRANT ROLE <role> TO [DATABASE] ROLE <grantee>  |  GRANT ROLE <role> TO USER <grantee>
    static ref ROLE_GRANT_RE: Regex = Regex::new(
        r"(?i)^GRANT\s+ROLE\s+(?P<role>\S+)\s+TO\s+(?P<granttype>DATABASE ROLE|ROLE|USER)\s+(?P<grantee>\S+)$"
    )
    .unwrap();
}

/// Parse a declarative `GRANT <priv> ON <kind> <object> TO ROLE <role>`
/// string into a `Grant` resource (spec.md §4.3 step 3's "String entry").
pub fn parse_declarative_grant(source: &str) -> Result<Resource, CompileError> {
    let caps = GRANT_RE.captures(source.trim()).ok_or_else(|| CompileError::InvalidResource {
        section: "grants".to_string(),
        reason: format!("does not match 'GRANT <priv> ON <kind> <object> TO ROLE <name>': {source:?}"),
    })?;

    let priv_name = caps["priv"].trim().to_uppercase();
    let object = parse_name(&caps["object"])?;
    let grantee = parse_name(&caps["grantee"])?;
    let grant_type = caps["granttype"].to_uppercase();

    let mut params = Params::new();
    params.insert("priv".to_string(), priv_name);
    params.insert("on".to_string(), object.render());
    params.insert("to".to_string(), grantee.render());
    params.insert(
        "to_kind".to_string(),
        if grant_type == "DATABASE ROLE" { "DATABASE_ROLE".to_string() } else { "ROLE".to_string() },
    );

    let fqn = Fqn::bare(object).with_params(params);
    Ok(Resource::new(ResourceKind::Grant, fqn, snowcap_catalog::Scope::Account))
}

/// Parse a declarative `GRANT ROLE <role> TO ROLE <grantee>` (or `TO USER
/// <grantee>`) string into a `RoleGrant` resource.
pub fn parse_declarative_role_grant(source: &str) -> Result<Resource, CompileError> {
    let caps = ROLE_GRANT_RE.captures(source.trim()).ok_or_else(|| CompileError::InvalidResource {
        section: "role_grants".to_string(),
        reason: format!("does not match 'GRANT ROLE <role> TO ROLE <name>': {source:?}"),
    })?;

    let role = parse_name(&caps["role"])?;
    let grantee = parse_name(&caps["grantee"])?;
    let grant_type = caps["granttype"].to_uppercase();

    role_grant_resource(ResourceKind::RoleGrant, role, grant_type_tag(&grant_type), grantee)
}

fn grant_type_tag(grant_type: &str) -> &'static str {
    match grant_type {
        "DATABASE ROLE" => "DATABASE_ROLE",
        "USER" => "USER",
        _ => "ROLE",
    }
}

fn role_grant_resource(
    kind: ResourceKind,
    role: snowcap_ident::Name,
    granted_to: &'static str,
    grantee: snowcap_ident::Name,
) -> Result<Resource, CompileError> {
    let mut params = Params::new();
    params.insert("role".to_string(), role.render());
    params.insert("granted_to".to_string(), granted_to.to_string());
    params.insert("to".to_string(), grantee.render());

    let scope = if kind == ResourceKind::DatabaseRoleGrant {
        snowcap_catalog::Scope::Database
    } else {
        snowcap_catalog::Scope::Account
    };
    let fqn = Fqn::bare(role.clone()).with_params(params);
    let mut resource = Resource::new(kind, fqn, scope);
    resource.attrs.insert("role".to_string(), AttrValue::Ident(role));
    resource.attrs.insert("granted_to".to_string(), AttrValue::Str(granted_to.to_string()));
    resource.attrs.insert("to".to_string(), AttrValue::Ident(grantee));
    Ok(resource)
}

/// Expand the compact `role_grants: { ROLE_NAME: [grantee, ...] }` /
/// `database_role_grants: { "db.role": [grantee, ...] }` short-forms
/// (spec.md §6.1) into individual `RoleGrant`/`DatabaseRoleGrant`
/// resources. A grantee prefixed `user:` grants to a user instead of a
/// role; otherwise the grantee is assumed to be another role.
pub fn expand_compact_role_grants(
    mapping: &serde_yaml::Mapping,
    database_scoped: bool,
) -> Result<Vec<Resource>, CompileError> {
    let mut out = Vec::new();
    for (key, value) in mapping {
        let role_name = key.as_str().ok_or_else(|| CompileError::InvalidResource {
            section: "role_grants".to_string(),
            reason: "role_grants keys must be strings".to_string(),
        })?;
        let grantees = value.as_sequence().ok_or_else(|| CompileError::InvalidResource {
            section: "role_grants".to_string(),
            reason: format!("role_grants[{role_name:?}] must be a list of grantees"),
        })?;

        for grantee_value in grantees {
            let grantee_str = grantee_value.as_str().ok_or_else(|| CompileError::InvalidResource {
                section: "role_grants".to_string(),
                reason: "grantee entries must be strings".to_string(),
            })?;
            let (granted_to, grantee_name) = match grantee_str.split_once(':') {
                Some(("user", rest)) => ("USER", rest),
                _ => (if database_scoped { "DATABASE_ROLE" } else { "ROLE" }, grantee_str),
            };
            let role = parse_name(role_name)?;
            let grantee = parse_name(grantee_name)?;
            let kind = if database_scoped { ResourceKind::DatabaseRoleGrant } else { ResourceKind::RoleGrant };
            out.push(role_grant_resource(kind, role, granted_to, grantee)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_declarative_grant() {
        let resource = parse_declarative_grant("GRANT SELECT ON DATABASE DB1 TO ROLE R1").unwrap();
        assert_eq!(resource.kind, ResourceKind::Grant);
        assert_eq!(resource.fqn.params.get("priv").map(String::as_str), Some("SELECT"));
        assert_eq!(resource.fqn.params.get("to").map(String::as_str), Some("R1"));
    }

    #[test]
    fn parses_declarative_role_grant() {
        let resource = parse_declarative_role_grant("GRANT ROLE CUSTOMROLE TO ROLE SYSADMIN").unwrap();
        assert_eq!(resource.kind, ResourceKind::RoleGrant);
        assert_eq!(resource.fqn.params.get("role").map(String::as_str), Some("CUSTOMROLE"));
    }

    #[test]
    fn expands_compact_role_grants() {
        let yaml = "CUSTOMROLE:\n  - SYSADMIN\n  - PUBLIC\n";
        let mapping = match serde_yaml::from_str(yaml).unwrap() {
            serde_yaml::Value::Mapping(m) => m,
            _ => unreachable!(),
        };
        let resources = expand_compact_role_grants(&mapping, false).unwrap();
        assert_eq!(resources.len(), 2);
        assert!(resources.iter().all(|r| r.kind == ResourceKind::RoleGrant));
    }

    #[test]
    fn rejects_malformed_grant_string() {
        assert!(parse_declarative_grant("not a grant").is_err());
    }
}
