//! Manifest compiler (component C3): spec.md §4.3's four steps. Turns the
//! merged YAML document into a flat `Vec<Resource>` plus the blueprint's
//! non-resource metadata. Reference resolution (container injection,
//! pointer merging, ownership, edition validation) is `resolver.rs`'s job;
//! this module only builds well-formed, *unresolved* resources.

use snowcap_catalog::{AttrValue, OwnerRef, Resource, ResourceKind, Scope};
use snowcap_ident::{parse_name, parse_urn, Fqn, Name, Params};
use std::collections::BTreeMap;

use crate::doc::{merge_documents, parse_document, split_meta, ManifestMeta};
use crate::error::CompileError;
use crate::grant::{expand_compact_role_grants, parse_declarative_grant, parse_declarative_role_grant};
use crate::template::interpolate;
use crate::vars::{bind_vars, VarValue, VarsEnv};

/// Attribute names the catalog treats as integer-valued, used to coerce a
/// `for_each`-interpolated string back into `AttrValue::Int` (spec.md §4.3
/// step 3: "integer fields coerced").
const INT_ATTRS: &[&str] = &[
    "data_retention_time_in_days",
    "auto_suspend",
    "min_cluster_count",
    "max_cluster_count",
    "credit_quota",
    "frequency",
];

/// The compiler's output: blueprint metadata plus the flat resource list
/// spec.md §4.3 names, not yet passed through the resolver (C4).
#[derive(Debug, Clone)]
pub struct CompiledManifest {
    pub meta: ManifestMeta,
    pub resources: Vec<Resource>,
}

/// Compile one or more YAML documents plus a vars input map into a
/// `CompiledManifest` (spec.md §4.3 steps 1-4).
pub fn compile(
    yaml_sources: &[&str],
    inputs: &BTreeMap<String, serde_json::Value>,
) -> Result<CompiledManifest, CompileError> {
    let docs = yaml_sources
        .iter()
        .map(|s| parse_document(s))
        .collect::<Result<Vec<_>, _>>()?;
    let merged = merge_documents(docs)?;
    let (meta, sections) = split_meta(merged)?;
    let vars = bind_vars(&meta.vars, inputs)?;

    let mut resources = Vec::new();
    for (key, value) in &sections {
        match key.as_str() {
            "role_grants" => {
                let mapping = value.as_mapping().ok_or_else(|| CompileError::InvalidResource {
                    section: key.clone(),
                    reason: "role_grants must be a mapping".to_string(),
                })?;
                resources.extend(expand_compact_role_grants(mapping, false)?);
            }
            "database_role_grants" => {
                let mapping = value.as_mapping().ok_or_else(|| CompileError::InvalidResource {
                    section: key.clone(),
                    reason: "database_role_grants must be a mapping".to_string(),
                })?;
                resources.extend(expand_compact_role_grants(mapping, true)?);
            }
            _ => {
                let kind = ResourceKind::from_plural_tag(key)
                    .ok_or_else(|| CompileError::UnknownKey(key.clone()))?;
                resources.extend(compile_section(kind, key, value, &vars)?);
            }
        }
    }

    Ok(CompiledManifest { meta, resources })
}

fn compile_section(
    kind: ResourceKind,
    section: &str,
    value: &serde_yaml::Value,
    vars: &VarsEnv,
) -> Result<Vec<Resource>, CompileError> {
    let entries = value.as_sequence().ok_or_else(|| CompileError::InvalidResource {
        section: section.to_string(),
        reason: "expected a list of resource records".to_string(),
    })?;

    let mut out = Vec::new();
    for entry in entries {
        match entry {
            serde_yaml::Value::String(source) => match kind {
                ResourceKind::Grant => out.push(parse_declarative_grant(source)?),
                ResourceKind::RoleGrant => out.push(parse_declarative_role_grant(source)?),
                _ => {
                    return Err(CompileError::InvalidResource {
                        section: section.to_string(),
                        reason: format!("{kind} does not support declarative string entries"),
                    })
                }
            },
            serde_yaml::Value::Mapping(m) => {
                if m.contains_key("for_each") {
                    for expanded in expand_for_each(m, vars, section)? {
                        out.push(dict_to_resource(kind, &expanded, section)?);
                    }
                } else {
                    out.push(dict_to_resource(kind, m, section)?);
                }
            }
            _ => {
                return Err(CompileError::InvalidResource {
                    section: section.to_string(),
                    reason: "expected a mapping or string entry".to_string(),
                })
            }
        }
    }
    Ok(out)
}

/// Expand a `for_each` template record (spec.md §4.3 step 3's third entry
/// kind) into one shallow-cloned, interpolated record per item of the
/// referenced list variable.
fn expand_for_each(
    entry: &serde_yaml::Mapping,
    vars: &VarsEnv,
    section: &str,
) -> Result<Vec<serde_yaml::Mapping>, CompileError> {
    let key = serde_yaml::Value::String("for_each".to_string());
    let var_name = entry
        .get(&key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CompileError::InvalidResource {
            section: section.to_string(),
            reason: "for_each must be a string variable name".to_string(),
        })?;

    let items = match vars.get(var_name) {
        Some(VarValue::List(items)) => items,
        Some(other) => {
            return Err(CompileError::ForEachNotAList {
                section: section.to_string(),
                actual: other.type_name(),
            })
        }
        None => return Err(CompileError::MissingVar(var_name.to_string())),
    };

    let mut template = entry.clone();
    template.remove(&key);

    items
        .iter()
        .map(|item| interpolate_mapping(&template, vars, Some(item), section))
        .collect()
}

fn interpolate_mapping(
    mapping: &serde_yaml::Mapping,
    vars: &VarsEnv,
    each: Option<&VarValue>,
    context: &str,
) -> Result<serde_yaml::Mapping, CompileError> {
    let mut out = serde_yaml::Mapping::new();
    for (k, v) in mapping {
        out.insert(k.clone(), interpolate_value(v, vars, each, context)?);
    }
    Ok(out)
}

fn interpolate_value(
    value: &serde_yaml::Value,
    vars: &VarsEnv,
    each: Option<&VarValue>,
    context: &str,
) -> Result<serde_yaml::Value, CompileError> {
    match value {
        serde_yaml::Value::String(s) => Ok(serde_yaml::Value::String(interpolate(s, vars, each, context)?)),
        serde_yaml::Value::Sequence(items) => Ok(serde_yaml::Value::Sequence(
            items
                .iter()
                .map(|v| interpolate_value(v, vars, each, context))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        serde_yaml::Value::Mapping(m) => Ok(serde_yaml::Value::Mapping(interpolate_mapping(m, vars, each, context)?)),
        other => Ok(other.clone()),
    }
}

const RESERVED_RESOURCE_KEYS: &[&str] = &["name", "database", "schema", "owner", "requires", "for_each"];

/// Build a `Resource` of `kind` from a single YAML mapping entry (spec.md
/// §4.3 step 3's "Dict entry").
fn dict_to_resource(kind: ResourceKind, m: &serde_yaml::Mapping, section: &str) -> Result<Resource, CompileError> {
    let name_str = m
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CompileError::InvalidResource {
            section: section.to_string(),
            reason: "record is missing a 'name' field".to_string(),
        })?;
    let name = parse_name(name_str)?;

    let database = m.get("database").and_then(|v| v.as_str()).map(parse_name).transpose()?;
    let schema = m.get("schema").and_then(|v| v.as_str()).map(parse_name).transpose()?;

    let record = snowcap_catalog::REGISTRY.get(kind);
    let fqn = build_fqn(record.scope, name, database, schema);

    let mut resource = Resource::new(kind, fqn, record.scope);

    if let Some(owner_value) = m.get("owner") {
        let owner_str = owner_value.as_str().ok_or_else(|| CompileError::InvalidResource {
            section: section.to_string(),
            reason: "owner must be a string".to_string(),
        })?;
        resource.owner = Some(OwnerRef::External(parse_name(owner_str)?));
    }

    if let Some(requires_value) = m.get("requires") {
        let list = requires_value.as_sequence().ok_or_else(|| CompileError::InvalidResource {
            section: section.to_string(),
            reason: "requires must be a list of URN strings".to_string(),
        })?;
        for item in list {
            let s = item.as_str().ok_or_else(|| CompileError::InvalidResource {
                section: section.to_string(),
                reason: "requires entries must be URN strings".to_string(),
            })?;
            let urn = parse_urn(s).map_err(CompileError::Ident)?;
            resource.requires.push(urn);
        }
    }

    for (key, value) in m {
        let Some(key_str) = key.as_str() else { continue };
        if RESERVED_RESOURCE_KEYS.contains(&key_str) {
            continue;
        }
        resource.attrs.insert(key_str.to_string(), value_to_attr(key_str, value, section)?);
    }

    if record.polymorphic {
        resource.subtype = snowcap_catalog::resolve_stage_subtype(&resource.attrs);
        if resource.subtype.is_none() {
            return Err(CompileError::InvalidResource {
                section: section.to_string(),
                reason: format!("no polymorphic resolver matched {kind} record {name_str:?}"),
            });
        }
    }

    Ok(resource)
}

fn build_fqn(scope: Scope, name: Name, database: Option<Name>, schema: Option<Name>) -> Fqn {
    match scope {
        Scope::Schema => match (database, schema) {
            (Some(db), Some(schema)) => Fqn::database_scoped(db, schema, name),
            (None, Some(schema)) => Fqn::schema_scoped(schema, name),
            (Some(db), None) => Fqn {
                database: Some(db),
                schema: None,
                name,
                arg_types: None,
                params: Params::new(),
            },
            (None, None) => Fqn::bare(name),
        },
        Scope::Database => match database {
            Some(db) => Fqn {
                database: Some(db),
                schema: None,
                name,
                arg_types: None,
                params: Params::new(),
            },
            None => Fqn::bare(name),
        },
        _ => Fqn::bare(name),
    }
}

fn value_to_attr(key: &str, value: &serde_yaml::Value, section: &str) -> Result<AttrValue, CompileError> {
    match value {
        serde_yaml::Value::String(s) => {
            if INT_ATTRS.contains(&key) {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Ok(AttrValue::Int(i));
                }
            }
            Ok(AttrValue::Str(s.clone()))
        }
        serde_yaml::Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(AttrValue::Int(i))
            } else {
                Ok(AttrValue::Str(n.to_string()))
            }
        }
        serde_yaml::Value::Sequence(items) => Ok(AttrValue::List(
            items
                .iter()
                .map(|v| value_to_attr(key, v, section))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        serde_yaml::Value::Null => Ok(AttrValue::Null),
        serde_yaml::Value::Mapping(_) => Err(CompileError::InvalidResource {
            section: section.to_string(),
            reason: format!("nested mapping not supported for attribute {key:?}"),
        }),
        serde_yaml::Value::Tagged(t) => value_to_attr(key, &t.value, section),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn compiles_database_record() {
        let yaml = "databases:\n  - name: DB1\n    comment: \"a database\"\n";
        let compiled = compile(&[yaml], &BTreeMap::new()).unwrap();
        assert_eq!(compiled.resources.len(), 1);
        assert_eq!(compiled.resources[0].kind, ResourceKind::Database);
        assert_eq!(
            compiled.resources[0].attrs.get("comment"),
            Some(&AttrValue::Str("a database".to_string()))
        );
    }

    #[test]
    fn compiles_schema_scoped_stage_with_explicit_database() {
        let yaml = "stages:\n  - name: STG1\n    database: DB1\n    schema: PUBLIC\n    url: \"s3://bucket/\"\n";
        let compiled = compile(&[yaml], &BTreeMap::new()).unwrap();
        let stage = &compiled.resources[0];
        assert_eq!(stage.subtype, Some(snowcap_catalog::StageSubtype::ExternalStage));
        assert_eq!(stage.fqn.database, Some(Name::unquoted("DB1")));
    }

    #[test]
    fn for_each_expands_over_list_var() {
        let yaml = "vars:\n  - name: regions\n    type: list\nwarehouses:\n  - for_each: regions\n    name: \"wh_{{ each.value }}\"\n    warehouse_size: XSMALL\n";
        let mut inputs = BTreeMap::new();
        inputs.insert("regions".to_string(), serde_json::json!(["east", "west"]));
        let compiled = compile(&[yaml], &inputs).unwrap();
        assert_eq!(compiled.resources.len(), 2);
        let names: Vec<_> = compiled
            .resources
            .iter()
            .map(|r| r.fqn.name.render())
            .collect();
        assert!(names.contains(&"wh_east".to_string()));
        assert!(names.contains(&"wh_west".to_string()));
    }

    #[test]
    fn for_each_coerces_integer_fields() {
        let yaml = "vars:\n  - name: retentions\n    type: list\ndatabases:\n  - for_each: retentions\n    name: \"db_{{ each.value }}\"\n    data_retention_time_in_days: \"{{ each.value }}\"\n";
        let mut inputs = BTreeMap::new();
        inputs.insert("retentions".to_string(), serde_json::json!([1, 7]));
        let compiled = compile(&[yaml], &inputs).unwrap();
        assert!(compiled
            .resources
            .iter()
            .any(|r| r.attrs.get("data_retention_time_in_days") == Some(&AttrValue::Int(1))));
    }

    #[test]
    fn rejects_unknown_section_key() {
        let yaml = "bogus_kind:\n  - name: X\n";
        assert!(matches!(compile(&[yaml], &BTreeMap::new()), Err(CompileError::UnknownKey(_))));
    }

    #[test]
    fn rejects_missing_name() {
        let yaml = "databases:\n  - comment: \"no name\"\n";
        assert!(compile(&[yaml], &BTreeMap::new()).is_err());
    }

    #[test]
    fn parses_requires_list() {
        let yaml = "warehouses:\n  - name: WH\n    requires: [\"urn:ab12345:role/CUSTOMROLE\"]\n";
        let compiled = compile(&[yaml], &BTreeMap::new()).unwrap();
        assert_eq!(compiled.resources[0].requires.len(), 1);
    }
}
