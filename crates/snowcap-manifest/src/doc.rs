use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::vars::VarSpec;

/// The blueprint's scope, spec.md §6.1's top-level `scope` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlueprintScope {
    Account,
    Database,
    Schema,
}

/// The manifest's non-resource metadata: everything in spec.md §6.1's
/// top-level key table except the per-kind resource sections, which are
/// handled dynamically in `compiler.rs` since their keys depend on the
/// catalog's registered kinds.
#[derive(Debug, Clone)]
pub struct ManifestMeta {
    pub name: String,
    pub scope: BlueprintScope,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub sync_resources: Vec<String>,
    pub dry_run: bool,
    pub vars: Vec<VarSpec>,
}

impl Default for ManifestMeta {
    fn default() -> Self {
        ManifestMeta {
            name: "snowcap".to_string(),
            scope: BlueprintScope::Account,
            database: None,
            schema: None,
            sync_resources: Vec::new(),
            dry_run: false,
            vars: Vec::new(),
        }
    }
}

const KNOWN_META_KEYS: &[&str] = &[
    "name",
    "scope",
    "database",
    "schema",
    "sync_resources",
    "dry_run",
    "vars",
    "role_grants",
    "database_role_grants",
];

/// Parse a single YAML document into a raw mapping. Kept as a
/// `serde_yaml::Value` (rather than a single rigid struct) because the
/// set of valid top-level keys is the union of `KNOWN_META_KEYS` and every
/// catalog kind's plural tag, which isn't known statically inside serde's
/// derive machinery.
pub fn parse_document(yaml: &str) -> Result<serde_yaml::Mapping, CompileError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    match value {
        serde_yaml::Value::Mapping(m) => Ok(m),
        serde_yaml::Value::Null => Ok(serde_yaml::Mapping::new()),
        _ => Err(CompileError::InvalidResource {
            section: "<document root>".to_string(),
            reason: "expected a YAML mapping at the document root".to_string(),
        }),
    }
}

/// Merge multiple parsed documents' top-level mappings (spec.md §4.3 step
/// 1: "Parse each file; merge lists by key and reject scalar conflicts.").
/// Sequence-valued keys concatenate across documents; scalar/mapping keys
/// must agree exactly if repeated.
pub fn merge_documents(docs: Vec<serde_yaml::Mapping>) -> Result<serde_yaml::Mapping, CompileError> {
    let mut merged = serde_yaml::Mapping::new();
    for doc in docs {
        for (key, value) in doc {
            match merged.get_mut(&key) {
                None => {
                    merged.insert(key, value);
                }
                Some(existing) => match (existing, value) {
                    (serde_yaml::Value::Sequence(existing_seq), serde_yaml::Value::Sequence(new_seq)) => {
                        existing_seq.extend(new_seq);
                    }
                    (existing, new) if *existing == new => {}
                    _ => {
                        let key_str = key.as_str().unwrap_or("<non-string key>").to_string();
                        return Err(CompileError::ScalarConflict(key_str));
                    }
                },
            }
        }
    }
    Ok(merged)
}

/// Split a merged document into its known metadata keys and the remaining
/// per-kind resource sections (plus the `role_grants`/`database_role_grants`
/// short-form keys, handled separately by the compiler).
pub fn split_meta(
    mut doc: serde_yaml::Mapping,
) -> Result<(ManifestMeta, BTreeMap<String, serde_yaml::Value>), CompileError> {
    let mut meta = ManifestMeta::default();

    if let Some(v) = doc.remove("name") {
        meta.name = v.as_str().unwrap_or("snowcap").to_string();
    }
    if let Some(v) = doc.remove("scope") {
        meta.scope = serde_yaml::from_value(v).map_err(CompileError::Yaml)?;
    }
    if let Some(v) = doc.remove("database") {
        meta.database = v.as_str().map(str::to_string);
    }
    if let Some(v) = doc.remove("schema") {
        meta.schema = v.as_str().map(str::to_string);
    }
    if let Some(v) = doc.remove("sync_resources") {
        meta.sync_resources = serde_yaml::from_value(v).map_err(CompileError::Yaml)?;
    }
    if let Some(v) = doc.remove("dry_run") {
        meta.dry_run = v.as_bool().unwrap_or(false);
    }
    if let Some(v) = doc.remove("vars") {
        meta.vars = serde_yaml::from_value(v).map_err(CompileError::Yaml)?;
    }

    let mut sections = BTreeMap::new();
    for (key, value) in doc {
        let key_str = key
            .as_str()
            .ok_or_else(|| CompileError::UnknownKey("<non-string key>".to_string()))?
            .to_string();
        sections.insert(key_str, value);
    }

    Ok((meta, sections))
}

pub fn is_known_meta_key(key: &str) -> bool {
    KNOWN_META_KEYS.contains(&key)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merges_sequences_across_documents() {
        let a = parse_document("databases:\n  - name: DB1\n").unwrap();
        let b = parse_document("databases:\n  - name: DB2\n").unwrap();
        let merged = merge_documents(vec![a, b]).unwrap();
        let seq = merged.get("databases").unwrap().as_sequence().unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn rejects_scalar_conflicts() {
        let a = parse_document("name: one\n").unwrap();
        let b = parse_document("name: two\n").unwrap();
        assert!(merge_documents(vec![a, b]).is_err());
    }

    #[test]
    fn splits_known_meta_from_sections() {
        let doc = parse_document("name: test\nscope: ACCOUNT\ndatabases:\n  - name: DB1\n").unwrap();
        let (meta, sections) = split_meta(doc).unwrap();
        assert_eq!(meta.name, "test");
        assert!(sections.contains_key("databases"));
    }
}
