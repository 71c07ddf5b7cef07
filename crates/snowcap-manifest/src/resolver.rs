//! Reference resolver (component C4): spec.md §4.4's four steps, applied to
//! the compiler's flat resource list to produce the frozen `Manifest`
//! spec.md §3.3/§3.5 describes ("Resources... are created by the compiler,
//! mutated by the resolver, then frozen").

use snowcap_catalog::{OwnerRef, ResourceKind, Resource, Scope, REGISTRY};
use snowcap_ident::{parse_name, Fqn, FqnContext, Name, Params, Urn};
use std::collections::BTreeMap;

use crate::compiler::CompiledManifest;
use crate::doc::BlueprintScope;
use crate::error::ResolveError;
use crate::session::SessionContext;

/// The frozen, resolved manifest (spec.md §3.3): URN → resource, plus the
/// scope/sync settings and the session it was resolved against.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub urns: BTreeMap<Urn, Resource>,
    pub scope: BlueprintScope,
    pub database: Option<Name>,
    pub schema: Option<Name>,
    pub sync_kinds: Vec<ResourceKind>,
    pub session: SessionContext,
    /// Carried straight from `ManifestMeta::dry_run` (spec.md §6.1): the
    /// scheduler's caller (`snowcap-core::plan`) consults this to decide
    /// whether to stop after producing a `Schedule` or go on to apply it
    /// (spec.md §4.7 step 4).
    pub dry_run: bool,
}

impl Manifest {
    pub fn resources_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.urns.values().filter(move |r| r.kind == kind)
    }

    pub fn get(&self, urn: &Urn) -> Option<&Resource> {
        self.urns.get(urn)
    }
}

pub fn resolve(compiled: CompiledManifest, session: &SessionContext) -> Result<Manifest, ResolveError> {
    let CompiledManifest { meta, mut resources } = compiled;

    let scope_database = meta.database.as_deref().map(parse_name).transpose()?;
    let scope_schema = meta.schema.as_deref().map(parse_name).transpose()?;

    for resource in &mut resources {
        inject_container_scope(resource, scope_database.as_ref(), scope_schema.as_ref())?;
        reject_explicit_public_schema(resource)?;
    }

    let role_names: Vec<Name> = resources
        .iter()
        .filter(|r| r.kind == ResourceKind::Role)
        .map(|r| r.fqn.name.clone())
        .collect();
    let database_roles: Vec<(Name, Name)> = resources
        .iter()
        .filter(|r| r.kind == ResourceKind::DatabaseRole)
        .filter_map(|r| r.fqn.database.clone().map(|db| (db, r.fqn.name.clone())))
        .collect();

    for resource in &mut resources {
        resolve_owner(resource, &role_names, &database_roles);
        validate_edition(resource, session)?;
    }

    let mut urns: BTreeMap<Urn, Resource> = BTreeMap::new();
    for resource in resources {
        let urn = resource.urn(&session.account_locator, session.org.as_deref());
        match urns.get(&urn) {
            None => {
                urns.insert(urn, resource);
            }
            Some(existing) if *existing == resource => {
                // Exact duplicate definitions merge into one (spec.md §3.3).
            }
            Some(_) => return Err(ResolveError::DuplicateResource(urn.render())),
        }
    }

    synthesize_public_schemas(&mut urns, session);

    let sync_kinds = meta
        .sync_resources
        .iter()
        .map(|tag| tag_to_kind(tag))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Manifest {
        urns,
        scope: meta.scope,
        database: scope_database,
        schema: scope_schema,
        sync_kinds,
        session: session.clone(),
        dry_run: meta.dry_run,
    })
}

/// A sync-resources entry may be a singular or plural kind tag
/// (`"DATABASE"`/`"DATABASES"` in spec.md §6.1 examples); accept either,
/// matched case-insensitively against the catalog's tags.
fn tag_to_kind(tag: &str) -> Result<ResourceKind, ResolveError> {
    let lower = tag.to_ascii_lowercase();
    ResourceKind::ALL
        .iter()
        .copied()
        .find(|k| k.tag() == lower || k.plural_tag() == lower)
        .ok_or_else(|| snowcap_catalog::CatalogError::UnknownKind(tag.to_string()).into())
}

/// Schema-scoped resources inherit their database/schema from the blueprint
/// scope roots when not given explicitly; database-scoped resources inherit
/// their database the same way (spec.md §4.4 "Container injection").
fn inject_container_scope(
    resource: &mut Resource,
    scope_database: Option<&Name>,
    scope_schema: Option<&Name>,
) -> Result<(), ResolveError> {
    match resource.scope {
        Scope::Database => {
            if resource.fqn.database.is_none() {
                let db = scope_database.cloned().ok_or_else(|| ResolveError::MissingScopeRoot {
                    urn: resource.fqn.render(),
                })?;
                resource.fqn.database = Some(db);
            }
        }
        Scope::Schema => {
            if resource.fqn.schema.is_none() {
                let schema = scope_schema.cloned().ok_or_else(|| ResolveError::MissingScopeRoot {
                    urn: resource.fqn.render(),
                })?;
                resource.fqn.schema = Some(schema);
            }
            if resource.fqn.database.is_none() {
                let db = scope_database.cloned().ok_or_else(|| ResolveError::MissingScopeRoot {
                    urn: resource.fqn.render(),
                })?;
                resource.fqn.database = Some(db);
            }
        }
        _ => {}
    }
    Ok(())
}

fn reject_explicit_public_schema(resource: &Resource) -> Result<(), ResolveError> {
    if resource.kind == ResourceKind::Schema && resource.fqn.name == Name::unquoted("PUBLIC") {
        return Err(ResolveError::ExplicitPublicSchema(resource.fqn.render()));
    }
    Ok(())
}

/// Ownership chain resolution (spec.md §4.4): an `owner` given as a bare
/// name resolves to an in-manifest `Role`; a dotted `db.role` name resolves
/// to an in-manifest `DatabaseRole`; otherwise it's left as an external
/// pointer. A missing owner is assigned the kind's catalog default.
fn resolve_owner(resource: &mut Resource, role_names: &[Name], database_roles: &[(Name, Name)]) {
    let record = REGISTRY.get(resource.kind);

    resource.owner = match resource.owner.take() {
        None => Some(OwnerRef::role(Name::unquoted(record.default_owner))),
        Some(OwnerRef::External(name)) => {
            if let Ok(fqn) = parse_fqn_for_owner(&name) {
                if let (Some(db), Some(role)) = (&fqn.database, Some(&fqn.name)) {
                    if database_roles.iter().any(|(d, r)| d == db && r == role) {
                        Some(OwnerRef::database_role(db.clone(), fqn.name))
                    } else if role_names.contains(&name) {
                        Some(OwnerRef::role(name))
                    } else {
                        Some(OwnerRef::External(name))
                    }
                } else if role_names.contains(&name) {
                    Some(OwnerRef::role(name))
                } else {
                    Some(OwnerRef::External(name))
                }
            } else if role_names.contains(&name) {
                Some(OwnerRef::role(name))
            } else {
                Some(OwnerRef::External(name))
            }
        }
        other => other,
    };
}

fn parse_fqn_for_owner(name: &Name) -> Result<Fqn, snowcap_ident::IdentError> {
    if name.raw().contains('.') {
        snowcap_ident::parse_fqn(name.raw(), FqnContext::DatabaseScoped)
    } else {
        Ok(Fqn::bare(name.clone()))
    }
}

fn validate_edition(resource: &Resource, session: &SessionContext) -> Result<(), ResolveError> {
    let record = REGISTRY.get(resource.kind);
    for (attr_name, _) in resource.attrs.iter() {
        if let Some(meta) = record.attr(attr_name) {
            if let Some(required) = meta.edition_required {
                if session.edition < required {
                    return Err(ResolveError::WrongEdition {
                        urn: resource.fqn.render(),
                        attr: meta.name,
                        required,
                        actual: session.edition,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Inject the implicit `PUBLIC` schema for every `Database` in the
/// manifest, inheriting its parameter fields for drift comparison (spec.md
/// §3.2, §4.4 "Implicit PUBLIC schema propagation").
fn synthesize_public_schemas(urns: &mut BTreeMap<Urn, Resource>, session: &SessionContext) {
    let databases: Vec<Resource> = urns
        .values()
        .filter(|r| r.kind == ResourceKind::Database)
        .cloned()
        .collect();

    let schema_record = REGISTRY.get(ResourceKind::Schema);

    for db in databases {
        let fqn = Fqn {
            database: Some(db.fqn.name.clone()),
            schema: None,
            name: Name::unquoted("PUBLIC"),
            arg_types: None,
            params: Params::new(),
        };
        let mut public_schema = Resource::new(ResourceKind::Schema, fqn, Scope::Database)
            .with_owner(OwnerRef::role(Name::unquoted(schema_record.default_owner)));

        for inherited in ["data_retention_time_in_days", "default_ddl_collation"] {
            if let Some(value) = db.attrs.get(inherited) {
                public_schema.attrs.insert(inherited.to_string(), value.clone());
            }
        }

        let urn = public_schema.urn(&session.account_locator, session.org.as_deref());
        urns.entry(urn).or_insert(public_schema);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use snowcap_catalog::Edition;
    use std::collections::BTreeMap as Map;

    fn session() -> SessionContext {
        SessionContext::new("ab12345", Edition::Standard)
    }

    #[test]
    fn injects_scope_root_for_schema_scoped_resource() {
        let yaml = "scope: SCHEMA\ndatabase: DB1\nschema: PUBLIC\nstages:\n  - name: STG1\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let manifest = resolve(compiled, &session()).unwrap();
        let stage = manifest.resources_of_kind(ResourceKind::Stage).next().unwrap();
        assert_eq!(stage.fqn.database, Some(Name::unquoted("DB1")));
        assert_eq!(stage.fqn.schema, Some(Name::unquoted("PUBLIC")));
    }

    #[test]
    fn missing_scope_root_errors() {
        let yaml = "scope: ACCOUNT\nstages:\n  - name: STG1\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        assert!(matches!(resolve(compiled, &session()), Err(ResolveError::MissingScopeRoot { .. })));
    }

    #[test]
    fn explicit_public_schema_is_rejected() {
        let yaml = "databases:\n  - name: DB1\nschemas:\n  - name: PUBLIC\n    database: DB1\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        assert!(matches!(
            resolve(compiled, &session()),
            Err(ResolveError::ExplicitPublicSchema(_))
        ));
    }

    #[test]
    fn implicit_public_schema_is_synthesized() {
        let yaml = "databases:\n  - name: DB1\n    data_retention_time_in_days: 3\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let manifest = resolve(compiled, &session()).unwrap();
        let schema = manifest.resources_of_kind(ResourceKind::Schema).next().unwrap();
        assert_eq!(schema.fqn.database, Some(Name::unquoted("DB1")));
        assert_eq!(
            schema.attrs.get("data_retention_time_in_days"),
            Some(&snowcap_catalog::AttrValue::Int(3))
        );
    }

    #[test]
    fn owner_resolves_to_in_manifest_role() {
        let yaml = "roles:\n  - name: CUSTOMROLE\nwarehouses:\n  - name: WH\n    owner: CUSTOMROLE\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let manifest = resolve(compiled, &session()).unwrap();
        let wh = manifest.resources_of_kind(ResourceKind::Warehouse).next().unwrap();
        assert_eq!(wh.owner, Some(OwnerRef::role(Name::unquoted("CUSTOMROLE"))));
    }

    #[test]
    fn owner_with_no_match_stays_external() {
        let yaml = "warehouses:\n  - name: WH\n    owner: UNKNOWNROLE\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let manifest = resolve(compiled, &session()).unwrap();
        let wh = manifest.resources_of_kind(ResourceKind::Warehouse).next().unwrap();
        assert_eq!(wh.owner, Some(OwnerRef::External(Name::unquoted("UNKNOWNROLE"))));
    }

    #[test]
    fn default_owner_applied_when_absent() {
        let yaml = "warehouses:\n  - name: WH\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let manifest = resolve(compiled, &session()).unwrap();
        let wh = manifest.resources_of_kind(ResourceKind::Warehouse).next().unwrap();
        assert_eq!(wh.owner, Some(OwnerRef::role(Name::unquoted("SYSADMIN"))));
    }

    #[test]
    fn edition_gated_attribute_rejects_standard_session() {
        let yaml = "warehouses:\n  - name: WH\n    min_cluster_count: 2\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        assert!(matches!(resolve(compiled, &session()), Err(ResolveError::WrongEdition { .. })));
    }

    #[test]
    fn edition_gated_attribute_allowed_on_enterprise_session() {
        let yaml = "warehouses:\n  - name: WH\n    min_cluster_count: 2\n";
        let compiled = compile(&[yaml], &Map::new()).unwrap();
        let enterprise = SessionContext::new("ab12345", Edition::Enterprise);
        assert!(resolve(compiled, &enterprise).is_ok());
    }
}
