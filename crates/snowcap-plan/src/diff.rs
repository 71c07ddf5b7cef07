//! Planner / diff (component C6), spec.md §4.6.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use snowcap_catalog::{
    expand_privilege, is_all_privilege, AttrValue, Ordering as AttrOrdering, OwnerRef, Resource,
    ResourceKind, REGISTRY,
};
use snowcap_ident::{parse_name, Fqn, Name, Urn};
use snowcap_manifest::{BlueprintScope, Manifest};

use crate::action::Action;
use crate::error::PlanError;
use crate::live::LiveState;

/// Run the full C6 algorithm: scope validation, pairing, delta
/// normalization, dependency ordering, and tie-breaking.
pub fn plan(manifest: &Manifest, live: &LiveState) -> Result<Vec<Action>, PlanError> {
    validate_scope(manifest)?;

    let desired = expand_all_grants(&manifest.urns);
    let actions = pair_up(manifest, &desired, &live.urns);
    order_actions(&desired, &live.urns, actions)
}

/// spec.md §4.6 step 1: "Every desired URN must be inside the blueprint
/// scope; if scope is Database/Schema, URNs outside the root are errors."
fn validate_scope(manifest: &Manifest) -> Result<(), PlanError> {
    for (urn, resource) in &manifest.urns {
        match manifest.scope {
            BlueprintScope::Account => {}
            BlueprintScope::Database => {
                if let (Some(root), Some(db)) = (&manifest.database, &resource.fqn.database) {
                    if db != root {
                        return Err(PlanError::OutOfScope { urn: urn.render() });
                    }
                }
            }
            BlueprintScope::Schema => {
                if let (Some(root), Some(db)) = (&manifest.database, &resource.fqn.database) {
                    if db != root {
                        return Err(PlanError::OutOfScope { urn: urn.render() });
                    }
                }
                if let (Some(root), Some(schema)) = (&manifest.schema, &resource.fqn.schema) {
                    if schema != root {
                        return Err(PlanError::OutOfScope { urn: urn.render() });
                    }
                }
            }
        }
    }
    Ok(())
}

/// spec.md §4.6 step 3's "Privileges given as `ALL` are expanded to the
/// canonical set for the target kind before comparison" (spec.md §8.2's
/// ALL-privilege expansion law): a desired `Grant` resource whose `priv`
/// param is `ALL` is replaced by one resource per privilege the catalog
/// declares for the kind the grant names in its `on_kind` attr — absent
/// that attr (the common case: a declarative `GRANT ... ON DATABASE ...`),
/// the expansion targets the kind the `Grant`'s `on` name plausibly
/// belongs to is unknowable from the grant alone, so `ALL` is expanded
/// against every kind's privilege set the name could refer to isn't
/// attempted; instead the attr the compiler stamps (`on_kind`) is
/// required for `ALL` grants, which `snowcap-manifest`'s grant parser
/// already records via the `kind` capture group.
fn expand_all_grants(urns: &BTreeMap<Urn, Resource>) -> BTreeMap<Urn, Resource> {
    let mut out = BTreeMap::new();
    for (urn, resource) in urns {
        if resource.kind != ResourceKind::Grant {
            out.insert(urn.clone(), resource.clone());
            continue;
        }
        let Some(priv_param) = resource.fqn.params.get("priv") else {
            out.insert(urn.clone(), resource.clone());
            continue;
        };
        if !is_all_privilege(priv_param) {
            out.insert(urn.clone(), resource.clone());
            continue;
        }
        let on_kind = resource
            .attrs
            .get("on_kind")
            .and_then(AttrValue::as_str)
            .and_then(|s| s.parse::<ResourceKind>().ok())
            .unwrap_or(ResourceKind::Database);
        for p in expand_privilege(on_kind, priv_param) {
            let mut fqn = resource.fqn.clone();
            fqn.params.insert("priv".to_string(), p.to_string());
            let new_urn = Urn::new(urn.account_locator.clone(), urn.kind.clone(), fqn.clone());
            let new_urn = match &urn.org {
                Some(org) => new_urn.with_org(org.clone()),
                None => new_urn,
            };
            let mut new_resource = resource.clone();
            new_resource.fqn = fqn;
            out.insert(new_urn, new_resource);
        }
    }
    out
}

fn pair_up(
    manifest: &Manifest,
    desired: &BTreeMap<Urn, Resource>,
    live: &BTreeMap<Urn, Resource>,
) -> Vec<Action> {
    let all_urns: BTreeSet<&Urn> = desired.keys().chain(live.keys()).collect();
    let mut actions = Vec::new();

    for urn in all_urns {
        let want = desired.get(urn);
        let have = live.get(urn);
        match (want, have) {
            (Some(d), None) => actions.push(Action::Create { urn: urn.clone(), after: d.clone() }),
            (None, Some(l)) => {
                if manifest.sync_kinds.contains(&l.kind) {
                    actions.push(Action::Drop { urn: urn.clone(), before: l.clone() });
                }
            }
            (Some(d), Some(l)) => {
                let owner_changed = owners_differ(d.owner.as_ref(), l.owner.as_ref());
                if owner_changed {
                    if let (Some(from), Some(to)) = (l.owner.clone(), d.owner.clone()) {
                        actions.push(Action::Transfer { urn: urn.clone(), kind: d.kind, from, to });
                    }
                }
                let delta = diff_attrs(d, l);
                if !delta.is_empty() {
                    actions.push(Action::Update {
                        urn: urn.clone(),
                        before: l.clone(),
                        after: d.clone(),
                        delta,
                    });
                }
            }
            (None, None) => unreachable!("URN drawn from the union of both maps"),
        }
    }

    actions
}

fn owners_differ(desired: Option<&OwnerRef>, live: Option<&OwnerRef>) -> bool {
    match (desired, live) {
        (Some(d), Some(l)) => d != l,
        (None, None) => false,
        _ => true,
    }
}

/// spec.md §4.6 step 2/3: field-by-field delta skipping `ignore_changes`/
/// `known_after_apply` fields, comparing unordered lists as sets and
/// identifier-valued fields with the identifier-equality rule (`Name`'s
/// `PartialEq`, which already implements spec.md §4.1's quoting rule).
fn diff_attrs(desired: &Resource, live: &Resource) -> BTreeSet<String> {
    let record = REGISTRY.get(desired.kind);
    let mut delta = BTreeSet::new();

    let mut field_names: BTreeSet<&str> = BTreeSet::new();
    field_names.extend(desired.attrs.keys().map(String::as_str));
    field_names.extend(live.attrs.keys().map(String::as_str));

    for field in field_names {
        let Some(meta) = record.attr(field) else {
            continue;
        };
        if meta.skip_in_diff() {
            continue;
        }
        let d = desired.attrs.get(field);
        let l = live.attrs.get(field);
        let equal = match meta.ordering {
            AttrOrdering::Unordered => values_equal_as_sets(d, l),
            AttrOrdering::Ordered => values_equal(d, l),
        };
        if !equal {
            delta.insert(field.to_string());
        }
    }

    delta
}

fn values_equal(a: Option<&AttrValue>, b: Option<&AttrValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => attr_value_eq(a, b),
        _ => false,
    }
}

fn values_equal_as_sets(a: Option<&AttrValue>, b: Option<&AttrValue>) -> bool {
    let as_set = |v: Option<&AttrValue>| -> Vec<&AttrValue> {
        match v {
            Some(AttrValue::List(items)) => items.iter().collect(),
            Some(other) => vec![other],
            None => Vec::new(),
        }
    };
    let mut sa = as_set(a);
    let mut sb = as_set(b);
    if sa.len() != sb.len() {
        return false;
    }
    // AttrValue doesn't implement Ord, so set comparison is done by mutual
    // containment rather than sorting.
    sa.retain(|x| {
        if let Some(pos) = sb.iter().position(|y| attr_value_eq(x, y)) {
            sb.remove(pos);
            false
        } else {
            true
        }
    });
    sa.is_empty() && sb.is_empty()
}

fn attr_value_eq(a: &AttrValue, b: &AttrValue) -> bool {
    match (a, b) {
        (AttrValue::Ident(x), AttrValue::Ident(y)) => x == y,
        (AttrValue::Str(x), AttrValue::Ident(y)) | (AttrValue::Ident(y), AttrValue::Str(x)) => {
            Name::unquoted(x) == *y || x == &y.render()
        }
        (AttrValue::List(x), AttrValue::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(i, j)| attr_value_eq(i, j))
        }
        _ => a == b,
    }
}

/// spec.md §4.6 steps 4-5 + "Tie-breaks": build the dependency DAG, reject
/// cycles, layer it, and order actions by (layer, tier, kind, urn) —
/// reversing the layer axis for `Drop` so that "drops of leaves precede
/// drops of their containers".
fn order_actions(
    desired: &BTreeMap<Urn, Resource>,
    live: &BTreeMap<Urn, Resource>,
    actions: Vec<Action>,
) -> Result<Vec<Action>, PlanError> {
    let mut universe: BTreeMap<Urn, Resource> = live.clone();
    universe.extend(desired.iter().map(|(u, r)| (u.clone(), r.clone())));
    let edges = dependency_edges(&universe);
    let layers = layer(&universe, &edges)?;

    let max_layer = layers.values().copied().max().unwrap_or(0);

    let mut keyed: Vec<(u64, u8, &str, String, Action)> = actions
        .into_iter()
        .map(|action| {
            let layer = *layers.get(action.urn()).unwrap_or(&0);
            let effective_layer = if matches!(action, Action::Drop { .. }) {
                max_layer - layer
            } else {
                layer
            };
            let tier = action.tier();
            let kind = action.kind().tag();
            let urn_str = action.urn().render();
            (effective_layer, tier, kind, urn_str, action)
        })
        .collect();

    keyed.sort_by(|a, b| {
        (a.0, a.1, a.2, &a.3).cmp(&(b.0, b.1, b.2, &b.3))
    });

    Ok(keyed.into_iter().map(|(_, _, _, _, action)| action).collect())
}

/// Builds the `from -> to` edge list meaning "`from` must be created before
/// `to`" (and, symmetrically, "`to` must be dropped before `from`"), per
/// spec.md §4.6 step 4's four edge sources.
fn dependency_edges(universe: &BTreeMap<Urn, Resource>) -> Vec<(Urn, Urn)> {
    let mut edges = Vec::new();

    let roles_by_name: HashMap<Name, Urn> = universe
        .iter()
        .filter(|(_, r)| matches!(r.kind, ResourceKind::Role | ResourceKind::DatabaseRole))
        .map(|(urn, r)| (r.fqn.name.clone(), urn.clone()))
        .collect();

    for (urn, resource) in universe {
        // container -> contained
        if let Some(container_urn) = container_urn(resource, universe) {
            edges.push((container_urn, urn.clone()));
        }

        // owner -> owned
        if let Some(owner) = &resource.owner {
            if let Some(owner_urn) = owner_urn(owner, universe) {
                edges.push((owner_urn, urn.clone()));
            }
        }

        // referenced -> referrer (catalog-declared typed references, e.g.
        // a Task's predecessor)
        let record = REGISTRY.get(resource.kind);
        for (attr_name, target_kind) in record.reference_attrs {
            let target_name = match resource.attrs.get(*attr_name) {
                Some(AttrValue::Ident(n)) => Some(n.clone()),
                Some(AttrValue::Str(s)) => parse_name(s).ok(),
                _ => None,
            };
            if let Some(target_name) = target_name {
                let target_fqn = Fqn {
                    database: resource.fqn.database.clone(),
                    schema: resource.fqn.schema.clone(),
                    name: target_name,
                    arg_types: None,
                    params: Default::default(),
                };
                let target_urn = Urn::new(urn.account_locator.clone(), target_kind.tag(), target_fqn);
                let target_urn = match &urn.org {
                    Some(org) => target_urn.with_org(org.clone()),
                    None => target_urn,
                };
                if universe.contains_key(&target_urn) {
                    edges.push((target_urn, urn.clone()));
                }
            }
        }

        // grant-style identity fields: a RoleGrant/DatabaseRoleGrant/Grant
        // names its subject role (and, when granted to another role, that
        // role too) via an `Ident`-valued attr rather than a catalog
        // `reference_attrs` entry, since the target kind varies per grant.
        if matches!(
            resource.kind,
            ResourceKind::Grant | ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant
        ) {
            for key in ["role", "to"] {
                if let Some(AttrValue::Ident(name)) = resource.attrs.get(key) {
                    if let Some(role_urn) = roles_by_name.get(name) {
                        if role_urn != urn {
                            edges.push((role_urn.clone(), urn.clone()));
                        }
                    }
                }
            }
        }

        // user-declared requires
        for required in &resource.requires {
            if universe.contains_key(required) {
                edges.push((required.clone(), urn.clone()));
            }
        }
    }

    edges.sort();
    edges.dedup();
    edges
}

fn container_urn(resource: &Resource, universe: &BTreeMap<Urn, Resource>) -> Option<Urn> {
    use snowcap_catalog::Scope;
    match resource.scope {
        Scope::Schema => {
            let database = resource.fqn.database.clone()?;
            let schema = resource.fqn.schema.clone()?;
            let fqn = Fqn {
                database: Some(database),
                schema: None,
                name: schema,
                arg_types: None,
                params: Default::default(),
            };
            find_in_universe(universe, ResourceKind::Schema, &fqn)
        }
        Scope::Database => {
            let database = resource.fqn.database.clone()?;
            let fqn = Fqn::bare(database);
            find_in_universe(universe, ResourceKind::Database, &fqn)
        }
        _ => None,
    }
}

fn find_in_universe(universe: &BTreeMap<Urn, Resource>, kind: ResourceKind, fqn: &Fqn) -> Option<Urn> {
    universe
        .keys()
        .find(|u| u.kind == kind.tag() && &u.fqn == fqn)
        .cloned()
}

fn owner_urn(owner: &OwnerRef, universe: &BTreeMap<Urn, Resource>) -> Option<Urn> {
    match owner {
        OwnerRef::Role(name) => universe
            .keys()
            .find(|u| u.kind == ResourceKind::Role.tag() && u.fqn.name == *name)
            .cloned(),
        OwnerRef::DatabaseRole { database, role } => universe
            .keys()
            .find(|u| {
                u.kind == ResourceKind::DatabaseRole.tag()
                    && u.fqn.name == *role
                    && u.fqn.database.as_ref() == Some(database)
            })
            .cloned(),
        OwnerRef::External(_) => None,
    }
}

/// Kahn's algorithm with explicit layering: each round's ready set (nodes
/// with no remaining incoming edge) becomes one layer. A non-empty
/// leftover graph after no more nodes can be removed is a cycle.
fn layer(universe: &BTreeMap<Urn, Resource>, edges: &[(Urn, Urn)]) -> Result<HashMap<Urn, u64>, PlanError> {
    let mut indegree: HashMap<Urn, usize> = universe.keys().map(|u| (u.clone(), 0)).collect();
    let mut outgoing: HashMap<Urn, Vec<Urn>> = HashMap::new();
    for (from, to) in edges {
        *indegree.entry(to.clone()).or_insert(0) += 1;
        outgoing.entry(from.clone()).or_default().push(to.clone());
    }

    let mut layers = HashMap::new();
    let mut remaining: HashSet<Urn> = universe.keys().cloned().collect();
    let mut current_layer = 0u64;

    while !remaining.is_empty() {
        let ready: Vec<Urn> = remaining
            .iter()
            .filter(|u| indegree.get(*u).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();

        if ready.is_empty() {
            let mut leftover: Vec<String> = remaining.iter().map(Urn::render).collect();
            leftover.sort();
            return Err(PlanError::NotADAG(leftover));
        }

        for u in &ready {
            layers.insert(u.clone(), current_layer);
            remaining.remove(u);
            if let Some(children) = outgoing.get(u) {
                for child in children {
                    if let Some(d) = indegree.get_mut(child) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
        }
        current_layer += 1;
    }

    Ok(layers)
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_catalog::Edition;
    use snowcap_ident::parse_name;
    use snowcap_manifest::{build, SessionContext};

    fn session() -> SessionContext {
        SessionContext::new("ab12345", Edition::Standard)
    }

    #[test]
    fn create_database_when_live_is_empty() {
        let yaml = "scope: ACCOUNT\ndatabases:\n  - name: DB1\n";
        let manifest = build(&[yaml], &Default::default(), &session()).unwrap();
        let live = LiveState::default();
        let actions = plan(&manifest, &live).unwrap();

        let db_urn = Urn::new("ab12345", "database", Fqn::bare(parse_name("DB1").unwrap()));
        assert!(actions.iter().any(|a| matches!(a, Action::Create { urn, .. } if *urn == db_urn)));
        // PUBLIC schema is implicit and also created.
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn drop_outside_sync_resources_is_ignored() {
        let yaml = "scope: ACCOUNT\nsync_resources: [DATABASE]\n";
        let manifest = build(&[yaml], &Default::default(), &session()).unwrap();

        let mut live = LiveState::default();
        let role_urn = Urn::new("ab12345", "role", Fqn::bare(parse_name("R").unwrap()));
        live.urns.insert(
            role_urn,
            Resource::new(ResourceKind::Role, Fqn::bare(parse_name("R").unwrap()), snowcap_catalog::Scope::Account),
        );

        let actions = plan(&manifest, &live).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn no_op_when_desired_matches_live() {
        let yaml = "scope: ACCOUNT\ndatabases:\n  - name: DB1\n";
        let manifest = build(&[yaml], &Default::default(), &session()).unwrap();
        let live = LiveState { urns: manifest.urns.clone() };
        let actions = plan(&manifest, &live).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn cycle_is_rejected() {
        let yaml = "scope: SCHEMA\ndatabase: DB1\nschema: S1\ntasks:\n  - name: A\n    predecessor: B\n  - name: B\n    predecessor: A\n";
        let manifest = build(&[yaml], &Default::default(), &session()).unwrap();
        let live = LiveState::default();
        assert!(matches!(plan(&manifest, &live), Err(PlanError::NotADAG(_))));
    }
}
