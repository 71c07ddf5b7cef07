//! Scheduler (component C7): assigns a role to every action, groups the
//! ordered action list into role-stable batches, and renders the final
//! operation stream via the catalog's `Renderer` table (spec.md §4.7).

use std::collections::HashSet;

use snowcap_catalog::{create_priv_for, global_priv_default_owner, Edition, OwnerRef, Renderer, ResourceKind, REGISTRY};
use snowcap_ident::Urn;

use crate::action::Action;
use crate::error::ScheduleError;

/// One step of the scheduled operation stream. `UseSecondaryRoles` is
/// emitted exactly once, at the front; `UseRole` is emitted only when the
/// executing role actually changes from the previous statement (spec.md
/// §4.7 step 2, §5 "coalescing role changes").
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    UseSecondaryRoles,
    UseRole(String),
    /// A single rendered statement for one planner `Action`. `mutating` is
    /// always `true` today (every `Action` variant performs a write); kept
    /// as an explicit field rather than inferred from `Op` shape so the
    /// executor's "invalidate the cache after every mutating statement"
    /// rule (spec.md §4.8) reads directly off the op instead of matching
    /// on the action kind again.
    Statement {
        urn: Urn,
        kind: ResourceKind,
        sql: String,
        mutating: bool,
    },
}

/// The scheduler's output: the full operation stream a C8 executor walks
/// in order. Kept as one flat, already-interleaved stream (rather than a
/// `Vec<Batch>` of role-grouped statements) because spec.md §4.7 step 2
/// describes a single ordered emission ("the scheduler emits a preface...
/// then, whenever the role changes... a `USE ROLE R` statement, then the
/// statements for that action") rather than a two-level grouping the
/// executor would need to flatten again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    pub ops: Vec<Op>,
}

impl Schedule {
    /// The distinct roles actually used, in first-use order. Useful for a
    /// caller (e.g. `snowcap-core`) that wants to report which roles a
    /// plan will assume before applying it.
    pub fn roles_used(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for op in &self.ops {
            if let Op::UseRole(role) = op {
                if seen.insert(role.clone()) {
                    out.push(role.clone());
                }
            }
        }
        out
    }
}

/// Run the full C7 algorithm over an already-ordered action list (spec.md
/// §4.6's output): role selection, edition-gating, and batching into the
/// final `Schedule`.
///
/// `available_roles` is the set of roles the session holds and may `USE
/// ROLE` into. Spec.md §6.2's `Session` trait exposes only the *current*
/// active role, not which roles are grantable to it, so the core's
/// `BlueprintConfig` is the one that supplies this set explicitly
/// (documented as an Open Question resolution in `DESIGN.md`).
pub fn schedule(
    actions: &[Action],
    available_roles: &HashSet<String>,
    edition: Edition,
    renderer: &dyn Renderer,
) -> Result<Schedule, ScheduleError> {
    check_edition_gate(actions, edition)?;

    let mut ops = vec![Op::UseSecondaryRoles];
    let mut current_role: Option<String> = None;

    for action in actions {
        let role = role_for_action(action, available_roles)?;
        if current_role.as_deref() != Some(role.as_str()) {
            ops.push(Op::UseRole(role.clone()));
            current_role = Some(role);
        }
        ops.push(Op::Statement {
            urn: action.urn().clone(),
            kind: action.kind(),
            sql: render_action(action, renderer),
            mutating: true,
        });
    }

    Ok(Schedule { ops })
}

/// spec.md §4.7 step 3: "If any action requires features above the
/// session edition, raise `WrongEdition` before emitting." This is a
/// defense-in-depth check: `snowcap-manifest`'s resolver (C4) already
/// rejects edition-gated attributes at compile time, but the scheduler
/// re-checks kind-level edition gates (`KindRecord::edition_required`)
/// since a kind could in principle be edition-gated wholesale rather than
/// per-attribute.
fn check_edition_gate(actions: &[Action], edition: Edition) -> Result<(), ScheduleError> {
    for action in actions {
        let record = REGISTRY.get(action.kind());
        if let Some(required) = record.edition_required {
            if edition < required {
                return Err(ScheduleError::WrongEdition {
                    urn: action.urn().render(),
                    required,
                    actual: edition,
                });
            }
        }
    }
    Ok(())
}

/// spec.md §4.7 step 1: choose the smallest-privilege role the session
/// holds that can perform `action`.
fn role_for_action(action: &Action, available_roles: &HashSet<String>) -> Result<String, ScheduleError> {
    match action {
        Action::Create { after, .. } => {
            let create_priv = create_priv_for(after.kind);
            let candidates = [
                after.owner.as_ref().map(OwnerRef::bare_name).map(|n| n.render()),
                Some(global_priv_default_owner(create_priv).to_string()),
            ];
            pick_available(&candidates, available_roles).ok_or_else(|| ScheduleError::MissingPrivilege {
                action: action.label(),
                privilege: create_priv.to_string(),
            })
        }
        Action::Transfer { from, .. } => {
            let candidates = [
                Some(from.bare_name().render()),
                Some(global_priv_default_owner("MANAGE GRANTS").to_string()),
            ];
            pick_available(&candidates, available_roles).ok_or_else(|| ScheduleError::MissingPrivilege {
                action: action.label(),
                privilege: "MANAGE GRANTS (or the resource's current owner)".to_string(),
            })
        }
        Action::Update { after, .. } => {
            let record = REGISTRY.get(after.kind);
            let candidates = [
                after.owner.as_ref().map(OwnerRef::bare_name).map(|n| n.render()),
                Some(record.default_owner.to_string()),
            ];
            pick_available(&candidates, available_roles).ok_or_else(|| ScheduleError::MissingPrivilege {
                action: action.label(),
                privilege: "OWNERSHIP (or an equivalent admin role)".to_string(),
            })
        }
        Action::Drop { before, .. } => {
            let record = REGISTRY.get(before.kind);
            let candidates = [
                before.owner.as_ref().map(OwnerRef::bare_name).map(|n| n.render()),
                Some(record.default_owner.to_string()),
            ];
            pick_available(&candidates, available_roles).ok_or_else(|| ScheduleError::MissingPrivilege {
                action: action.label(),
                privilege: "OWNERSHIP".to_string(),
            })
        }
    }
}

/// The first candidate role name (in priority order) the session actually
/// holds, compared case-insensitively against `available_roles` (role
/// names are unquoted system tokens in practice, per spec.md §3.1's
/// quoting rule).
fn pick_available(candidates: &[Option<String>], available_roles: &HashSet<String>) -> Option<String> {
    candidates.iter().flatten().find_map(|candidate| {
        available_roles
            .iter()
            .find(|available| available.eq_ignore_ascii_case(candidate))
            .cloned()
    })
}

fn render_action(action: &Action, renderer: &dyn Renderer) -> String {
    match action {
        Action::Create { after, .. } => renderer.render_create(after),
        Action::Update { after, delta, .. } => renderer.render_update(after, delta),
        Action::Transfer { to, .. } => {
            // `render_transfer` wants the resource's current shape, which
            // the planner doesn't carry on `Transfer` (only the two
            // `OwnerRef`s) — synthesize a minimal resource carrying just
            // enough (kind/fqn) for the renderer to name the target.
            let stub = snowcap_catalog::Resource::new(
                action.kind(),
                action.urn().fqn.clone(),
                REGISTRY.get(action.kind()).scope,
            );
            renderer.render_transfer(&stub, to)
        }
        Action::Drop { before, .. } => renderer.render_drop(before),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_catalog::{GenericRenderer, Resource, Scope};
    use snowcap_ident::{Fqn, Name};
    use std::collections::BTreeSet;

    fn roles(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_picks_catalog_default_owner_when_available() {
        let resource = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB1")), Scope::Account);
        let action = Action::Create { urn: resource.urn("ab12345", None), after: resource };
        let available = roles(&["SYSADMIN"]);
        let sched = schedule(&[action], &available, Edition::Standard, &GenericRenderer).unwrap();
        assert!(matches!(sched.ops[1], Op::UseRole(ref r) if r == "SYSADMIN"));
    }

    #[test]
    fn missing_privilege_is_reported() {
        let resource = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB1")), Scope::Account);
        let action = Action::Create { urn: resource.urn("ab12345", None), after: resource };
        let available = roles(&["SOME_OTHER_ROLE"]);
        let err = schedule(&[action], &available, Edition::Standard, &GenericRenderer).unwrap_err();
        assert!(matches!(err, ScheduleError::MissingPrivilege { .. }));
    }

    #[test]
    fn adjacent_same_role_actions_emit_one_use_role() {
        let db1 = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB1")), Scope::Account);
        let db2 = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB2")), Scope::Account);
        let actions = vec![
            Action::Create { urn: db1.urn("ab12345", None), after: db1 },
            Action::Create { urn: db2.urn("ab12345", None), after: db2 },
        ];
        let available = roles(&["SYSADMIN"]);
        let sched = schedule(&actions, &available, Edition::Standard, &GenericRenderer).unwrap();
        let use_role_count = sched.ops.iter().filter(|op| matches!(op, Op::UseRole(_))).count();
        assert_eq!(use_role_count, 1);
    }

    #[test]
    fn role_switch_between_differently_owned_actions() {
        let wh = Resource::new(ResourceKind::Warehouse, Fqn::bare(Name::unquoted("WH")), Scope::Account)
            .with_owner(OwnerRef::role(Name::unquoted("CUSTOMROLE")));
        let role = Resource::new(ResourceKind::Role, Fqn::bare(Name::unquoted("CUSTOMROLE")), Scope::Account);
        let actions = vec![
            Action::Create { urn: role.urn("ab12345", None), after: role },
            Action::Create { urn: wh.urn("ab12345", None), after: wh.clone() },
            Action::Transfer {
                urn: wh.urn("ab12345", None),
                kind: ResourceKind::Warehouse,
                from: OwnerRef::role(Name::unquoted("SYSADMIN")),
                to: OwnerRef::role(Name::unquoted("CUSTOMROLE")),
            },
        ];
        let available = roles(&["USERADMIN", "SYSADMIN", "CUSTOMROLE"]);
        let sched = schedule(&actions, &available, Edition::Standard, &GenericRenderer).unwrap();
        let use_roles: Vec<&str> = sched
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::UseRole(r) => Some(r.as_str()),
                _ => None,
            })
            .collect();
        // Role (USERADMIN) -> Warehouse create (CUSTOMROLE, its owner) -> Transfer (SYSADMIN, the from-owner).
        assert_eq!(use_roles, vec!["USERADMIN", "CUSTOMROLE", "SYSADMIN"]);
    }

    #[test]
    fn drop_requires_owner_role() {
        let db = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB1")), Scope::Account)
            .with_owner(OwnerRef::role(Name::unquoted("CUSTOMROLE")));
        let action = Action::Drop { urn: db.urn("ab12345", None), before: db };
        let available = roles(&["CUSTOMROLE"]);
        let sched = schedule(&[action], &available, Edition::Standard, &GenericRenderer).unwrap();
        assert!(matches!(sched.ops[1], Op::UseRole(ref r) if r == "CUSTOMROLE"));
    }

    #[test]
    fn statements_are_rendered_with_the_given_renderer() {
        let db = Resource::new(ResourceKind::Database, Fqn::bare(Name::unquoted("DB1")), Scope::Account);
        let action = Action::Create { urn: db.urn("ab12345", None), after: db };
        let available = roles(&["SYSADMIN"]);
        let sched = schedule(&[action], &available, Edition::Standard, &GenericRenderer).unwrap();
        let sql = sched
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Statement { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(sql, "CREATE DATABASE DB1");
        let _ = BTreeSet::<String>::new();
    }
}
