use std::collections::BTreeSet;

use crate::owner::OwnerRef;
use crate::resource::Resource;

/// Emits warehouse statements for a resource. Spec.md §1/§5 treats the
/// actual DDL text as an external collaborator's concern ("per-kind DDL
/// rendering detail beyond a small `Renderer` trait + table" is a stated
/// Non-goal); this trait is the seam the planner/scheduler/executor
/// dispatch through, with `GenericRenderer` providing a reasonable
/// placeholder implementation so the workspace has something runnable and
/// testable end to end.
pub trait Renderer {
    fn render_create(&self, resource: &Resource) -> String;
    fn render_update(&self, resource: &Resource, delta: &BTreeSet<String>) -> String;
    fn render_drop(&self, resource: &Resource) -> String;
    fn render_transfer(&self, resource: &Resource, to_owner: &OwnerRef) -> String;
}

/// A renderer that emits generic, syntactically plausible DDL from a
/// resource's kind/FQN/attres. Good enough to drive the executor and the
/// end-to-end scenario tests; a production rendition would supply a
/// per-kind renderer table instead (the registry's `KindRecord` is the
/// extension point named in spec.md §4.2 for that).
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericRenderer;

impl Renderer for GenericRenderer {
    fn render_create(&self, resource: &Resource) -> String {
        format!(
            "CREATE {} {}",
            resource.kind.tag().to_uppercase().replace('_', " "),
            resource.fqn.render()
        )
    }

    fn render_update(&self, resource: &Resource, delta: &BTreeSet<String>) -> String {
        let fields = delta.iter().cloned().collect::<Vec<_>>().join(", ");
        format!(
            "ALTER {} {} SET {}",
            resource.kind.tag().to_uppercase().replace('_', " "),
            resource.fqn.render(),
            fields
        )
    }

    fn render_drop(&self, resource: &Resource) -> String {
        format!(
            "DROP {} {}",
            resource.kind.tag().to_uppercase().replace('_', " "),
            resource.fqn.render()
        )
    }

    fn render_transfer(&self, resource: &Resource, to_owner: &OwnerRef) -> String {
        let owner_clause = match to_owner {
            OwnerRef::Role(name) => format!("ROLE {}", name.render()),
            OwnerRef::DatabaseRole { database, role } => {
                format!("DATABASE ROLE {}.{}", database.render(), role.render())
            }
            OwnerRef::External(name) => format!("ROLE {}", name.render()),
        };
        format!(
            "GRANT OWNERSHIP ON {} {} TO {}",
            resource.kind.tag().to_uppercase().replace('_', " "),
            resource.fqn.render(),
            owner_clause
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kind::ResourceKind;
    use crate::scope::Scope;
    use snowcap_ident::{Fqn, Name};

    #[test]
    fn renders_create_statement() {
        let resource = Resource::new(
            ResourceKind::Database,
            Fqn::bare(Name::unquoted("DB1")),
            Scope::Account,
        );
        assert_eq!(GenericRenderer.render_create(&resource), "CREATE DATABASE DB1");
    }

    #[test]
    fn renders_transfer_statement_for_database_role() {
        let resource = Resource::new(
            ResourceKind::Warehouse,
            Fqn::bare(Name::unquoted("WH")),
            Scope::Account,
        );
        let owner = OwnerRef::database_role(Name::unquoted("DB1"), Name::unquoted("ADMIN"));
        assert_eq!(
            GenericRenderer.render_transfer(&resource, &owner),
            "GRANT OWNERSHIP ON WAREHOUSE WH TO DATABASE ROLE DB1.ADMIN"
        );
    }
}
