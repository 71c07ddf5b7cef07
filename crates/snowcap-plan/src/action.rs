use std::collections::BTreeSet;

use snowcap_catalog::{OwnerRef, Resource, ResourceKind};
use snowcap_ident::Urn;

/// One step of a plan: spec.md §3.4/glossary — "Create, Update, Transfer,
/// Drop, carrying enough information to render statements."
///
/// `Transfer` is kept distinct from `Update` (rather than folded into the
/// attribute delta) because the warehouse requires a dedicated
/// `GRANT OWNERSHIP` statement executed by the *from*-owner's role, not the
/// owning resource's usual admin role (spec.md glossary, "Ownership
/// transfer").
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create {
        urn: Urn,
        after: Resource,
    },
    Update {
        urn: Urn,
        before: Resource,
        after: Resource,
        delta: BTreeSet<String>,
    },
    Transfer {
        urn: Urn,
        kind: ResourceKind,
        from: OwnerRef,
        to: OwnerRef,
    },
    Drop {
        urn: Urn,
        before: Resource,
    },
}

impl Action {
    pub fn urn(&self) -> &Urn {
        match self {
            Action::Create { urn, .. }
            | Action::Update { urn, .. }
            | Action::Transfer { urn, .. }
            | Action::Drop { urn, .. } => urn,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Action::Create { after, .. } => after.kind,
            Action::Update { after, .. } => after.kind,
            Action::Transfer { kind, .. } => *kind,
            Action::Drop { before, .. } => before.kind,
        }
    }

    /// Tie-break tier within a topological layer, spec.md §4.6 "Tie-breaks":
    /// "Create precedes Transfer precedes Update precedes Drop".
    pub(crate) fn tier(&self) -> u8 {
        match self {
            Action::Create { .. } => 0,
            Action::Transfer { .. } => 1,
            Action::Update { .. } => 2,
            Action::Drop { .. } => 3,
        }
    }

    pub fn label(&self) -> String {
        format!("{}({})", self.tier_name(), self.urn().render())
    }

    fn tier_name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "Create",
            Action::Update { .. } => "Update",
            Action::Transfer { .. } => "Transfer",
            Action::Drop { .. } => "Drop",
        }
    }
}
