use snowcap_ident::{Fqn, Urn};

use crate::attr::AttrRecord;
use crate::kind::{ResourceKind, StageSubtype};
use crate::owner::OwnerRef;
use crate::scope::Scope;

/// A single entity in the desired manifest or observed live state: kind
/// tag, FQN, owner, scope, and a kind-specific attribute record (spec.md
/// §3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub fqn: Fqn,
    pub owner: Option<OwnerRef>,
    pub scope: Scope,
    /// Set only for kinds the catalog declares as polymorphic (today, just
    /// `Stage`); `None` for every monomorphic kind.
    pub subtype: Option<StageSubtype>,
    pub attrs: AttrRecord,
    /// Extra dependency edges beyond what the catalog derives structurally
    /// (container/owner/reference) — spec.md §4.3 step 4's user-declared
    /// `requires`.
    pub requires: Vec<Urn>,
}

impl Resource {
    pub fn new(kind: ResourceKind, fqn: Fqn, scope: Scope) -> Self {
        Resource {
            kind,
            fqn,
            owner: None,
            scope,
            subtype: None,
            attrs: AttrRecord::new(),
            requires: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_attrs(mut self, attrs: AttrRecord) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_subtype(mut self, subtype: StageSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    pub fn with_requires(mut self, requires: Vec<Urn>) -> Self {
        self.requires = requires;
        self
    }

    /// The URN that keys this resource, given the account locator/org the
    /// blueprint resolves against.
    pub fn urn(&self, account_locator: &str, org: Option<&str>) -> Urn {
        let urn = Urn::new(account_locator, self.kind.tag(), self.fqn.clone());
        match org {
            Some(org) => urn.with_org(org),
            None => urn,
        }
    }
}
