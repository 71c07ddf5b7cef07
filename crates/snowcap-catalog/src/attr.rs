use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snowcap_ident::Name;
use std::collections::BTreeMap;

use crate::scope::Edition;

/// One value in a resource's kind-specific attribute record.
///
/// Modeled as a closed value enum rather than raw JSON so the planner's
/// diff (`snowcap-plan`) can apply identifier-equality and set-comparison
/// rules generically across every kind without per-kind match arms — it
/// only needs to know the shape of an `AttrValue`, not what kind owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Ident(Name),
    List(Vec<AttrValue>),
    Null,
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&Name> {
        match self {
            AttrValue::Ident(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<Name> for AttrValue {
    fn from(n: Name) -> Self {
        AttrValue::Ident(n)
    }
}

/// A kind-specific attribute record: field name to value. Fields absent
/// from the map are treated as unset (distinct from an explicit `Null`).
pub type AttrRecord = BTreeMap<String, AttrValue>;

/// Whether a list-typed attribute's order carries meaning. Per spec.md
/// §4.6 step 3, order-irrelevant lists are compared as sets during diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Ordered,
    Unordered,
}

/// Per-field metadata the catalog declares for every attribute of a kind,
/// per spec.md §4.2: "type, default, `fetchable`, `known_after_apply`,
/// `ignore_changes`, `edition_required`".
#[derive(Debug, Clone, Copy)]
pub struct AttrMeta {
    pub name: &'static str,
    /// Whether the remote-state reader can populate this field at all
    /// (some fields are write-only, e.g. a password).
    pub fetchable: bool,
    /// Skipped during diff because the warehouse only knows the value
    /// after the statement has executed (e.g. a generated identifier).
    pub known_after_apply: bool,
    /// Skipped during diff unconditionally regardless of drift.
    pub ignore_changes: bool,
    /// Minimum edition required for this field to be honored; `None` means
    /// no edition gate.
    pub edition_required: Option<Edition>,
    /// How list-typed values compare during diff. Irrelevant for scalar
    /// fields.
    pub ordering: Ordering,
    /// Skipped during diff entirely: the field changes independently of
    /// attribute drift (the `owner` field is handled by `Transfer`, not
    /// `Update`).
    pub participates_in_diff: bool,
}

impl AttrMeta {
    pub const fn new(name: &'static str) -> Self {
        AttrMeta {
            name,
            fetchable: true,
            known_after_apply: false,
            ignore_changes: false,
            edition_required: None,
            ordering: Ordering::Ordered,
            participates_in_diff: true,
        }
    }

    pub const fn known_after_apply(mut self) -> Self {
        self.known_after_apply = true;
        self
    }

    pub const fn ignore_changes(mut self) -> Self {
        self.ignore_changes = true;
        self
    }

    pub const fn not_fetchable(mut self) -> Self {
        self.fetchable = false;
        self
    }

    pub const fn unordered(mut self) -> Self {
        self.ordering = Ordering::Unordered;
        self
    }

    pub const fn requires_edition(mut self, edition: Edition) -> Self {
        self.edition_required = Some(edition);
        self
    }

    /// True if this field should be skipped during change detection,
    /// either because it's flagged `ignore_changes`/`known_after_apply` or
    /// because it's a structural field handled outside `Update`.
    pub fn skip_in_diff(&self) -> bool {
        self.ignore_changes || self.known_after_apply || !self.participates_in_diff
    }
}
