use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a resource lives in the warehouse containment hierarchy.
///
/// `Table` exists in the scope taxonomy even though this catalog doesn't
/// ship a table-scoped kind yet (spec.md §3.2 names it as one of the five
/// containment levels; the `KindRegistry` mechanism is meant to grow into it
/// without a taxonomy change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Organization,
    Account,
    Database,
    Schema,
    Table,
    Anonymous,
}

/// A Snowflake edition, ordered so `edition_required` checks are a simple
/// comparison (spec.md §4.4 "Edition validation", §4.7 "Edition-gating").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Edition {
    #[default]
    Standard,
    Enterprise,
    BusinessCritical,
}
