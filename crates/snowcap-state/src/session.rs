use std::collections::BTreeMap;

/// A single returned row: a string-keyed map of column name to value,
/// exactly as spec.md §6.2 describes the `Session.execute` contract.
pub type Row = BTreeMap<String, serde_json::Value>;

/// A wire-level failure from a `Session`, carrying the warehouse's error
/// code so callers can opt specific codes into "treat as empty" recovery
/// (spec.md §7's `empty_response_codes`).
#[derive(Debug, Clone)]
pub struct SessionError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for SessionError {}

/// The warehouse connection contract the reader and executor are built
/// against (spec.md §6.2). Any driver satisfying this shape can back
/// Snowcap; the wire protocol itself is explicitly opaque and out of
/// scope (spec.md's "warehouse wire protocol" Non-goal).
///
/// Spec.md also names a `cursor()` factory "with the same semantics" as
/// `execute`. Since nothing here ever needs more than one statement's
/// result set live at a time, a cursor collapses to a call to `execute`;
/// this trait omits it rather than carry a distinction with no behavior
/// difference (recorded as an Open Question resolution in DESIGN.md).
pub trait Session: Send + Sync {
    fn execute(&self, sql: &str) -> Result<Vec<Row>, SessionError>;
    fn role(&self) -> &str;
    fn user(&self) -> &str;
}
