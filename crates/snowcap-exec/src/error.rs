/// Executor (C8) failure modes, spec.md §7: a wire-level failure during
/// apply, carrying the offending statement and the warehouse's error code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("statement failed: {statement:?} ({code})")]
    StatementFailure { statement: String, code: String },
}
