/// Errors raised while talking to a `Session` or decoding its rows
/// (component C5), per spec.md §7's taxonomy entries owned by C5.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("statement failed: {statement:?} ({code})")]
    StatementFailure { statement: String, code: String },
    #[error("row missing expected column {0:?}")]
    MissingColumn(String),
    #[error(transparent)]
    Catalog(#[from] snowcap_catalog::CatalogError),
    #[error(transparent)]
    Ident(#[from] snowcap_ident::IdentError),
}
