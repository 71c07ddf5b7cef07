use snowcap_catalog::{CatalogError, Edition};
use snowcap_ident::IdentError;

/// Errors raised while compiling raw YAML documents into a flat resource
/// list (component C3), per spec.md §7's taxonomy entries owned by C3.
#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("failed to parse YAML")]
    Yaml(#[from] serde_yaml::Error),
    #[error("top-level key {0:?} conflicts with a scalar already set by another document")]
    ScalarConflict(String),
    #[error("required variable {0:?} was not supplied and has no default")]
    MissingVar(String),
    #[error("variable {name:?} expected type {expected}, got {actual}")]
    VarTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("for_each on {section:?} must reference a list variable, found {actual}")]
    ForEachNotAList { section: String, actual: &'static str },
    #[error("invalid resource in section {section:?}: {reason}")]
    InvalidResource { section: String, reason: String },
    #[error("unknown top-level key {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("template error in {context:?}: {reason}")]
    Template { context: String, reason: String },
}

/// Errors raised while resolving references across a compiled resource
/// list (component C4).
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("two distinct resources share URN {0}")]
    DuplicateResource(String),
    #[error("resource {urn} is schema-scoped but no database/schema scope root is configured")]
    MissingScopeRoot { urn: String },
    #[error("attribute {attr:?} on {urn} requires edition {required:?} but session edition is {actual:?}")]
    WrongEdition {
        urn: String,
        attr: &'static str,
        required: Edition,
        actual: Edition,
    },
    #[error("owner reference {0:?} does not resolve to an in-manifest role or an external role name")]
    UnresolvedOwner(String),
    #[error("explicit PUBLIC schema {0} may not be authored; it is implicit")]
    ExplicitPublicSchema(String),
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Top-level error for the combined C3 → C4 pipeline (`build`), aggregating
/// the two phase-specific error enums the same way `snowcap_core::SnowcapError`
/// later aggregates every crate's error type.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
