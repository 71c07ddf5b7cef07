/// Errors raised while consulting the catalog itself (as opposed to
/// errors the manifest compiler/resolver raise using catalog data — those
/// live in `snowcap_manifest::{CompileError, ResolveError}`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown resource kind {0:?}")]
    UnknownKind(String),
    #[error("no polymorphic resolver matched an ambiguous {0} record")]
    AmbiguousSubtype(&'static str),
}
