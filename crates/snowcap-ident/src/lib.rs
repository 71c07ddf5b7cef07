//! Identifier model (component C1): names, fully qualified names, and URNs.
//!
//! This crate owns the quoting/case rules that every other Snowcap crate
//! treats as ground truth for comparing and rendering warehouse object
//! names. It has no knowledge of resource kinds beyond treating a kind as
//! an opaque string tag inside a URN — the catalog of legal kinds lives in
//! `snowcap-catalog`.

use std::collections::BTreeMap;
use std::fmt;

mod fqn;
mod name;
mod urn;

pub use fqn::{parse_fqn, Fqn, FqnContext};
pub use name::{parse_name, Name};
pub use urn::{parse_urn, Urn};

/// Errors raised while parsing identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentError {
    #[error("invalid identifier {0:?}: empty")]
    Empty(String),
    #[error("invalid quoted identifier {0:?}: unterminated quote")]
    UnterminatedQuote(String),
    #[error("invalid fully qualified name {0:?}: expected 1-3 dotted parts, got {1}")]
    FqnArity(String, usize),
    #[error("invalid fully qualified name {0:?}: ambiguous without scope context")]
    FqnAmbiguous(String),
    #[error("invalid URN {0:?}: {1}")]
    MalformedUrn(String, &'static str),
}

/// An ordered string-keyed parameter map, used to disambiguate non-object
/// resources (spec.md §3.1's `params` on an FQN, and a URN's `?params`
/// query string).
pub type Params = BTreeMap<String, String>;

/// Render a params map in the canonical `k=v&k2=v2` query-string form used
/// by both `Fqn` callable signatures' trailing params and `Urn::render`.
pub(crate) fn render_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn parse_params(s: &str) -> Params {
    let mut out = Params::new();
    if s.is_empty() {
        return out;
    }
    for pair in s.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            out.insert(k.to_string(), v.to_string());
        } else {
            out.insert(pair.to_string(), String::new());
        }
    }
    out
}

/// A display helper that's only used in error messages / debug output; not
/// part of the canonical render path (which lives on `Name`/`Fqn`/`Urn`
/// themselves).
pub(crate) fn quote_display(raw: &str) -> impl fmt::Display + '_ {
    struct D<'a>(&'a str);
    impl fmt::Display for D<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    D(raw)
}
