use schemars::JsonSchema;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::{fqn::parse_fqn, render_params, Fqn, FqnContext, IdentError, Params};

/// A URN uniquely addressing one warehouse resource, per spec.md §3.1:
/// `urn:{org?}:{account_locator}:{kind}/{fqn}[?params]`.
///
/// `org` is optional (omitted for single-account deployments); `account_locator`
/// and `kind` are always present. `fqn` and `params` are carried as their own
/// pre-parsed types rather than a raw string, since every component that
/// consumes a `Urn` needs the structured form and re-parsing it at every call
/// site would be wasteful and error-prone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn {
    pub org: Option<String>,
    pub account_locator: String,
    pub kind: String,
    pub fqn: Fqn,
}

impl Urn {
    pub fn new(account_locator: impl Into<String>, kind: impl Into<String>, fqn: Fqn) -> Self {
        Self {
            org: None,
            account_locator: account_locator.into(),
            kind: kind.into(),
            fqn,
        }
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// Render the canonical string form. `parse_urn(u.render()) == u` is
    /// required to hold for every `Urn` this crate can produce.
    pub fn render(&self) -> String {
        let mut out = String::from("urn:");
        if let Some(org) = &self.org {
            out.push_str(org);
        }
        out.push(':');
        out.push_str(&self.account_locator);
        out.push(':');
        out.push_str(&self.kind);
        out.push('/');
        out.push_str(&self.fqn_body());
        if !self.fqn.params.is_empty() {
            out.push('?');
            out.push_str(&render_params(&self.fqn.params));
        }
        out
    }

    fn fqn_body(&self) -> String {
        // Fqn::render also appends its own params/arg_types; for the URN we
        // need the dotted+signature part without the trailing `?params`,
        // since the URN's params belong after the kind/fqn path as a whole.
        let mut bare = self.fqn.clone();
        bare.params = Params::new();
        bare.render()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl Serialize for Urn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_urn(&s).map_err(|e| D::Error::custom(e.to_string()))
    }
}

impl JsonSchema for Urn {
    fn schema_name() -> String {
        "Urn".to_string()
    }

    fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            ..Default::default()
        }
        .into()
    }
}

/// The `FqnContext` a given `kind` segment's body parses under, mirroring
/// `snowcap-catalog`'s per-kind `Scope` (spec.md §4.2) without this crate
/// taking a dependency on that crate: a schema or database role's FQN is
/// always `database.name` (2 dotted parts); a stage or task's FQN may be
/// `name`, `schema.name`, or `database.schema.name`. Every other kind this
/// catalog ships never renders a 2-part body (account-scoped kinds are
/// either bare names or, for grants, a bare name plus `?params`), so
/// `FqnContext::Account` — which rejects 2-part names as ambiguous — is
/// safe for them. Adding a database- or schema-scoped kind to the catalog
/// means adding its tag here too.
fn fqn_context_for_kind(kind: &str) -> FqnContext {
    match kind {
        "schema" | "database_role" => FqnContext::DatabaseScoped,
        "stage" | "task" => FqnContext::SchemaScoped,
        _ => FqnContext::Account,
    }
}

/// Parse a URN string of the form `urn:{org?}:{account_locator}:{kind}/{fqn}[?params]`.
///
/// The `kind` segment determines how the `fqn` body is scoped (bare,
/// schema-scoped, or database-scoped); `fqn_context_for_kind` picks the
/// right `FqnContext` so that, e.g., a schema's 2-part `MYDB.PUBLIC` body
/// parses as `database.name` rather than being rejected as ambiguous.
pub fn parse_urn(input: &str) -> Result<Urn, IdentError> {
    let rest = input
        .strip_prefix("urn:")
        .ok_or(IdentError::MalformedUrn(input.to_string(), "missing urn: prefix"))?;

    let (head, fqn_part) = rest
        .split_once('/')
        .ok_or(IdentError::MalformedUrn(input.to_string(), "missing '/' before fqn"))?;

    let head_parts: Vec<&str> = head.split(':').collect();
    let (org, account_locator, kind) = match head_parts.as_slice() {
        [locator, kind] => (None, *locator, *kind),
        [org, locator, kind] => (Some(org.to_string()), *locator, *kind),
        _ => {
            return Err(IdentError::MalformedUrn(
                input.to_string(),
                "expected {account_locator}:{kind} or {org}:{account_locator}:{kind}",
            ))
        }
    };

    if account_locator.is_empty() {
        return Err(IdentError::MalformedUrn(
            input.to_string(),
            "account_locator must not be empty",
        ));
    }
    if kind.is_empty() {
        return Err(IdentError::MalformedUrn(input.to_string(), "kind must not be empty"));
    }
    if fqn_part.is_empty() {
        return Err(IdentError::MalformedUrn(input.to_string(), "fqn must not be empty"));
    }

    let fqn = parse_fqn(fqn_part, fqn_context_for_kind(kind))?;

    Ok(Urn {
        org,
        account_locator: account_locator.to_string(),
        kind: kind.to_string(),
        fqn,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Name;

    #[test]
    fn parses_without_org() {
        let urn = parse_urn("urn:ab12345:database/MYDB").unwrap();
        assert_eq!(urn.org, None);
        assert_eq!(urn.account_locator, "ab12345");
        assert_eq!(urn.kind, "database");
        assert_eq!(urn.fqn.name, Name::unquoted("MYDB"));
    }

    #[test]
    fn parses_with_org() {
        let urn = parse_urn("urn:acme:ab12345:schema/MYDB.PUBLIC").unwrap();
        assert_eq!(urn.org.as_deref(), Some("acme"));
        assert_eq!(urn.fqn.database, Some(Name::unquoted("MYDB")));
        assert_eq!(urn.fqn.name, Name::unquoted("PUBLIC"));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(parse_urn("ab12345:database/MYDB").is_err());
    }

    #[test]
    fn rejects_missing_fqn() {
        assert!(parse_urn("urn:ab12345:database/").is_err());
    }

    #[test]
    fn round_trips() {
        let input = "urn:ab12345:grant/MYDB.PUBLIC.MYTABLE?priv=SELECT&to=MYROLE";
        let urn = parse_urn(input).unwrap();
        assert_eq!(urn.render(), input);
    }

    #[test]
    fn round_trips_with_org() {
        let input = "urn:acme:ab12345:database/MYDB";
        let urn = parse_urn(input).unwrap();
        assert_eq!(urn.render(), input);
    }

    #[test]
    fn render_then_parse_is_identity() {
        let urn = Urn::new("xy98765", "role", Fqn::bare(Name::unquoted("SYSADMIN")));
        let rendered = urn.render();
        let reparsed = parse_urn(&rendered).unwrap();
        assert_eq!(urn, reparsed);
    }

    #[test]
    fn schema_urn_round_trips_its_two_part_body() {
        let input = "urn:ab12345:schema/MYDB.PUBLIC";
        let urn = parse_urn(input).unwrap();
        assert_eq!(urn.fqn.database, Some(Name::unquoted("MYDB")));
        assert_eq!(urn.fqn.name, Name::unquoted("PUBLIC"));
        assert_eq!(urn.render(), input);
    }

    #[test]
    fn database_role_urn_round_trips_its_two_part_body() {
        let input = "urn:ab12345:database_role/MYDB.MYROLE";
        let urn = parse_urn(input).unwrap();
        assert_eq!(urn.render(), input);
    }

    #[test]
    fn stage_urn_round_trips_schema_scoped_and_database_scoped_bodies() {
        let schema_scoped = "urn:ab12345:stage/S1.MYSTAGE";
        assert_eq!(parse_urn(schema_scoped).unwrap().render(), schema_scoped);

        let database_scoped = "urn:ab12345:stage/MYDB.S1.MYSTAGE";
        assert_eq!(parse_urn(database_scoped).unwrap().render(), database_scoped);
    }
}
