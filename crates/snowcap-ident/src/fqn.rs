use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{name::parse_name, parse_params, render_params, IdentError, Name, Params};

/// Hint the caller supplies to disambiguate a two-part dotted name, per
/// spec.md §4.1: `a.b` could be `database.schema` or `schema.name`
/// depending on what scope the resource lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FqnContext {
    /// The resource is account-scoped; a dotted name has no db/schema parts.
    Account,
    /// The resource lives directly in a database (e.g. a Schema); a single
    /// leading dotted part is the database.
    DatabaseScoped,
    /// The resource lives in a schema (e.g. a Table); one leading dotted
    /// part is the schema, two are `database.schema`.
    SchemaScoped,
}

/// A fully qualified name: `{database?, schema?, name, arg_types?, params?}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Fqn {
    pub database: Option<Name>,
    pub schema: Option<Name>,
    pub name: Name,
    /// Applies to callable kinds (function/procedure): the argument type
    /// signature used to disambiguate overloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_types: Option<Vec<Name>>,
    /// Ordered mapping used to disambiguate non-object resources, e.g. a
    /// grant's `(priv, on, to)`.
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl Fqn {
    pub fn bare(name: Name) -> Self {
        Self {
            database: None,
            schema: None,
            name,
            arg_types: None,
            params: Params::new(),
        }
    }

    pub fn schema_scoped(schema: Name, name: Name) -> Self {
        Self {
            database: None,
            schema: Some(schema),
            name,
            arg_types: None,
            params: Params::new(),
        }
    }

    pub fn database_scoped(database: Name, schema: Name, name: Name) -> Self {
        Self {
            database: Some(database),
            schema: Some(schema),
            name,
            arg_types: None,
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Render in canonical dotted form: `db.schema.name(arg_types)?params`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(db) = &self.database {
            parts.push(db.render());
        }
        if let Some(schema) = &self.schema {
            parts.push(schema.render());
        }
        parts.push(self.name.render());
        let mut out = parts.join(".");

        if let Some(args) = &self.arg_types {
            out.push('(');
            out.push_str(
                &args
                    .iter()
                    .map(Name::render)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            out.push(')');
        }
        if !self.params.is_empty() {
            out.push('?');
            out.push_str(&render_params(&self.params));
        }
        out
    }
}

/// Parse a dotted FQN body (1-3 parts, with an optional `(arg, types)`
/// signature and an optional `?k=v&...` params suffix), disambiguating `a.b`
/// per the supplied `context`.
pub fn parse_fqn(input: &str, context: FqnContext) -> Result<Fqn, IdentError> {
    let (body, params_str) = match input.split_once('?') {
        Some((b, p)) => (b, Some(p)),
        None => (input, None),
    };

    let (dotted, arg_types) = match body.find('(') {
        Some(idx) => {
            if !body.ends_with(')') {
                return Err(IdentError::MalformedUrn(
                    input.to_string(),
                    "unterminated argument signature",
                ));
            }
            let sig = &body[idx + 1..body.len() - 1];
            let args = if sig.trim().is_empty() {
                Vec::new()
            } else {
                sig.split(',')
                    .map(|p| parse_name(p.trim()))
                    .collect::<Result<Vec<_>, _>>()?
            };
            (&body[..idx], Some(args))
        }
        None => (body, None),
    };

    let parts = split_dotted(dotted)?;
    let names = parts
        .iter()
        .map(|p| parse_name(p))
        .collect::<Result<Vec<_>, _>>()?;

    let fqn = match (names.len(), context) {
        (1, _) => Fqn::bare(names.into_iter().next().unwrap()),
        (2, FqnContext::DatabaseScoped) => {
            let mut it = names.into_iter();
            let db = it.next().unwrap();
            let name = it.next().unwrap();
            Fqn {
                database: Some(db),
                schema: None,
                name,
                arg_types: None,
                params: Params::new(),
            }
        }
        (2, FqnContext::SchemaScoped) => {
            let mut it = names.into_iter();
            let schema = it.next().unwrap();
            let name = it.next().unwrap();
            Fqn::schema_scoped(schema, name)
        }
        (2, FqnContext::Account) => {
            return Err(IdentError::FqnAmbiguous(input.to_string()));
        }
        (3, _) => {
            let mut it = names.into_iter();
            let db = it.next().unwrap();
            let schema = it.next().unwrap();
            let name = it.next().unwrap();
            Fqn::database_scoped(db, schema, name)
        }
        (n, _) => return Err(IdentError::FqnArity(input.to_string(), n)),
    };

    let mut fqn = fqn;
    fqn.arg_types = arg_types;
    if let Some(p) = params_str {
        fqn.params = parse_params(p);
    }
    Ok(fqn)
}

fn split_dotted(s: &str) -> Result<Vec<String>, IdentError> {
    // Split on '.' that isn't inside a double-quoted segment.
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                cur.push(c);
            }
            '.' if !in_quotes => {
                parts.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    if in_quotes {
        return Err(IdentError::UnterminatedQuote(s.to_string()));
    }
    parts.push(cur);
    if parts.iter().any(|p| p.is_empty()) {
        return Err(IdentError::FqnArity(s.to_string(), parts.len()));
    }
    Ok(parts)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let fqn = parse_fqn("MYDB", FqnContext::Account).unwrap();
        assert_eq!(fqn.database, None);
        assert_eq!(fqn.name, Name::unquoted("MYDB"));
    }

    #[test]
    fn parses_schema_scoped_two_part() {
        let fqn = parse_fqn("PUBLIC.MY_TABLE", FqnContext::SchemaScoped).unwrap();
        assert_eq!(fqn.schema, Some(Name::unquoted("PUBLIC")));
        assert_eq!(fqn.name, Name::unquoted("MY_TABLE"));
    }

    #[test]
    fn parses_database_scoped_two_part() {
        let fqn = parse_fqn("MYDB.PUBLIC", FqnContext::DatabaseScoped).unwrap();
        assert_eq!(fqn.database, Some(Name::unquoted("MYDB")));
        assert_eq!(fqn.name, Name::unquoted("PUBLIC"));
    }

    #[test]
    fn two_part_without_context_is_ambiguous() {
        assert!(matches!(
            parse_fqn("A.B", FqnContext::Account),
            Err(IdentError::FqnAmbiguous(_))
        ));
    }

    #[test]
    fn parses_three_part() {
        let fqn = parse_fqn("MYDB.MYSCHEMA.MYTABLE", FqnContext::Account).unwrap();
        assert_eq!(fqn.database, Some(Name::unquoted("MYDB")));
        assert_eq!(fqn.schema, Some(Name::unquoted("MYSCHEMA")));
        assert_eq!(fqn.name, Name::unquoted("MYTABLE"));
    }

    #[test]
    fn parses_callable_signature() {
        let fqn = parse_fqn("MYDB.PUBLIC.MY_FUNC(NUMBER, VARCHAR)", FqnContext::Account).unwrap();
        assert_eq!(
            fqn.arg_types,
            Some(vec![Name::unquoted("NUMBER"), Name::unquoted("VARCHAR")])
        );
    }

    #[test]
    fn quoted_dot_is_not_a_separator() {
        let fqn = parse_fqn("\"has.dot\"", FqnContext::Account).unwrap();
        assert_eq!(fqn.name, Name::quoted("has.dot"));
    }

    #[test]
    fn render_round_trips() {
        let input = "MYDB.MYSCHEMA.MY_FUNC(NUMBER)";
        let fqn = parse_fqn(input, FqnContext::Account).unwrap();
        assert_eq!(fqn.render(), "MYDB.MYSCHEMA.MY_FUNC(NUMBER)");
    }
}
