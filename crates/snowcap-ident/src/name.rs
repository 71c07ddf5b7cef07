use lazy_static::lazy_static;
use regex::Regex;
use schemars::{gen::SchemaGenerator, schema::Schema, JsonSchema};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::IdentError;

const UNQUOTED_CHARS: &str = "A-Za-z0-9_$";

lazy_static! {
    static ref UNQUOTED_RE: Regex = Regex::new(&format!("^[{UNQUOTED_CHARS}]+$")).unwrap();
}

// A minimal set of reserved words that force quoting even when the token
// otherwise matches UNQUOTED_RE. Not exhaustive (the warehouse's full
// reserved-word list is much longer); this covers the common case of
// authoring a resource literally named e.g. `table` or `order`.
const RESERVED: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BETWEEN", "BY", "CHECK", "COLUMN", "CONNECT", "CREATE", "CROSS",
    "CURRENT", "DELETE", "DISTINCT", "DROP", "ELSE", "EXISTS", "FOR", "FROM", "GRANT", "GROUP",
    "HAVING", "IN", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LIKE", "NOT", "NULL", "OF",
    "ON", "OR", "ORDER", "REVOKE", "ROW", "SELECT", "SET", "TABLE", "UNION", "UPDATE", "VALUES",
    "VIEW", "WHENEVER", "WHERE", "WITH",
];

/// A single identifier token: a database name, schema name, object name,
/// role name, and so on.
///
/// Equality follows spec.md §4.1: if either side is quoted, the raw text is
/// compared verbatim; if neither side is quoted, the uppercased text is
/// compared (mirroring Snowflake folding unquoted identifiers to upper
/// case). This makes equality a property of the *pair* being compared:
/// `Name::quoted("FOO")` equals `Name::unquoted("FOO")` but not
/// `Name::unquoted("foo")`, even though the latter two are themselves
/// equal. `Hash` and `Ord` are both implemented over the uppercased text
/// when unquoted and the verbatim text when quoted — the same branch `Eq`
/// takes — which keeps `Hash`/`Ord` consistent with `Eq` for same-regime
/// comparisons (the common case — a manifest and its resolved references
/// are quoted consistently, and `Urn` orders a `BTreeMap` by this) at the
/// cost of the cross-regime corner case above.
#[derive(Debug, Clone)]
pub struct Name {
    raw: String,
    quoted: bool,
}

impl JsonSchema for Name {
    fn schema_name() -> String {
        "Name".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            ..Default::default()
        }
        .into()
    }
}

impl Name {
    /// Construct a `Name` from raw text that was not quoted in its source.
    pub fn unquoted(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            quoted: false,
        }
    }

    /// Construct a `Name` from raw text that was quoted in its source
    /// (i.e. the already-unescaped contents of a `"..."` literal).
    pub fn quoted(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            quoted: true,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// True if this name's content requires quoting regardless of how it
    /// was originally spelled: characters outside `[A-Za-z0-9_$]`, or a
    /// collision with a reserved keyword.
    pub fn requires_quoting(&self) -> bool {
        if self.raw.is_empty() {
            return true;
        }
        if !UNQUOTED_RE.is_match(&self.raw) {
            return true;
        }
        RESERVED.contains(&self.raw.to_uppercase().as_str())
    }

    /// Render this name in canonical warehouse DDL form: quoted if the
    /// source was quoted or if quoting is structurally required, bare
    /// otherwise.
    pub fn render(&self) -> String {
        if self.quoted || self.requires_quoting() {
            format!("\"{}\"", self.raw.replace('"', "\"\""))
        } else {
            self.raw.clone()
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        if self.quoted || other.quoted {
            self.raw == other.raw
        } else {
            self.raw.eq_ignore_ascii_case(&other.raw)
        }
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.quoted {
            self.raw.hash(state);
        } else {
            self.raw.to_uppercase().hash(state);
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.quoted || other.quoted {
            self.raw.cmp(&other.raw)
        } else {
            self.raw.to_uppercase().cmp(&other.raw.to_uppercase())
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_name(&s).map_err(|e| D::Error::custom(e.to_string()))
    }
}

/// Parse a single identifier token as it would appear authored in YAML or a
/// DDL fragment: either a bare run of `[A-Za-z0-9_$]` characters, or a
/// double-quoted string with `""` representing a literal embedded quote.
pub fn parse_name(input: &str) -> Result<Name, IdentError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IdentError::Empty(input.to_string()));
    }

    if let Some(inner) = trimmed.strip_prefix('"') {
        if inner.len() < 1 || !inner.ends_with('"') {
            return Err(IdentError::UnterminatedQuote(input.to_string()));
        }
        let body = &inner[..inner.len() - 1];
        let unescaped = body.replace("\"\"", "\"");
        return Ok(Name::quoted(unescaped));
    }

    Ok(Name::unquoted(trimmed.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unquoted_equality_is_case_insensitive() {
        assert_eq!(Name::unquoted("foo"), Name::unquoted("FOO"));
        assert_eq!(Name::unquoted("Foo"), Name::unquoted("fOO"));
    }

    #[test]
    fn quoted_equality_is_exact() {
        assert_ne!(Name::quoted("foo"), Name::quoted("FOO"));
        assert_eq!(Name::quoted("foo"), Name::quoted("foo"));
    }

    #[test]
    fn mixed_quoting_compares_raw_text() {
        assert_eq!(Name::quoted("FOO"), Name::unquoted("FOO"));
        assert_ne!(Name::quoted("foo"), Name::unquoted("FOO"));
    }

    #[test]
    fn render_quotes_when_required() {
        assert_eq!(Name::unquoted("my_table").render(), "my_table");
        assert_eq!(Name::unquoted("my-table").render(), "\"my-table\"");
    }

    #[test]
    fn render_quotes_reserved_word() {
        assert_eq!(Name::unquoted("select").render(), "\"select\"");
    }

    #[test]
    fn round_trip_parse_render() {
        let n = parse_name("\"has a space\"").unwrap();
        assert!(n.is_quoted());
        assert_eq!(n.raw(), "has a space");
        assert_eq!(n.render(), "\"has a space\"");

        let n = parse_name("PLAIN_NAME").unwrap();
        assert!(!n.is_quoted());
        assert_eq!(n.render(), "PLAIN_NAME");
    }

    #[test]
    fn escaped_quotes_round_trip() {
        let n = parse_name("\"has \"\"quotes\"\"\"").unwrap();
        assert_eq!(n.raw(), "has \"quotes\"");
        assert_eq!(n.render(), "\"has \"\"quotes\"\"\"");
    }

    #[test]
    fn unquoted_names_differing_only_by_case_are_ord_equal() {
        use std::cmp::Ordering;
        let lower = Name::unquoted("db1");
        let upper = Name::unquoted("DB1");
        assert_eq!(lower, upper);
        assert_eq!(lower.cmp(&upper), Ordering::Equal);
    }

    #[test]
    fn btreemap_keyed_by_name_folds_case_insensitively() {
        use std::collections::BTreeMap;
        let mut map: BTreeMap<Name, i32> = BTreeMap::new();
        map.insert(Name::unquoted("db1"), 1);
        map.insert(Name::unquoted("DB1"), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Name::unquoted("Db1")), Some(&2));
    }
}
