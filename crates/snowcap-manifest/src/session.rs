use snowcap_catalog::Edition;

/// The session context a `Manifest` is resolved and keyed against: the
/// account locator/org used to mint URNs (spec.md §3.1), and the warehouse
/// edition used for edition-gating (spec.md §4.4 "Edition validation").
///
/// This is distinct from `snowcap_state`'s notion of a live `Session` (the
/// wire connection): `SessionContext` carries only the facts the manifest
/// pipeline needs to assemble URNs and validate editions, not an executable
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub account_locator: String,
    pub org: Option<String>,
    pub edition: Edition,
}

impl SessionContext {
    pub fn new(account_locator: impl Into<String>, edition: Edition) -> Self {
        SessionContext {
            account_locator: account_locator.into(),
            org: None,
            edition,
        }
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }
}
