//! Remote-state reader (component C5): session-scoped cached reads,
//! per-object and bulk-audit-view read strategies, parameter-inheritance
//! pruning (spec.md §4.5).

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use snowcap_catalog::{Resource, ResourceKind, Scope, REGISTRY};
use snowcap_ident::{Fqn, Name, Urn};
use tracing::{debug, warn};

use crate::cache::ReaderCache;
use crate::gate::BulkReadGate;
use crate::rows::{row_to_attrs, row_to_grant_row, row_to_owner};
use crate::session::{Row, Session};
use crate::StateError;

/// Warehouse error codes the reader always treats as "object not found"
/// rather than a hard failure (spec.md §4.5 "Failure semantics": "A read
/// that returns 'object not found' resolves to `None`"). These mirror
/// Snowflake's `SQL compilation error: ... does not exist` family of
/// codes.
const NOT_FOUND_CODES: &[&str] = &["002003", "002043"];

const DEFAULT_CONCURRENCY: usize = 8;

/// Attribute names whose value is only obtainable via `SHOW PARAMETERS`
/// rather than the kind's `SHOW`/`DESC` statement. Used to decide whether
/// the extra round-trip in `fetch` is worth issuing (spec.md §4.5 "skipped
/// when the catalog reports that no attribute in the desired spec depends
/// on parameter output").
const PARAMETER_ATTRS: &[&str] = &["data_retention_time_in_days", "default_ddl_collation"];

/// The remote-state reader. Holds the wire `Session`, a role-keyed cache,
/// and the bulk-read gate; exposes the `fetch`/`list` contract the planner
/// consumes (spec.md §4.5).
pub struct Reader {
    session: Arc<dyn Session>,
    account_locator: String,
    org: Option<String>,
    cache: Arc<ReaderCache>,
    gate: BulkReadGate,
    concurrency: usize,
    empty_response_codes: Vec<String>,
}

impl Reader {
    /// `account_locator`/`org` must match the `SessionContext` the desired
    /// manifest was resolved against, since every URN the reader mints has
    /// to compare equal to the manifest's URNs for the planner's diff to
    /// pair them up at all.
    pub fn new(session: Arc<dyn Session>, account_locator: impl Into<String>) -> Self {
        Reader {
            session,
            account_locator: account_locator.into(),
            org: None,
            cache: Arc::new(ReaderCache::new()),
            gate: BulkReadGate::new(true),
            concurrency: DEFAULT_CONCURRENCY,
            empty_response_codes: Vec::new(),
        }
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_bulk_reads_enabled(mut self, enabled: bool) -> Self {
        self.gate = BulkReadGate::new(enabled);
        self
    }

    /// Opt an additional warehouse error code into "treat as empty"
    /// recovery (spec.md §7 policy (c)).
    pub fn with_empty_response_code(mut self, code: impl Into<String>) -> Self {
        self.empty_response_codes.push(code.into());
        self
    }

    pub fn cache(&self) -> &ReaderCache {
        &self.cache
    }

    fn role(&self) -> String {
        self.session.role().to_string()
    }

    fn is_not_found(&self, code: &str) -> bool {
        NOT_FOUND_CODES.contains(&code) || self.empty_response_codes.iter().any(|c| c == code)
    }

    /// Mark `database` as carrying explicit parameter fields in the
    /// desired manifest, so its implicit PUBLIC schema is fetched with
    /// `SHOW PARAMETERS` too (spec.md §4.5 "Inheritance of parameters").
    pub fn mark_parameter_inherited(&self, database: Name) {
        self.cache.mark_parameter_inherited(&self.role(), database);
    }

    /// Invalidate the entire cache for the current role (spec.md §4.8,
    /// called by the executor after every successful mutating statement).
    pub fn invalidate(&self) {
        self.cache.invalidate(&self.role());
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StateError> {
        let session = self.session.clone();
        let statement = sql.to_string();
        debug!(statement = %statement, "executing read statement");
        let result = {
            let statement = statement.clone();
            tokio::task::spawn_blocking(move || session.execute(&statement))
                .await
                .expect("read statement task panicked")
        };
        result.map_err(|err| StateError::StatementFailure {
            statement,
            code: err.code,
        })
    }

    /// Fetch one object's live spec, or `None` if it doesn't exist
    /// (spec.md §4.5's `fetch(urn) → spec | None` contract).
    pub async fn fetch(&self, urn: &Urn, kind: ResourceKind) -> Result<Option<Resource>, StateError> {
        if let Some(cached) = self.cache.get_fetch(&self.role(), urn) {
            return Ok(cached);
        }

        let resource = match kind {
            ResourceKind::Grant | ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant => {
                self.fetch_grant(urn, kind).await?
            }
            _ => self.fetch_per_object(urn, kind).await?,
        };

        self.cache.put_fetch(&self.role(), urn.clone(), resource.clone());
        Ok(resource)
    }

    /// List every live URN of `kind` (spec.md §4.5's `list(kind) → [URN]`).
    pub async fn list(&self, kind: ResourceKind) -> Result<Vec<Urn>, StateError> {
        if let Some(cached) = self.cache.get_list(&self.role(), kind) {
            return Ok(cached);
        }

        let urns = match kind {
            ResourceKind::Grant | ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant => {
                self.list_grants(kind).await?
            }
            _ => self.list_per_kind(kind).await?,
        };

        self.cache.put_list(&self.role(), kind, urns.clone());
        Ok(urns)
    }

    async fn fetch_per_object(&self, urn: &Urn, kind: ResourceKind) -> Result<Option<Resource>, StateError> {
        let record = REGISTRY.get(kind);
        let show_stmt = format!("SHOW {}S LIKE '{}'", kind.tag().to_uppercase(), urn.fqn.name.raw());
        let rows = match self.execute(&show_stmt).await {
            Ok(rows) => rows,
            Err(StateError::StatementFailure { code, .. }) if self.is_not_found(&code) => return Ok(None),
            Err(err) => return Err(err),
        };
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let mut attrs = row_to_attrs(kind, &row);
        let needs_parameters = record.attrs.iter().any(|a| {
            PARAMETER_ATTRS.contains(&a.name) && a.fetchable
        });
        if needs_parameters {
            let desc_stmt = format!("SHOW PARAMETERS IN {} {}", kind.tag().to_uppercase(), urn.fqn.render());
            if let Ok(param_rows) = self.execute(&desc_stmt).await {
                for prow in param_rows {
                    let param_attrs = row_to_attrs(kind, &prow);
                    attrs.extend(param_attrs);
                }
            }
        }

        let owner = row_to_owner(&row);
        let mut resource = Resource::new(kind, urn.fqn.clone(), record.scope).with_attrs(attrs);
        resource.owner = owner;
        if record.polymorphic {
            resource.subtype = snowcap_catalog::resolve_stage_subtype(&resource.attrs);
        }
        Ok(Some(resource))
    }

    async fn list_per_kind(&self, kind: ResourceKind) -> Result<Vec<Urn>, StateError> {
        let record = REGISTRY.get(kind);
        let stmt = format!("SHOW {}S", kind.tag().to_uppercase());
        let rows = self.execute(&stmt).await?;
        let mut urns = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(name_val) = crate::rows::match_named_field(row, "name").and_then(|v| v.as_str()) else {
                continue;
            };
            let Ok(name) = snowcap_ident::parse_name(name_val) else {
                continue;
            };
            let container = container_fqn(record.scope, row);
            let fqn = crate::rows::fqn_in_container(record.scope, name, container.as_ref());
            urns.push(self.mint_urn(kind, fqn));
        }
        Ok(urns)
    }

    fn mint_urn(&self, kind: ResourceKind, fqn: Fqn) -> Urn {
        let urn = Urn::new(self.account_locator.clone(), kind.tag(), fqn);
        match &self.org {
            Some(org) => urn.with_org(org.clone()),
            None => urn,
        }
    }

    /// Two-stage grant read per spec.md §4.5 "Bulk audit path": attempt a
    /// single bulk query, normalize, and cache; on any failure (permission
    /// or otherwise), fall back to per-object `SHOW GRANTS` and record the
    /// sticky fallback flag so future attempts skip straight to fallback.
    async fn fetch_grant(&self, urn: &Urn, kind: ResourceKind) -> Result<Option<Resource>, StateError> {
        let database_scoped = kind == ResourceKind::DatabaseRoleGrant;
        let is_role_grant = matches!(kind, ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant);

        let rows = self.grant_rows(is_role_grant, database_scoped).await?;
        let target = rows.into_iter().find(|row| {
            self.mint_urn(kind, row.clone().into_resource(database_scoped).fqn) == *urn
        });
        Ok(target.map(|row| row.into_resource(database_scoped)))
    }

    async fn list_grants(&self, kind: ResourceKind) -> Result<Vec<Urn>, StateError> {
        let database_scoped = kind == ResourceKind::DatabaseRoleGrant;
        let is_role_grant = matches!(kind, ResourceKind::RoleGrant | ResourceKind::DatabaseRoleGrant);
        let rows = self.grant_rows(is_role_grant, database_scoped).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let resource = row.into_resource(database_scoped);
                self.mint_urn(kind, resource.fqn)
            })
            .collect())
    }

    async fn grant_rows(
        &self,
        is_role_grant: bool,
        database_scoped: bool,
    ) -> Result<Vec<crate::rows::GrantRow>, StateError> {
        let role = self.role();
        if is_role_grant {
            if let Some(cached) = self.cache.get_bulk_role_grants(&role) {
                return Ok(cached);
            }
        } else if let Some(cached) = self.cache.get_bulk_grants(&role) {
            return Ok(cached);
        }

        if self.gate.should_attempt_bulk() {
            match self.bulk_grant_read(is_role_grant).await {
                Ok(rows) => {
                    self.gate.record_probe(true);
                    if is_role_grant {
                        self.cache.put_bulk_role_grants(&role, rows.clone());
                    } else {
                        self.cache.put_bulk_grants(&role, rows.clone());
                    }
                    return Ok(rows);
                }
                Err(err) => {
                    warn!(error = %err, "bulk audit-view read failed, falling back to per-object SHOW GRANTS");
                    self.gate.record_probe(false);
                    self.gate.record_bulk_failure();
                }
            }
        }

        self.per_object_grant_read(is_role_grant, database_scoped).await
    }

    async fn bulk_grant_read(&self, is_role_grant: bool) -> Result<Vec<crate::rows::GrantRow>, StateError> {
        let stmt = if is_role_grant {
            "SELECT * FROM SNOWFLAKE.ACCOUNT_USAGE.GRANTS_TO_USERS WHERE DELETED_ON IS NULL"
        } else {
            "SELECT * FROM SNOWFLAKE.ACCOUNT_USAGE.GRANTS_TO_ROLES WHERE DELETED_ON IS NULL"
        };
        let rows = self.execute(stmt).await?;
        Ok(rows.iter().filter_map(row_to_grant_row).collect())
    }

    /// Falls back to one `SHOW GRANTS`-family query; this is cheaper than
    /// issuing one per URN because `SHOW GRANTS TO ROLE x`/`SHOW GRANTS OF
    /// ROLE x` already enumerates everything for that role in one round
    /// trip, same as the original's per-object path.
    async fn per_object_grant_read(
        &self,
        is_role_grant: bool,
        database_scoped: bool,
    ) -> Result<Vec<crate::rows::GrantRow>, StateError> {
        let stmt = match (is_role_grant, database_scoped) {
            (true, false) => "SHOW GRANTS OF ROLE".to_string(),
            (true, true) => "SHOW GRANTS OF DATABASE ROLE".to_string(),
            (false, _) => "SHOW GRANTS".to_string(),
        };
        let rows = self.execute(&stmt).await?;
        Ok(rows.iter().filter_map(row_to_grant_row).collect())
    }

    /// Fan out `list` over every kind in `kinds` concurrently, bounded by
    /// this reader's worker pool size (spec.md §4.5 "Concurrency": "Per-kind
    /// bulk lists and role-privilege enumerations are issued in parallel
    /// over a bounded worker pool").
    pub async fn list_many(&self, kinds: &[ResourceKind]) -> Vec<(ResourceKind, Result<Vec<Urn>, StateError>)> {
        stream::iter(kinds.iter().copied())
            .map(|kind| async move { (kind, self.list(kind).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

fn container_fqn(scope: Scope, row: &Row) -> Option<Fqn> {
    match scope {
        Scope::Schema => {
            let database = crate::rows::match_named_field(row, "database_name")
                .and_then(|v| v.as_str())
                .and_then(|s| snowcap_ident::parse_name(s).ok());
            let schema = crate::rows::match_named_field(row, "schema_name")
                .and_then(|v| v.as_str())
                .and_then(|s| snowcap_ident::parse_name(s).ok())?;
            Some(Fqn {
                database,
                schema: None,
                name: schema,
                arg_types: None,
                params: snowcap_ident::Params::new(),
            })
        }
        Scope::Database => {
            let database = crate::rows::match_named_field(row, "database_name")
                .and_then(|v| v.as_str())
                .and_then(|s| snowcap_ident::parse_name(s).ok())?;
            Some(Fqn::bare(database))
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::SessionError;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeSession {
        role: String,
        responses: Mutex<std::collections::HashMap<String, Result<Vec<Row>, SessionError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn new(role: &str) -> Self {
            FakeSession {
                role: role.to_string(),
                responses: Mutex::new(std::collections::HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn on(&mut self, stmt: &str, result: Result<Vec<Row>, SessionError>) {
            self.responses.get_mut().unwrap().insert(stmt.to_string(), result);
        }
    }

    impl Session for FakeSession {
        fn execute(&self, sql: &str) -> Result<Vec<Row>, SessionError> {
            self.calls.lock().unwrap().push(sql.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(sql)
                .cloned()
                .unwrap_or(Ok(Vec::new()))
        }

        fn role(&self) -> &str {
            &self.role
        }

        fn user(&self) -> &str {
            "test_user"
        }
    }

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn fetch_caches_result_under_role() {
        let mut fake = FakeSession::new("SYSADMIN");
        fake.on(
            "SHOW DATABASES LIKE 'DB1'",
            Ok(vec![row(&[("name", json!("DB1")), ("owner", json!("SYSADMIN")), ("comment", json!("hi"))])]),
        );
        let reader = Reader::new(Arc::new(fake), "ab12345");
        let urn = Urn::new("ab12345", "database", Fqn::bare(Name::unquoted("DB1")));

        let first = reader.fetch(&urn, ResourceKind::Database).await.unwrap();
        assert!(first.is_some());
        let second = reader.fetch(&urn, ResourceKind::Database).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn not_found_code_resolves_to_none() {
        let mut fake = FakeSession::new("SYSADMIN");
        fake.on(
            "SHOW DATABASES LIKE 'MISSING'",
            Err(SessionError {
                code: "002003".to_string(),
                message: "object does not exist".to_string(),
            }),
        );
        let reader = Reader::new(Arc::new(fake), "ab12345");
        let urn = Urn::new("ab12345", "database", Fqn::bare(Name::unquoted("MISSING")));
        let result = reader.fetch(&urn, ResourceKind::Database).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn bulk_grant_failure_falls_back_and_is_sticky() {
        let mut fake = FakeSession::new("SECURITYADMIN");
        fake.on(
            "SELECT * FROM SNOWFLAKE.ACCOUNT_USAGE.GRANTS_TO_ROLES WHERE DELETED_ON IS NULL",
            Err(SessionError {
                code: "000403".to_string(),
                message: "access denied".to_string(),
            }),
        );
        fake.on(
            "SHOW GRANTS",
            Ok(vec![row(&[
                ("privilege", json!("USAGE")),
                ("grantee_name", json!("SYSADMIN")),
                ("name", json!("DB1")),
            ])]),
        );
        let reader = Reader::new(Arc::new(fake), "ab12345");
        let urns = reader.list(ResourceKind::Grant).await.unwrap();
        assert_eq!(urns.len(), 1);
        assert!(reader.gate.has_failed());

        // Second call should skip the bulk path entirely and go straight
        // to per-object fallback again (cache was already populated by the
        // first `list`, so this exercises the cached path, not a second
        // live read).
        let urns_again = reader.list(ResourceKind::Grant).await.unwrap();
        assert_eq!(urns_again, urns);
    }

    #[tokio::test]
    async fn invalidate_clears_cache_for_role() {
        let mut fake = FakeSession::new("SYSADMIN");
        fake.on(
            "SHOW DATABASES LIKE 'DB1'",
            Ok(vec![row(&[("name", json!("DB1")), ("owner", json!("SYSADMIN"))])]),
        );
        let reader = Reader::new(Arc::new(fake), "ab12345");
        let urn = Urn::new("ab12345", "database", Fqn::bare(Name::unquoted("DB1")));
        reader.fetch(&urn, ResourceKind::Database).await.unwrap();
        reader.invalidate();
        assert_eq!(reader.cache.get_fetch("SYSADMIN", &urn), None);
    }
}
