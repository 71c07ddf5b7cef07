//! Snowcap's facade: wires components C1-C8 into the two operations
//! spec.md §6.3 names as the CLI's entry points, `plan(config) → [Action]`
//! and `apply(config, actions)`.
//!
//! This crate owns no algorithm of its own; it only sequences
//! `snowcap-manifest` → `snowcap-state` → `snowcap-plan` →
//! `snowcap-exec`, the same role `build::Output` plays in the teacher
//! repo for its own multi-crate pipeline.

mod config;
mod error;

pub use config::BlueprintConfig;
pub use error::SnowcapError;

use std::sync::Arc;

use snowcap_catalog::{GenericRenderer, Renderer, ResourceKind};
use snowcap_exec::ExecutionReport;
use snowcap_plan::{Action, Schedule};
use snowcap_state::{Reader, Session};
use tracing::info;

/// Attribute names whose presence on a desired `Database` record marks it
/// as carrying explicit parameter fields, per spec.md §4.5 "Inheritance
/// of parameters". Mirrors `snowcap_catalog`'s `DATABASE_ATTRS` parameter
/// fields (`data_retention_time_in_days`, `default_ddl_collation`); kept
/// as a small local list rather than a catalog export since this is the
/// one place outside the reader itself that needs to know which fields
/// trigger the inheritance marking.
const DATABASE_PARAMETER_ATTRS: &[&str] = &["data_retention_time_in_days", "default_ddl_collation"];

/// The result of running the planner/scheduler over one `BlueprintConfig`
/// — spec.md §6.3's `[Action]`, plus the scheduled operation stream ready
/// for `Blueprint::apply` and the effective `dry_run` flag that decided
/// whether `apply` will actually run it.
#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub actions: Vec<Action>,
    pub schedule: Schedule,
    pub dry_run: bool,
}

/// A resolved blueprint: one `BlueprintConfig` bound to a live `Session`.
/// Owns the `Reader` so `plan` and `apply` share one cache instance across
/// a single run (spec.md §4.5 "All fetches/lists are cached under the
/// session's current role").
pub struct Blueprint {
    config: BlueprintConfig,
    session: Arc<dyn Session>,
    reader: Reader,
    renderer: Box<dyn Renderer>,
}

impl Blueprint {
    pub fn new(config: BlueprintConfig, session: Arc<dyn Session>) -> Self {
        let mut reader = Reader::new(session.clone(), config.session.account_locator.clone());
        if let Some(org) = &config.session.org {
            reader = reader.with_org(org.clone());
        }
        Blueprint {
            config,
            session,
            reader,
            renderer: Box::new(GenericRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Component C3 → C4 → C5 → C6 → C7, in order: compile and resolve the
    /// manifest, gather exactly the live state the planner needs, diff,
    /// and schedule. Does not touch the warehouse beyond reads.
    pub async fn plan(&self) -> Result<PlanOutput, SnowcapError> {
        let manifest = self.config.compile_manifest()?;

        for database in manifest.resources_of_kind(ResourceKind::Database) {
            if DATABASE_PARAMETER_ATTRS.iter().any(|attr| database.attrs.contains_key(*attr)) {
                self.reader.mark_parameter_inherited(database.fqn.name.clone());
            }
        }

        let live = snowcap_plan::gather_live_state(&self.reader, &manifest).await?;
        let actions = snowcap_plan::plan(&manifest, &live)?;

        let dry_run = self.config.dry_run_override.unwrap_or(manifest.dry_run);
        info!(actions = actions.len(), dry_run, "plan computed");

        let schedule = snowcap_plan::schedule(
            &actions,
            &self.config.available_roles,
            manifest.session.edition,
            self.renderer.as_ref(),
        )?;

        Ok(PlanOutput { actions, schedule, dry_run })
    }

    /// Component C8: applies a previously computed `PlanOutput`'s
    /// schedule. Returns `None` without touching the warehouse when
    /// `dry_run` is set (spec.md §4.7 step 4).
    pub async fn apply(&self, output: &PlanOutput) -> Result<Option<ExecutionReport>, SnowcapError> {
        if output.dry_run {
            info!("dry_run set, skipping apply");
            return Ok(None);
        }
        let report = snowcap_exec::apply(&output.schedule, self.session.clone(), &self.reader).await?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_catalog::Edition;
    use snowcap_state::{Row, SessionError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeSession {
        role: String,
        responses: Mutex<HashMap<String, Result<Vec<Row>, SessionError>>>,
    }

    impl FakeSession {
        fn new(role: &str, responses: &[(&str, Vec<Row>)]) -> Self {
            FakeSession {
                role: role.to_string(),
                responses: Mutex::new(responses.iter().map(|(k, v)| (k.to_string(), Ok(v.clone()))).collect()),
            }
        }
    }

    impl Session for FakeSession {
        fn execute(&self, sql: &str) -> Result<Vec<Row>, SessionError> {
            self.responses.lock().unwrap().get(sql).cloned().unwrap_or(Ok(Vec::new()))
        }
        fn role(&self) -> &str {
            &self.role
        }
        fn user(&self) -> &str {
            "test_user"
        }
    }

    #[tokio::test]
    async fn create_database_against_empty_live_state() {
        let config = BlueprintConfig::new("ab12345", Edition::Standard)
            .with_yaml("scope: ACCOUNT\ndatabases:\n  - name: DB1\n")
            .with_available_role("SYSADMIN");
        let session = Arc::new(FakeSession::new("SYSADMIN", &[]));
        let blueprint = Blueprint::new(config, session);

        let output = blueprint.plan().await.unwrap();
        assert_eq!(output.actions.len(), 2); // DB1 + implicit PUBLIC schema
        assert!(!output.dry_run);
    }

    #[tokio::test]
    async fn dry_run_override_prevents_apply() {
        let config = BlueprintConfig::new("ab12345", Edition::Standard)
            .with_yaml("scope: ACCOUNT\ndatabases:\n  - name: DB1\n")
            .with_available_role("SYSADMIN")
            .with_dry_run_override(true);
        let session = Arc::new(FakeSession::new("SYSADMIN", &[]));
        let blueprint = Blueprint::new(config, session);

        let output = blueprint.plan().await.unwrap();
        assert!(output.dry_run);
        let report = blueprint.apply(&output).await.unwrap();
        assert!(report.is_none());
    }
}
