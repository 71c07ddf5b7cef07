use std::collections::{BTreeMap, HashSet};

use snowcap_catalog::Edition;
use snowcap_manifest::SessionContext;

/// The configuration the core consumes, spec.md §6.1/§6.3: the assembled
/// YAML manifest sources plus the connection facts the manifest pipeline,
/// planner, and scheduler need. `snowcap-cli` is responsible for turning
/// CLI flags and an on-disk config file into one of these; the core
/// itself never reads a file or an environment variable.
#[derive(Debug, Clone)]
pub struct BlueprintConfig {
    /// One or more YAML documents, already read from disk (spec.md §6.1).
    pub yaml_sources: Vec<String>,
    /// `--vars`-style input bindings for the manifest's `vars_spec`
    /// (spec.md §4.3 step 2).
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// Account locator/org/edition the manifest is resolved against and
    /// URNs are minted with (spec.md §3.1, §4.4 "Edition validation").
    pub session: SessionContext,
    /// The roles the connecting session holds and may `USE ROLE` into,
    /// consumed by the scheduler's role-selection step (spec.md §4.7 step
    /// 1). Spec.md's minimal `Session` trait (§6.2) has no "list my
    /// granted roles" call, so this is supplied by the caller rather than
    /// discovered — an Open Question resolution recorded in `DESIGN.md`.
    pub available_roles: HashSet<String>,
    /// Overrides the manifest's own `dry_run:` YAML key when set (the
    /// CLI's `--dry-run` flag, spec.md §6.3).
    pub dry_run_override: Option<bool>,
}

impl BlueprintConfig {
    pub fn new(account_locator: impl Into<String>, edition: Edition) -> Self {
        BlueprintConfig {
            yaml_sources: Vec::new(),
            inputs: BTreeMap::new(),
            session: SessionContext::new(account_locator, edition),
            available_roles: HashSet::new(),
            dry_run_override: None,
        }
    }

    pub fn with_yaml(mut self, yaml: impl Into<String>) -> Self {
        self.yaml_sources.push(yaml.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn with_available_role(mut self, role: impl Into<String>) -> Self {
        self.available_roles.insert(role.into());
        self
    }

    pub fn with_dry_run_override(mut self, dry_run: bool) -> Self {
        self.dry_run_override = Some(dry_run);
        self
    }

    fn yaml_refs(&self) -> Vec<&str> {
        self.yaml_sources.iter().map(String::as_str).collect()
    }

    pub(crate) fn compile_manifest(&self) -> Result<snowcap_manifest::Manifest, snowcap_manifest::ManifestError> {
        snowcap_manifest::build(&self.yaml_refs(), &self.inputs, &self.session)
    }
}
