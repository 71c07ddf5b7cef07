use snowcap_catalog::Edition;
use snowcap_ident::IdentError;

/// Planner (C6) failure modes, spec.md §7.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("desired resource {urn} is outside the blueprint scope root")]
    OutOfScope { urn: String },
    #[error("resource {urn} references {target}, which is absent from both manifest and live state")]
    MissingResource { urn: String, target: String },
    #[error("dependency cycle detected, participating URNs: {0:?}")]
    NotADAG(Vec<String>),
    #[error("plan violates a scope or edition constraint: {0}")]
    NonConformingPlan(String),
    #[error(transparent)]
    Ident(#[from] IdentError),
}

/// Scheduler (C7) failure modes, spec.md §7.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no available role can perform {action} (requires {privilege})")]
    MissingPrivilege { action: String, privilege: String },
    #[error("{urn} action requires edition {required:?}, session is {actual:?}")]
    WrongEdition {
        urn: String,
        required: Edition,
        actual: Edition,
    },
}
