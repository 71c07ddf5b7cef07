//! The top-level error a `snowcap-cli` caller matches on, aggregating
//! every lower crate's own error type (spec.md §7's taxonomy, unified) the
//! same way the teacher's `build::Output` aggregates catalog-build errors
//! for its caller.

#[derive(thiserror::Error, Debug)]
pub enum SnowcapError {
    #[error(transparent)]
    Manifest(#[from] snowcap_manifest::ManifestError),
    #[error(transparent)]
    Plan(#[from] snowcap_plan::PlanError),
    #[error(transparent)]
    Schedule(#[from] snowcap_plan::ScheduleError),
    #[error(transparent)]
    State(#[from] snowcap_state::StateError),
    #[error(transparent)]
    Exec(#[from] snowcap_exec::ExecError),
}

impl SnowcapError {
    /// The process exit code `snowcap-cli` should use for this failure,
    /// mirroring how `flowctl`'s `main.rs` maps error contexts to exit
    /// codes rather than always exiting `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            SnowcapError::Manifest(_) | SnowcapError::Plan(_) | SnowcapError::Schedule(_) => 2,
            SnowcapError::State(_) => 3,
            SnowcapError::Exec(_) => 4,
        }
    }
}
