//! Planner and scheduler (components C6/C7): turns a desired `Manifest`
//! plus a gathered `LiveState` into an ordered, role-correct, idempotent
//! sequence of operations (spec.md §4.6/§4.7).

mod action;
mod diff;
mod error;
mod live;
mod scheduler;

pub use action::Action;
pub use diff::plan;
pub use error::{PlanError, ScheduleError};
pub use live::{gather_live_state, LiveState};
pub use scheduler::{schedule, Op, Schedule};
