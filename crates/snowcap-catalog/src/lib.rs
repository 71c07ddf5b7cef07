//! Resource catalog (component C2): the ground truth every other Snowcap
//! crate consults for kind shape, scope, default ownership, privileges,
//! and DDL rendering dispatch.
//!
//! This crate narrows *which* kinds ship (SPEC_FULL.md §2 picks a
//! representative set instead of the original's ~80) while keeping the
//! registry mechanism itself general: adding a kind is one `KindRecord`,
//! not a change to the planner, scheduler, or resolver.

pub mod attr;
pub mod builtins;
mod error;
mod kind;
mod owner;
mod privilege;
mod registry;
mod render;
mod resource;
pub mod scope;

pub use attr::{AttrRecord, AttrValue};
pub use error::CatalogError;
pub use kind::{resolve_stage_subtype, ResourceKind, StageSubtype};
pub use owner::OwnerRef;
pub use privilege::{create_priv_for, expand_privilege, global_priv_default_owner, is_all_privilege, privs_for};
pub use registry::{KindRecord, KindRegistry, REGISTRY};
pub use render::{GenericRenderer, Renderer};
pub use resource::Resource;
pub use scope::{Edition, Scope};
