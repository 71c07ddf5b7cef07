//! Remote-state reader (component C5): cached, session-scoped reads of
//! live warehouse state, with a bulk audit-view read path that falls back
//! to per-object queries (spec.md §4.5).

mod cache;
mod error;
mod gate;
mod reader;
pub mod rows;
mod session;

pub use cache::ReaderCache;
pub use error::StateError;
pub use gate::BulkReadGate;
pub use reader::Reader;
pub use session::{Row, Session, SessionError};
