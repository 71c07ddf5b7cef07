//! The warehouse wire protocol is an explicit external collaborator (spec.md
//! §1/§6.2: "modeled as an opaque `Session` that executes a statement
//! string and returns row dictionaries"), not something this exercise
//! implements. `UnwiredSession` is the seam a real Snowflake driver (or a
//! test double) plugs into; it reports its own absence clearly rather than
//! pretending to talk to a warehouse.

use snowcap_state::{Row, Session, SessionError};

pub struct UnwiredSession {
    role: String,
    user: String,
}

impl UnwiredSession {
    pub fn new(role: impl Into<String>, user: impl Into<String>) -> Self {
        UnwiredSession { role: role.into(), user: user.into() }
    }
}

impl Session for UnwiredSession {
    fn execute(&self, _sql: &str) -> Result<Vec<Row>, SessionError> {
        Err(SessionError {
            code: "NOT_IMPLEMENTED".to_string(),
            message: "no warehouse driver is wired up; supply a Session implementation that \
                      speaks the target warehouse's wire protocol"
                .to_string(),
        })
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn user(&self) -> &str {
        &self.user
    }
}
