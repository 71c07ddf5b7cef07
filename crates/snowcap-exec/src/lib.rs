//! Executor (component C8): applies a scheduler-produced `Schedule`
//! sequentially against a `Session`, invalidating the reader cache after
//! every mutating statement, per spec.md §4.8.

mod error;

pub use error::ExecError;

use std::sync::Arc;

use snowcap_plan::Op;
use snowcap_state::{Reader, Session};
use tracing::{debug, info};

/// One statement the executor actually sent to the warehouse (including
/// `USE ROLE`/`USE SECONDARY ROLES` preamble statements), in execution
/// order. Returned so a caller (e.g. `snowcap-cli`) can print what ran,
/// the same role `build::Output` plays for the teacher's build pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub mutating: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub executed: Vec<ExecutedStatement>,
}

/// Applies every op in `schedule` against `session`, in order, never in
/// parallel (spec.md §5: "The core is single-threaded for mutation").
///
/// On any statement failure the executor stops immediately and returns
/// the error; it does not attempt rollback (spec.md §4.8, §7: "StatementFailure
/// during apply aborts the run immediately"). Whatever prefix of
/// statements already succeeded stays applied — the caller gets back the
/// partial `ExecutionReport` alongside the error via `err`'s position in
/// `schedule.ops`, not reconstructed state.
pub async fn apply(
    schedule: &snowcap_plan::Schedule,
    session: Arc<dyn Session>,
    reader: &Reader,
) -> Result<ExecutionReport, ExecError> {
    let mut report = ExecutionReport::default();
    let mut active_role = session.role().to_string();

    for op in &schedule.ops {
        match op {
            Op::UseSecondaryRoles => {
                execute_statement(&session, "USE SECONDARY ROLES ALL").await?;
                report.executed.push(ExecutedStatement {
                    sql: "USE SECONDARY ROLES ALL".to_string(),
                    mutating: false,
                });
            }
            Op::UseRole(role) => {
                // spec.md §4.8: "`USE ROLE` to the currently active role
                // is a no-op and is elided."
                if role.eq_ignore_ascii_case(&active_role) {
                    debug!(role = %role, "role already active, eliding USE ROLE");
                    continue;
                }
                let sql = format!("USE ROLE {role}");
                execute_statement(&session, &sql).await?;
                active_role = role.clone();
                report.executed.push(ExecutedStatement { sql, mutating: false });
            }
            Op::Statement { sql, mutating, urn, .. } => {
                info!(urn = %urn.render(), statement = %sql, "applying");
                execute_statement(&session, sql).await?;
                if *mutating {
                    reader.invalidate();
                }
                report.executed.push(ExecutedStatement { sql: sql.clone(), mutating: *mutating });
            }
        }
    }

    Ok(report)
}

async fn execute_statement(session: &Arc<dyn Session>, sql: &str) -> Result<(), ExecError> {
    let session = session.clone();
    let statement = sql.to_string();
    let result = {
        let statement = statement.clone();
        tokio::task::spawn_blocking(move || session.execute(&statement))
            .await
            .expect("statement execution task panicked")
    };
    result.map(|_rows| ()).map_err(|err| ExecError::StatementFailure {
        statement,
        code: err.code,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_catalog::ResourceKind;
    use snowcap_ident::{Fqn, Name, Urn};
    use snowcap_state::{Row, SessionError};
    use std::sync::Mutex;

    struct FakeSession {
        role: Mutex<String>,
        fail_on: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn new(role: &str) -> Self {
            FakeSession {
                role: Mutex::new(role.to_string()),
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(role: &str, fail_on: &str) -> Self {
            FakeSession {
                role: Mutex::new(role.to_string()),
                fail_on: Some(fail_on.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Session for FakeSession {
        fn execute(&self, sql: &str) -> Result<Vec<Row>, SessionError> {
            self.calls.lock().unwrap().push(sql.to_string());
            if let Some(role) = sql.strip_prefix("USE ROLE ") {
                *self.role.lock().unwrap() = role.to_string();
            }
            if self.fail_on.as_deref() == Some(sql) {
                return Err(SessionError { code: "000001".to_string(), message: "boom".to_string() });
            }
            Ok(Vec::new())
        }

        fn role(&self) -> &str {
            // Leak is fine in a test double: short-lived process, and
            // `Session::role` returns `&str` rather than an owned string.
            Box::leak(self.role.lock().unwrap().clone().into_boxed_str())
        }

        fn user(&self) -> &str {
            "test_user"
        }
    }

    fn urn() -> Urn {
        Urn::new("ab12345", "database", Fqn::bare(Name::unquoted("DB1")))
    }

    #[tokio::test]
    async fn applies_every_op_in_order() {
        let fake = Arc::new(FakeSession::new("PUBLIC"));
        let reader = Reader::new(fake.clone(), "ab12345");
        let schedule = snowcap_plan::Schedule {
            ops: vec![
                snowcap_plan::Op::UseSecondaryRoles,
                snowcap_plan::Op::UseRole("SYSADMIN".to_string()),
                snowcap_plan::Op::Statement {
                    urn: urn(),
                    kind: ResourceKind::Database,
                    sql: "CREATE DATABASE DB1".to_string(),
                    mutating: true,
                },
            ],
        };

        let report = apply(&schedule, fake.clone(), &reader).await.unwrap();
        assert_eq!(report.executed.len(), 3);
        assert!(report.executed[2].mutating);
    }

    #[tokio::test]
    async fn use_role_to_active_role_is_elided() {
        let fake = Arc::new(FakeSession::new("SYSADMIN"));
        let reader = Reader::new(fake.clone(), "ab12345");
        let schedule = snowcap_plan::Schedule {
            ops: vec![snowcap_plan::Op::UseRole("SYSADMIN".to_string())],
        };
        let report = apply(&schedule, fake.clone(), &reader).await.unwrap();
        assert!(report.executed.is_empty());
    }

    #[tokio::test]
    async fn statement_failure_stops_the_run() {
        let fake = Arc::new(FakeSession::failing_on("SYSADMIN", "DROP DATABASE DB1"));
        let reader = Reader::new(fake.clone(), "ab12345");
        let schedule = snowcap_plan::Schedule {
            ops: vec![
                snowcap_plan::Op::Statement {
                    urn: urn(),
                    kind: ResourceKind::Database,
                    sql: "DROP DATABASE DB1".to_string(),
                    mutating: true,
                },
                snowcap_plan::Op::Statement {
                    urn: urn(),
                    kind: ResourceKind::Database,
                    sql: "CREATE DATABASE DB2".to_string(),
                    mutating: true,
                },
            ],
        };
        let err = apply(&schedule, fake.clone(), &reader).await.unwrap_err();
        assert!(matches!(err, ExecError::StatementFailure { .. }));
    }
}
