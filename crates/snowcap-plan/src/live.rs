use std::collections::BTreeMap;

use snowcap_catalog::Resource;
use snowcap_ident::Urn;
use snowcap_manifest::Manifest;
use snowcap_state::{Reader, StateError};

/// The live-state snapshot the planner diffs the desired manifest against
/// (spec.md glossary: "the snapshot of objects read from the warehouse,
/// keyed by URN").
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub urns: BTreeMap<Urn, Resource>,
}

/// Assembles a `LiveState` by reading exactly the URNs the planner needs:
/// every desired URN (to detect Create/Update/Transfer), plus every live
/// URN of a sync kind (to detect Drop candidates) — spec.md §4.5's
/// `fetch`/`list` contract, driven here rather than inside `Reader` itself
/// since only the planner knows which URNs it cares about.
pub async fn gather_live_state(reader: &Reader, manifest: &Manifest) -> Result<LiveState, StateError> {
    let mut urns = BTreeMap::new();

    for (urn, resource) in &manifest.urns {
        if let Some(live) = reader.fetch(urn, resource.kind).await? {
            urns.insert(urn.clone(), live);
        }
    }

    let listed = reader.list_many(&manifest.sync_kinds).await;
    for (kind, result) in listed {
        for urn in result? {
            if urns.contains_key(&urn) {
                continue;
            }
            if let Some(live) = reader.fetch(&urn, kind).await? {
                urns.insert(urn, live);
            }
        }
    }

    Ok(LiveState { urns })
}

#[cfg(test)]
mod test {
    use super::*;
    use snowcap_catalog::Edition;
    use snowcap_ident::{parse_name, Fqn};
    use snowcap_manifest::{build, SessionContext};
    use snowcap_state::{Row, Session, SessionError};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct FakeSession {
        responses: Mutex<HashMap<String, Result<Vec<Row>, SessionError>>>,
    }

    impl FakeSession {
        fn new(pairs: &[(&str, Vec<Row>)]) -> Self {
            FakeSession {
                responses: Mutex::new(
                    pairs.iter().map(|(k, v)| (k.to_string(), Ok(v.clone()))).collect(),
                ),
            }
        }
    }

    impl Session for FakeSession {
        fn execute(&self, sql: &str) -> Result<Vec<Row>, SessionError> {
            self.responses.lock().unwrap().get(sql).cloned().unwrap_or(Ok(Vec::new()))
        }
        fn role(&self) -> &str {
            "SYSADMIN"
        }
        fn user(&self) -> &str {
            "test_user"
        }
    }

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn gathers_only_relevant_urns() {
        let yaml = "scope: ACCOUNT\nsync_resources: [DATABASE]\ndatabases:\n  - name: DB1\n";
        let session_ctx = SessionContext::new("ab12345", Edition::Standard);
        let manifest = build(&[yaml], &Default::default(), &session_ctx).unwrap();

        let fake = FakeSession::new(&[
            (
                "SHOW DATABASES LIKE 'DB1'",
                vec![row(&[("name", serde_json::json!("DB1")), ("owner", serde_json::json!("SYSADMIN"))])],
            ),
            (
                "SHOW DATABASES",
                vec![
                    row(&[("name", serde_json::json!("DB1")), ("owner", serde_json::json!("SYSADMIN"))]),
                    row(&[("name", serde_json::json!("STALE")), ("owner", serde_json::json!("SYSADMIN"))]),
                ],
            ),
            (
                "SHOW DATABASES LIKE 'STALE'",
                vec![row(&[("name", serde_json::json!("STALE")), ("owner", serde_json::json!("SYSADMIN"))])],
            ),
        ]);

        let reader = Reader::new(Arc::new(fake), "ab12345");
        let live = gather_live_state(&reader, &manifest).await.unwrap();

        let db1 = Urn::new("ab12345", "database", Fqn::bare(parse_name("DB1").unwrap()));
        let stale = Urn::new("ab12345", "database", Fqn::bare(parse_name("STALE").unwrap()));
        assert!(live.urns.contains_key(&db1));
        assert!(live.urns.contains_key(&stale));
        assert_eq!(live.urns.len(), 2);
    }
}
