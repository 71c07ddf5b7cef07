use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Three-stage gate controlling whether the reader attempts the bulk
/// audit-view read path before falling back to per-object `SHOW GRANTS`
/// (spec.md §4.5; SPEC_FULL.md §4 "two-stage cache, not a boolean").
///
/// Grounded on the original `data_provider.py`'s `_should_use_account_usage`,
/// which checks three things in order: an explicit config flag, a cached
/// "do we have IMPORTED PRIVILEGES" access probe, and a cached "did a
/// previous bulk query already fail" flag. The probe and the failure flag
/// have different lifetimes: the probe is revalidated per session, while
/// the failure flag, once set, is sticky for the session's lifetime — so
/// they're modeled as two separate cells rather than one collapsed bool.
pub struct BulkReadGate {
    enabled_by_config: bool,
    access_probe: OnceLock<bool>,
    failed_once: AtomicBool,
}

impl BulkReadGate {
    pub fn new(enabled_by_config: bool) -> Self {
        BulkReadGate {
            enabled_by_config,
            access_probe: OnceLock::new(),
            failed_once: AtomicBool::new(false),
        }
    }

    /// Whether the reader should even attempt the bulk path this call.
    /// Does not consult the access probe: a caller with no probe result
    /// yet should still try once to discover it.
    pub fn should_attempt_bulk(&self) -> bool {
        self.enabled_by_config && !self.has_failed() && self.access_probe.get().copied().unwrap_or(true)
    }

    /// Record the result of probing for audit-view access, if not already
    /// recorded. Subsequent probes in the same session are no-ops — the
    /// probe result is fixed once discovered.
    pub fn record_probe(&self, has_access: bool) {
        let _ = self.access_probe.set(has_access);
    }

    pub fn probe(&self) -> Option<bool> {
        self.access_probe.get().copied()
    }

    /// Mark the bulk path as having failed once; sticky for the gate's
    /// lifetime, so future `should_attempt_bulk` calls skip straight to
    /// per-object fallback (spec.md §4.5: "records a session-scoped
    /// fallback flag so future bulk attempts are skipped").
    pub fn record_bulk_failure(&self) {
        self.failed_once.store(true, Ordering::SeqCst);
    }

    pub fn has_failed(&self) -> bool {
        self.failed_once.load(Ordering::SeqCst)
    }
}

impl Default for BulkReadGate {
    fn default() -> Self {
        BulkReadGate::new(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_by_config_never_attempts_bulk() {
        let gate = BulkReadGate::new(false);
        assert!(!gate.should_attempt_bulk());
    }

    #[test]
    fn failure_is_sticky() {
        let gate = BulkReadGate::new(true);
        assert!(gate.should_attempt_bulk());
        gate.record_bulk_failure();
        assert!(!gate.should_attempt_bulk());
        // A later, unrelated probe success does not un-stick it.
        gate.record_probe(true);
        assert!(!gate.should_attempt_bulk());
    }

    #[test]
    fn probe_records_once() {
        let gate = BulkReadGate::new(true);
        gate.record_probe(false);
        gate.record_probe(true);
        assert_eq!(gate.probe(), Some(false));
    }
}
