//! Duplicate-request suppression for mutating endpoints.
//!
//! Every guarded request is reduced to a fingerprint over its identifying
//! attributes. A fingerprint sitting in the pending table (request in flight)
//! or in the recently-completed table (finished within the retention window)
//! marks the request as a duplicate. Registration is an atomic
//! check-and-insert under one lock, so two identical requests racing each
//! other cannot both pass; nothing awaits while the lock is held.
//!
//! Release runs exactly once per registration however the request ends:
//! explicitly on response completion, or via `Drop` when the request is
//! aborted mid-flight. A periodic sweep reclaims stuck pending entries and
//! aged completed ones.
//!
//! State is process-local, same caveat as the pending stores.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Identifying attributes hashed into a fingerprint.
pub(crate) struct FingerprintParts<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub body: &'a [u8],
    pub bearer: &'a str,
    pub user_agent: &'a str,
    pub client_ip: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RequestFingerprint([u8; 32]);

impl RequestFingerprint {
    pub(crate) fn new(parts: &FingerprintParts<'_>) -> Self {
        let mut hasher = Sha256::new();
        for field in [
            parts.method,
            parts.path,
            parts.query,
            parts.bearer,
            parts.user_agent,
            parts.client_ip,
        ] {
            hasher.update(field.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(parts.body);
        Self(hasher.finalize().into())
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct GuardPolicy {
    /// How long a completed fingerprint keeps blocking identical requests.
    pub retention: Duration,
    /// Age at which a pending entry counts as stuck and is swept away.
    pub pending_max_age: Duration,
}

#[derive(Default)]
struct GuardMaps {
    pending: HashMap<RequestFingerprint, Instant>,
    completed: HashMap<RequestFingerprint, Instant>,
}

pub(crate) struct DuplicateGuard {
    policy: GuardPolicy,
    maps: Arc<Mutex<GuardMaps>>,
}

impl DuplicateGuard {
    pub(crate) fn new(policy: GuardPolicy) -> Self {
        Self {
            policy,
            maps: Arc::new(Mutex::new(GuardMaps::default())),
        }
    }

    /// Whether an identical request is in flight or completed recently.
    pub(crate) fn check_duplicate(&self, fingerprint: &RequestFingerprint) -> bool {
        let maps = lock(&self.maps);
        maps.pending.contains_key(fingerprint)
            || maps
                .completed
                .get(fingerprint)
                .is_some_and(|done| done.elapsed() < self.policy.retention)
    }

    /// Atomically claim a fingerprint; `None` means duplicate.
    ///
    /// The returned handle must outlive the request. Dropping it releases,
    /// so aborted requests cannot leave a fingerprint stuck in pending.
    pub(crate) fn register_pending(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> Option<ReleaseHandle> {
        let mut maps = lock(&self.maps);
        if maps.pending.contains_key(fingerprint)
            || maps
                .completed
                .get(fingerprint)
                .is_some_and(|done| done.elapsed() < self.policy.retention)
        {
            return None;
        }
        maps.pending.insert(*fingerprint, Instant::now());
        Some(ReleaseHandle {
            maps: Arc::clone(&self.maps),
            fingerprint: *fingerprint,
            released: false,
        })
    }

    /// Purge stuck pending entries and aged completed ones.
    /// Returns (pending purged, completed purged).
    pub(crate) fn sweep(&self) -> (usize, usize) {
        let mut maps = lock(&self.maps);
        let pending_before = maps.pending.len();
        let max_age = self.policy.pending_max_age;
        maps.pending.retain(|_, started| started.elapsed() < max_age);
        let pending_purged = pending_before - maps.pending.len();

        let completed_before = maps.completed.len();
        let retention = self.policy.retention;
        maps.completed.retain(|_, done| done.elapsed() < retention);
        (pending_purged, completed_before - maps.completed.len())
    }
}

fn lock(maps: &Mutex<GuardMaps>) -> MutexGuard<'_, GuardMaps> {
    maps.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot move of a fingerprint from pending to recently-completed.
pub(crate) struct ReleaseHandle {
    maps: Arc<Mutex<GuardMaps>>,
    fingerprint: RequestFingerprint,
    released: bool,
}

impl ReleaseHandle {
    pub(crate) fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut maps = lock(&self.maps);
        maps.pending.remove(&self.fingerprint);
        maps.completed.insert(self.fingerprint, Instant::now());
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        self.do_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn parts<'a>(body: &'a [u8], bearer: &'a str) -> FingerprintParts<'a> {
        FingerprintParts {
            method: "POST",
            path: "/v1/auth/phone/verify-code",
            query: "",
            body,
            bearer,
            user_agent: "rakonti-app/1.0",
            client_ip: "1.2.3.4",
        }
    }

    fn policy(retention_ms: u64, pending_max_ms: u64) -> GuardPolicy {
        GuardPolicy {
            retention: Duration::from_millis(retention_ms),
            pending_max_age: Duration::from_millis(pending_max_ms),
        }
    }

    #[test]
    fn fingerprint_is_deterministic_and_input_sensitive() {
        let a = RequestFingerprint::new(&parts(b"{\"code\":\"1\"}", "tok"));
        let b = RequestFingerprint::new(&parts(b"{\"code\":\"1\"}", "tok"));
        let c = RequestFingerprint::new(&parts(b"{\"code\":\"2\"}", "tok"));
        let d = RequestFingerprint::new(&parts(b"{\"code\":\"1\"}", "other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn second_identical_request_is_rejected_while_pending() {
        let guard = DuplicateGuard::new(policy(30_000, 120_000));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        let handle = guard.register_pending(&fingerprint);
        assert!(handle.is_some());
        assert!(guard.check_duplicate(&fingerprint));
        assert!(guard.register_pending(&fingerprint).is_none());
    }

    #[test]
    fn release_moves_to_completed_window() {
        let guard = DuplicateGuard::new(policy(30_000, 120_000));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        let handle = guard.register_pending(&fingerprint).unwrap();
        handle.release();

        // Still blocked by the retention window.
        assert!(guard.check_duplicate(&fingerprint));
        assert!(guard.register_pending(&fingerprint).is_none());
    }

    #[test]
    fn identical_request_allowed_after_retention() {
        let guard = DuplicateGuard::new(policy(20, 120_000));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        let handle = guard.register_pending(&fingerprint).unwrap();
        handle.release();
        sleep(Duration::from_millis(40));

        assert!(!guard.check_duplicate(&fingerprint));
        assert!(guard.register_pending(&fingerprint).is_some());
    }

    #[test]
    fn dropping_the_handle_releases() {
        let guard = DuplicateGuard::new(policy(30_000, 120_000));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        let handle = guard.register_pending(&fingerprint).unwrap();
        drop(handle);

        // Pending slot is free again, but the completed window holds.
        assert!(guard.check_duplicate(&fingerprint));
        let (pending_purged, _) = guard.sweep();
        assert_eq!(pending_purged, 0);
    }

    #[test]
    fn sweep_purges_stuck_pending_entries() {
        let guard = DuplicateGuard::new(policy(30_000, 10));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        let handle = guard.register_pending(&fingerprint).unwrap();
        sleep(Duration::from_millis(30));
        let (pending_purged, completed_purged) = guard.sweep();
        assert_eq!(pending_purged, 1);
        assert_eq!(completed_purged, 0);
        assert!(!guard.check_duplicate(&fingerprint));

        // Late release of a swept entry still lands in completed harmlessly.
        handle.release();
        assert!(guard.check_duplicate(&fingerprint));
    }

    #[test]
    fn sweep_purges_aged_completed_entries() {
        let guard = DuplicateGuard::new(policy(10, 120_000));
        let fingerprint = RequestFingerprint::new(&parts(b"{}", "tok"));

        guard.register_pending(&fingerprint).unwrap().release();
        sleep(Duration::from_millis(30));
        let (_, completed_purged) = guard.sweep();
        assert_eq!(completed_purged, 1);
        assert!(!guard.check_duplicate(&fingerprint));
    }
}
