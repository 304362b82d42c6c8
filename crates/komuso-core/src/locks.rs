//! local lock service
//!
//! in-process mutual exclusion over note commitments so a single client
//! cannot race itself into a double spend. the on-chain nullifier set stays
//! the ultimate authority; this map only guards concurrent pipelines inside
//! one process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// a lock that outlives this is considered leaked and swept
const LOCK_TIMEOUT: Duration = Duration::from_secs(300);

/// minimum spacing between opportunistic sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct LockEntry {
    locked_at: Instant,
    operation: String,
}

#[derive(Default)]
struct LockMap {
    locks: HashMap<String, LockEntry>,
    last_sweep: Option<Instant>,
}

/// in-process commitment lock map
pub struct LockService {
    inner: Mutex<LockMap>,
}

impl LockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(LockMap::default()) })
    }

    /// acquire all commitments or none
    pub fn try_lock(
        self: &Arc<Self>,
        commitments: &[String],
        operation: &str,
    ) -> Option<LockGuard> {
        let mut map = self.inner.lock();
        Self::sweep_locked(&mut map, false);

        if commitments.iter().any(|c| map.locks.contains_key(c)) {
            return None;
        }

        let now = Instant::now();
        for commitment in commitments {
            map.locks.insert(
                commitment.clone(),
                LockEntry { locked_at: now, operation: operation.to_string() },
            );
        }
        debug!("locked {} commitments for {}", commitments.len(), operation);

        Some(LockGuard {
            service: Arc::clone(self),
            commitments: commitments.to_vec(),
        })
    }

    /// release commitments; releasing an unheld commitment is a no-op
    pub fn unlock(&self, commitments: &[String]) {
        let mut map = self.inner.lock();
        for commitment in commitments {
            map.locks.remove(commitment);
        }
    }

    /// drop expired locks now
    pub fn sweep(&self) {
        Self::sweep_locked(&mut self.inner.lock(), true);
    }

    fn sweep_locked(map: &mut LockMap, force: bool) {
        let now = Instant::now();
        if !force {
            if let Some(last) = map.last_sweep {
                if now.duration_since(last) < SWEEP_INTERVAL {
                    return;
                }
            }
        }
        map.last_sweep = Some(now);

        let before = map.locks.len();
        map.locks
            .retain(|_, entry| now.duration_since(entry.locked_at) < LOCK_TIMEOUT);
        let expired = before - map.locks.len();
        if expired > 0 {
            debug!("swept {} expired locks", expired);
        }
    }

    pub fn held(&self) -> usize {
        self.inner.lock().locks.len()
    }

    /// operation currently holding a commitment, if any
    pub fn holder(&self, commitment: &str) -> Option<String> {
        self.inner
            .lock()
            .locks
            .get(commitment)
            .map(|entry| entry.operation.clone())
    }
}

/// releases its commitments on drop, so every exit path unlocks
pub struct LockGuard {
    service: Arc<LockService>,
    commitments: Vec<String>,
}

impl LockGuard {
    pub fn commitments(&self) -> &[String] {
        &self.commitments
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.service.unlock(&self.commitments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_or_nothing() {
        let service = LockService::new();
        let guard = service
            .try_lock(&["a".into(), "b".into()], "withdraw")
            .unwrap();

        // overlapping set fails entirely, including the free commitment
        assert!(service.try_lock(&["b".into(), "c".into()], "deposit").is_none());
        assert!(service.holder("c").is_none());

        drop(guard);
        assert!(service.try_lock(&["b".into(), "c".into()], "deposit").is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let service = LockService::new();
        {
            let _guard = service.try_lock(&["x".into()], "deposit").unwrap();
            assert_eq!(service.held(), 1);
        }
        assert_eq!(service.held(), 0);
    }

    #[test]
    fn test_unlock_idempotent() {
        let service = LockService::new();
        let guard = service.try_lock(&["x".into()], "deposit").unwrap();
        service.unlock(&["x".into()]);
        service.unlock(&["x".into()]);
        assert_eq!(service.held(), 0);
        // guard drop after manual unlock is also a no-op
        drop(guard);
    }

    #[test]
    fn test_holder_reports_operation() {
        let service = LockService::new();
        let _guard = service.try_lock(&["x".into()], "withdraw").unwrap();
        assert_eq!(service.holder("x").as_deref(), Some("withdraw"));
    }
}
