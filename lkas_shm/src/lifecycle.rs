//! Orphan detection and cleanup for regions left behind by a crashed writer.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use crate::error::ShmResult;
use crate::platform::is_process_alive;

/// Tracked state for one region, used to decide whether it has been
/// abandoned by both its writer and its readers.
#[derive(Debug, Clone)]
pub struct RegionMetadata {
    pub name: String,
    pub path: String,
    pub writer_pid: u32,
    pub created_at: SystemTime,
    pub last_access: SystemTime,
}

/// Tracks live regions and reclaims ones whose writer has died and whose
/// grace period has elapsed.
pub struct RegionCleanup {
    grace_period: Duration,
    tracked: HashMap<String, RegionMetadata>,
}

impl RegionCleanup {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            tracked: HashMap::new(),
        }
    }

    pub fn register(&mut self, metadata: RegionMetadata) {
        self.tracked.insert(metadata.name.clone(), metadata);
    }

    pub fn unregister(&mut self, name: &str) {
        self.tracked.remove(name);
    }

    pub fn touch(&mut self, name: &str) {
        if let Some(metadata) = self.tracked.get_mut(name) {
            metadata.last_access = SystemTime::now();
        }
    }

    /// Reclaim any tracked region whose writer is dead and whose grace
    /// period has elapsed, returning how many were removed.
    pub fn reclaim_orphans(&mut self) -> ShmResult<usize> {
        let mut to_remove = Vec::new();

        for (name, metadata) in &self.tracked {
            if is_process_alive(metadata.writer_pid) {
                continue;
            }
            let Ok(elapsed) = metadata.last_access.elapsed() else {
                continue;
            };
            if elapsed <= self.grace_period {
                continue;
            }
            tracing::info!(region = %name, "reclaiming orphaned region");
            if crate::platform::destroy_backing_file(&metadata.path).is_ok() {
                to_remove.push(name.clone());
            }
        }

        let count = to_remove.len();
        for name in to_remove {
            self.tracked.remove(&name);
        }
        Ok(count)
    }
}

impl Default for RegionCleanup {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

static GLOBAL_CLEANUP: LazyLock<Mutex<RegionCleanup>> =
    LazyLock::new(|| Mutex::new(RegionCleanup::default()));

/// The process-wide cleanup coordinator. The orchestrator polls
/// [`RegionCleanup::reclaim_orphans`] on this instance periodically.
pub fn global_cleanup() -> MutexGuard<'static, RegionCleanup> {
    GLOBAL_CLEANUP.lock().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, writer_pid: u32) -> RegionMetadata {
        RegionMetadata {
            name: name.to_string(),
            path: format!("/dev/shm/{name}"),
            writer_pid,
            created_at: SystemTime::now(),
            last_access: SystemTime::now(),
        }
    }

    #[test]
    fn register_and_unregister_round_trip() {
        let mut cleanup = RegionCleanup::new(Duration::from_secs(5));
        cleanup.register(sample("a", 1));
        assert!(cleanup.tracked.contains_key("a"));
        cleanup.unregister("a");
        assert!(!cleanup.tracked.contains_key("a"));
    }

    #[test]
    fn live_writer_is_never_reclaimed() {
        let mut cleanup = RegionCleanup::new(Duration::from_secs(0));
        cleanup.register(sample("live", crate::platform::current_pid()));
        let reclaimed = cleanup.reclaim_orphans().unwrap();
        assert_eq!(reclaimed, 0);
        assert!(cleanup.tracked.contains_key("live"));
    }

    #[test]
    fn dead_writer_within_grace_period_is_kept() {
        let mut cleanup = RegionCleanup::new(Duration::from_secs(3600));
        cleanup.register(sample("recent", 0));
        let reclaimed = cleanup.reclaim_orphans().unwrap();
        assert_eq!(reclaimed, 0);
    }
}
