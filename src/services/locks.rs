use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::level::LocationId;

/// Per-(location, material) async locks serializing the read-modify-write of
/// a level row. The store exposes no atomic counter, so without this two
/// concurrent recorders for the same key race on read level, compute, write
/// and lose an update. The transaction log itself is append-only and has no
/// such race.
#[derive(Debug, Default)]
pub struct LevelLocks {
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl LevelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the given level. The guard releases on
    /// drop; lock entries are kept for the process lifetime, which is bounded
    /// by the number of distinct (location, material) pairs seen.
    pub async fn acquire(&self, location: &LocationId, material_id: &str) -> OwnedMutexGuard<()> {
        let key = (location.as_key(), material_id.to_string());
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Per-check async locks serializing count updates and completion of a single
/// inventory check. Completion is terminal: the completed flag must be read,
/// the reconciling transactions written, and the flag set inside one critical
/// section, or two racing completers both pass the pending check and double
/// the correction rows.
#[derive(Debug, Default)]
pub struct CheckLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CheckLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, check_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(check_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
