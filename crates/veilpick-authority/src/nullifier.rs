//! One-time nullifier consumption.
//!
//! A nullifier that has been accepted once must never be accepted again,
//! for the lifetime of the system. `insert_unique` is the atomicity
//! primitive: of any number of concurrent calls with the same nullifier,
//! exactly one returns `true`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use veilpick_types::{Nullifier, PickupError, PickupResult};

/// Permanent set of consumed nullifiers. Entries are never removed.
pub trait NullifierStore: Send + Sync {
    /// Insert the nullifier if absent. Returns `true` when this call
    /// consumed it, `false` when it was already present.
    fn insert_unique(&self, nullifier: &Nullifier) -> PickupResult<bool>;

    fn contains(&self, nullifier: &Nullifier) -> PickupResult<bool>;

    fn len(&self) -> PickupResult<usize>;

    fn is_empty(&self) -> PickupResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory store for tests and single-process deployments. Unbounded:
/// consumed nullifiers are retained for the process lifetime.
#[derive(Default)]
pub struct MemoryNullifierStore {
    seen: Mutex<HashSet<Nullifier>>,
}

impl MemoryNullifierStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NullifierStore for MemoryNullifierStore {
    fn insert_unique(&self, nullifier: &Nullifier) -> PickupResult<bool> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| PickupError::Storage("Nullifier set lock poisoned".into()))?;
        Ok(seen.insert(*nullifier))
    }

    fn contains(&self, nullifier: &Nullifier) -> PickupResult<bool> {
        let seen = self
            .seen
            .lock()
            .map_err(|_| PickupError::Storage("Nullifier set lock poisoned".into()))?;
        Ok(seen.contains(nullifier))
    }

    fn len(&self) -> PickupResult<usize> {
        let seen = self
            .seen
            .lock()
            .map_err(|_| PickupError::Storage("Nullifier set lock poisoned".into()))?;
        Ok(seen.len())
    }
}

/// Durable store backed by sled, keyed by nullifier bytes. Uniqueness
/// comes from compare-and-swap against an absent key, so concurrent
/// inserts of the same nullifier resolve to one winner even across
/// process threads.
pub struct SledNullifierStore {
    db: sled::Db,
}

impl SledNullifierStore {
    pub fn open(path: &Path) -> PickupResult<Self> {
        let db = sled::open(path)
            .map_err(|e| PickupError::Storage(format!("Cannot open nullifier db: {}", e)))?;
        Ok(Self { db })
    }
}

impl NullifierStore for SledNullifierStore {
    fn insert_unique(&self, nullifier: &Nullifier) -> PickupResult<bool> {
        let outcome = self
            .db
            .compare_and_swap(nullifier.as_bytes(), None::<&[u8]>, Some(vec![]))
            .map_err(|e| PickupError::Storage(e.to_string()))?;

        match outcome {
            Ok(()) => {
                self.db
                    .flush()
                    .map_err(|e| PickupError::Storage(e.to_string()))?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn contains(&self, nullifier: &Nullifier) -> PickupResult<bool> {
        self.db
            .contains_key(nullifier.as_bytes())
            .map_err(|e| PickupError::Storage(e.to_string()))
    }

    fn len(&self) -> PickupResult<usize> {
        Ok(self.db.len())
    }
}
