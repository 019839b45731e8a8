//! Sharded visited-set
//!
//! Backed by a `DashMap`, so claims on different shards never contend and
//! heavy fan-out does not serialize on a single lock.

use dashmap::DashMap;

/// Default number of shards
pub const DEFAULT_SHARDS: usize = 16;

/// Thread-safe set of task ids claimed during one walk
#[derive(Debug)]
pub struct DedupStore {
    claimed: DashMap<String, ()>,
    shards: usize,
}

impl DedupStore {
    /// Create a store with `shard_count` shards
    ///
    /// Rounded up to a power of two; dashmap needs at least two.
    pub fn new(shard_count: usize) -> Self {
        let shards = shard_count.max(2).next_power_of_two();
        Self {
            claimed: DashMap::with_shard_amount(shards),
            shards,
        }
    }

    /// Atomically claim `id`
    ///
    /// Returns true for exactly one caller per id over the life of the store.
    /// Ids are never released.
    pub fn try_claim(&self, id: &str) -> bool {
        if self.claimed.contains_key(id) {
            return false;
        }
        self.claimed.insert(id.to_owned(), ()).is_none()
    }

    /// Check whether `id` has been claimed
    pub fn contains(&self, id: &str) -> bool {
        self.claimed.contains_key(id)
    }

    /// Number of claimed ids
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// Check if nothing has been claimed
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Number of shards in use
    pub fn shard_count(&self) -> usize {
        self.shards
    }
}

impl Default for DedupStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
