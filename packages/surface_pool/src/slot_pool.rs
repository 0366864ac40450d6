use std::num::NonZero;

use foldhash::{HashMap, HashMapExt};

use crate::{
    ComponentKey, Error, LeaseSnapshot, PinRecord, PoolSnapshot, Result, SlotCategory, SlotId,
};

/// The live binding between one component key and one slot of a bounded category.
///
/// A lease is created the first time a key is resolved in its category and mutated by
/// every later resolve and release of the same key. It is destroyed, returning its slot
/// to the free list, only when the refcount goes strictly negative while unpinned.
#[derive(Debug)]
struct Lease {
    slot_index: u32,
    refcount: i32,
    pinned: bool,
}

/// Free and leased slot bookkeeping for one bounded [`SlotCategory`].
///
/// The pool owns a fixed set of slot indexes, fixed at construction. Every index is
/// either on the free list or held by exactly one lease; the two sets are disjoint and
/// together always cover the full capacity.
///
/// This type is not synchronized. [`SurfacePool`][crate::SurfacePool] wraps each
/// instance in its own mutex and keeps critical sections free of I/O.
#[derive(Debug)]
pub(crate) struct SlotPool {
    category: SlotCategory,
    capacity: usize,

    /// Slot indexes not currently leased, kept in descending order so that `pop`
    /// hands out the lowest free index. Recycled indexes go to the end and are
    /// therefore reused before older ones.
    free: Vec<u32>,

    /// We use foldhash for better performance with small hash tables.
    leases: HashMap<ComponentKey, Lease>,
}

impl SlotPool {
    pub(crate) fn new(category: SlotCategory, capacity: NonZero<u32>) -> Self {
        Self {
            category,
            capacity: capacity.get() as usize,
            free: (0..capacity.get()).rev().collect(),
            leases: HashMap::new(),
        }
    }

    pub(crate) fn category(&self) -> SlotCategory {
        self.category
    }

    /// Number of slots available for new keys.
    pub(crate) fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns the slot leased to `key`, incrementing the lease refcount, or leases a
    /// free slot to it with refcount zero.
    ///
    /// Fails only when `key` holds no lease and the free list is empty.
    pub(crate) fn acquire(&mut self, key: &ComponentKey) -> Result<SlotId> {
        self.acquire_inner(key, false)
    }

    /// Like [`acquire()`][Self::acquire], additionally marking the lease pinned.
    ///
    /// Pinning is idempotent: re-pinning an already pinned lease only increments the
    /// refcount, the same as a plain re-acquire.
    pub(crate) fn acquire_pinned(&mut self, key: &ComponentKey) -> Result<SlotId> {
        self.acquire_inner(key, true)
    }

    fn acquire_inner(&mut self, key: &ComponentKey, pin: bool) -> Result<SlotId> {
        if let Some(lease) = self.leases.get_mut(key) {
            lease.refcount = lease
                .refcount
                .checked_add(1)
                .expect("lease refcount overflowed i32");

            if pin {
                lease.pinned = true;
            }

            return Ok(SlotId::pooled(self.category, lease.slot_index));
        }

        let Some(slot_index) = self.free.pop() else {
            return Err(Error::Exhausted {
                category: self.category,
                capacity: self.capacity,
                key: key.clone(),
            });
        };

        self.leases.insert(
            key.clone(),
            Lease {
                slot_index,
                refcount: 0,
                pinned: pin,
            },
        );

        Ok(SlotId::pooled(self.category, slot_index))
    }

    /// Decrements the lease refcount for `key`, recycling the slot once the count goes
    /// negative on an unpinned lease.
    ///
    /// Releasing a key with no live lease is a no-op: double release and late release
    /// after external cleanup are expected caller behavior. Returns the recycled slot
    /// when the lease was destroyed.
    pub(crate) fn release(&mut self, key: &ComponentKey) -> Option<SlotId> {
        let lease = self.leases.get_mut(key)?;

        lease.refcount = lease
            .refcount
            .checked_sub(1)
            .expect("lease refcount underflowed i32");

        // A fresh lease starts at zero and re-acquires add one, so the count goes
        // negative on the first release not matched by an acquire.
        if lease.refcount >= 0 || lease.pinned {
            return None;
        }

        let lease = self
            .leases
            .remove(key)
            .expect("lease was just looked up under the same key");
        self.free.push(lease.slot_index);

        Some(SlotId::pooled(self.category, lease.slot_index))
    }

    /// Returns the slot of the live lease for `key`, if any.
    pub(crate) fn reverse_lookup(&self, key: &ComponentKey) -> Option<SlotId> {
        self.leases
            .get(key)
            .map(|lease| SlotId::pooled(self.category, lease.slot_index))
    }

    /// Recreates a pinned lease from a persisted record, with refcount zero.
    ///
    /// Returns `false` without touching any state when the record does not fit this
    /// pool: wrong category, index beyond capacity, slot already leased or key already
    /// bound. Callers skip such records.
    pub(crate) fn seed_pinned(&mut self, record: &PinRecord) -> bool {
        if record.slot().category() != Some(self.category) {
            return false;
        }

        let Some(slot_index) = record.slot().index() else {
            return false;
        };

        if self.leases.contains_key(record.key()) {
            return false;
        }

        let Some(free_position) = self.free.iter().position(|&index| index == slot_index) else {
            return false;
        };

        // Preserve descending order so unpinned allocation still starts at the
        // lowest free index.
        self.free.remove(free_position);

        self.leases.insert(
            record.key().clone(),
            Lease {
                slot_index,
                refcount: 0,
                pinned: true,
            },
        );

        true
    }

    /// All pinned leases as persistable records, ordered by slot index.
    pub(crate) fn pinned_records(&self) -> Vec<PinRecord> {
        let mut records: Vec<_> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.pinned)
            .map(|(key, lease)| {
                PinRecord::new(SlotId::pooled(self.category, lease.slot_index), key.clone())
            })
            .collect();

        records.sort_by_key(|record| record.slot().index());
        records
    }

    /// Unpins every lease, recycling those whose refcount has already gone negative.
    ///
    /// A pinned lease keeps absorbing releases without being destroyed; once unpinned,
    /// a lease that has outlived its references has no later event to recycle it, so
    /// it is recycled here. Returns the number of leases that were pinned.
    pub(crate) fn clear_pinned(&mut self) -> usize {
        let mut unpinned = 0_usize;
        let mut recycled = Vec::new();

        for (key, lease) in &mut self.leases {
            if !lease.pinned {
                continue;
            }

            lease.pinned = false;
            unpinned = unpinned
                .checked_add(1)
                .expect("lease count is bounded by pool capacity");

            if lease.refcount < 0 {
                recycled.push(key.clone());
            }
        }

        for key in recycled {
            let lease = self
                .leases
                .remove(&key)
                .expect("key was collected from the lease table above");
            self.free.push(lease.slot_index);
        }

        unpinned
    }

    /// A point-in-time copy of the pool state for diagnostics.
    pub(crate) fn snapshot(&self) -> PoolSnapshot {
        let mut leases: Vec<_> = self
            .leases
            .iter()
            .map(|(key, lease)| {
                LeaseSnapshot::new(
                    SlotId::pooled(self.category, lease.slot_index),
                    key.clone(),
                    lease.refcount,
                    lease.pinned,
                )
            })
            .collect();

        leases.sort_by_key(|lease| lease.slot().index());

        let mut free: Vec<_> = self
            .free
            .iter()
            .map(|&index| SlotId::pooled(self.category, index))
            .collect();

        free.sort_by_key(|slot| slot.index());

        PoolSnapshot::new(self.category, self.capacity, leases, free)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SlotPool: Send, Debug);

    fn pool_of(capacity: u32) -> SlotPool {
        SlotPool::new(
            SlotCategory::SingleTop,
            NonZero::new(capacity).expect("test capacities are non-zero"),
        )
    }

    fn key(name: &str) -> ComponentKey {
        ComponentKey::new(name)
    }

    #[test]
    fn fresh_pool_is_fully_available() {
        let pool = SlotPool::new(SlotCategory::SingleTask, nz!(4_u32));

        assert_eq!(pool.available(), 4);
        assert_eq!(pool.category(), SlotCategory::SingleTask);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.capacity(), 4);
        assert!(snapshot.leases().is_empty());
    }

    #[test]
    fn acquire_hands_out_lowest_index_first() {
        let mut pool = pool_of(3);

        let a = pool.acquire(&key("a")).expect("pool has free slots");
        let b = pool.acquire(&key("b")).expect("pool has free slots");
        let c = pool.acquire(&key("c")).expect("pool has free slots");

        assert_eq!(a.index(), Some(0));
        assert_eq!(b.index(), Some(1));
        assert_eq!(c.index(), Some(2));
    }

    #[test]
    fn reacquire_returns_same_slot() {
        let mut pool = pool_of(2);

        let first = pool.acquire(&key("a")).expect("pool has free slots");
        let second = pool.acquire(&key("a")).expect("existing lease never exhausts");

        assert_eq!(first, second);
        assert_eq!(pool.available(), 1);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.leases().len(), 1);
        let lease = snapshot.leases().first().expect("one live lease");
        assert_eq!(lease.refcount(), 1);
    }

    #[test]
    fn exhaustion_requires_empty_free_list_and_unknown_key() {
        let mut pool = pool_of(2);

        pool.acquire(&key("a")).expect("pool has free slots");
        pool.acquire(&key("b")).expect("pool has free slots");

        let error = pool.acquire(&key("c")).expect_err("no free slot for new key");
        assert!(matches!(error, Error::Exhausted { capacity: 2, .. }));

        // A key with a live lease is still served from the full pool.
        pool.acquire(&key("a"))
            .expect("existing lease never exhausts");
    }

    #[test]
    fn fresh_lease_is_recycled_by_first_release() {
        let mut pool = pool_of(1);
        let k = key("a");

        let slot = pool.acquire(&k).expect("pool has free slots");

        // Refcount 0 -> -1 crosses the recycling edge.
        assert_eq!(pool.release(&k), Some(slot));
        assert_eq!(pool.reverse_lookup(&k), None);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn balanced_release_keeps_lease_alive() {
        let mut pool = pool_of(1);
        let k = key("a");

        let slot = pool.acquire(&k).expect("pool has free slots");
        pool.acquire(&k).expect("existing lease never exhausts");

        // Two acquires, one release: refcount drops 1 -> 0, still live.
        assert_eq!(pool.release(&k), None);
        assert_eq!(pool.reverse_lookup(&k), Some(slot));

        // One more release sends it negative and recycles.
        assert_eq!(pool.release(&k), Some(slot));
        assert_eq!(pool.reverse_lookup(&k), None);
    }

    #[test]
    fn release_of_unknown_key_is_noop() {
        let mut pool = pool_of(1);

        assert_eq!(pool.release(&key("never-acquired")), None);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn recycled_slot_is_reused_next() {
        let mut pool = pool_of(2);

        let a = pool.acquire(&key("a")).expect("pool has free slots");
        pool.acquire(&key("b")).expect("pool has free slots");
        pool.acquire(&key("c")).expect_err("pool is exhausted");

        pool.release(&key("a"));

        let c = pool.acquire(&key("c")).expect("recycled slot is free again");
        assert_eq!(c, a);
    }

    #[test]
    fn pinned_lease_survives_any_number_of_releases() {
        let mut pool = pool_of(2);
        let k = key("a");

        let slot = pool.acquire_pinned(&k).expect("pool has free slots");

        for _ in 0..3 {
            assert_eq!(pool.release(&k), None);
        }

        assert_eq!(pool.reverse_lookup(&k), Some(slot));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn pinning_existing_lease_increments_refcount() {
        let mut pool = pool_of(1);
        let k = key("a");

        let slot = pool.acquire(&k).expect("pool has free slots");
        let pinned = pool.acquire_pinned(&k).expect("existing lease never exhausts");
        assert_eq!(slot, pinned);

        // Refcount is now 1; unpinning alone does not recycle a lease that still
        // has a non-negative count.
        assert_eq!(pool.clear_pinned(), 1);
        assert_eq!(pool.reverse_lookup(&k), Some(slot));

        pool.release(&k);
        assert_eq!(pool.release(&k), Some(slot));
    }

    #[test]
    fn repinning_is_idempotent() {
        let mut pool = pool_of(1);
        let k = key("a");

        pool.acquire_pinned(&k).expect("pool has free slots");
        pool.acquire_pinned(&k).expect("existing lease never exhausts");

        let records = pool.pinned_records();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn clear_pinned_recycles_overreleased_leases() {
        let mut pool = pool_of(2);
        let k = key("a");

        pool.acquire_pinned(&k).expect("pool has free slots");
        pool.release(&k);

        // The lease sits at refcount -1, kept alive only by the pin.
        assert_eq!(pool.snapshot().leases().len(), 1);

        assert_eq!(pool.clear_pinned(), 1);
        assert_eq!(pool.reverse_lookup(&k), None);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn seed_pinned_restores_lease() {
        let mut pool = pool_of(2);
        let record = PinRecord::from_encoded(SlotCategory::SingleTop, "single_top.1@pkg/Widget")
            .expect("well-formed record");

        assert!(pool.seed_pinned(&record));

        assert_eq!(
            pool.reverse_lookup(&key("pkg/Widget")),
            Some(SlotId::pooled(SlotCategory::SingleTop, 1))
        );
        assert_eq!(pool.pinned_records(), vec![record]);

        // Slot 0 is still free and is handed to the next new key.
        let other = pool.acquire(&key("other")).expect("slot 0 is free");
        assert_eq!(other.index(), Some(0));
    }

    #[test]
    fn seed_pinned_rejects_misfit_records() {
        let mut pool = pool_of(2);

        // Wrong category.
        let record = PinRecord::from_encoded(SlotCategory::SingleTask, "single_task.0@pkg/A")
            .expect("well-formed record");
        assert!(!pool.seed_pinned(&record));

        // Index beyond capacity.
        let record = PinRecord::from_encoded(SlotCategory::SingleTop, "single_top.7@pkg/A")
            .expect("well-formed record");
        assert!(!pool.seed_pinned(&record));

        // Slot already taken.
        let record = PinRecord::from_encoded(SlotCategory::SingleTop, "single_top.0@pkg/A")
            .expect("well-formed record");
        assert!(pool.seed_pinned(&record));
        let duplicate = PinRecord::from_encoded(SlotCategory::SingleTop, "single_top.0@pkg/B")
            .expect("well-formed record");
        assert!(!pool.seed_pinned(&duplicate));

        // Key already bound.
        let rebind = PinRecord::from_encoded(SlotCategory::SingleTop, "single_top.1@pkg/A")
            .expect("well-formed record");
        assert!(!pool.seed_pinned(&rebind));

        assert_eq!(pool.snapshot().leases().len(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut pool = pool_of(3);

        for round in 0_u32..20 {
            let k = key(&format!("key-{round}"));

            match pool.acquire(&k) {
                Ok(_) => {}
                Err(Error::Exhausted { .. }) => {
                    // Make room and retry; the retried key must then fit.
                    let oldest = round
                        .checked_sub(3)
                        .expect("exhaustion cannot happen before three acquisitions");
                    pool.release(&key(&format!("key-{oldest}")));
                    pool.acquire(&k).expect("slot was just recycled");
                }
            }

            let live = pool.snapshot().leases().len();
            assert!(live <= 3);
            assert_eq!(live.checked_add(pool.available()), Some(3));
        }
    }

    #[test]
    fn snapshot_reflects_pool_state() {
        let mut pool = pool_of(3);

        pool.acquire(&key("a")).expect("pool has free slots");
        pool.acquire_pinned(&key("b")).expect("pool has free slots");

        let snapshot = pool.snapshot();

        assert_eq!(snapshot.category(), SlotCategory::SingleTop);
        assert_eq!(snapshot.capacity(), 3);
        assert_eq!(snapshot.leases().len(), 2);
        assert_eq!(snapshot.free().len(), 1);

        let pinned: Vec<_> = snapshot
            .leases()
            .iter()
            .filter(|lease| lease.pinned())
            .collect();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned.first().expect("one pinned lease").key().as_str(), "b");
    }
}
