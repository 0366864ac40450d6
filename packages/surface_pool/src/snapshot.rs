use std::fmt;

use crate::{ComponentKey, SlotCategory, SlotId};

/// A point-in-time copy of one live lease.
///
/// Part of a [`PoolSnapshot`]. The display form is
/// `single_top.0 -> 'pkg/Widget' (refcount 1, pinned)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaseSnapshot {
    slot: SlotId,
    key: ComponentKey,
    refcount: i32,
    pinned: bool,
}

impl LeaseSnapshot {
    pub(crate) fn new(slot: SlotId, key: ComponentKey, refcount: i32, pinned: bool) -> Self {
        Self {
            slot,
            key,
            refcount,
            pinned,
        }
    }

    /// The slot the lease holds.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The component key the lease belongs to.
    #[must_use]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// References beyond the initial resolve. A fresh lease has refcount zero; a
    /// pinned lease that has absorbed extra releases can sit below zero.
    #[must_use]
    pub fn refcount(&self) -> i32 {
        self.refcount
    }

    /// Whether the lease is protected from refcount-driven recycling.
    #[must_use]
    pub fn pinned(&self) -> bool {
        self.pinned
    }
}

impl fmt::Display for LeaseSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> '{}' (refcount {}", self.slot, self.key, self.refcount)?;

        if self.pinned {
            write!(f, ", pinned")?;
        }

        write!(f, ")")
    }
}

/// A point-in-time copy of one bounded pool: its leases and its free slots.
///
/// Returned by [`SurfacePool::snapshots()`][crate::SurfacePool::snapshots]. Leases and
/// free slots are ordered by slot index so repeated snapshots of the same state render
/// identically. The display form is a small human-readable block, one line per lease:
///
/// ```text
/// single_top pool (capacity 4, 2 leased, 2 free):
///   single_top.0 -> 'pkg/A' (refcount 1)
///   single_top.1 -> 'pkg/B' (refcount 0, pinned)
///   free: single_top.2, single_top.3
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolSnapshot {
    category: SlotCategory,
    capacity: usize,
    leases: Vec<LeaseSnapshot>,
    free: Vec<SlotId>,
}

impl PoolSnapshot {
    pub(crate) fn new(
        category: SlotCategory,
        capacity: usize,
        leases: Vec<LeaseSnapshot>,
        free: Vec<SlotId>,
    ) -> Self {
        Self {
            category,
            capacity,
            leases,
            free,
        }
    }

    /// The category this snapshot describes.
    #[must_use]
    pub fn category(&self) -> SlotCategory {
        self.category
    }

    /// The fixed capacity of the category.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live leases, ordered by slot index.
    #[must_use]
    pub fn leases(&self) -> &[LeaseSnapshot] {
        &self.leases
    }

    /// Unleased slots, ordered by slot index.
    #[must_use]
    pub fn free(&self) -> &[SlotId] {
        &self.free
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} pool (capacity {}, {} leased, {} free):",
            self.category,
            self.capacity,
            self.leases.len(),
            self.free.len()
        )?;

        for lease in &self.leases {
            writeln!(f, "  {lease}")?;
        }

        if self.free.is_empty() {
            writeln!(f, "  free: (none)")
        } else {
            let free = self
                .free
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            writeln!(f, "  free: {free}")
        }
    }
}
