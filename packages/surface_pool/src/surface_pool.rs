use std::fmt::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::metrics::{EXHAUSTIONS, PIN_SET_CLEARS};
use crate::{
    ComponentKey, Error, MultiplicityPolicy, PinStore, PoolSnapshot, Result, SlotCategory, SlotId,
    SlotPool, SurfacePoolBuilder, ThemeIntrospector,
};

/// Multiplexes a fixed number of host-owned surface slots across any number of
/// logical components.
///
/// Every component declares a [`MultiplicityPolicy`]. Unbounded components are served
/// constant shared slots with no bookkeeping, so they can never exhaust anything.
/// Each bounded policy is backed by its own small pool of interchangeable slots:
/// resolving a component key leases a slot to it, repeated resolution of the same key
/// returns the same slot with a bumped reference count, and releasing returns the
/// slot to the pool once the count goes negative.
///
/// A lease can additionally be pinned. Pinned leases ignore refcount-driven recycling
/// and are written through a [`PinStore`] so the same key reattaches to the same slot
/// after a process restart.
///
/// Construct one instance in the composition root, via [`new()`][Self::new] or
/// [`builder()`][Self::builder], and hand references to every call site.
///
/// # Example
///
/// ```
/// use surface_pool::{ComponentKey, MultiplicityPolicy, SlotCategory, SurfacePool};
///
/// let pool = SurfacePool::new();
/// let key = ComponentKey::new("com.example.mail/Inbox");
///
/// // A bounded policy leases one slot per component key.
/// let slot = pool.resolve(&key, MultiplicityPolicy::SingleTask, false)?;
/// assert_eq!(slot.category(), Some(SlotCategory::SingleTask));
///
/// // Resolving the same key again returns the same slot.
/// let again = pool.resolve(&key, MultiplicityPolicy::SingleTask, false)?;
/// assert_eq!(again, slot);
///
/// // Unbounded components share a constant slot.
/// let compose = ComponentKey::new("com.example.mail/Compose");
/// let shared = pool.resolve(&compose, MultiplicityPolicy::Unbounded, false)?;
/// assert!(shared.is_shared());
///
/// // Each release drops one reference; the lease is recycled when the count
/// // goes negative.
/// pool.release(slot, &key);
/// pool.release(slot, &key);
/// assert_eq!(pool.reverse_lookup(&key, MultiplicityPolicy::SingleTask), None);
/// # Ok::<(), surface_pool::Error>(())
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe. Any number of threads may call
/// [`resolve()`][Self::resolve], [`release()`][Self::release] and
/// [`reverse_lookup()`][Self::reverse_lookup] concurrently: each bounded category is
/// guarded by its own lock, critical sections never perform I/O and pin persistence
/// happens outside the locks.
pub struct SurfacePool {
    single_top: Mutex<SlotPool>,
    single_instance: Mutex<SlotPool>,
    single_task: Mutex<SlotPool>,

    pin_store: Arc<dyn PinStore>,
    theme: Arc<dyn ThemeIntrospector>,
}

impl SurfacePool {
    /// Creates a pool with the default configuration: default capacities, an
    /// in-memory pin store, every component treated as opaque and no outstanding
    /// external callbacks.
    ///
    /// Use [`builder()`][Self::builder] to supply a durable store or the host's
    /// collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a pool with custom capacities, a custom [`PinStore`] or
    /// custom host collaborators.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use new_zealand::nz;
    /// use surface_pool::{MemoryPinStore, SlotCategory, SurfacePool};
    ///
    /// let pool = SurfacePool::builder()
    ///     .capacity(SlotCategory::SingleTask, nz!(2_u32))
    ///     .pin_store(Arc::new(MemoryPinStore::new()))
    ///     .build();
    /// ```
    #[must_use]
    pub fn builder() -> SurfacePoolBuilder {
        SurfacePoolBuilder::new()
    }

    pub(crate) fn new_inner(
        single_top: SlotPool,
        single_instance: SlotPool,
        single_task: SlotPool,
        pin_store: Arc<dyn PinStore>,
        theme: Arc<dyn ThemeIntrospector>,
    ) -> Self {
        Self {
            single_top: Mutex::new(single_top),
            single_instance: Mutex::new(single_instance),
            single_task: Mutex::new(single_task),
            pin_store,
            theme,
        }
    }

    /// Resolves a component key to a slot under its declared policy.
    ///
    /// Unbounded components receive one of the constant shared slots, picked by
    /// asking the [`ThemeIntrospector`][crate::ThemeIntrospector] whether the
    /// component is translucent. This branch does no bookkeeping and never fails.
    ///
    /// Bounded policies lease a slot from the matching category: the key's existing
    /// lease if it has one, otherwise a free slot. With `pin` set the lease is also
    /// pinned, which shields it from refcount-driven recycling and persists the
    /// mapping for the next process. Pinning has no effect on unbounded resolutions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] when the key holds no lease and every slot of the
    /// bounded category is taken. As a side effect the persisted pinned sets of all
    /// categories are discarded, on the assumption that stale pins are hogging slots;
    /// in-memory leases are untouched, so the cleanup takes effect after the next
    /// restart.
    pub fn resolve(
        &self,
        key: &ComponentKey,
        policy: MultiplicityPolicy,
        pin: bool,
    ) -> Result<SlotId> {
        let Some(category) = policy.category() else {
            // The theme collaborator is foreign code; it must not run under a lock.
            let slot = SlotId::shared(self.theme.is_translucent(key));
            trace!(%key, %slot, "resolved to shared slot");
            return Ok(slot);
        };

        let (outcome, available) = {
            let mut pool = self.pool(category).lock();

            let outcome = if pin {
                pool.acquire_pinned(key)
            } else {
                pool.acquire(key)
            };

            (outcome, pool.available())
        };

        match outcome {
            Ok(slot) => {
                if pin {
                    self.persist_pins(category);
                }

                trace!(%key, %slot, pin, available, "resolved");
                Ok(slot)
            }
            Err(error) => {
                self.remediate_exhaustion(&error);
                Err(error)
            }
        }
    }

    /// Releases one reference to the lease `key` holds in `slot`'s category.
    ///
    /// The lease is destroyed, returning its slot to the free list, when its
    /// refcount goes negative while unpinned. Releasing a shared slot or a key with
    /// no live lease is a no-op: double release and late release after external
    /// cleanup are expected caller behavior.
    pub fn release(&self, slot: SlotId, key: &ComponentKey) {
        let Some(category) = slot.category() else {
            // Shared slots carry no lease.
            return;
        };

        let recycled = {
            let mut pool = self.pool(category).lock();
            let freed = pool.release(key);

            freed.map(|freed| (freed, pool.available()))
        };

        if let Some((freed, available)) = recycled {
            debug!(%key, slot = %freed, available, "lease recycled");
        }
    }

    /// Finds the slot currently leased to `key`, querying the single-task,
    /// single-instance and single-top pools in that order.
    ///
    /// When no pool holds a lease for the key, a component whose declared policy is
    /// unbounded reports the standard shared slot; any other policy reports `None`.
    #[must_use]
    pub fn reverse_lookup(&self, key: &ComponentKey, policy: MultiplicityPolicy) -> Option<SlotId> {
        const LOOKUP_ORDER: [SlotCategory; 3] = [
            SlotCategory::SingleTask,
            SlotCategory::SingleInstance,
            SlotCategory::SingleTop,
        ];

        for category in LOOKUP_ORDER {
            let slot = self.pool(category).lock().reverse_lookup(key);

            if slot.is_some() {
                return slot;
            }
        }

        if policy == MultiplicityPolicy::Unbounded {
            return Some(SlotId::shared(false));
        }

        None
    }

    /// A point-in-time snapshot of every bounded pool, for operational introspection.
    ///
    /// Pools are snapshotted one at a time, so the combined result is not a single
    /// atomic view across categories.
    #[must_use]
    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        SlotCategory::ALL
            .into_iter()
            .map(|category| self.pool(category).lock().snapshot())
            .collect()
    }

    /// Renders a diagnostic listing of all leases and free slots in every category,
    /// ending with the constant shared slots of the unbounded pass-through.
    ///
    /// # Example
    ///
    /// ```
    /// use surface_pool::{ComponentKey, MultiplicityPolicy, SurfacePool};
    ///
    /// let pool = SurfacePool::new();
    /// pool.resolve(
    ///     &ComponentKey::new("pkg/Widget"),
    ///     MultiplicityPolicy::SingleTask,
    ///     false,
    /// )
    /// .expect("fresh pool has free slots");
    ///
    /// let listing = pool.dump();
    /// assert!(listing.contains("single_task.0 -> 'pkg/Widget'"));
    /// ```
    #[must_use]
    pub fn dump(&self) -> String {
        let mut listing = String::new();

        for snapshot in self.snapshots() {
            write!(listing, "{snapshot}").expect("writing to a String cannot fail");
        }

        writeln!(
            listing,
            "shared slots: {}, {}",
            SlotId::shared(false),
            SlotId::shared(true)
        )
        .expect("writing to a String cannot fail");

        listing
    }

    /// Unpins every lease of one category and discards its persisted pinned set.
    ///
    /// Unpinned leases whose refcount already went negative are recycled immediately;
    /// the rest live on as ordinary leases. Returns the number of leases that were
    /// pinned.
    pub fn clear_pinned(&self, category: SlotCategory) -> usize {
        let unpinned = self.pool(category).lock().clear_pinned();

        self.pin_store.clear(category);
        PIN_SET_CLEARS.with(|e| e.observe_once());

        if unpinned > 0 {
            debug!(%category, unpinned, "cleared pinned leases");
        }

        unpinned
    }

    fn pool(&self, category: SlotCategory) -> &Mutex<SlotPool> {
        match category {
            SlotCategory::SingleTop => &self.single_top,
            SlotCategory::SingleInstance => &self.single_instance,
            SlotCategory::SingleTask => &self.single_task,
        }
    }

    /// Writes the category's current pinned set through the store.
    ///
    /// The set is collected under the pool lock but stored outside it. The store's
    /// growth gate makes redundant writes free.
    fn persist_pins(&self, category: SlotCategory) {
        let records = self.pool(category).lock().pinned_records();
        self.pin_store.save(category, &records);
    }

    /// Best-effort remediation for a full pool: discard every persisted pinned set,
    /// on the unverified assumption that stale pins are a frequent cause of
    /// exhaustion.
    ///
    /// Live leases are not touched, so relief arrives only once the next process
    /// starts without the stale pins.
    fn remediate_exhaustion(&self, error: &Error) {
        warn!(%error, "slots exhausted; discarding persisted pins");

        EXHAUSTIONS.with(|e| e.observe_once());
        PIN_SET_CLEARS.with(|e| e.observe_once());

        self.pin_store.clear_all();
    }
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SurfacePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfacePool")
            .field("single_top", &self.single_top)
            .field("single_instance", &self.single_instance)
            .field("single_task", &self.single_task)
            .field("pin_store", &self.pin_store)
            .finish_non_exhaustive()
    }
}
