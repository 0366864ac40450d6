use std::fmt;
use std::num::NonZero;
use std::sync::Arc;

use new_zealand::nz;
use tracing::{debug, warn};

use crate::metrics::{PIN_SET_CLEARS, PINS_SEEDED};
use crate::{
    AlwaysOpaque, CallbackCounter, MemoryPinStore, NoExternalCallbacks, PinStore, SlotCategory,
    SlotPool, SurfacePool, ThemeIntrospector,
};

/// Default slot count for the single-top category.
const DEFAULT_SINGLE_TOP_CAPACITY: NonZero<u32> = nz!(8_u32);

/// Default slot count for the single-instance category.
const DEFAULT_SINGLE_INSTANCE_CAPACITY: NonZero<u32> = nz!(4_u32);

/// Default slot count for the single-task category.
const DEFAULT_SINGLE_TASK_CAPACITY: NonZero<u32> = nz!(4_u32);

/// Builder for creating an instance of [`SurfacePool`].
///
/// All settings are optional: capacities default to small fixed constants, the pin
/// store defaults to an in-memory one and the collaborators default to
/// [`AlwaysOpaque`] and [`NoExternalCallbacks`].
///
/// Building is when persisted pins are handled: if the callback counter reports no
/// outstanding pinned references, every persisted pinned set is discarded; otherwise
/// the sets are loaded and their leases recreated pinned in the fresh pools.
///
/// # Examples
///
/// Capacity tuning:
///
/// ```
/// use new_zealand::nz;
/// use surface_pool::{SlotCategory, SurfacePool};
///
/// let pool = SurfacePool::builder()
///     .capacity(SlotCategory::SingleTop, nz!(16_u32))
///     .build();
/// ```
///
/// Durable pins:
///
/// ```
/// use std::sync::Arc;
///
/// use surface_pool::{FilePinStore, SurfacePool};
///
/// # let dir = tempfile::tempdir().expect("temporary directory is available");
/// # let path = dir.path().join("pinned.toml");
/// let pool = SurfacePool::builder()
///     .pin_store(Arc::new(FilePinStore::new(path)))
///     .build();
/// ```
#[must_use]
pub struct SurfacePoolBuilder {
    single_top_capacity: NonZero<u32>,
    single_instance_capacity: NonZero<u32>,
    single_task_capacity: NonZero<u32>,

    pin_store: Arc<dyn PinStore>,
    theme: Arc<dyn ThemeIntrospector>,
    callbacks: Arc<dyn CallbackCounter>,
}

impl SurfacePoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            single_top_capacity: DEFAULT_SINGLE_TOP_CAPACITY,
            single_instance_capacity: DEFAULT_SINGLE_INSTANCE_CAPACITY,
            single_task_capacity: DEFAULT_SINGLE_TASK_CAPACITY,
            pin_store: Arc::new(MemoryPinStore::new()),
            theme: Arc::new(AlwaysOpaque),
            callbacks: Arc::new(NoExternalCallbacks),
        }
    }

    /// Sets the fixed slot count of one bounded category.
    ///
    /// Capacity is fixed for the lifetime of the pool; there is no resizing.
    pub fn capacity(mut self, category: SlotCategory, capacity: NonZero<u32>) -> Self {
        match category {
            SlotCategory::SingleTop => self.single_top_capacity = capacity,
            SlotCategory::SingleInstance => self.single_instance_capacity = capacity,
            SlotCategory::SingleTask => self.single_task_capacity = capacity,
        }

        self
    }

    /// Sets the store that makes pinned leases survive process restarts.
    pub fn pin_store(mut self, pin_store: Arc<dyn PinStore>) -> Self {
        self.pin_store = pin_store;
        self
    }

    /// Sets the collaborator that classifies components as translucent or opaque.
    pub fn theme_introspector(mut self, theme: Arc<dyn ThemeIntrospector>) -> Self {
        self.theme = theme;
        self
    }

    /// Sets the collaborator that counts external requests referencing pinned slots.
    pub fn callback_counter(mut self, callbacks: Arc<dyn CallbackCounter>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Builds the pool, pruning or restoring persisted pins.
    #[must_use]
    pub fn build(self) -> SurfacePool {
        let mut pools = [
            SlotPool::new(SlotCategory::SingleTop, self.single_top_capacity),
            SlotPool::new(SlotCategory::SingleInstance, self.single_instance_capacity),
            SlotPool::new(SlotCategory::SingleTask, self.single_task_capacity),
        ];

        let outstanding = self.callbacks.outstanding_pinned_references();

        if outstanding == 0 {
            // Pins exist on behalf of external callback requests. With none of those
            // left, every persisted pin is stale.
            debug!("no outstanding pinned references; discarding persisted pins");
            self.pin_store.clear_all();
            PIN_SET_CLEARS.with(|e| e.observe_once());
        } else {
            let mut seeded = 0_usize;

            for pool in &mut pools {
                for record in self.pin_store.load(pool.category()) {
                    if pool.seed_pinned(&record) {
                        seeded = seeded
                            .checked_add(1)
                            .expect("seeded pins are bounded by pool capacities");
                    } else {
                        warn!(%record, "skipping persisted pin that no longer fits its pool");
                    }
                }
            }

            if seeded > 0 {
                debug!(outstanding, seeded, "restored pinned leases");
                PINS_SEEDED.with(|e| e.batch(seeded).observe_once());
            }
        }

        let [single_top, single_instance, single_task] = pools;

        SurfacePool::new_inner(
            single_top,
            single_instance,
            single_task,
            self.pin_store,
            self.theme,
        )
    }
}

impl fmt::Debug for SurfacePoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfacePoolBuilder")
            .field("single_top_capacity", &self.single_top_capacity)
            .field("single_instance_capacity", &self.single_instance_capacity)
            .field("single_task_capacity", &self.single_task_capacity)
            .field("pin_store", &self.pin_store)
            .finish_non_exhaustive()
    }
}
