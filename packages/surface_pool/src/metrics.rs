//! Metrics for the surface slot pools.
//!
//! This module provides events for observing capacity exhaustion and pinned-set
//! maintenance. The metrics use per-thread event instances to minimize contention.

use nm::Event;

thread_local! {
    /// Event for observing bounded-category exhaustion.
    ///
    /// Each observation is one resolve that failed because every slot of the
    /// category was leased. A nonzero rate is the signal for capacity tuning.
    pub(crate) static EXHAUSTIONS: Event = Event::builder()
        .name("surface_pool_exhaustions")
        .build();

    /// Event for observing category-wide clears of the persisted pinned set,
    /// whether from startup pruning or from the exhaustion fallback.
    pub(crate) static PIN_SET_CLEARS: Event = Event::builder()
        .name("surface_pool_pin_set_clears")
        .build();

    /// Event for observing pinned leases restored from the store at startup.
    pub(crate) static PINS_SEEDED: Event = Event::builder()
        .name("surface_pool_pins_seeded")
        .build();
}
