//! Demonstrates pinned leases surviving a simulated process restart.
//!
//! Pinned slot assignments are written through a `FilePinStore`. A second pool
//! built over the same file stands in for the next process: with external requests
//! still outstanding it reattaches the pinned component to its old slot; without
//! any it discards the persisted pins at startup.

use std::sync::Arc;

use surface_pool::{CallbackCounter, ComponentKey, FilePinStore, MultiplicityPolicy, SurfacePool};

/// Stands in for the host subsystem that tracks requests referencing pinned slots.
struct PendingRequests(usize);

impl CallbackCounter for PendingRequests {
    fn outstanding_pinned_references(&self) -> usize {
        self.0
    }
}

fn main() {
    println!("=== Pinned Restart Example ===");

    let dir = tempfile::tempdir().expect("temporary directory is available");
    let path = dir.path().join("pinned.toml");

    let widget = ComponentKey::new("com.example.home/Widget");

    // First process: pin the widget to its slot.
    let pool = SurfacePool::builder()
        .pin_store(Arc::new(FilePinStore::new(&path)))
        .build();

    let slot = pool
        .resolve(&widget, MultiplicityPolicy::SingleTask, true)
        .expect("fresh pool has free slots");
    println!("first process: {widget} pinned to {slot}");
    drop(pool);

    // Second process: one external request still references the pinned slot, so
    // the persisted mapping is restored.
    let pool = SurfacePool::builder()
        .pin_store(Arc::new(FilePinStore::new(&path)))
        .callback_counter(Arc::new(PendingRequests(1)))
        .build();

    let restored = pool
        .reverse_lookup(&widget, MultiplicityPolicy::SingleTask)
        .expect("pinned lease was restored");
    assert_eq!(restored, slot);
    println!("second process: {widget} reattached to {restored}");
    drop(pool);

    // Third process: nothing outstanding, so the persisted pins are pruned.
    let pool = SurfacePool::builder()
        .pin_store(Arc::new(FilePinStore::new(&path)))
        .build();

    assert_eq!(
        pool.reverse_lookup(&widget, MultiplicityPolicy::SingleTask),
        None
    );
    println!("third process: stale pin pruned at startup");

    println!("Pinned restart example completed successfully!");
}
