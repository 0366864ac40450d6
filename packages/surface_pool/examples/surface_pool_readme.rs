//! Example that demonstrates the exact usage shown in the README.md file.
//!
//! This shows the full lease lifecycle: bounded resolution, slot sharing between
//! repeated resolutions of one component, release-driven recycling and the constant
//! shared slots serving unbounded components.

use surface_pool::{ComponentKey, MultiplicityPolicy, SurfacePool};

fn main() {
    println!("=== SurfacePool README Example ===");

    let pool = SurfacePool::new();

    let inbox = ComponentKey::new("com.example.mail/Inbox");

    // A bounded policy leases one slot per component key.
    let slot = pool
        .resolve(&inbox, MultiplicityPolicy::SingleTask, false)
        .expect("fresh pool has free slots");
    println!("{inbox} renders into {slot}");

    // Re-resolving the same key shares the lease.
    let again = pool
        .resolve(&inbox, MultiplicityPolicy::SingleTask, false)
        .expect("existing lease never exhausts");
    assert_eq!(again, slot);
    println!("resolved again: still {again}");

    // Unbounded components all render into a constant shared slot.
    let compose = ComponentKey::new("com.example.mail/Compose");
    let shared = pool
        .resolve(&compose, MultiplicityPolicy::Unbounded, false)
        .expect("unbounded resolution cannot fail");
    println!("{compose} renders into {shared}");

    println!();
    print!("{}", pool.dump());
    println!();

    // Two resolutions, two releases: the slot returns to the pool.
    pool.release(slot, &inbox);
    pool.release(slot, &inbox);
    assert_eq!(
        pool.reverse_lookup(&inbox, MultiplicityPolicy::SingleTask),
        None
    );
    println!("released; {inbox} holds no slot anymore");

    println!("README example completed successfully!");
}
