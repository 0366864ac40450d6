//! A bounded pool of reusable rendering surface slots.
//!
//! This crate provides [`SurfacePool`], which multiplexes a fixed set of host-owned
//! surface slots across any number of logical components. Each component, identified
//! by a [`ComponentKey`], declares a [`MultiplicityPolicy`]: unbounded components all
//! render into constant shared slots, while the bounded policies lease a dedicated
//! slot from a small fixed-capacity pool per policy.
//!
//! # Quick start
//!
//! ```rust
//! use surface_pool::{ComponentKey, MultiplicityPolicy, SurfacePool};
//!
//! let pool = SurfacePool::new();
//! let key = ComponentKey::new("com.example.mail/Inbox");
//!
//! // The same component resolves to the same slot for as long as it is in use.
//! let slot = pool.resolve(&key, MultiplicityPolicy::SingleTask, false)?;
//! let again = pool.resolve(&key, MultiplicityPolicy::SingleTask, false)?;
//! assert_eq!(again, slot);
//!
//! // One release per resolve; the slot is recycled when the last user lets go.
//! pool.release(slot, &key);
//! pool.release(slot, &key);
//! assert_eq!(pool.reverse_lookup(&key, MultiplicityPolicy::SingleTask), None);
//! # Ok::<(), surface_pool::Error>(())
//! ```
//!
//! # Key features
//!
//! - **Reference-counted leases**: Repeated resolutions of one component key share one
//!   slot. A lease starts at refcount zero and each re-resolve adds one, so the count
//!   goes strictly negative, recycling the slot, on the first release not matched by
//!   a resolve.
//! - **Durable pinning**: A lease resolved with `pin` set is shielded from
//!   refcount-driven recycling, and its slot assignment is written through a
//!   [`PinStore`] so the component reattaches to the same slot after a process
//!   restart. [`FilePinStore`] persists to a TOML file; [`MemoryPinStore`] is for
//!   hosts and tests that do not need durability.
//! - **Capacity exhaustion recovery**: When a bounded pool runs out of slots, the
//!   resolve fails with [`Error::Exhausted`] and every persisted pinned set is
//!   discarded, so stale pins stop hogging slots from the next restart onwards.
//!
//! # Startup
//!
//! Persisted pins are reconciled when the pool is built. The host's
//! [`CallbackCounter`] reports how many external requests still reference pinned
//! slots: with none outstanding the persisted sets are discarded, otherwise each
//! record is restored as a pinned lease in its old slot. Records that no longer fit
//! their pool are skipped.
//!
//! # Thread safety
//!
//! One [`SurfacePool`] instance serves the whole process and all its threads. Each
//! bounded category has its own internal lock and no lock is held across I/O or
//! calls into host collaborators.

mod builder;
mod clients;
mod component_key;
mod error;
mod metrics;
mod pin_record;
mod pin_store;
mod policy;
mod slot_id;
mod slot_pool;
mod snapshot;
mod surface_pool;

pub use builder::*;
pub use clients::*;
pub use component_key::*;
pub use error::*;
pub use pin_record::*;
pub use pin_store::*;
pub use policy::*;
pub use slot_id::*;
pub(crate) use slot_pool::SlotPool;
pub use snapshot::*;
pub use surface_pool::*;
