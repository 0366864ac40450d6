use thiserror::Error;

use crate::{ComponentKey, SlotCategory};

/// Errors that can occur when resolving surface slots.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Every slot of a bounded category is currently leased and the requested key
    /// holds no existing lease.
    ///
    /// This is a capacity condition, not a fault: the caller typically abandons the
    /// request or falls back to a shared slot where the domain allows it. Retrying
    /// does not help until some other lease is released.
    #[error("no free {category} slot: all {capacity} are leased and '{key}' holds none")]
    Exhausted {
        /// The category that ran out of slots.
        category: SlotCategory,

        /// The fixed capacity of that category.
        capacity: usize,

        /// The component key whose resolution failed.
        key: ComponentKey,
    },
}

/// A specialized `Result` type for surface pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
