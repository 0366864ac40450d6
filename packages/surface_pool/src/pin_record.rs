use std::fmt;

use crate::{ComponentKey, SlotCategory, SlotId};

/// A persisted `(slot, component key)` pair describing one pinned lease.
///
/// Records are what a [`PinStore`][crate::PinStore] traffics in. They are grouped
/// by [`SlotCategory`] and each encodes to the string form `slot@key`, for example
/// `single_task.1@pkg/Widget`. The display implementation produces this encoding
/// and [`from_encoded()`][Self::from_encoded] parses it back.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PinRecord {
    slot: SlotId,
    key: ComponentKey,
}

impl PinRecord {
    /// Creates a record binding a pooled slot to a component key.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is one of the shared constant slots. Shared slots are never
    /// pinned because they are always available and carry no lease.
    #[must_use]
    pub fn new(slot: SlotId, key: ComponentKey) -> Self {
        assert!(
            !slot.is_shared(),
            "shared slots have no leases and cannot be pinned"
        );

        Self { slot, key }
    }

    /// The pooled slot the pinned lease holds.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The component key the pinned lease belongs to.
    #[must_use]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// Parses a record from its `slot@key` encoding.
    ///
    /// Returns `None` when the encoding is malformed or names a slot outside
    /// `category`. Stores skip such entries rather than failing the whole load.
    ///
    /// # Example
    ///
    /// ```
    /// use surface_pool::{PinRecord, SlotCategory};
    ///
    /// let record = PinRecord::from_encoded(SlotCategory::SingleTask, "single_task.1@pkg/Widget")
    ///     .expect("well-formed record");
    ///
    /// assert_eq!(record.slot().to_string(), "single_task.1");
    /// assert_eq!(record.key().as_str(), "pkg/Widget");
    /// ```
    #[must_use]
    pub fn from_encoded(category: SlotCategory, encoded: &str) -> Option<Self> {
        let (slot, key) = encoded.split_once('@')?;
        let (category_name, index) = slot.split_once('.')?;

        if SlotCategory::from_name(category_name)? != category {
            return None;
        }

        let index: u32 = index.parse().ok()?;

        if key.is_empty() {
            return None;
        }

        Some(Self {
            slot: SlotId::pooled(category, index),
            key: ComponentKey::new(key),
        })
    }
}

impl fmt::Display for PinRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slot, self.key)
    }
}
