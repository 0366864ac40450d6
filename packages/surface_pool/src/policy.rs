use derive_more::derive::Display;

/// A component's declared reuse rule: how many live instances of it may exist at once.
///
/// Components with the [`Unbounded`][Self::Unbounded] policy all share constant slots
/// and never consume pool capacity. Each of the three bounded policies maps to its own
/// [`SlotCategory`] with a fixed number of slots.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirroring the fixed multiplicity vocabulary of the host platform"
)]
pub enum MultiplicityPolicy {
    /// Any number of logical components share a constant slot. Always available,
    /// never exhausted.
    Unbounded,

    /// At most one instance may be at the top of a task at a time.
    SingleTop,

    /// At most one instance may exist in the process at a time.
    SingleInstance,

    /// At most one instance may exist per task at a time.
    SingleTask,
}

impl MultiplicityPolicy {
    /// The bounded slot category backing this policy, if any.
    ///
    /// Returns `None` for [`Unbounded`][Self::Unbounded], which is served from
    /// constant slots without bookkeeping.
    #[must_use]
    pub fn category(self) -> Option<SlotCategory> {
        match self {
            Self::Unbounded => None,
            Self::SingleTop => Some(SlotCategory::SingleTop),
            Self::SingleInstance => Some(SlotCategory::SingleInstance),
            Self::SingleTask => Some(SlotCategory::SingleTask),
        }
    }
}

/// One bounded family of interchangeable slots.
///
/// The display form (`single_top`, `single_instance`, `single_task`) is also the
/// canonical name used to partition persisted pinned mappings.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirroring the fixed multiplicity vocabulary of the host platform"
)]
pub enum SlotCategory {
    /// Slots for [`MultiplicityPolicy::SingleTop`] components.
    #[display("single_top")]
    SingleTop,

    /// Slots for [`MultiplicityPolicy::SingleInstance`] components.
    #[display("single_instance")]
    SingleInstance,

    /// Slots for [`MultiplicityPolicy::SingleTask`] components.
    #[display("single_task")]
    SingleTask,
}

impl SlotCategory {
    /// Every bounded category, in declaration order.
    pub const ALL: [Self; 3] = [Self::SingleTop, Self::SingleInstance, Self::SingleTask];

    /// Parses a category from its canonical name.
    ///
    /// This is the inverse of the `Display` implementation and is intended for
    /// [`PinStore`][crate::PinStore] implementations that key their storage by
    /// category name.
    ///
    /// # Example
    ///
    /// ```
    /// use surface_pool::SlotCategory;
    ///
    /// let category = SlotCategory::from_name("single_task");
    /// assert_eq!(category, Some(SlotCategory::SingleTask));
    ///
    /// assert!(SlotCategory::from_name("bogus").is_none());
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "single_top" => Some(Self::SingleTop),
            "single_instance" => Some(Self::SingleInstance),
            "single_task" => Some(Self::SingleTask),
            _ => None,
        }
    }

    /// The policy served by this category.
    #[must_use]
    pub fn policy(self) -> MultiplicityPolicy {
        match self {
            Self::SingleTop => MultiplicityPolicy::SingleTop,
            Self::SingleInstance => MultiplicityPolicy::SingleInstance,
            Self::SingleTask => MultiplicityPolicy::SingleTask,
        }
    }
}
