use std::fmt;

use crate::SlotCategory;

/// Identifies one host-owned rendering surface slot.
///
/// Identifiers are opaque handles returned by
/// [`SurfacePool::resolve()`][crate::SurfacePool::resolve] and fall into two groups:
///
/// * pooled slots, one of a fixed number per bounded [`SlotCategory`], interchangeable
///   within their category;
/// * the constant shared slots that serve every
///   [`Unbounded`][crate::MultiplicityPolicy::Unbounded] component, in an opaque and
///   a translucent variant.
///
/// The display form is `single_top.3` for pooled slots and `shared` or
/// `shared.translucent` for the constant ones.
///
/// # Slot reuse
///
/// A pooled slot may be handed out again for a different component key after the
/// lease holding it is recycled. Holding on to a stale identifier is harmless but
/// releases against it become no-ops once the lease is gone.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SlotId {
    kind: SlotKind,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum SlotKind {
    /// One of the preallocated slots of a bounded category.
    Pooled { category: SlotCategory, index: u32 },

    /// A constant slot shared by all unbounded components.
    Shared { translucent: bool },
}

impl SlotId {
    pub(crate) fn pooled(category: SlotCategory, index: u32) -> Self {
        Self {
            kind: SlotKind::Pooled { category, index },
        }
    }

    pub(crate) fn shared(translucent: bool) -> Self {
        Self {
            kind: SlotKind::Shared { translucent },
        }
    }

    /// The bounded category this slot belongs to.
    ///
    /// Returns `None` for the shared constant slots, which belong to no category
    /// and are not tracked by any pool.
    #[must_use]
    pub fn category(self) -> Option<SlotCategory> {
        match self.kind {
            SlotKind::Pooled { category, .. } => Some(category),
            SlotKind::Shared { .. } => None,
        }
    }

    /// Whether this is one of the constant slots shared by all unbounded components.
    #[must_use]
    pub fn is_shared(self) -> bool {
        matches!(self.kind, SlotKind::Shared { .. })
    }

    pub(crate) fn index(self) -> Option<u32> {
        match self.kind {
            SlotKind::Pooled { index, .. } => Some(index),
            SlotKind::Shared { .. } => None,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SlotKind::Pooled { category, index } => write!(f, "{category}.{index}"),
            SlotKind::Shared { translucent: false } => f.write_str("shared"),
            SlotKind::Shared { translucent: true } => f.write_str("shared.translucent"),
        }
    }
}
