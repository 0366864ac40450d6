use crate::ComponentKey;

/// Answers theme questions about components, for routing unbounded resolutions.
///
/// Components with the [`Unbounded`][crate::MultiplicityPolicy::Unbounded] policy all
/// share constant slots; the only distinction made between them is whether they render
/// with a translucent theme, in which case they are served the translucent shared slot
/// instead of the opaque one.
///
/// Implemented by the host. The default is [`AlwaysOpaque`].
#[cfg_attr(test, mockall::automock)]
pub trait ThemeIntrospector: Send + Sync {
    /// Whether the component identified by `key` renders with a translucent theme.
    fn is_translucent(&self, key: &ComponentKey) -> bool;
}

/// A [`ThemeIntrospector`] that treats every component as opaque.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOpaque;

impl ThemeIntrospector for AlwaysOpaque {
    #[cfg_attr(test, mutants::skip)] // Trivial fn, the constant is the whole point.
    fn is_translucent(&self, _key: &ComponentKey) -> bool {
        false
    }
}

/// Counts external requests that still reference pinned slots.
///
/// Pins exist on behalf of callback requests issued to external parties. At startup
/// the pool asks this collaborator how many such requests are still outstanding; when
/// the answer is zero, every pin that survived the previous process is known to be
/// stale and the whole persisted pinned set is discarded before any lease is seeded.
///
/// Implemented by the host. The default is [`NoExternalCallbacks`].
#[cfg_attr(test, mockall::automock)]
pub trait CallbackCounter: Send + Sync {
    /// Number of already-issued external requests that reference pinned slots.
    fn outstanding_pinned_references(&self) -> usize;
}

/// A [`CallbackCounter`] that reports no outstanding references.
///
/// With this default every startup discards the persisted pinned set, which is the
/// correct behavior for hosts that do not hand out pinned slots to external parties.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoExternalCallbacks;

impl CallbackCounter for NoExternalCallbacks {
    #[cfg_attr(test, mutants::skip)] // Trivial fn, the constant is the whole point.
    fn outstanding_pinned_references(&self) -> usize {
        0
    }
}
