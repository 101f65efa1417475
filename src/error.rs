//! Pool creation errors.

/// Errors surfaced when creating a [`DynamicPool`](crate::DynamicPool).
///
/// Steady-state operations never return this type: exhaustion is reported as
/// `None` from the construct methods, and a failing value initialiser
/// propagates its own error or panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested capacity was zero. A pool must hold at least one slot.
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,

    /// The backing storage could not be allocated, either because the
    /// allocator refused or because the total size overflows `isize`.
    #[error("failed to allocate pool storage for {capacity} slots")]
    AllocationFailed {
        /// The capacity that was requested.
        capacity: usize,
    },
}
