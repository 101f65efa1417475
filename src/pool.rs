//! Pool types composing slot storage with a producer and a consumer policy.
//!
//! Both flavours carry the capacity's worth of cells plus the sentinel in
//! one stable allocation and differ only in where the capacity lives:
//! [`StaticPool`] keeps it in the type and cannot fail to construct, while
//! [`DynamicPool`] takes it at runtime and reports allocation failure.
//!
//! The four policy combinations of each flavour are named by the aliases at
//! the bottom of this module, mirroring the producer/consumer matrix:
//! Spsc, Spmc, Mpsc and Mpmc.

use std::convert::Infallible;
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::Error;
use crate::handle::Pooled;
use crate::policy::sealed::{Acquire, Release};
use crate::policy::{
    AcquirePolicy, MultiConsumer, MultiProducer, ReleasePolicy, SingleConsumer, SingleProducer,
};
use crate::slot::{Link, Slot};
use crate::storage::SlotArray;

/// Storage plus the two policy states; everything both pool flavours share.
struct PoolCore<T, P, C> {
    slots: SlotArray<T>,
    producer: P,
    consumer: C,
}

// SAFETY: the core owns its cells outright; moving it to another thread
// moves any values constructed there afterwards, hence `T: Send`.
unsafe impl<T: Send, P: Send, C: Send> Send for PoolCore<T, P, C> {}

// SAFETY: sharing the core shares the policy states (gated by their own
// `Sync`) and lets another thread construct and destroy `T`s, which moves
// values across threads, hence `T: Send`.
unsafe impl<T: Send, P: Sync, C: Sync> Sync for PoolCore<T, P, C> {}

impl<T, P: AcquirePolicy, C: ReleasePolicy> PoolCore<T, P, C> {
    fn new(slots: SlotArray<T>) -> Self {
        let (head, tail) = slots.thread_links();
        Self {
            producer: P::with_head(head),
            consumer: C::with_tail(tail),
            slots,
        }
    }

    /// The construct path shared by every public variant. Pops a cell,
    /// marks it live, runs the initialiser, and only then commits the
    /// value. A failing initialiser (error or panic) reinserts the cell at
    /// the head, leaving the free list as it was before the call.
    fn try_construct_with<F, E>(&self, init: F) -> Result<Option<NonNull<Slot<T>>>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let Some(link) = self.producer.acquire() else {
            return Ok(None);
        };
        let slot = Slot::<T>::from_link(link);

        // The cell is live from here on: its link word now carries the
        // owner back-pointer the handle will use to find the destroy side.
        // SAFETY: the cell was just detached, so this thread owns it.
        unsafe {
            slot.as_ref()
                .link
                .set_owner(ptr::from_ref(&self.consumer).cast());
        }

        let repair = RepairGuard {
            producer: &self.producer,
            node: link,
        };
        let value = init()?;
        // SAFETY: the cell is detached and the value storage is writable.
        unsafe { slot.as_ref().value_ptr().write(value) };
        mem::forget(repair);

        Ok(Some(slot))
    }
}

/// Puts an acquired cell back at the head if the value initialiser bails
/// out, whether by error return or by panic.
struct RepairGuard<'a, P: Acquire> {
    producer: &'a P,
    node: NonNull<Link>,
}

impl<P: Acquire> Drop for RepairGuard<'_, P> {
    fn drop(&mut self) {
        self.producer.repair(self.node);
    }
}

macro_rules! construct_methods {
    () => {
        /// Constructs a value in a pooled cell.
        ///
        /// Returns `None` when the pool is exhausted; the value is dropped
        /// in that case. Exhaustion is a normal outcome, not an error: a
        /// later destroy makes the pool usable again.
        #[must_use]
        pub fn construct(&self, value: T) -> Option<Pooled<'_, T, C>> {
            self.construct_with(|| value)
        }

        /// Constructs a value in place from an initialiser closure.
        ///
        /// The closure runs after the cell has been claimed, so the value
        /// is written straight into pool storage. If the closure panics,
        /// the cell is returned to the free list before the panic
        /// propagates, and the pool has lost no capacity.
        #[must_use]
        pub fn construct_with<F>(&self, init: F) -> Option<Pooled<'_, T, C>>
        where
            F: FnOnce() -> T,
        {
            match self.try_construct_with(|| Ok::<T, Infallible>(init())) {
                Ok(handle) => handle,
                Err(err) => match err {},
            }
        }

        /// Constructs a value from a fallible initialiser.
        ///
        /// `Ok(None)` reports exhaustion. If the initialiser returns an
        /// error, the claimed cell is reinserted into the free list and the
        /// error is passed through; the pool's state is exactly as it was
        /// before the call.
        ///
        /// # Errors
        ///
        /// Propagates whatever the initialiser returns.
        pub fn try_construct_with<F, E>(&self, init: F) -> Result<Option<Pooled<'_, T, C>>, E>
        where
            F: FnOnce() -> Result<T, E>,
        {
            let slot = self.core.try_construct_with(init)?;
            // SAFETY: the cell is initialised and uniquely ours; the owner
            // back-pointer targets this pool's consumer state, which lives
            // as long as the handle's borrow of `self`.
            Ok(slot.map(|slot| unsafe { Pooled::new(slot) }))
        }

        /// The distance in bytes between neighbouring cells.
        ///
        /// Equals the cell size rounded up to the cell alignment; two
        /// values constructed back-to-back on a fresh pool sit exactly this
        /// far apart.
        #[must_use]
        pub fn slot_stride(&self) -> usize {
            mem::size_of::<Slot<T>>()
        }
    };
}

/// A pool whose capacity is part of the type.
///
/// Creation cannot fail: storage exhaustion during `new` is treated as a
/// fatal condition, like any other container construction. For a capacity
/// chosen at runtime use [`DynamicPool`].
///
/// # Example
///
/// ```rust
/// use slotpool::StaticSpscPool;
///
/// let pool = StaticSpscPool::<u64, 2>::new();
/// let a = pool.construct(1).unwrap();
/// let b = pool.construct(2).unwrap();
/// assert!(pool.construct(3).is_none()); // exhausted
/// drop(a);
/// assert!(pool.construct(3).is_some()); // capacity came back
/// # drop(b);
/// ```
pub struct StaticPool<T, const N: usize, P: AcquirePolicy, C: ReleasePolicy> {
    core: PoolCore<T, P, C>,
}

impl<T, const N: usize, P: AcquirePolicy, C: ReleasePolicy> StaticPool<T, N, P, C> {
    /// The pool's capacity.
    pub const CAPACITY: usize = N;

    /// Creates the pool with all `N` cells free.
    ///
    /// # Panics
    ///
    /// Panics if the backing storage cannot be allocated. Out-of-memory is
    /// not a recoverable condition for the static flavour.
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N > 0, "pool capacity must be at least 1") };
        let slots =
            SlotArray::allocate(N).expect("static pool storage allocation is not expected to fail");
        Self {
            core: PoolCore::new(slots),
        }
    }

    /// The fixed capacity, `N`.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    construct_methods!();
}

impl<T, const N: usize, P: AcquirePolicy, C: ReleasePolicy> Default for StaticPool<T, N, P, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize, P: AcquirePolicy, C: ReleasePolicy> fmt::Debug for StaticPool<T, N, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPool")
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}

/// A pool whose capacity is chosen at creation time.
///
/// # Example
///
/// ```rust
/// use slotpool::DynamicMpmcPool;
///
/// # fn main() -> Result<(), slotpool::Error> {
/// let pool = DynamicMpmcPool::<String>::with_capacity(128)?;
/// let s = pool.construct(String::from("pooled")).unwrap();
/// assert_eq!(*s, "pooled");
/// # Ok(())
/// # }
/// ```
pub struct DynamicPool<T, P: AcquirePolicy, C: ReleasePolicy> {
    core: PoolCore<T, P, C>,
}

impl<T, P: AcquirePolicy, C: ReleasePolicy> DynamicPool<T, P, C> {
    /// Creates a pool with `capacity` free cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroCapacity`] when `capacity` is zero and
    /// [`Error::AllocationFailed`] when the backing storage cannot be
    /// acquired; no partial state remains in either case.
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        let slots = SlotArray::allocate(capacity)?;
        Ok(Self {
            core: PoolCore::new(slots),
        })
    }

    /// The capacity chosen at creation.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.core.slots.capacity()
    }

    construct_methods!();
}

impl<T, P: AcquirePolicy, C: ReleasePolicy> fmt::Debug for DynamicPool<T, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicPool")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// Static pool, single producer, single consumer. Wait-free on both sides;
/// the whole pool is confined to one thread at a time.
pub type StaticSpscPool<T, const N: usize> = StaticPool<T, N, SingleProducer, SingleConsumer>;
/// Static pool, single producer, multiple consumers: one thread constructs,
/// handles may be dropped anywhere.
pub type StaticSpmcPool<T, const N: usize> = StaticPool<T, N, SingleProducer, MultiConsumer>;
/// Static pool, multiple producers, single consumer.
pub type StaticMpscPool<T, const N: usize> = StaticPool<T, N, MultiProducer, SingleConsumer>;
/// Static pool, multiple producers, multiple consumers: fully concurrent.
pub type StaticMpmcPool<T, const N: usize> = StaticPool<T, N, MultiProducer, MultiConsumer>;

/// Dynamic pool, single producer, single consumer.
pub type DynamicSpscPool<T> = DynamicPool<T, SingleProducer, SingleConsumer>;
/// Dynamic pool, single producer, multiple consumers.
pub type DynamicSpmcPool<T> = DynamicPool<T, SingleProducer, MultiConsumer>;
/// Dynamic pool, multiple producers, single consumer.
pub type DynamicMpscPool<T> = DynamicPool<T, MultiProducer, SingleConsumer>;
/// Dynamic pool, multiple producers, multiple consumers: fully concurrent.
pub type DynamicMpmcPool<T> = DynamicPool<T, MultiProducer, MultiConsumer>;
