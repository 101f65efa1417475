//! Slot storage: one contiguous aligned allocation of capacity + 1 cells.
//!
//! The extra cell is the sentinel. It is never handed out as live storage;
//! its only job is to make "list empty" observable as a null link at the
//! head, which is what keeps the multi-producer pop loop branch-free on the
//! hot path. The buffer is allocated once and its base address is stable for
//! the pool's lifetime, so the intrusive links can be plain pointers.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::error::Error;
use crate::slot::{Link, Slot};

pub(crate) struct SlotArray<T> {
    ptr: NonNull<Slot<T>>,
    /// Usable slots; the buffer holds `capacity + 1` cells counting the
    /// sentinel.
    capacity: usize,
}

impl<T> SlotArray<T> {
    /// Allocates storage for `capacity` usable slots plus the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroCapacity`] for an empty request and
    /// [`Error::AllocationFailed`] when the total size overflows or the
    /// allocator refuses.
    pub(crate) fn allocate(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        let layout = Self::layout(capacity).ok_or(Error::AllocationFailed { capacity })?;

        // SAFETY: the layout is non-zero sized (at least one slot plus the
        // sentinel, each at least one pointer wide).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<Slot<T>>()) else {
            return Err(Error::AllocationFailed { capacity });
        };

        for index in 0..=capacity {
            // SAFETY: `index` is within the freshly allocated buffer of
            // `capacity + 1` slots.
            unsafe { ptr.as_ptr().add(index).write(Slot::new()) };
        }

        debug!(capacity, bytes = layout.size(), "allocated pool storage");
        Ok(Self { ptr, capacity })
    }

    /// Layout of the whole buffer, or `None` when the size overflows.
    fn layout(capacity: usize) -> Option<Layout> {
        let cells = capacity.checked_add(1)?;
        Layout::array::<Slot<T>>(cells).ok()
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The cell at `index`. Index `capacity` is the sentinel.
    pub(crate) fn slot(&self, index: usize) -> NonNull<Slot<T>> {
        debug_assert!(index <= self.capacity);
        // SAFETY: the buffer holds `capacity + 1` cells and `index` is in
        // range, so the offset stays inside the allocation.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(index)) }
    }

    /// Threads the initial free list through the array: cell i links to
    /// cell i + 1 and the sentinel links to null. Returns the initial head
    /// (cell 0) and tail (the sentinel).
    pub(crate) fn thread_links(&self) -> (NonNull<Link>, NonNull<Link>) {
        for index in 0..self.capacity {
            let slot = self.slot(index);
            let next = self.slot(index + 1).cast::<Link>();
            // SAFETY: both cells live in this buffer.
            unsafe { slot.as_ref().link.set_next(next.as_ptr()) };
        }
        let sentinel = self.slot(self.capacity);
        // SAFETY: the sentinel lives in this buffer.
        unsafe { sentinel.as_ref().link.set_next(ptr::null_mut()) };

        (self.slot(0).cast(), sentinel.cast())
    }
}

impl<T> Drop for SlotArray<T> {
    fn drop(&mut self) {
        // All cells are free by the time the pool can be dropped (handles
        // borrow the pool), so there are no values left to destroy here.
        if let Some(layout) = Self::layout(self.capacity) {
            debug!(capacity = self.capacity, "releasing pool storage");
            // SAFETY: the buffer was allocated in `allocate` with this exact
            // layout and has not been freed.
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), layout) };
        }
    }
}
