//! Cell layout: the intrusive link word and the slot that holds it.
//!
//! Every cell of a pool is a [`Slot<T>`]. While the cell sits on the free
//! list its first word is the atomic "next free cell" pointer; while the cell
//! is live the same word carries the owner back-pointer that lets a handle
//! find the destroy side of its pool without any per-handle state. The value
//! storage follows the link word at the offset the compiler picks for
//! `repr(C)`, so the array stride is the payload size rounded up to the
//! stricter of the two alignments.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use crate::sync::{AtomicPtr, Ordering};

/// The intrusive link word threaded through free cells.
///
/// All cross-thread traffic on the free list flows through this one atomic:
/// stores are release, loads are acquire, so a consumer that appends a cell
/// publishes it to the producer that later pops it.
pub(crate) struct Link {
    next: AtomicPtr<Link>,
}

impl Link {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Publishes `node` as this cell's successor on the free list.
    pub(crate) fn set_next(&self, node: *mut Link) {
        self.next.store(node, Ordering::Release);
    }

    /// Reads this cell's successor. Null means the cell is the sentinel and
    /// the list is empty at this end.
    pub(crate) fn next(&self) -> *mut Link {
        self.next.load(Ordering::Acquire)
    }

    /// Overwrites the link word with the owner back-pointer, marking the
    /// cell live. Only valid once the cell has been detached from the list.
    pub(crate) fn set_owner(&self, owner: *const ()) {
        self.next.store(owner.cast_mut().cast(), Ordering::Release);
    }

    /// Reads the owner back-pointer out of a live cell.
    pub(crate) fn owner(&self) -> *const () {
        self.next.load(Ordering::Acquire).cast_const().cast()
    }
}

/// One storage cell of a pool.
///
/// `repr(C)` pins the link word to offset zero, which is what allows a
/// `NonNull<Link>` travelling through the free list to be turned back into
/// the slot it belongs to with a plain pointer cast.
#[repr(C)]
pub(crate) struct Slot<T> {
    pub(crate) link: Link,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            link: Link::new(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Recovers the slot from the address of its link word.
    pub(crate) fn from_link(link: NonNull<Link>) -> NonNull<Slot<T>> {
        link.cast()
    }

    /// Pointer to the value storage. The caller is responsible for knowing
    /// whether the cell currently holds an initialised `T`.
    pub(crate) fn value_ptr(&self) -> *mut T {
        self.value.get().cast()
    }
}
