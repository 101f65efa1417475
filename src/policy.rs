//! Producer and consumer policies for the free list.
//!
//! The construct side and the destroy side of a pool are synchronised
//! independently. Each side has a single-threaded wait-free variant and a
//! multi-threaded variant; a pool composes one of each, giving the four
//! combinations exported from [`crate::pool`].
//!
//! - [`SingleProducer`]: plain head pointer, no synchronisation. The type is
//!   `!Sync`, which confines the construct side to one thread at a time.
//! - [`MultiProducer`]: lock-free CAS pop from the head.
//! - [`SingleConsumer`]: plain tail pointer, no synchronisation, `!Sync`.
//! - [`MultiConsumer`]: wait-free tail exchange; every destroy completes in a
//!   bounded number of its own steps.
//!
//! Because destroys append at the tail and never at the head, a popped cell
//! cannot reappear as the head CAS expected value until a full chain of
//! constructs has consumed every cell ahead of it; that is the protocol's
//! natural ABA resistance. The one head push in the system is the repair
//! path that reinserts a cell after a failed value initialiser, and it runs
//! as its own CAS loop.

use std::cell::Cell;
use std::ptr::{self, NonNull};

use crossbeam_utils::CachePadded;

use crate::slot::Link;
use crate::sync::{AtomicPtr, Ordering};

pub(crate) mod sealed {
    use std::ptr::NonNull;

    use crate::slot::Link;

    /// Construct-side behaviour: detaching cells from the head of the list.
    ///
    /// # Safety
    ///
    /// Implementations must keep the head pointing at a valid cell at all
    /// times (the sentinel when the list is empty), must only return cells
    /// that were on the list, and must never return the sentinel.
    pub unsafe trait Acquire: Sized {
        /// Creates the policy state with the list's initial head cell.
        fn with_head(head: NonNull<Link>) -> Self;

        /// Detaches and returns the head cell, or `None` when the head is
        /// the sentinel (its link is null).
        fn acquire(&self) -> Option<NonNull<Link>>;

        /// Reinserts a cell whose value initialiser failed at the head of
        /// the list, leaving the list exactly as valid as before the
        /// matching [`Self::acquire`].
        fn repair(&self, node: NonNull<Link>);
    }

    /// Destroy-side behaviour: appending cells at the tail of the list.
    ///
    /// # Safety
    ///
    /// Implementations must keep the tail pointing at a cell whose link is
    /// null, and `release` must only be called with a detached live cell of
    /// the same pool.
    pub unsafe trait Release: Sized {
        /// Creates the policy state with the list's initial tail cell (the
        /// sentinel).
        fn with_tail(tail: NonNull<Link>) -> Self;

        /// Appends a cell at the tail. The cell's value must already be
        /// dropped; this nulls the cell's link and links it in.
        fn release(&self, node: NonNull<Link>);
    }
}

use sealed::{Acquire, Release};

/// Construct-side policy marker. Implemented by [`SingleProducer`] and
/// [`MultiProducer`] only; the trait is sealed.
pub trait AcquirePolicy: sealed::Acquire {}

/// Destroy-side policy marker. Implemented by [`SingleConsumer`] and
/// [`MultiConsumer`] only; the trait is sealed.
pub trait ReleasePolicy: sealed::Release {}

/// Wait-free construct policy for a single constructing thread.
#[derive(Debug)]
pub struct SingleProducer {
    head: Cell<*mut Link>,
}

// SAFETY: the head pointer targets storage owned by the enclosing pool and
// moves between threads together with it. The `Cell` keeps the type `!Sync`,
// which is exactly the single-producer contract.
unsafe impl Send for SingleProducer {}

// SAFETY: the head always points at a valid cell of the owning pool, cells
// ahead of the sentinel are free, and acquire/repair run on one thread at a
// time because the type is `!Sync`.
unsafe impl Acquire for SingleProducer {
    fn with_head(head: NonNull<Link>) -> Self {
        Self {
            head: Cell::new(head.as_ptr()),
        }
    }

    fn acquire(&self) -> Option<NonNull<Link>> {
        let head = self.head.get();
        // SAFETY: head invariantly points at a cell of the pool; the cell is
        // free (or the sentinel) and its link word is valid to read.
        let next = unsafe { (*head).next() };
        if next.is_null() {
            // Head is the sentinel: the pool is exhausted.
            return None;
        }
        self.head.set(next);
        // SAFETY: head is never null by the policy invariant.
        Some(unsafe { NonNull::new_unchecked(head) })
    }

    fn repair(&self, node: NonNull<Link>) {
        let current = self.head.get();
        // SAFETY: `node` was just detached by acquire and is owned by this
        // (single) constructing thread.
        unsafe { node.as_ref().set_next(current) };
        self.head.set(node.as_ptr());
    }
}

impl AcquirePolicy for SingleProducer {}

/// Lock-free construct policy safe for any number of constructing threads.
#[derive(Debug)]
pub struct MultiProducer {
    head: CachePadded<AtomicPtr<Link>>,
}

// SAFETY: the head cell is detached with an acq_rel CAS (acquire on the
// failure reload), so the thread that wins observes the cell's link word and
// is the only one to hand the cell out. The sentinel check happens before
// the CAS, so the sentinel is never returned.
unsafe impl Acquire for MultiProducer {
    fn with_head(head: NonNull<Link>) -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(head.as_ptr())),
        }
    }

    fn acquire(&self) -> Option<NonNull<Link>> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            // SAFETY: the head always points at a valid cell. The cell may
            // be popped by a rival thread between the load and the CAS, in
            // which case the value read here is discarded when the CAS
            // fails; the load itself stays in bounds because cells are only
            // deallocated with the whole pool.
            let next = unsafe { (*head).next() };
            if next.is_null() {
                // Head is the sentinel: nothing to take. No CAS needed.
                return None;
            }
            match self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
            {
                // SAFETY: head is never null by the policy invariant.
                Ok(_) => return Some(unsafe { NonNull::new_unchecked(head) }),
                Err(current) => head = current,
            }
        }
    }

    fn repair(&self, node: NonNull<Link>) {
        let mut expected = self.head.load(Ordering::Acquire);
        loop {
            // SAFETY: `node` is detached and owned by this thread until the
            // CAS below publishes it.
            unsafe { node.as_ref().set_next(expected) };
            match self.head.compare_exchange(
                expected,
                node.as_ptr(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => expected = current,
            }
        }
    }
}

impl AcquirePolicy for MultiProducer {}

/// Wait-free destroy policy for a single destroying thread.
#[derive(Debug)]
pub struct SingleConsumer {
    tail: Cell<*mut Link>,
}

// SAFETY: the tail pointer targets storage owned by the enclosing pool and
// moves between threads together with it. The `Cell` keeps the type `!Sync`,
// which is exactly the single-consumer contract.
unsafe impl Send for SingleConsumer {}

// SAFETY: the tail invariantly points at the last cell of the list (whose
// link is null), and release runs on one thread at a time because the type
// is `!Sync`. The link stores are release stores, pairing with the acquire
// loads on the construct side.
unsafe impl Release for SingleConsumer {
    fn with_tail(tail: NonNull<Link>) -> Self {
        Self {
            tail: Cell::new(tail.as_ptr()),
        }
    }

    fn release(&self, node: NonNull<Link>) {
        // SAFETY: the caller hands over a detached cell; the tail cell is
        // valid by the policy invariant.
        unsafe {
            node.as_ref().set_next(ptr::null_mut());
            let tail = self.tail.get();
            (*tail).set_next(node.as_ptr());
        }
        self.tail.set(node.as_ptr());
    }
}

impl ReleasePolicy for SingleConsumer {}

/// Wait-free destroy policy safe for any number of destroying threads.
///
/// The tail exchange linearises concurrent destroys; the follow-up link
/// store is what makes the cell reachable from the construct side. Between
/// the two, a construct that has walked up to the exchanged-out cell reads a
/// null link and reports the pool empty; the window closes in a bounded
/// number of the destroying thread's own steps.
#[derive(Debug)]
pub struct MultiConsumer {
    tail: CachePadded<AtomicPtr<Link>>,
}

// SAFETY: the atomic exchange gives each destroy a unique predecessor cell,
// so the `prev.next` store is unconcurrent; the release orderings publish
// the nulled link before the cell becomes reachable.
unsafe impl Release for MultiConsumer {
    fn with_tail(tail: NonNull<Link>) -> Self {
        Self {
            tail: CachePadded::new(AtomicPtr::new(tail.as_ptr())),
        }
    }

    fn release(&self, node: NonNull<Link>) {
        // SAFETY: the caller hands over a detached cell.
        unsafe { node.as_ref().set_next(ptr::null_mut()) };
        let prev = self.tail.swap(node.as_ptr(), Ordering::AcqRel);
        // SAFETY: `prev` was the tail cell an instant ago; it stays valid
        // because cells are only deallocated with the whole pool, and only
        // this thread holds it as a predecessor.
        unsafe { (*prev).set_next(node.as_ptr()) };
    }
}

impl ReleasePolicy for MultiConsumer {}
