//! # slotpool
//!
//! A fixed-capacity object pool built on an intrusive free list. The pool
//! recycles storage for many small, identically typed values at rates well
//! above the general-purpose heap: a construct is one pop from the head of
//! the list, a destroy is one append at its tail.
//!
//! ## Features
//!
//! - **Intrusive free list**: the "next" pointer lives inside each free
//!   cell, so the pool carries no side tables and no per-object metadata
//!   beyond one pointer.
//! - **Independent producer/consumer policies**: the construct side and the
//!   destroy side each come in a single-threaded wait-free and a
//!   multi-threaded flavour, composable into four variants per storage kind.
//! - **Lock-free multi-producer construct, wait-free multi-consumer
//!   destroy**: no mutexes, no blocking, no spinning beyond one CAS retry
//!   loop on the construct side.
//! - **Failure-safe construction**: if a value initialiser returns an error
//!   or panics, the claimed cell goes back to the free list and the pool
//!   loses no capacity.
//! - **Drop-to-free handles**: [`Pooled`] owns its value; dropping it runs
//!   the destructor and returns the cell to the owning pool through a
//!   back-pointer embedded in the cell.
//!
//! ## Example
//!
//! ```rust
//! use slotpool::DynamicSpscPool;
//!
//! # fn main() -> Result<(), slotpool::Error> {
//! let pool = DynamicSpscPool::<[u64; 4]>::with_capacity(1024)?;
//!
//! let block = pool.construct([1, 2, 3, 4]).expect("pool has free cells");
//! assert_eq!(block[2], 3);
//!
//! // The cell returns to the pool when the handle is dropped.
//! drop(block);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrent example
//!
//! ```rust
//! use std::thread;
//!
//! use slotpool::StaticMpmcPool;
//!
//! let pool = StaticMpmcPool::<u64, 64>::new();
//!
//! thread::scope(|scope| {
//!     for worker in 0..4u64 {
//!         let pool = &pool;
//!         scope.spawn(move || {
//!             for round in 0..100 {
//!                 if let Some(value) = pool.construct(worker * 1000 + round) {
//!                     assert_eq!(*value, worker * 1000 + round);
//!                 }
//!             }
//!         });
//!     }
//! });
//! ```
//!
//! ## Choosing a variant
//!
//! Pick the weakest policies your threading allows; the single-threaded
//! flavours skip atomic read-modify-write operations entirely. The type
//! system enforces the contracts: pools with a single-producer side are not
//! `Sync`, and handles of a single-consumer pool are not `Send`, so a
//! variant can never be driven from more threads than its policies permit.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod handle;
mod policy;
mod pool;
mod slot;
mod storage;
mod sync;

pub use error::Error;
pub use handle::Pooled;
pub use policy::{
    AcquirePolicy, MultiConsumer, MultiProducer, ReleasePolicy, SingleConsumer, SingleProducer,
};
pub use pool::{
    DynamicMpmcPool, DynamicMpscPool, DynamicPool, DynamicSpmcPool, DynamicSpscPool,
    StaticMpmcPool, StaticMpscPool, StaticPool, StaticSpmcPool, StaticSpscPool,
};
