//! Atomic primitives, switchable between `std` and `loom`.
//!
//! The lock-free paths are model-checked with loom (`RUSTFLAGS="--cfg loom"
//! cargo test --test loom`). Everything that participates in the cross-thread
//! protocol imports its atomics from here so the checked build and the real
//! build share one source of truth.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicPtr, Ordering};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicPtr, Ordering};
