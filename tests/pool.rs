//! Behaviour scenarios across the policy and storage matrix.

#![cfg(not(loom))]

use std::mem::align_of;

use slotpool::{
    AcquirePolicy, DynamicMpmcPool, DynamicMpscPool, DynamicPool, DynamicSpmcPool,
    DynamicSpscPool, Error, ReleasePolicy, StaticMpmcPool, StaticMpscPool, StaticPool,
    StaticSpmcPool, StaticSpscPool,
};

#[cfg(not(miri))]
const LARGE_CAPACITY: usize = 10_000_000;
#[cfg(miri)]
const LARGE_CAPACITY: usize = 512;

const RUN_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct TestNode {
    val1: usize,
    val2: usize,
}

impl TestNode {
    fn new(val1: usize, val2: usize) -> Self {
        Self { val1, val2 }
    }
}

#[derive(Debug)]
struct AlignmentNode {
    val1: u32,
    val2: bool,
    blank: u8,
}

#[test]
fn test_max_allocation_static() {
    let pool = StaticMpmcPool::<TestNode, LARGE_CAPACITY>::new();
    let offset = LARGE_CAPACITY + 500;

    let mut nodes = Vec::with_capacity(LARGE_CAPACITY);
    for i in 0..LARGE_CAPACITY {
        let node = pool
            .construct(TestNode::new(i, i + offset))
            .expect("pool must hold exactly its capacity");
        nodes.push(node);
    }
    assert!(pool.construct(TestNode::new(0, 0)).is_none());

    for (i, node) in nodes.iter().enumerate() {
        assert_eq!(node.val1, i);
        assert_eq!(node.val2, i + offset);
    }

    drop(nodes);
    assert!(pool.construct(TestNode::new(0, 0)).is_some());
}

#[test]
fn test_max_allocation_dynamic() {
    let pool = DynamicMpmcPool::<TestNode>::with_capacity(LARGE_CAPACITY).unwrap();
    let offset = LARGE_CAPACITY + 500;

    let mut nodes = Vec::with_capacity(LARGE_CAPACITY);
    for i in 0..LARGE_CAPACITY {
        let node = pool
            .construct(TestNode::new(i, i + offset))
            .expect("pool must hold exactly its capacity");
        nodes.push(node);
    }
    assert!(pool.construct(TestNode::new(0, 0)).is_none());

    for (i, node) in nodes.iter().enumerate() {
        assert_eq!(node.val1, i);
        assert_eq!(node.val2, i + offset);
    }

    drop(nodes);
    assert!(pool.construct(TestNode::new(0, 0)).is_some());
}

#[test]
fn test_reuse_across_five_runs() {
    fn five_runs_static<const N: usize, P: AcquirePolicy, C: ReleasePolicy>(
        pool: &StaticPool<TestNode, N, P, C>,
    ) {
        for _ in 0..5 {
            let offset = N + 500;
            let mut nodes = Vec::with_capacity(N);
            for i in 0..N {
                nodes.push(pool.construct(TestNode::new(i, i + offset)).unwrap());
            }
            assert!(pool.construct(TestNode::new(0, 0)).is_none());
            for (i, node) in nodes.iter().enumerate() {
                assert_eq!(node.val1, i);
                assert_eq!(node.val2, i + offset);
            }
        }
    }

    fn five_runs_dynamic<P: AcquirePolicy, C: ReleasePolicy>(pool: &DynamicPool<TestNode, P, C>) {
        let capacity = pool.capacity();
        for _ in 0..5 {
            let offset = capacity + 500;
            let mut nodes = Vec::with_capacity(capacity);
            for i in 0..capacity {
                nodes.push(pool.construct(TestNode::new(i, i + offset)).unwrap());
            }
            assert!(pool.construct(TestNode::new(0, 0)).is_none());
            for (i, node) in nodes.iter().enumerate() {
                assert_eq!(node.val1, i);
                assert_eq!(node.val2, i + offset);
            }
        }
    }

    five_runs_static(&StaticSpscPool::<TestNode, RUN_CAPACITY>::new());
    five_runs_static(&StaticSpmcPool::<TestNode, RUN_CAPACITY>::new());
    five_runs_static(&StaticMpscPool::<TestNode, RUN_CAPACITY>::new());
    five_runs_static(&StaticMpmcPool::<TestNode, RUN_CAPACITY>::new());

    five_runs_dynamic(&DynamicSpscPool::<TestNode>::with_capacity(RUN_CAPACITY).unwrap());
    five_runs_dynamic(&DynamicSpmcPool::<TestNode>::with_capacity(RUN_CAPACITY).unwrap());
    five_runs_dynamic(&DynamicMpscPool::<TestNode>::with_capacity(RUN_CAPACITY).unwrap());
    five_runs_dynamic(&DynamicMpmcPool::<TestNode>::with_capacity(RUN_CAPACITY).unwrap());
}

#[test]
fn test_failing_initialisers_consume_no_capacity_single_producer() {
    failing_initialisers::<slotpool::SingleProducer>();
}

#[test]
fn test_failing_initialisers_consume_no_capacity_multi_producer() {
    failing_initialisers::<slotpool::MultiProducer>();
}

/// Alternates succeeding and failing initialisers over 2N - 1 calls against
/// a pool of capacity N: every even call lands, every odd call fails, and
/// the failures consume nothing, so the pool ends exactly full.
fn failing_initialisers<P: AcquirePolicy>() {
    const CAPACITY: usize = 100;
    let pool = StaticPool::<TestNode, CAPACITY, P, slotpool::SingleConsumer>::new();

    let mut nodes = Vec::new();
    for i in 0..(2 * CAPACITY - 1) {
        let result = pool.try_construct_with(|| {
            if i % 2 == 1 {
                Err("constructor failure")
            } else {
                Ok(TestNode::new(i, i))
            }
        });
        match result {
            Ok(Some(node)) => {
                assert_eq!(i % 2, 0, "only even calls may succeed");
                nodes.push(node);
            }
            Ok(None) => panic!("pool reported empty at call {i}"),
            Err(message) => {
                assert_eq!(i % 2, 1, "only odd calls may fail");
                assert_eq!(message, "constructor failure");
            }
        }
    }

    assert_eq!(nodes.len(), CAPACITY);
    assert!(pool.construct(TestNode::new(0, 0)).is_none());

    for (run, node) in nodes.iter().enumerate() {
        assert_eq!(node.val1, run * 2);
    }
}

#[test]
fn test_panicking_initialisers_consume_no_capacity() {
    const CAPACITY: usize = 16;
    let pool = StaticMpmcPool::<TestNode, CAPACITY>::new();

    for _ in 0..CAPACITY {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = pool.construct_with(|| -> TestNode { panic!("constructor failure") });
        }));
        assert!(result.is_err());
    }

    // Every panic repaired the list, so the full capacity remains.
    let nodes: Vec<_> = std::iter::from_fn(|| pool.construct(TestNode::new(0, 0))).collect();
    assert_eq!(nodes.len(), CAPACITY);
}

#[test]
fn test_alignment_static() {
    // A smaller run keeps the static type reasonable; the dynamic variant
    // covers the large capacity.
    const CAPACITY: usize = 4096;
    let pool = StaticSpscPool::<AlignmentNode, CAPACITY>::new();
    verify_alignment_run(&pool, CAPACITY, pool.slot_stride());
}

#[test]
fn test_alignment_dynamic() {
    let pool = DynamicSpscPool::<AlignmentNode>::with_capacity(LARGE_CAPACITY).unwrap();
    verify_alignment_run(&pool, LARGE_CAPACITY, pool.slot_stride());
}

trait AlignedConstruct {
    fn make(&self, val1: u32, val2: bool) -> Option<(*const AlignmentNode, ErasedHold<'_>)>;
}

/// Keeps the handle alive without naming its concrete type.
struct ErasedHold<'a>(#[allow(dead_code)] Box<dyn std::fmt::Debug + 'a>);

fn verify_alignment_run(pool: &impl AlignedConstruct, capacity: usize, stride: usize) {
    let mut held = Vec::with_capacity(capacity);
    let mut prev_addr: Option<usize> = None;
    let mut flip = false;

    for i in 0..capacity {
        let (addr, hold) = pool
            .make(u32::try_from(i % 1_000_000).unwrap(), flip)
            .expect("pool must hold exactly its capacity");
        flip = !flip;

        let addr = addr as usize;
        assert_eq!(addr % align_of::<AlignmentNode>(), 0);
        if let Some(prev) = prev_addr {
            assert_eq!(addr - prev, stride, "cells must be exactly one stride apart");
        }
        prev_addr = Some(addr);
        held.push(hold);
    }

    assert!(pool.make(0, false).is_none());
}

impl<const N: usize, P: AcquirePolicy, C: ReleasePolicy> AlignedConstruct
    for StaticPool<AlignmentNode, N, P, C>
{
    fn make(&self, val1: u32, val2: bool) -> Option<(*const AlignmentNode, ErasedHold<'_>)> {
        let handle = self.construct(AlignmentNode {
            val1,
            val2,
            blank: b'A',
        })?;
        Some((handle.as_ptr(), ErasedHold(Box::new(handle))))
    }
}

impl<P: AcquirePolicy, C: ReleasePolicy> AlignedConstruct for DynamicPool<AlignmentNode, P, C> {
    fn make(&self, val1: u32, val2: bool) -> Option<(*const AlignmentNode, ErasedHold<'_>)> {
        let handle = self.construct(AlignmentNode {
            val1,
            val2,
            blank: b'A',
        })?;
        Some((handle.as_ptr(), ErasedHold(Box::new(handle))))
    }
}

#[test]
fn test_live_values_survive_neighbouring_destroys() {
    let pool = StaticSpscPool::<TestNode, 8>::new();

    let before: Vec<_> = (0..3)
        .map(|i| pool.construct(TestNode::new(i, i + 100)).unwrap())
        .collect();
    let keeper = pool.construct(TestNode::new(77, 777)).unwrap();
    let after: Vec<_> = (4..8)
        .map(|i| pool.construct(TestNode::new(i, i + 100)).unwrap())
        .collect();

    drop(before);
    assert_eq!(keeper.val1, 77);
    assert_eq!(keeper.val2, 777);

    drop(after);
    assert_eq!(keeper.val1, 77);
    assert_eq!(keeper.val2, 777);

    // Churn the freed cells and look again.
    let churn: Vec<_> = std::iter::from_fn(|| pool.construct(TestNode::new(9, 9))).collect();
    assert_eq!(churn.len(), 7);
    assert_eq!(keeper.val1, 77);
    assert_eq!(keeper.val2, 777);
}

#[test]
fn test_dynamic_creation_failure_leaves_nothing_behind() {
    // A capacity whose total byte size overflows the allocator's limits.
    let absurd = usize::MAX / 2;
    let result = DynamicMpmcPool::<TestNode>::with_capacity(absurd);
    assert_eq!(result.err(), Some(Error::AllocationFailed { capacity: absurd }));

    // Creation after the failure works normally.
    let pool = DynamicMpmcPool::<TestNode>::with_capacity(4).unwrap();
    assert!(pool.construct(TestNode::new(1, 2)).is_some());
}
