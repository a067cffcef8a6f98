//! Randomized operation-trace property test: after every operation in a
//! generated sequence of allocate/release/resize/zalloc calls, every heap
//! invariant from `Allocator::audit` must still hold.

use proptest::prelude::*;
use segalloc::{Allocator, AllocatorConfig, SimHeap};

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Release(usize),
    Resize(usize, usize),
    ZAlloc(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..512).prop_map(Op::Allocate),
        (0usize..16).prop_map(Op::Release),
        (0usize..16, 1usize..512).prop_map(|(i, n)| Op::Resize(i, n)),
        (1usize..8, 1usize..64).prop_map(|(k, n)| Op::ZAlloc(k, n)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let config = AllocatorConfig::builder().first_block_size(512).chunksize(512).build();
        let mut allocator = Allocator::new(SimHeap::new(1 << 22), config).unwrap();
        let mut live: Vec<*mut u8> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate(n) => {
                    let p = allocator.allocate(n);
                    if !p.is_null() {
                        live.push(p);
                    }
                }
                Op::Release(i) => {
                    if !live.is_empty() {
                        let p = live.remove(i % live.len());
                        allocator.release(p);
                    }
                }
                Op::Resize(i, n) => {
                    if !live.is_empty() {
                        let idx = i % live.len();
                        let p = live[idx];
                        let q = allocator.resize(p, n);
                        if !q.is_null() {
                            live[idx] = q;
                        } else {
                            live.remove(idx);
                        }
                    }
                }
                Op::ZAlloc(k, n) => {
                    let p = allocator.zero_alloc(k, n);
                    if !p.is_null() {
                        live.push(p);
                    }
                }
            }

            prop_assert!(allocator.audit().is_ok(), "invariant violated: {:?}", allocator.audit());
        }
    }
}
