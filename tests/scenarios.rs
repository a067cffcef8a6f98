//! Concrete end-to-end scenarios run against `SimHeap`.

use segalloc::{Allocator, AllocatorConfig, SimHeap};

fn small_heap() -> Allocator<SimHeap> {
    let config = AllocatorConfig::builder().first_block_size(512).chunksize(256).build();
    Allocator::new(SimHeap::new(1 << 20), config).unwrap()
}

#[test]
fn scenario_allocate_then_release() {
    let mut a = small_heap();
    let p = a.allocate(1);
    assert!(!p.is_null());
    assert_eq!(p as usize & 7, 0);
    a.release(p);
    a.audit().expect("invariants hold after release");
}

#[test]
fn scenario_first_fit_reuses_freed_hole() {
    let mut a = small_heap();
    let x = a.allocate(100);
    let y = a.allocate(100);
    assert!(!x.is_null() && !y.is_null());
    a.release(x);
    let z = a.allocate(80);
    assert_eq!(z, x, "freed hole should be reused by a smaller request");
    a.audit().unwrap();
}

#[test]
fn scenario_coalescing_merges_two_released_neighbors() {
    let mut a = small_heap();
    let x = a.allocate(16);
    let y = a.allocate(16);
    a.release(x);
    a.release(y);
    a.audit().expect("invariants hold after coalescing");

    // after releasing both neighbors, a request that spans their combined
    // size should be satisfiable from the merged hole.
    let z = a.allocate(16 + 16 + 8);
    assert!(!z.is_null());
}

#[test]
fn scenario_resize_preserves_prefix_and_grows() {
    let mut a = small_heap();
    let x = a.allocate(40);
    unsafe {
        for i in 0..40u8 {
            *x.add(i as usize) = i;
        }
    }
    let y = a.resize(x, 4000);
    assert!(!y.is_null());
    unsafe {
        for i in 0..40u8 {
            assert_eq!(*y.add(i as usize), i, "byte {i} not preserved across resize");
        }
    }
    a.audit().unwrap();
}

#[test]
fn scenario_eight_byte_remnant_is_unlisted_but_valid() {
    let mut a = small_heap();
    let x = a.allocate(8);
    let _y = a.allocate(8);
    a.release(x);
    // whether or not an 8-byte remnant was produced depends on block_size_for's
    // rounding, but invariants must hold regardless.
    a.audit().expect("invariants hold with a possible 8-byte remnant");
}

#[test]
fn scenario_release_then_reallocate_after_exhaustion() {
    let config = AllocatorConfig::builder().first_block_size(256).chunksize(256).build();
    // a tiny cap forces allocate to eventually fail once the heap can't grow further.
    let mut a = Allocator::new(SimHeap::new(256 + 512 + 4096), config).unwrap();

    let mut live = Vec::new();
    loop {
        let p = a.allocate(64);
        if p.is_null() {
            break;
        }
        live.push(p);
    }
    assert!(!live.is_empty(), "heap should have accepted at least one allocation");

    let freed = live.pop().unwrap();
    a.release(freed);
    let reused = a.allocate(64);
    assert!(!reused.is_null(), "allocate must succeed again after release frees capacity");
    a.audit().unwrap();
}
