//! The size-class index and the free-list operator built on top of it.
//!
//! `CLASSES` singly-linked free lists, one per power-of-two size class, live
//! in a fixed-size table at the very base of the heap (so the table is
//! itself allocated from the heap it indexes). Class `i` holds free blocks
//! of size in `[2^(i+5), 2^(i+6))`; the `+5` offset is `BIAS` applied to the
//! class exponent, and is what makes the smallest class start at 32 bytes.

use crate::block;

pub const CLASSES: usize = 26;
pub const BIAS: u32 = 2;
pub const CLASS_BYTES: usize = CLASSES * 8;

/// `log2(ALIGNMENT)`: every block size is already a multiple of `ALIGNMENT`,
/// so class 0's lower bound is `ALIGNMENT` shifted left by `BIAS`.
const BASE_EXP: u32 = block::ALIGNMENT.trailing_zeros();

/// The smallest class index `i` with `2^(i+5) >= size`, clamped to the last class.
pub fn class_of(size: usize) -> usize {
    let mut class = 0usize;
    let mut bound = 1usize << (BASE_EXP + BIAS) as usize;
    while bound < size && class < CLASSES - 1 {
        class += 1;
        bound <<= 1;
    }
    class
}

/// A view over the class index table stored at the heap base. Cheap to
/// construct: it is just a pointer, re-derived from [`crate::Allocator`] on
/// every call rather than held across mutations of the heap.
#[derive(Clone, Copy)]
pub struct ClassTable {
    base: *mut u8,
}

impl ClassTable {
    /// Zeroes every class head. Must be called once, at heap initialization.
    pub unsafe fn init(base: *mut u8) -> Self {
        unsafe {
            for i in 0..CLASSES {
                *(base.add(i * 8) as *mut *mut u8) = block::null();
            }
        }
        Self { base }
    }

    unsafe fn head_slot(&self, class: usize) -> *mut *mut u8 {
        unsafe { self.base.add(class * 8) as *mut *mut u8 }
    }

    unsafe fn head(&self, class: usize) -> *mut u8 {
        unsafe { *self.head_slot(class) }
    }

    unsafe fn set_head(&self, class: usize, bp: *mut u8) {
        unsafe { *self.head_slot(class) = bp };
    }

    /// Prepends `bp` to the head of its size class's free list. Caller must
    /// ensure `bp` is free and `size(bp) >= MIN_BLOCK_SIZE`.
    pub unsafe fn insert(&self, bp: *mut u8, blk_size: usize) {
        debug_assert!(blk_size >= block::MIN_BLOCK_SIZE);
        unsafe {
            let class = class_of(blk_size);
            let old_head = self.head(class);
            block::set_next_free(bp, old_head);
            self.set_head(class, bp);
        }
        tracing::trace!(bp = ?bp, blk_size, class = class_of(blk_size), "inserted into free list");
    }

    /// Inserts `bp` only if it is listable (`>= MIN_BLOCK_SIZE`); leaves
    /// smaller blocks as unlisted remnants, per the 8-byte-remnant rule.
    pub unsafe fn insert_if_listable(&self, bp: *mut u8, blk_size: usize) {
        if blk_size >= block::MIN_BLOCK_SIZE {
            unsafe { self.insert(bp, blk_size) };
        }
    }

    /// Splices `bp` out of its size class's free list.
    pub unsafe fn remove(&self, bp: *mut u8, blk_size: usize) {
        unsafe {
            let class = class_of(blk_size);
            let mut cur = self.head(class);
            if cur == bp {
                self.set_head(class, block::next_free(bp));
                return;
            }
            while !cur.is_null() {
                let next = block::next_free(cur);
                if next == bp {
                    block::set_next_free(cur, block::next_free(bp));
                    return;
                }
                cur = next;
            }
        }
        debug_assert!(false, "remove: block not found on its expected free list");
    }

    /// Removes `bp` only if it would have been listed (`>= MIN_BLOCK_SIZE`).
    pub unsafe fn remove_if_listed(&self, bp: *mut u8, blk_size: usize) {
        if blk_size >= block::MIN_BLOCK_SIZE {
            unsafe { self.remove(bp, blk_size) };
        }
    }

    /// Good-fit search: first-fit within `class_of(req)`, then first-fit in
    /// each larger class in turn. `None` if no block anywhere is big enough.
    pub unsafe fn find_fit(&self, req: usize) -> Option<*mut u8> {
        for class in class_of(req)..CLASSES {
            let mut cur = unsafe { self.head(class) };
            while !cur.is_null() {
                if unsafe { block::size(cur) } >= req {
                    return Some(cur);
                }
                cur = unsafe { block::next_free(cur) };
            }
        }
        None
    }

    /// Whether `target` is present on `class`'s free list. Used only by
    /// [`crate::Allocator::audit`].
    pub unsafe fn contains(&self, class: usize, target: *mut u8) -> bool {
        unsafe {
            let mut cur = self.head(class);
            while !cur.is_null() {
                if cur == target {
                    return true;
                }
                cur = block::next_free(cur);
            }
            false
        }
    }

    /// Whether `target` is present on any class's free list, regardless of
    /// which one. Used only by [`crate::Allocator::audit`] to check that an
    /// allocated block never appears on a free list.
    pub unsafe fn contains_any(&self, target: *mut u8) -> bool {
        (0..CLASSES).any(|class| unsafe { self.contains(class, target) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_of_boundaries() {
        assert_eq!(class_of(1), 0);
        assert_eq!(class_of(32), 0);
        assert_eq!(class_of(33), 1);
        assert_eq!(class_of(64), 1);
        assert_eq!(class_of(65), 2);
        assert_eq!(class_of(usize::MAX), CLASSES - 1);
    }

    unsafe fn block_at(buf: &mut [u8], header_off: usize) -> *mut u8 {
        unsafe { buf.as_mut_ptr().add(header_off + block::HEADER_SIZE) }
    }

    #[test]
    fn insert_find_remove_roundtrip() {
        let mut heap = vec![0u8; CLASS_BYTES + 256];
        let base = heap.as_mut_ptr();
        unsafe {
            let classes = ClassTable::init(base);
            let region = base.add(CLASS_BYTES);
            let a = block_at(std::slice::from_raw_parts_mut(region, 256), 0);
            block::write_block(a, 32, false);
            classes.insert(a, 32);

            let found = classes.find_fit(16).expect("should find a");
            assert_eq!(found, a);

            classes.remove(a, 32);
            assert!(classes.find_fit(16).is_none());
        }
    }

    #[test]
    fn find_fit_scans_into_larger_classes() {
        let mut heap = vec![0u8; CLASS_BYTES + 256];
        let base = heap.as_mut_ptr();
        unsafe {
            let classes = ClassTable::init(base);
            let region = base.add(CLASS_BYTES);
            let big = block_at(std::slice::from_raw_parts_mut(region, 256), 0);
            block::write_block(big, 200, false);
            classes.insert(big, 200);

            // a request whose own class (for 40 bytes) is empty must still
            // find the 200-byte block in a larger class.
            let found = classes.find_fit(40).expect("should find big in a larger class");
            assert_eq!(found, big);
        }
    }
}
