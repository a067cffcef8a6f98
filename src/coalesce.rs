//! Immediate boundary-tag coalescing.

use crate::block;
use crate::classes::ClassTable;

/// Merges `bp` with whichever of its immediate predecessor/successor blocks
/// are free, removing any merged neighbor from its free list first. Returns
/// the payload pointer of the resulting (possibly larger, possibly
/// relocated-to-a-lower-address) free block. Does not reinsert the result
/// into any free list or footer-less epilogue; callers own that.
///
/// `bp` itself must not already be on a free list.
pub unsafe fn coalesce(bp: *mut u8, classes: &ClassTable) -> *mut u8 {
    unsafe {
        let mut size = block::size(bp);
        let prev_is_free = !block::prev_alloc(bp);
        let next_bp = bp.add(size);
        let next_is_free = !block::is_alloc(next_bp);

        let mut result = bp;

        if next_is_free {
            let next_size = block::size(next_bp);
            classes.remove_if_listed(next_bp, next_size);
            size += next_size;
        }

        if prev_is_free {
            let prev_footer = block::prev_footer_word(bp);
            let prev_size = (prev_footer & !0x7) as usize;
            let prev_bp = bp.sub(prev_size);
            classes.remove_if_listed(prev_bp, prev_size);
            size += prev_size;
            result = prev_bp;
        }

        block::write_block(result, size, false);
        // No two adjacent free blocks is an invariant, not just a side
        // effect of the merges above; restate it explicitly.
        block::set_prev_alloc(result, true);

        let successor = result.add(size);
        block::set_prev_alloc(successor, false);

        result
    }
}
