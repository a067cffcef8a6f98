//! Placement: carving an allocated block of exactly `req` bytes out of a
//! free block that may be larger, re-listing whatever remainder is left.

use crate::block;
use crate::classes::ClassTable;

/// Splits the free block at `bp` (already removed from its free list by the
/// caller) to satisfy a request of `req` bytes. If the leftover after
/// carving out `req` is at least [`block::MIN_BLOCK_SIZE`], it is written up
/// as a new free block and reinserted; otherwise the whole block is handed
/// out as-is (internal fragmentation, no remnant).
///
/// Returns the payload pointer of the allocated block — always `bp` itself.
pub unsafe fn split(bp: *mut u8, req: usize, classes: &ClassTable) -> *mut u8 {
    unsafe {
        let avail = block::size(bp);
        debug_assert!(avail >= req);
        let remainder = avail - req;

        if remainder >= block::MIN_BLOCK_SIZE {
            block::write_block(bp, req, true);
            block::set_prev_alloc(bp, true);

            let rem_bp = bp.add(req);
            block::write_block(rem_bp, remainder, false);
            block::set_prev_alloc(rem_bp, true);

            // the remainder's successor was bp's successor before the split
            // and so cannot itself be free (no two adjacent free blocks),
            // but clear its predecessor-allocated bit unconditionally rather
            // than assume that invariant held coming in.
            let after = rem_bp.add(remainder);
            block::set_prev_alloc(after, false);

            classes.insert(rem_bp, remainder);
        } else {
            block::write_block(bp, avail, true);
            block::set_prev_alloc(bp, true);

            let after = bp.add(avail);
            block::set_prev_alloc(after, true);
        }

        bp
    }
}
