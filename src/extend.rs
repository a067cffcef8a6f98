//! Growing the heap when no free block satisfies a request.

use crate::block;
use crate::classes::ClassTable;
use crate::error::AllocatorError;
use crate::heap::HeapSource;

/// Extends the heap by `chunksize` bytes (falling back to the exact `req`
/// size if that fails), replacing the old epilogue with a new free block
/// covering the newly won region and writing a fresh epilogue past it.
///
/// `epilogue` must point at the current epilogue's payload (its 4-byte
/// header, no payload beyond). The new free block is inserted into
/// `classes`. Returns the payload pointer of that new free block; callers
/// are expected to immediately try to coalesce it with a free predecessor.
pub unsafe fn extend<S: HeapSource>(
    heap: &mut S,
    classes: &ClassTable,
    epilogue: *mut u8,
    req: usize,
    chunksize: usize,
) -> Result<*mut u8, AllocatorError> {
    let grow_by = crate::align::align8(req.max(chunksize));

    let (new_region, grown) = match unsafe { heap.sbrk(grow_by) } {
        Ok(p) => (p, grow_by),
        Err(_) if grow_by != req => {
            let exact = crate::align::align8(req);
            tracing::warn!(grow_by, exact, "chunksize extension failed, retrying at exact size");
            (unsafe { heap.sbrk(exact) }?, exact)
        }
        Err(e) => return Err(e),
    };
    debug_assert_eq!(new_region, epilogue, "sbrk must extend contiguously from the old epilogue");
    let new_bp = epilogue;
    // the old epilogue's own header already carries the real
    // predecessor-allocated bit, so reuse it before overwriting the word.
    let prev_alloc_flag = unsafe { block::prev_alloc(new_bp) };

    unsafe {
        block::write_block(new_bp, grown, false);
        block::set_prev_alloc(new_bp, prev_alloc_flag);

        let new_epilogue = new_bp.add(grown);
        block::write_epilogue(new_epilogue, false);

        classes.insert(new_bp, grown);
    }

    tracing::debug!(grown, bp = ?new_bp, "heap extended");
    Ok(new_bp)
}
