//! # segalloc - A Segregated-Fit Coalescing Allocator
//!
//! This crate implements a general-purpose dynamic memory allocator in the
//! style of the classic "segregated free list" family: a single growable
//! heap, boundary-tagged blocks, and a fixed vector of free lists indexed by
//! size class. It exposes the four classic allocation primitives —
//! `allocate`, `release`, `resize`, `zero_alloc` — with semantics matching
//! the standard C allocator.
//!
//! ## Heap layout
//!
//! ```text
//!   heap_lo                                                        heap_hi
//!      │                                                              │
//!      ▼                                                              ▼
//!   ┌────────────┬──────┬──────────┬───────────────────────┬──────────┐
//!   │ class index│ pad  │ prologue │     payload blocks     │ epilogue │
//!   │ CLASSES × 8│ 4    │ 8 bytes  │        variable         │ 4 bytes  │
//!   └────────────┴──────┴──────────┴───────────────────────┴──────────┘
//! ```
//!
//! The class index is itself allocated from the heap it indexes. The
//! prologue and epilogue are always-allocated sentinels that let every
//! real operation treat "predecessor" and "successor" uniformly, with no
//! special-casing at either end of the payload region.
//!
//! ## Block layout
//!
//! ```text
//!   allocated block (size S):
//!   [ header ][            payload (S-4 bytes)             ]
//!
//!   free block (size S >= 16):
//!   [ header ][ next free (8) ][     unused      ][ footer ]
//!
//!   free block (size S == 8, unlisted remnant):
//!   [ header ][ footer ]
//! ```
//!
//! ## Crate structure
//!
//! ```text
//!   segalloc
//!   ├── heap      - HeapSource trait, ProcessHeap, SimHeap
//!   ├── align     - 8-byte alignment helper
//!   ├── block     - header/footer bit encoding
//!   ├── classes   - size-class index and free-list operator
//!   ├── coalesce  - boundary-tag fusion
//!   ├── place     - splitting a free block to satisfy a request
//!   ├── extend    - growing the heap when no fit exists
//!   ├── config    - tunables
//!   └── error     - AllocatorError
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use segalloc::{Allocator, heap::ProcessHeap};
//!
//! let mut alloc = Allocator::new(ProcessHeap::new(), Default::default()).unwrap();
//! let p = alloc.allocate(64);
//! unsafe { *(p as *mut u64) = 42; }
//! alloc.release(p);
//! ```
//!
//! ## Limitations
//!
//! - Single-threaded only; see [`Allocator`]'s top-level docs.
//! - Memory is never returned to the operating system; the heap only grows.
//! - No guarantee that `resize` preserves the returned address.

pub mod align;
pub mod block;
pub mod classes;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod extend;
pub mod heap;
pub mod place;

pub use config::AllocatorConfig;
pub use error::AllocatorError;
pub use heap::{HeapSource, ProcessHeap, SimHeap};

use classes::ClassTable;

/// The segregated-fit coalescing allocator.
///
/// `Allocator<S>` owns the heap it manages (via `S: HeapSource`) and the
/// bookkeeping built on top of it. It is deliberately not `Sync`: every
/// entry point assumes exclusive access and runs to completion with no
/// internal suspension point. Callers needing concurrent access must add
/// their own synchronization.
pub struct Allocator<S: HeapSource> {
    heap: S,
    config: AllocatorConfig,
    classes: ClassTable,
    prologue: *mut u8,
    epilogue: *mut u8,
}

/// Sentinel returned by the classic-malloc-style entry points on failure.
pub fn null() -> *mut u8 {
    block::null()
}

impl<S: HeapSource> Allocator<S> {
    /// Initializes a fresh heap on `source`: the class index, the prologue,
    /// an initial free block of `config.first_block_size` bytes, and the
    /// epilogue.
    pub fn new(mut source: S, config: AllocatorConfig) -> Result<Self, AllocatorError> {
        let total = classes::CLASS_BYTES + 16 + config.first_block_size;
        let base = unsafe { source.sbrk(total)? };

        let classes = unsafe { ClassTable::init(base) };
        let prologue = unsafe { base.add(classes::CLASS_BYTES + 4 + block::HEADER_SIZE) };
        unsafe { block::write_prologue(prologue) };

        let free_bp = unsafe { prologue.add(8) };
        unsafe {
            block::write_block(free_bp, config.first_block_size, false);
            block::set_prev_alloc(free_bp, true);
        }

        let epilogue = unsafe { free_bp.add(config.first_block_size) };
        unsafe { block::write_epilogue(epilogue, false) };

        unsafe { classes.insert(free_bp, config.first_block_size) };

        tracing::debug!(base = ?base, first_block_size = config.first_block_size, "heap initialized");

        Ok(Self { heap: source, config, classes, prologue, epilogue })
    }

    /// Best-effort validation that `bp` looks like a pointer this allocator
    /// could have issued: inside the payload region, 8-byte aligned. Not a
    /// corruption detector.
    fn looks_owned(&self, bp: *mut u8) -> bool {
        let addr = bp as usize;
        addr & 0x7 == 0 && addr > self.prologue as usize && addr < self.epilogue as usize
    }

    /// Fallible counterpart of [`Allocator::allocate`].
    pub fn try_allocate(&mut self, n: usize) -> Result<*mut u8, AllocatorError> {
        if n == 0 {
            return Err(AllocatorError::InvalidRequest);
        }
        let req = block::block_size_for(n);

        if let Some(bp) = unsafe { self.classes.find_fit(req) } {
            unsafe { self.classes.remove_if_listed(bp, block::size(bp)) };
            tracing::trace!(req, bp = ?bp, "fit found");
            return Ok(unsafe { place::split(bp, req, &self.classes) });
        }

        tracing::debug!(req, "no fit, extending heap");
        let extended = unsafe {
            extend::extend(&mut self.heap, &self.classes, self.epilogue, req, self.config.chunksize)?
        };
        unsafe { self.classes.remove_if_listed(extended, block::size(extended)) };
        let merged = unsafe { coalesce::coalesce(extended, &self.classes) };
        self.epilogue = unsafe { merged.add(block::size(merged)) };

        Ok(unsafe { place::split(merged, req, &self.classes) })
    }

    /// Allocates `n` payload bytes, returning the failure sentinel
    /// ([`null`]) on any error.
    pub fn allocate(&mut self, n: usize) -> *mut u8 {
        self.try_allocate(n).unwrap_or_else(|_| null())
    }

    /// Releases a previously-allocated pointer. A no-op on the sentinel and
    /// (defensively) on a pointer that is already free.
    pub fn release(&mut self, bp: *mut u8) {
        if bp == null() || bp.is_null() {
            return;
        }
        if !self.looks_owned(bp) {
            tracing::error!(bp = ?bp, "release called on a pointer this allocator did not issue");
            return;
        }
        if unsafe { !block::is_alloc(bp) } {
            tracing::debug!(bp = ?bp, "release called on an already-free block, ignoring");
            return;
        }

        unsafe {
            block::write_block(bp, block::size(bp), false);
            let merged = coalesce::coalesce(bp, &self.classes);
            self.classes.insert_if_listable(merged, block::size(merged));
        }
        tracing::trace!(bp = ?bp, "released");
    }

    /// Fallible counterpart of [`Allocator::resize`].
    pub fn try_resize(&mut self, bp: *mut u8, n: usize) -> Result<*mut u8, AllocatorError> {
        if bp == null() || bp.is_null() {
            return self.try_allocate(n);
        }
        if n == 0 {
            self.release(bp);
            return Ok(null());
        }
        if !self.looks_owned(bp) {
            return Err(AllocatorError::InvalidPointer);
        }

        let req = block::block_size_for(n);
        let old_size = unsafe { block::size(bp) };

        // 1. shrink in place / already fits
        if old_size >= req {
            return Ok(unsafe { place::split(bp, req, &self.classes) });
        }

        let next = unsafe { bp.add(old_size) };
        let next_free = unsafe { !block::is_alloc(next) };
        let next_size = if next_free { unsafe { block::size(next) } } else { 0 };

        // 2. merge with a free successor
        if next_free && old_size + next_size >= req {
            unsafe {
                self.classes.remove_if_listed(next, next_size);
                block::resize_header_in_place(bp, old_size + next_size);
                return Ok(place::split(bp, req, &self.classes));
            }
        }

        let prev_free = unsafe { !block::prev_alloc(bp) };
        if prev_free {
            let prev_footer = unsafe { block::prev_footer_word(bp) };
            let prev_size = (prev_footer & !0x7) as usize;
            let prev_bp = unsafe { bp.sub(prev_size) };

            // 3. slide into predecessor alone
            if prev_size + old_size >= req {
                return Ok(unsafe {
                    self.slide_into_predecessor(prev_bp, prev_size, bp, old_size, prev_size + old_size, req)
                });
            }

            // 4. slide into predecessor and consume the free successor too
            if next_free && prev_size + old_size + next_size >= req {
                unsafe {
                    self.classes.remove_if_listed(next, next_size);
                }
                return Ok(unsafe {
                    self.slide_into_predecessor(
                        prev_bp,
                        prev_size,
                        bp,
                        old_size,
                        prev_size + old_size + next_size,
                        req,
                    )
                });
            }
        }

        // 5. fallback: save the payload, release, reallocate, restore.
        let copy_len = old_size.min(req) - block::HEADER_SIZE;
        let mut saved = vec![0u8; copy_len];
        unsafe { std::ptr::copy_nonoverlapping(bp, saved.as_mut_ptr(), copy_len) };

        self.release(bp);
        let new_bp = self.try_allocate(n)?;
        unsafe { std::ptr::copy_nonoverlapping(saved.as_ptr(), new_bp, copy_len) };
        Ok(new_bp)
    }

    /// Moves the live payload of `bp` (its block is `live_size` bytes, so
    /// `live_size - HEADER_SIZE` payload bytes are live) into the head of
    /// its free predecessor `prev_bp`, marks the `combined`-byte merged
    /// region allocated, and splits it to `req`. Used by steps 3 and 4 of
    /// [`Allocator::try_resize`]; `combined` already accounts for whichever
    /// neighbors were folded in by the caller.
    unsafe fn slide_into_predecessor(
        &self,
        prev_bp: *mut u8,
        prev_size: usize,
        bp: *mut u8,
        live_size: usize,
        combined: usize,
        req: usize,
    ) -> *mut u8 {
        unsafe {
            self.classes.remove_if_listed(prev_bp, prev_size);
            let move_len = live_size - block::HEADER_SIZE;
            std::ptr::copy(bp, prev_bp, move_len);
            block::write_block(prev_bp, combined, true);
            block::set_prev_alloc(prev_bp, true);
            place::split(prev_bp, req, &self.classes)
        }
    }

    /// Resizes the allocation at `bp` to `n` payload bytes, returning the
    /// failure sentinel on error. `bp == null()` behaves as `allocate(n)`;
    /// `n == 0` behaves as `release(bp)`.
    pub fn resize(&mut self, bp: *mut u8, n: usize) -> *mut u8 {
        self.try_resize(bp, n).unwrap_or_else(|_| null())
    }

    /// Fallible counterpart of [`Allocator::zero_alloc`].
    pub fn try_zalloc(&mut self, count: usize, size: usize) -> Result<*mut u8, AllocatorError> {
        if count == 0 || size == 0 {
            return Err(AllocatorError::InvalidRequest);
        }
        let n = count.checked_mul(size).ok_or(AllocatorError::InvalidRequest)?;
        let bp = self.try_allocate(n)?;
        unsafe { std::ptr::write_bytes(bp, 0, n) };
        Ok(bp)
    }

    /// Allocates `count * size` zeroed bytes, returning the failure
    /// sentinel on any error.
    pub fn zero_alloc(&mut self, count: usize, size: usize) -> *mut u8 {
        self.try_zalloc(count, size).unwrap_or_else(|_| null())
    }

    /// Walks the heap from the first real block to the epilogue, checking
    /// every invariant in §3/§8 of this crate's design notes: no two
    /// adjacent free blocks, the predecessor-allocated flag agrees with the
    /// predecessor's real status, every listable free block is on exactly
    /// one free list and no allocated block is on any, every free block's
    /// footer matches its header, every block lies within the heap's
    /// `(lo, hi]` range, and the block chain exactly tiles the heap with no
    /// gap before the epilogue. Not on any hot path; intended for tests and
    /// external drivers.
    pub fn audit(&self) -> Result<(), AllocatorError> {
        let heap_lo = self.heap.lo();
        let heap_hi = self.heap.hi();

        let mut bp = unsafe { self.prologue.add(8) };
        let mut prev_was_free = false;

        loop {
            let addr = bp as usize;
            if addr & 0x7 != 0 || addr <= heap_lo || addr > heap_hi + 1 {
                return Err(AllocatorError::InvariantViolation(format!(
                    "block at {:?} lies outside the heap's (lo, hi] range", bp
                )));
            }

            let size = unsafe { block::size(bp) };
            let alloc = unsafe { block::is_alloc(bp) };
            let prev_alloc = unsafe { block::prev_alloc(bp) };

            if prev_alloc == prev_was_free {
                return Err(AllocatorError::InvariantViolation(format!(
                    "prev-alloc flag mismatch at {:?}", bp
                )));
            }

            if size == 0 {
                if !alloc {
                    return Err(AllocatorError::InvariantViolation(
                        "epilogue must be marked allocated".into(),
                    ));
                }
                if addr != heap_hi + 1 {
                    return Err(AllocatorError::InvariantViolation(format!(
                        "block chain reaches {:?} instead of tiling the full heap up to {:#x}",
                        bp, heap_hi
                    )));
                }
                break;
            }

            if alloc {
                if unsafe { self.classes.contains_any(bp) } {
                    return Err(AllocatorError::InvariantViolation(format!(
                        "allocated block {:?} still appears on a free list", bp
                    )));
                }
            } else {
                if prev_was_free {
                    return Err(AllocatorError::InvariantViolation(format!(
                        "two adjacent free blocks at {:?}", bp
                    )));
                }
                let footer = unsafe { *(bp.add(size - 2 * block::HEADER_SIZE) as *mut u32) };
                let header = unsafe { *(bp.sub(block::HEADER_SIZE) as *mut u32) };
                if footer != header {
                    return Err(AllocatorError::InvariantViolation(format!(
                        "header/footer mismatch at {:?}", bp
                    )));
                }
                if size >= block::MIN_BLOCK_SIZE {
                    let expected_class = classes::class_of(size);
                    if !unsafe { self.is_listed_in(expected_class, bp) } {
                        return Err(AllocatorError::InvariantViolation(format!(
                            "free block {:?} not found on its expected class list", bp
                        )));
                    }
                }
            }

            prev_was_free = !alloc;
            bp = unsafe { bp.add(size) };
        }

        Ok(())
    }

    unsafe fn is_listed_in(&self, class: usize, target: *mut u8) -> bool {
        unsafe { self.classes.contains(class, target) }
    }
}
