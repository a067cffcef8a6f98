//! The allocator's error type.

use thiserror::Error;

/// Everything that can go wrong inside the allocator.
///
/// The sentinel-returning entry points (`allocate`, `release`, `resize`,
/// `zero_alloc`) collapse all of these to a null pointer; the `try_*`
/// counterparts surface this type directly.
#[derive(Debug, Error)]
pub enum AllocatorError {
    /// The heap primitive refused to extend by the requested amount, and the
    /// exact-size fallback (see [`crate::extend::extend`]) also failed.
    #[error("heap primitive refused to extend the heap")]
    HeapExhausted,

    /// A caller-supplied pointer could not be validated as one this
    /// allocator issued (best-effort; not a corruption detector).
    #[error("pointer was not issued by this allocator")]
    InvalidPointer,

    /// `allocate(0)`, or `zero_alloc` with a zero count/size, or a
    /// `k * n` that overflows `usize`.
    #[error("invalid allocation request")]
    InvalidRequest,

    /// Raised only by [`crate::Allocator::audit`]: names the specific
    /// invariant that failed and, where applicable, the address involved.
    #[error("heap invariant violated: {0}")]
    InvariantViolation(String),
}
