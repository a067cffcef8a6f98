//! Tunable constants and the small builder used to override them in tests.

/// Extension unit requested from the heap primitive when no fit exists,
/// chosen to amortize `sbrk` cost without egregious over-commit.
pub const CHUNKSIZE: usize = 2112;

/// Size, in bytes, of the first free block carved out at [`crate::Allocator::new`].
pub const FIRST_BLOCK_SIZE: usize = 1504;

/// Runtime-overridable tunables. `Default` matches the values above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub chunksize: usize,
    pub first_block_size: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { chunksize: CHUNKSIZE, first_block_size: FIRST_BLOCK_SIZE }
    }
}

impl AllocatorConfig {
    pub fn builder() -> AllocatorConfigBuilder {
        AllocatorConfigBuilder::default()
    }
}

/// Builder for [`AllocatorConfig`]; unset fields fall back to the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocatorConfigBuilder {
    chunksize: Option<usize>,
    first_block_size: Option<usize>,
}

impl AllocatorConfigBuilder {
    pub fn chunksize(mut self, value: usize) -> Self {
        self.chunksize = Some(value);
        self
    }

    pub fn first_block_size(mut self, value: usize) -> Self {
        self.first_block_size = Some(value);
        self
    }

    pub fn build(self) -> AllocatorConfig {
        let defaults = AllocatorConfig::default();
        AllocatorConfig {
            chunksize: self.chunksize.unwrap_or(defaults.chunksize),
            first_block_size: self.first_block_size.unwrap_or(defaults.first_block_size),
        }
    }
}
