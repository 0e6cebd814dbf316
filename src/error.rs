//! Errors reported by block allocation and configuration.
//!
//! Only resource exhaustion and invalid configuration are reported. Misuse of
//! a block (freeing with another allocator, feeding a misaligned slice to a
//! vector kernel, an out-of-range level) is a caller bug, checked by debug
//! assertions and otherwise unchecked.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The underlying allocator could not satisfy the request.
    #[error("out of memory allocating {bytes} bytes aligned to {align}")]
    OutOfMemory { bytes: usize, align: usize },

    /// The requested element count does not fit in a memory layout.
    #[error("allocation of {count} elements overflows the address space")]
    LayoutOverflow { count: usize },

    /// A GAP level-length table failed validation.
    #[error("invalid GAP level table: {0}")]
    InvalidGapLevels(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
