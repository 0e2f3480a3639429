use thiserror::Error;

/// Errors that can occur when requesting storage from a [`FixedPool`][crate::FixedPool].
///
/// Every variant means the same thing to a container: no storage was handed out. The variants
/// exist to tell apart a resource condition from a usage mistake when diagnosing a failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The memory region backing the pool could not be obtained from the system allocator.
    ///
    /// This is also reported if the size of the region does not fit in the address space.
    #[error("failed to allocate a region of {capacity} slots of {item_type}")]
    OutOfMemory {
        /// Name of the element type the region was sized for.
        item_type: &'static str,

        /// Number of slots the region was supposed to hold.
        capacity: usize,
    },

    /// Every slot of the pool is currently handed out, or the pool no longer owns a region
    /// because its contents were moved out via [`take()`][crate::FixedPool::take].
    #[error("pool of {capacity} slots of {item_type} has no free slot")]
    PoolExhausted {
        /// Name of the element type stored in the pool.
        item_type: &'static str,

        /// Fixed capacity of the pool.
        capacity: usize,
    },

    /// The caller asked for storage for some number of elements other than exactly one.
    #[error("a pool hands out storage for exactly one element per request but {count} were requested")]
    InvalidCount {
        /// The number of elements that was requested.
        count: usize,
    },
}

impl Error {
    /// Whether the error is the recoverable "no free slot right now" condition.
    ///
    /// Returning storage to the pool makes a subsequent request succeed again, unless the pool
    /// is in the empty (moved-from) state.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
