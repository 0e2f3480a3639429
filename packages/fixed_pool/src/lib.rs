#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A fixed-capacity pool allocator that hands out storage for one element at a time.
//!
//! This package provides [`FixedPool`], which owns a single preallocated region with room for
//! exactly `CAPACITY` elements of type `T`. Handing out and taking back storage are constant
//! time operations that never touch the system allocator, which makes the pool a good storage
//! layer for containers with many short-lived nodes of the same type, such as linked lists.
//!
//! # Features
//!
//! - **Fixed capacity**: The number of elements is part of the pool type. The pool never grows.
//! - **Constant time**: Free slots are tracked in an intrusive free list stored inside the
//!   free slots themselves, so no bookkeeping memory is needed.
//! - **Stack order reuse**: The most recently returned slot is the next one handed out.
//! - **Explicit copies**: [`FixedPool::try_clone()`] creates an independent pool with clones of
//!   all live elements at the same slot positions and the same free slot reuse order.
//! - **Ownership transfer**: Moving a pool moves its region; [`FixedPool::take()`] does the same
//!   through a reference, leaving an empty pool behind.
//! - **Uniform failure reporting**: Exhaustion, invalid requests and allocation failure are all
//!   reported as an [`Error`] so containers can treat them uniformly.
//!
//! # Example
//!
//! ```rust
//! use fixed_pool::FixedPool;
//!
//! let mut pool = FixedPool::<u64, 3>::new().unwrap();
//!
//! let a = pool.construct(10).unwrap();
//! let b = pool.construct(20).unwrap();
//!
//! // SAFETY: Both items are initialized and not exclusively referenced.
//! unsafe {
//!     assert_eq!(*a.as_ref() + *b.as_ref(), 30);
//! }
//!
//! // SAFETY: Both items were constructed above and are not used after this.
//! unsafe {
//!     pool.destroy(b);
//!     pool.destroy(a);
//! }
//!
//! // Storage is reused in stack order.
//! assert_eq!(pool.allocate(1).unwrap(), a);
//! ```
//!
//! # Thread safety
//!
//! The pool is a single-threaded data structure. It can be moved to another thread if `T` can
//! but cannot be shared between threads. Wrap it in a mutex if you need to share it.

mod builder;
mod drop_policy;
mod error;
mod free_list;
mod pool;
mod region;
mod slot;

pub use builder::*;
pub use drop_policy::*;
pub use error::Error;
pub(crate) use error::Result;
pub(crate) use free_list::*;
pub use pool::FixedPool;
pub(crate) use region::*;
pub(crate) use slot::*;
