use std::any::type_name;
use std::ptr::NonNull;
use std::{fmt, mem, ptr, thread};

use scopeguard::ScopeGuard;
use tracing::{debug, trace};

use crate::{DropPolicy, Error, FixedPoolBuilder, FreeList, Result};

/// A fixed-capacity pool that hands out storage for one `T` at a time.
///
/// The pool owns a single region of memory with room for exactly `CAPACITY` elements, obtained
/// once when the pool is created. Requesting storage via [`allocate()`][1] and returning it via
/// [`deallocate()`][2] take constant time and never touch the system allocator. Storage is
/// reused in stack order: the most recently returned slot is the next one handed out.
///
/// The pool is meant as the storage layer of a container that needs one element's storage at a
/// time, such as a linked list. The pool does not know which of the handed-out slots have been
/// initialized, so it never reads or drops elements on its own. Initializing, reading and
/// dropping the elements is the responsibility of whoever obtained the storage. The
/// [`construct()`][3] and [`destroy()`][4] methods combine both steps for convenience.
///
/// # Value semantics
///
/// * Moving a pool (including by plain assignment) moves ownership of the region, without
///   touching any element. Pointers obtained from the pool remain valid.
/// * [`take()`][5] moves the region out of a pool that you only have a reference to, leaving
///   behind an empty pool that owns no region and fails every request for storage.
/// * [`try_clone()`][6] creates an independent pool with its own region in which every live
///   slot holds a clone of the element at the same position in the original, and in which the
///   same slots are free, in the same reuse order.
///
/// # Identity
///
/// Two pools compare equal only if they are the same instance. Storage obtained from one pool
/// must never be returned to another.
///
/// # Thread safety
///
/// The pool can be moved to another thread if `T` can, but it cannot be shared between threads.
///
/// # Example
///
/// ```rust
/// use fixed_pool::FixedPool;
///
/// let mut pool = FixedPool::<u64, 2>::new().unwrap();
///
/// let a = pool.construct(1).unwrap();
/// let b = pool.construct(2).unwrap();
///
/// // The pool holds exactly two items.
/// assert!(pool.allocate(1).unwrap_err().is_exhausted());
///
/// // SAFETY: Both items were constructed above and are not used after this.
/// unsafe {
///     pool.destroy(a);
///     pool.destroy(b);
/// }
///
/// assert!(pool.is_empty());
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::deallocate
/// [3]: Self::construct
/// [4]: Self::destroy
/// [5]: Self::take
/// [6]: Self::try_clone
pub struct FixedPool<T, const CAPACITY: usize> {
    /// The region and its free chain. `None` once the contents have been moved out via
    /// `take()`, in which case the pool is empty and owns no memory.
    slots: Option<FreeList<T, CAPACITY>>,

    drop_policy: DropPolicy,
}

impl<T, const CAPACITY: usize> FixedPool<T, CAPACITY> {
    pub(crate) fn new_inner(drop_policy: DropPolicy) -> Result<Self> {
        Ok(Self {
            slots: Some(FreeList::new()?),
            drop_policy,
        })
    }

    /// Creates a new [`FixedPool`] with the default configuration.
    ///
    /// The region for all `CAPACITY` elements is allocated immediately.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let pool = FixedPool::<String, 16>::new().unwrap();
    ///
    /// assert_eq!(pool.capacity(), 16);
    /// assert!(pool.is_empty());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the region cannot be allocated.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Starts building a new [`FixedPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u32, 8>::builder()
    ///     .drop_policy(DropPolicy::MustNotLeakItems)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(pool.is_empty());
    /// ```
    pub fn builder() -> FixedPoolBuilder<T, CAPACITY> {
        FixedPoolBuilder::new()
    }

    /// The number of elements the pool can hold at the same time.
    ///
    /// This is fixed by the type and does not change, not even if the pool is empty because
    /// its contents were moved out via [`take()`][Self::take].
    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// The number of slots currently handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.as_ref().map_or(0, FreeList::len)
    }

    /// Whether no slots are currently handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the next request for storage will fail because no slot is free.
    ///
    /// This is always the case for a pool whose contents were moved out.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.as_ref().is_none_or(FreeList::is_full)
    }

    /// Whether the pool owns a region.
    ///
    /// This is `false` only after the contents of the pool were moved out via
    /// [`take()`][Self::take].
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u32, 4>::new().unwrap();
    /// assert!(pool.is_valid());
    ///
    /// let moved = pool.take();
    /// assert!(moved.is_valid());
    /// assert!(!pool.is_valid());
    /// ```
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.slots.is_some()
    }

    /// The index of the slot that `ptr` points to, if it points to the start of a slot in the
    /// region of this pool.
    ///
    /// Slot indexes are stable for the lifetime of the region and are preserved by
    /// [`try_clone()`][Self::try_clone], so they can be used to find the clone of an element.
    ///
    /// This only compares addresses and never dereferences `ptr`.
    #[must_use]
    pub fn slot_index(&self, ptr: NonNull<T>) -> Option<usize> {
        self.slots.as_ref()?.index_of(ptr)
    }

    /// Pointer to the storage of the slot at `index`, whether the slot is handed out or not.
    ///
    /// Returns `None` if the index is out of bounds or the pool owns no region. The storage
    /// only holds a valid `T` if the slot is handed out and its holder has initialized it.
    #[must_use]
    pub fn slot_ptr(&self, index: usize) -> Option<NonNull<T>> {
        if index >= CAPACITY {
            return None;
        }

        Some(self.slots.as_ref()?.element_ptr(index))
    }

    /// Hands out uninitialized storage for one `T`.
    ///
    /// The storage is correctly aligned for `T` and remains valid until it is returned via
    /// [`deallocate()`][Self::deallocate] or the region is released (the pool, or whichever
    /// pool it was moved to, is dropped).
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidCount`] if `count` is anything other than 1.
    /// * [`Error::PoolExhausted`] if every slot is already handed out or the pool owns no region.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u32, 4>::new().unwrap();
    ///
    /// let ptr = pool.allocate(1).unwrap();
    ///
    /// // SAFETY: The storage is valid for writes of one u32.
    /// unsafe { ptr.write(42) };
    ///
    /// // SAFETY: We just initialized it.
    /// assert_eq!(unsafe { ptr.read() }, 42);
    ///
    /// // SAFETY: The pointer came from this pool and is returned only once.
    /// unsafe { pool.deallocate(ptr.as_ptr(), 1) };
    /// ```
    pub fn allocate(&mut self, count: usize) -> Result<NonNull<T>> {
        if count != 1 {
            trace!(
                item_type = type_name::<T>(),
                count, "rejected request for other than one slot"
            );

            return Err(Error::InvalidCount { count });
        }

        let Some(slots) = self.slots.as_mut() else {
            return Err(Self::exhausted());
        };

        let Some(index) = slots.acquire() else {
            return Err(Self::exhausted());
        };

        Ok(slots.element_ptr(index))
    }

    #[cfg_attr(test, mutants::skip)] // Only adds logging to the error construction.
    fn exhausted() -> Error {
        trace!(
            item_type = type_name::<T>(),
            capacity = CAPACITY,
            "pool exhausted"
        );

        Error::PoolExhausted {
            item_type: type_name::<T>(),
            capacity: CAPACITY,
        }
    }

    /// Returns storage obtained from [`allocate()`][Self::allocate] to the pool, making it the
    /// next slot to be handed out.
    ///
    /// Any element still stored there is overwritten without being dropped. Drop it first if
    /// it needs dropping.
    ///
    /// Does nothing if `ptr` is null, if `count` is anything other than 1, or if the pool owns
    /// no region.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have been returned by [`allocate()`][Self::allocate] on this same
    /// pool instance (or on the pool its region was moved from) and must not have been returned
    /// since. Returning foreign or already-returned storage corrupts the pool.
    ///
    /// In debug builds, some violations of this contract are detected and cause a panic.
    pub unsafe fn deallocate(&mut self, ptr: *mut T, count: usize) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };

        if count != 1 {
            return;
        }

        let Some(slots) = self.slots.as_mut() else {
            return;
        };

        let index = slots.index_of(ptr);

        debug_assert!(
            index.is_some(),
            "pointer {ptr:?} returned to a pool of {} that did not hand it out",
            type_name::<T>()
        );

        let Some(index) = index else {
            return;
        };

        // SAFETY: The caller guarantees the pointer was handed out by this region and has not
        // been returned since, so the slot is live.
        unsafe {
            slots.release(index);
        }
    }

    /// Moves `value` into newly allocated storage and returns a pointer to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is already handed out or the pool owns no
    /// region. The value is dropped in that case.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<String, 4>::new().unwrap();
    ///
    /// let greeting = pool.construct("Hello".to_string()).unwrap();
    ///
    /// // SAFETY: The item is initialized and no exclusive reference to it exists.
    /// assert_eq!(unsafe { greeting.as_ref() }, "Hello");
    ///
    /// // SAFETY: The item was constructed above and is not used after this.
    /// unsafe { pool.destroy(greeting) };
    /// ```
    pub fn construct(&mut self, value: T) -> Result<NonNull<T>> {
        let ptr = self.allocate(1)?;

        // SAFETY: Freshly allocated storage is valid for writes and aligned for T.
        unsafe {
            ptr.write(value);
        }

        Ok(ptr)
    }

    /// Drops the element at `ptr` in place and returns its storage to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate()`][Self::allocate] or
    /// [`construct()`][Self::construct] on this same pool, must not have been returned since
    /// and must hold an initialized `T` that is not referenced anywhere else.
    pub unsafe fn destroy(&mut self, ptr: NonNull<T>) {
        // SAFETY: The caller guarantees the storage holds an initialized, unaliased T.
        unsafe {
            ptr.drop_in_place();
        }

        // SAFETY: Forwarding guarantees from the caller.
        unsafe {
            self.deallocate(ptr.as_ptr(), 1);
        }
    }

    /// Moves the region out of this pool into a new pool, leaving this one empty.
    ///
    /// No element is touched and pointers obtained from this pool remain valid, now belonging
    /// to the returned pool. The pool left behind owns no region: it reports itself as
    /// invalid and fails every request for storage, and dropping it does nothing.
    ///
    /// Plain Rust moves and assignments already transfer ownership. This method exists for
    /// when you only hold an exclusive reference to the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut original = FixedPool::<u32, 4>::new().unwrap();
    /// let item = original.construct(5).unwrap();
    ///
    /// let mut moved = original.take();
    ///
    /// assert!(original.allocate(1).is_err());
    /// assert_eq!(moved.len(), 1);
    ///
    /// // SAFETY: The item now belongs to the pool the region moved to.
    /// unsafe { moved.destroy(item) };
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        debug!(
            item_type = type_name::<T>(),
            capacity = CAPACITY,
            live = self.len(),
            "moving pool region to new owner"
        );

        Self {
            slots: self.slots.take(),
            drop_policy: self.drop_policy,
        }
    }

    /// Exchanges the regions (and configuration) of two pools. No element is touched.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Creates an independent copy of the pool.
    ///
    /// The copy has its own region. For every slot that is handed out in this pool, the slot at
    /// the same position in the copy holds a clone of the element. The same slots are free in
    /// both pools and they will be handed out in the same order.
    ///
    /// Copying an empty (moved-from) pool produces another empty pool.
    ///
    /// The copy takes time proportional to the square of the capacity, plus the cost of
    /// cloning the live elements.
    ///
    /// If cloning an element panics, the clones made so far are dropped and the new region is
    /// released before the panic continues.
    ///
    /// # Safety
    ///
    /// Every slot currently handed out by this pool must hold an initialized `T` and no
    /// exclusive reference to any of these elements may exist during the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the region for the copy cannot be allocated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut original = FixedPool::<String, 4>::new().unwrap();
    /// let item = original.construct("first".to_string()).unwrap();
    ///
    /// // SAFETY: The only live slot holds an initialized String.
    /// let mut copy = unsafe { original.try_clone() }.unwrap();
    ///
    /// assert_eq!(copy.len(), 1);
    ///
    /// // The clone is in the slot with the same index as the original item.
    /// let index = original.slot_index(item).unwrap();
    /// let cloned = copy.slot_ptr(index).unwrap();
    ///
    /// // SAFETY: The slot in the copy holds the clone and no exclusive reference to it exists.
    /// assert_eq!(unsafe { cloned.as_ref() }, "first");
    ///
    /// // SAFETY: Each item lives in its own pool and is not used after this.
    /// unsafe {
    ///     copy.destroy(cloned);
    ///     original.destroy(item);
    /// }
    /// ```
    pub unsafe fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        let Some(source) = self.slots.as_ref() else {
            return Ok(Self {
                slots: None,
                drop_policy: self.drop_policy,
            });
        };

        let destination = FreeList::with_chain_of(source)?;

        // If a clone panics, we drop the clones made so far. The region itself is released
        // when the destination is dropped at the end of the closure.
        let mut cloning = scopeguard::guard(
            (destination, 0_usize),
            |(destination, cloned_below_index)| {
                for index in 0..cloned_below_index {
                    if source.is_free(index) {
                        continue;
                    }

                    // SAFETY: Every live slot below this index was initialized by the loop below.
                    unsafe {
                        destination.element_ptr(index).drop_in_place();
                    }
                }
            },
        );

        for index in 0..CAPACITY {
            if !source.is_free(index) {
                // SAFETY: The caller guarantees every live slot holds an initialized T that is not
                // exclusively referenced anywhere.
                let original = unsafe { source.element_ptr(index).as_ref() };
                let clone = original.clone();

                // SAFETY: The slot is live in the destination and its storage is valid for writes.
                unsafe {
                    cloning.0.element_ptr(index).write(clone);
                }
            }

            cloning.1 = index
                .checked_add(1)
                .expect("guarded by CAPACITY < usize::MAX in region ctor");
        }

        let (destination, _) = ScopeGuard::into_inner(cloning);

        debug!(
            item_type = type_name::<T>(),
            capacity = CAPACITY,
            live = destination.len(),
            "cloned pool"
        );

        Ok(Self {
            slots: Some(destination),
            drop_policy: self.drop_policy,
        })
    }

    /// Replaces the contents of this pool with a copy of `source`, as if by
    /// [`try_clone()`][Self::try_clone].
    ///
    /// The previous region of this pool is released. Elements still stored in it are not
    /// dropped. If the copy fails, this pool is left unchanged.
    ///
    /// # Safety
    ///
    /// Same as [`try_clone()`][Self::try_clone], applied to `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the region for the copy cannot be allocated.
    pub unsafe fn try_clone_from(&mut self, source: &Self) -> Result<()>
    where
        T: Clone,
    {
        // SAFETY: Forwarding guarantees from the caller.
        let mut copy = unsafe { source.try_clone() }?;

        self.swap(&mut copy);

        // `copy` now holds our previous region, which is released here.
        Ok(())
    }
}

impl<T, const CAPACITY: usize> Drop for FixedPool<T, CAPACITY> {
    fn drop(&mut self) {
        let live = self.len();

        // We release the memory first, so a panic below does not also leak the region.
        drop(self.slots.take());

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotLeakItems && !thread::panicking() {
            assert!(
                live == 0,
                "dropped a pool of {} with {live} slots still handed out with a policy that says all slots must be returned first",
                type_name::<T>()
            );
        }
    }
}

impl<T, const CAPACITY: usize> PartialEq for FixedPool<T, CAPACITY> {
    /// Pools are equal only to themselves. Storage from one pool may not be returned to another.
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl<T, const CAPACITY: usize> Eq for FixedPool<T, CAPACITY> {}

impl<T, const CAPACITY: usize> fmt::Debug for FixedPool<T, CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &CAPACITY)
            .field("len", &self.len())
            .field("is_valid", &self.is_valid())
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}
