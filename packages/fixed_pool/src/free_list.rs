use std::any::type_name;
use std::iter;
use std::ptr::NonNull;

use crate::{Region, Result, Slot};

/// Tracks which slots of a region are free by threading a singly-linked list through them.
///
/// The links are stored inside the free slots themselves, so the tracker needs no memory of its
/// own beyond the head index. Think of this as a stack of the most recently released slots:
/// acquiring pops the head, releasing pushes a new head.
///
/// This is the only type that reads or writes the link half of the slot overlay.
#[derive(Debug)]
pub(crate) struct FreeList<T, const CAPACITY: usize> {
    region: Region<T, CAPACITY>,

    /// Index of the slot the next acquire will hand out. Equal to `CAPACITY` when no slot is free.
    next_free_index: usize,

    /// Number of slots currently handed out. Not needed for the chain itself but lets callers
    /// answer "how many" and "is anything still out there" without walking the chain.
    live_count: usize,
}

impl<T, const CAPACITY: usize> FreeList<T, CAPACITY> {
    /// Creates a new region with every slot free, chained in ascending index order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] if the region cannot be allocated.
    pub(crate) fn new() -> Result<Self> {
        let region = Region::<T, CAPACITY>::create()?;

        for index in 0..CAPACITY {
            // For the last slot, this points out of bounds, which terminates the chain.
            let next_free_index = index
                .checked_add(1)
                .expect("guarded by CAPACITY < usize::MAX in region ctor");

            // SAFETY: The slot pointer is in bounds of a live region and valid for writes.
            unsafe {
                Slot::write_link(region.slot_ptr(index), next_free_index);
            }
        }

        Ok(Self {
            region,
            next_free_index: 0,
            live_count: 0,
        })
    }

    /// Creates a new region whose free chain has the same shape as that of `source`: the same
    /// slot indexes are free and they are linked in the same order.
    ///
    /// The slots that are live in `source` are counted as live in the result but their contents
    /// are left uninitialized. Filling them in is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] if the region cannot be allocated.
    pub(crate) fn with_chain_of(source: &Self) -> Result<Self> {
        let region = Region::<T, CAPACITY>::create()?;

        let mut free_indexes = source.free_indexes().peekable();
        let next_free_index = free_indexes.peek().copied().unwrap_or(CAPACITY);

        while let Some(index) = free_indexes.next() {
            let next = free_indexes.peek().copied().unwrap_or(CAPACITY);

            // SAFETY: The index came from a well-formed chain of the same capacity, so it is in
            // bounds, and the slot pointer of a live region is valid for writes.
            unsafe {
                Slot::write_link(region.slot_ptr(index), next);
            }
        }

        Ok(Self {
            region,
            next_free_index,
            live_count: source.live_count,
        })
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.next_free_index >= CAPACITY
    }

    /// Pops the head of the free chain, returning the index of the slot that is now live.
    ///
    /// Returns `None` if no slot is free.
    #[must_use]
    pub(crate) fn acquire(&mut self) -> Option<usize> {
        #[cfg(debug_assertions)]
        self.integrity_check();

        if self.is_full() {
            return None;
        }

        let index = self.next_free_index;

        // SAFETY: The head of the chain is in bounds (checked above) and is a free slot,
        // so its link is the active half of the overlay.
        self.next_free_index = unsafe { Slot::read_link(self.region.slot_ptr(index)) };

        self.live_count = self
            .live_count
            .checked_add(1)
            .expect("guarded by chain holding at most CAPACITY slots");

        Some(index)
    }

    /// Pushes a slot onto the free chain as its new head.
    ///
    /// Whatever element is still stored in the slot is overwritten without being dropped.
    ///
    /// # Safety
    ///
    /// The index must belong to a slot that is currently live, i.e. it was returned by
    /// [`acquire()`][Self::acquire] on this same instance and has not been released since.
    /// Releasing a free slot corrupts the chain.
    pub(crate) unsafe fn release(&mut self, index: usize) {
        debug_assert!(
            !self.is_free(index),
            "slot {index} released while already free in pool of {}",
            type_name::<T>()
        );

        // SAFETY: The slot pointer is in bounds (`slot_ptr()` asserts it) and valid for writes.
        unsafe {
            Slot::write_link(self.region.slot_ptr(index), self.next_free_index);
        }

        self.next_free_index = index;

        self.live_count = self.live_count.checked_sub(1).unwrap_or_else(|| {
            panic!(
                "slot {index} released with no live slots in pool of {}",
                type_name::<T>()
            )
        });
    }

    /// Whether the slot at `index` is currently on the free chain.
    ///
    /// This walks the chain, so it takes time proportional to the number of free slots.
    #[must_use]
    pub(crate) fn is_free(&self, index: usize) -> bool {
        self.free_indexes().any(|free_index| free_index == index)
    }

    /// Iterates over the indexes of the free slots in chain order, starting from the head.
    pub(crate) fn free_indexes(&self) -> impl Iterator<Item = usize> {
        let mut current = self.next_free_index;

        iter::from_fn(move || {
            if current >= CAPACITY {
                return None;
            }

            let index = current;

            // SAFETY: The index is in bounds (checked above) and reachable from the head,
            // so the slot is free and its link is the active half of the overlay.
            current = unsafe { Slot::read_link(self.region.slot_ptr(index)) };

            Some(index)
        })
        // A corrupted chain may contain a cycle. Never walk more slots than exist.
        .take(CAPACITY)
    }

    #[must_use]
    pub(crate) fn element_ptr(&self, index: usize) -> NonNull<T> {
        self.region.element_ptr(index)
    }

    #[must_use]
    pub(crate) fn index_of(&self, element: NonNull<T>) -> Option<usize> {
        self.region.index_of(element)
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let mut observed_is_free = [false; CAPACITY];
        let mut observed_free_count: usize = 0;
        let mut current = self.next_free_index;

        while current < CAPACITY {
            let seen = observed_is_free
                .get_mut(current)
                .expect("guarded by loop condition");

            assert!(
                !*seen,
                "free chain visits slot {current} twice in pool of {}",
                type_name::<T>()
            );

            *seen = true;
            observed_free_count = observed_free_count
                .checked_add(1)
                .expect("guarded by cycle check above");

            // SAFETY: The index is in bounds (loop condition) and reachable from the head.
            current = unsafe { Slot::read_link(self.region.slot_ptr(current)) };
        }

        assert!(
            current == CAPACITY,
            "free chain terminates with out of bounds link {current} instead of {CAPACITY} in pool of {}",
            type_name::<T>()
        );

        assert!(
            observed_free_count.checked_add(self.live_count) == Some(CAPACITY),
            "free slot count {observed_free_count} plus live slot count {} does not match capacity {CAPACITY} in pool of {}",
            self.live_count,
            type_name::<T>()
        );
    }
}
