use std::alloc::{Layout, alloc, dealloc};
use std::any::type_name;
use std::ptr::NonNull;

use num_integer::Integer;
use tracing::debug;

use crate::{Error, Result, Slot};

/// One contiguous, correctly aligned block of memory holding exactly `CAPACITY` slots.
///
/// The region is obtained from the system allocator when created and returned to it when
/// dropped. It never inspects or drops the contents of its slots. That is up to the owner.
///
/// Slots are identified by their index in the region. Raw addresses are converted to and from
/// indexes only here, at the region boundary.
#[derive(Debug)]
pub(crate) struct Region<T, const CAPACITY: usize> {
    first_slot_ptr: NonNull<Slot<T>>,
}

impl<T, const CAPACITY: usize> Region<T, CAPACITY> {
    /// Allocates a new region. The contents of all slots are uninitialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the system allocator cannot satisfy the request or if
    /// the size of the region overflows. This is not retried.
    pub(crate) fn create() -> Result<Self> {
        const {
            assert!(CAPACITY > 0, "a fixed pool must have non-zero capacity");
            assert!(
                CAPACITY < usize::MAX,
                "a fixed pool capacity must be less than usize::MAX"
            );
        }

        let layout = Self::layout().ok_or_else(Self::out_of_memory)?;

        // SAFETY: The layout is not zero-sized because CAPACITY is non-zero (asserted above)
        // and every slot is at least large enough to hold a link.
        let ptr = unsafe { alloc(layout) };

        let first_slot_ptr = NonNull::new(ptr.cast::<Slot<T>>()).ok_or_else(Self::out_of_memory)?;

        debug!(
            item_type = type_name::<T>(),
            capacity = CAPACITY,
            stride = Slot::<T>::STRIDE,
            align = Slot::<T>::ALIGN,
            bytes = layout.size(),
            "created pool region"
        );

        Ok(Self { first_slot_ptr })
    }

    fn layout() -> Option<Layout> {
        Layout::array::<Slot<T>>(CAPACITY).ok()
    }

    fn out_of_memory() -> Error {
        Error::OutOfMemory {
            item_type: type_name::<T>(),
            capacity: CAPACITY,
        }
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<Slot<T>> {
        assert!(
            index < CAPACITY,
            "slot {index} index out of bounds in pool of {}",
            type_name::<T>()
        );

        // SAFETY: Guarded by bounds check above, so the result is within the allocation.
        unsafe { self.first_slot_ptr.add(index) }
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn element_ptr(&self, index: usize) -> NonNull<T> {
        Slot::element_ptr(self.slot_ptr(index))
    }

    /// Maps an element pointer back to the index of its slot.
    ///
    /// Returns `None` if the pointer does not point to the start of a slot in this region.
    /// This only compares addresses and never dereferences the pointer.
    #[must_use]
    pub(crate) fn index_of(&self, element: NonNull<T>) -> Option<usize> {
        let offset = element
            .as_ptr()
            .addr()
            .checked_sub(self.first_slot_ptr.as_ptr().addr())?;

        let (index, remainder) = offset.div_rem(&Slot::<T>::STRIDE);

        (remainder == 0 && index < CAPACITY).then_some(index)
    }
}

impl<T, const CAPACITY: usize> Drop for Region<T, CAPACITY> {
    fn drop(&mut self) {
        let layout = Self::layout()
            .expect("layout was successfully calculated when the region was created");

        // SAFETY: The layout must match between alloc and dealloc. It does. The region is only
        // ever dropped once because it has a single owner.
        unsafe {
            dealloc(self.first_slot_ptr.as_ptr().cast(), layout);
        }

        debug!(
            item_type = type_name::<T>(),
            capacity = CAPACITY,
            "released pool region"
        );
    }
}

// SAFETY: Yes, there are raw pointers involved here but nothing inherently non-thread-mobile
// about it, so as long as T itself can move between threads, the region can do so, too.
unsafe impl<T: Send, const CAPACITY: usize> Send for Region<T, CAPACITY> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn slots_are_contiguous_and_aligned() {
        let region = Region::<u16, 4>::create().unwrap();

        let first = region.element_ptr(0).as_ptr().addr();

        for index in 0..4 {
            let addr = region.element_ptr(index).as_ptr().addr();

            assert_eq!(addr - first, index * Slot::<u16>::STRIDE);
            assert_eq!(addr % align_of::<u16>(), 0);
        }
    }

    #[test]
    fn index_of_inverts_element_ptr() {
        let region = Region::<String, 5>::create().unwrap();

        for index in 0..5 {
            assert_eq!(region.index_of(region.element_ptr(index)), Some(index));
        }
    }

    #[test]
    fn over_aligned_items_are_aligned() {
        #[repr(align(128))]
        struct Aligned {
            _value: u8,
        }

        let region = Region::<Aligned, 3>::create().unwrap();

        for index in 0..3 {
            assert_eq!(region.element_ptr(index).as_ptr().addr() % 128, 0);
        }
    }

    #[test]
    #[should_panic]
    fn oob_slot_panics() {
        let region = Region::<u32, 3>::create().unwrap();
        _ = region.slot_ptr(3);
    }

    #[test]
    fn foreign_pointer_has_no_index() {
        let region = Region::<u64, 3>::create().unwrap();
        let mut outsider = 0_u64;

        assert_eq!(region.index_of(NonNull::from(&mut outsider)), None);
    }

    #[test]
    fn misaligned_pointer_has_no_index() {
        let region = Region::<u64, 3>::create().unwrap();

        let inside = region
            .element_ptr(1)
            .cast::<u8>()
            .as_ptr()
            .wrapping_add(1)
            .cast::<u64>();

        assert_eq!(region.index_of(NonNull::new(inside).unwrap()), None);
    }

    #[test]
    fn pointer_past_end_has_no_index() {
        let region = Region::<u64, 3>::create().unwrap();

        let past_end = region
            .element_ptr(2)
            .as_ptr()
            .wrapping_byte_add(Slot::<u64>::STRIDE);

        assert_eq!(region.index_of(NonNull::new(past_end).unwrap()), None);
    }

    #[test]
    fn size_overflow_is_out_of_memory() {
        let result = Region::<[u8; 1 << 20], { usize::MAX >> 8 }>::create();

        assert!(matches!(result, Err(Error::OutOfMemory { .. })));
    }
}
