use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// One storage cell of a region.
///
/// A slot either holds an element (it is handed out to a client) or the index of the next free
/// slot (it is on the free chain). Which of the two is not recorded anywhere in the slot itself:
/// a slot is free exactly when it is reachable from the head of the free chain.
///
/// The element lives at offset zero, so a pointer to a slot is also a pointer to its element.
#[repr(C)]
pub(crate) union Slot<T> {
    value: ManuallyDrop<T>,
    next_free_index: usize,
}

impl<T> Slot<T> {
    /// Distance in bytes between the starts of two adjacent slots in a region.
    ///
    /// This is the size of the overlay rounded up to its alignment, which is at least the
    /// alignment of `T`, so every slot in a region is correctly aligned for `T`.
    pub(crate) const STRIDE: usize = size_of::<Self>();

    /// Alignment of every slot and therefore of the region as a whole.
    pub(crate) const ALIGN: usize = align_of::<Self>();

    /// Pointer to the storage for the element in a slot. The storage may be uninitialized.
    pub(crate) fn element_ptr(slot: NonNull<Self>) -> NonNull<T> {
        // SAFETY: Only computes a field address, no read happens.
        let value = unsafe { &raw mut (*slot.as_ptr()).value };

        // `ManuallyDrop<T>` is `repr(transparent)` over `T`.
        // SAFETY: The field is at offset zero of a non-null pointer, so it is non-null as well.
        unsafe { NonNull::new_unchecked(value.cast::<T>()) }
    }

    /// Reads the free-chain link stored in a free slot.
    ///
    /// # Safety
    ///
    /// The slot must be valid for reads and must currently be free, meaning its link was
    /// written by [`write_link()`][Self::write_link] and has not been overwritten by an element.
    pub(crate) unsafe fn read_link(slot: NonNull<Self>) -> usize {
        // SAFETY: Validity and the link being the active field are forwarded from the caller.
        // Reading a `Copy` union field through a place expression creates no reference.
        unsafe { (*slot.as_ptr()).next_free_index }
    }

    /// Turns a slot into a free slot that links to the slot at `next_free_index`.
    ///
    /// Any element previously stored in the slot is overwritten without being dropped.
    ///
    /// # Safety
    ///
    /// The slot must be valid for writes.
    pub(crate) unsafe fn write_link(slot: NonNull<Self>, next_free_index: usize) {
        // SAFETY: Validity is forwarded from the caller. Assigning a `Copy` union field
        // does not read or drop the previous contents.
        unsafe {
            (*slot.as_ptr()).next_free_index = next_free_index;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::mem::MaybeUninit;

    use super::*;

    #[repr(align(64))]
    struct CacheLine {
        _bytes: [u8; 64],
    }

    #[test]
    fn stride_fits_both_states() {
        assert!(Slot::<u8>::STRIDE >= size_of::<usize>());
        assert!(Slot::<[u64; 8]>::STRIDE >= size_of::<[u64; 8]>());
        assert!(Slot::<()>::STRIDE >= size_of::<usize>());
    }

    #[test]
    fn stride_is_multiple_of_item_alignment() {
        assert_eq!(Slot::<CacheLine>::STRIDE % align_of::<CacheLine>(), 0);
        assert_eq!(Slot::<u16>::STRIDE % align_of::<u16>(), 0);
        assert_eq!(Slot::<u128>::STRIDE % align_of::<u128>(), 0);
        assert!(Slot::<CacheLine>::ALIGN >= align_of::<CacheLine>());
    }

    #[test]
    fn link_round_trips_through_slot() {
        let mut storage = MaybeUninit::<Slot<String>>::uninit();
        let slot = NonNull::from(&mut storage).cast::<Slot<String>>();

        // SAFETY: The slot points to local storage of the right type and size.
        unsafe {
            Slot::write_link(slot, 7);
        }

        // SAFETY: We just wrote the link.
        assert_eq!(unsafe { Slot::read_link(slot) }, 7);
    }
}
