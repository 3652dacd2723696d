//! Region-tagged containers.
//!
//! The region-tagged allocator is exposed to ordinary kernel code as
//! `RegionBox<T>`: a `Box`-like smart pointer whose backing storage is
//! drawn from a named `RegionTag`'s buddy allocator instead of the
//! general kernel heap (`heap.rs`). Used for data that must live in a
//! specific physical region - e.g. DMA-visible buffers in `BulkSRAM`, or
//! core-local scratch in `TightlyCoupledData`.

use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use crate::lib::error::Errno;
use crate::mm::region::{self, RegionHandle, RegionTag};

pub struct RegionBox<T> {
    ptr: NonNull<T>,
    _handle: RegionHandle,
}

impl<T> RegionBox<T> {
    pub fn new_in(tag: RegionTag, value: T) -> Result<Self, Errno> {
        let size = core::mem::size_of::<T>().max(1);
        let handle = region::allocate(tag, size)?;
        let align = core::mem::align_of::<T>();
        if handle.base % align != 0 {
            return Err(Errno::EFAULT);
        }
        let raw = handle.base as *mut MaybeUninit<T>;
        unsafe {
            raw.write(MaybeUninit::new(value));
        }
        Ok(Self {
            ptr: unsafe { NonNull::new_unchecked(raw as *mut T) },
            _handle: handle,
        })
    }

    pub fn tag(&self) -> RegionTag {
        self._handle.tag
    }
}

impl<T> Deref for RegionBox<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for RegionBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for RegionBox<T> {
    fn drop(&mut self) {
        unsafe {
            core::ptr::drop_in_place(self.ptr.as_ptr());
        }
        // `_handle`'s own Drop releases the backing buddy block.
    }
}

unsafe impl<T: Send> Send for RegionBox<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_value() {
        region::init();
        let mut b = RegionBox::new_in(RegionTag::BulkSRAM, 42u32).unwrap();
        assert_eq!(*b, 42);
        *b = 7;
        assert_eq!(*b, 7);
    }
}
