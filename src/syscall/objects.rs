//! Per-process kernel object table.
//!
//! Userspace addresses a mutex or semaphore by a small integer handle
//! rather than a pointer; the table maps that handle to an `Arc` of this
//! crate's own `sync::Mutex`/`sync::CountingSemaphore`, so a syscall's
//! first argument is always a lookup key, never a raw pointer into
//! kernel memory.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::lib::error::Errno;
use crate::sync::mutex::Mutex as KMutex;
use crate::sync::sem::CountingSemaphore;

pub enum KernelObject {
    Mutex(KMutex<()>),
    Semaphore(CountingSemaphore),
}

pub type Handle = i32;

#[derive(Default)]
pub struct ObjectTable {
    slots: Vec<Option<Arc<KernelObject>>>,
}

impl ObjectTable {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn insert(&mut self, obj: KernelObject) -> Handle {
        let arc = Arc::new(obj);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(arc);
                return i as Handle;
            }
        }
        self.slots.push(Some(arc));
        (self.slots.len() - 1) as Handle
    }

    pub fn get(&self, handle: Handle) -> Result<Arc<KernelObject>, Errno> {
        if handle < 0 {
            return Err(Errno::EINVAL);
        }
        self.slots
            .get(handle as usize)
            .and_then(|s| s.clone())
            .ok_or(Errno::EINVAL)
    }

    pub fn remove(&mut self, handle: Handle) -> Result<(), Errno> {
        if handle < 0 {
            return Err(Errno::EINVAL);
        }
        let slot = self.slots.get_mut(handle as usize).ok_or(Errno::EINVAL)?;
        if slot.take().is_none() {
            return Err(Errno::EINVAL);
        }
        Ok(())
    }
}
