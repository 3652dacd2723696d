//! Writer-preferred reader/writer lock: a single-writer slot, a count of
//! concurrent readers, and a shared wait list. Writer-preferred: once a
//! writer is waiting, new readers queue behind it rather than starving
//! the writer.

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::lib::error::Errno;
use crate::sched::thread::{BlockReason, ThreadId};
use crate::sync::spinlock::Spinlock;

struct RwState {
    writer: Option<ThreadId>,
    readers: Vec<ThreadId>,
    writer_waiting: bool,
    waiting: Vec<ThreadId>,
}

pub struct RwLock<T: ?Sized> {
    state: Spinlock<RwState>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            state: Spinlock::new(RwState {
                writer: None,
                readers: Vec::new(),
                writer_waiting: false,
                waiting: Vec::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> RwLock<T> {
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let me = crate::sched::scheduler::current_thread_id();
        loop {
            {
                let mut st = self.state.lock();
                if st.writer.is_none() && !st.writer_waiting {
                    st.readers.push(me);
                    return RwLockReadGuard { lock: self };
                }
                if !st.waiting.contains(&me) {
                    st.waiting.push(me);
                }
            }
            crate::sched::scheduler::block_current(BlockReason::RwLock);
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let me = crate::sched::scheduler::current_thread_id();
        loop {
            {
                let mut st = self.state.lock();
                if st.writer.is_none() && st.readers.is_empty() {
                    st.writer = Some(me);
                    st.writer_waiting = false;
                    return RwLockWriteGuard { lock: self };
                }
                st.writer_waiting = true;
                if !st.waiting.contains(&me) {
                    st.waiting.push(me);
                }
            }
            crate::sched::scheduler::block_current(BlockReason::RwLock);
        }
    }

    pub fn try_read(&self) -> Result<RwLockReadGuard<'_, T>, Errno> {
        let me = crate::sched::scheduler::current_thread_id();
        let mut st = self.state.lock();
        if st.writer.is_none() && !st.writer_waiting {
            st.readers.push(me);
            Ok(RwLockReadGuard { lock: self })
        } else {
            Err(Errno::EBUSY)
        }
    }

    fn unlock_read(&self) {
        let me = crate::sched::scheduler::current_thread_id();
        let mut st = self.state.lock();
        st.readers.retain(|&t| t != me);
        if st.readers.is_empty() {
            let waiters = core::mem::take(&mut st.waiting);
            st.writer_waiting = false;
            drop(st);
            for w in waiters {
                crate::sched::scheduler::unblock(w);
            }
        }
    }

    fn unlock_write(&self) {
        let mut st = self.state.lock();
        st.writer = None;
        let waiters = core::mem::take(&mut st.waiting);
        drop(st);
        for w in waiters {
            crate::sched::scheduler::unblock(w);
        }
    }
}

pub struct RwLockReadGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<'a, T: ?Sized> Deref for RwLockReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for RwLockReadGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct RwLockWriteGuard<'a, T: ?Sized> {
    lock: &'a RwLock<T>,
}

impl<'a, T: ?Sized> Deref for RwLockWriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for RwLockWriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for RwLockWriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_readers() {
        let l = RwLock::new(42);
        let r1 = l.read();
        let r2 = l.try_read();
        assert!(r2.is_ok());
        assert_eq!(*r1, 42);
    }
}
