//! Recursive, optionally error-checking mutex with priority inheritance.
//!
//! Tracks an owner thread id, a wait list, a recursion count, and an
//! `echeck` flag that turns "unlock by non-owner" into an error instead
//! of undefined behavior. Ownership transfer feeds
//! the scheduler's blocker-chain walk (`sched::scheduler::set_blocking_on`)
//! so a high-priority waiter temporarily boosts the owner.

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::lib::error::Errno;
use crate::sched::thread::{BlockReason, ThreadId};
use crate::sync::spinlock::Spinlock;

struct MutexState {
    owner: Option<ThreadId>,
    lockcount: u32,
    waiting: Vec<ThreadId>,
}

pub struct Mutex<T: ?Sized> {
    recursive: bool,
    error_checking: bool,
    state: Spinlock<MutexState>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Self::with_flags(data, false, true)
    }

    pub const fn new_recursive(data: T) -> Self {
        Self::with_flags(data, true, true)
    }

    pub const fn with_flags(data: T, recursive: bool, error_checking: bool) -> Self {
        Self {
            recursive,
            error_checking,
            state: Spinlock::new(MutexState {
                owner: None,
                lockcount: 0,
                waiting: Vec::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.try_lock_inner(true).expect("lock with blocking cannot fail")
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, Errno> {
        self.try_lock_inner(false)
    }

    fn try_lock_inner(&self, block: bool) -> Result<MutexGuard<'_, T>, Errno> {
        let me = crate::sched::scheduler::current_thread_id();
        loop {
            {
                let mut st = self.state.lock();
                match st.owner {
                    None => {
                        st.owner = Some(me);
                        st.lockcount = 1;
                        return Ok(MutexGuard { mutex: self });
                    }
                    Some(owner) if owner == me && self.recursive => {
                        st.lockcount += 1;
                        return Ok(MutexGuard { mutex: self });
                    }
                    Some(owner) if owner == me && self.error_checking => {
                        return Err(Errno::EDEADLK);
                    }
                    Some(_owner) if !block => {
                        return Err(Errno::EBUSY);
                    }
                    Some(owner) => {
                        if !st.waiting.contains(&me) {
                            st.waiting.push(me);
                        }
                        crate::sched::scheduler::set_blocking_on(me, owner);
                    }
                }
            }
            crate::sched::scheduler::block_current(BlockReason::Mutex);
        }
    }

    /// Release the mutex. Normally called implicitly via `MutexGuard`'s
    /// `Drop`; exposed directly for callers (e.g. a handle-based syscall)
    /// that can't hold a lexically scoped guard across the call boundary.
    pub fn unlock(&self) -> Result<(), Errno> {
        let me = crate::sched::scheduler::current_thread_id();
        let mut st = self.state.lock();
        match st.owner {
            Some(owner) if owner == me => {
                st.lockcount -= 1;
                if st.lockcount > 0 {
                    return Ok(());
                }
                st.owner = None;
                let next = if st.waiting.is_empty() {
                    None
                } else {
                    Some(st.waiting.remove(0))
                };
                drop(st);
                crate::sched::scheduler::clear_blocking_on(me);
                if let Some(next) = next {
                    crate::sched::scheduler::unblock(next);
                }
                Ok(())
            }
            Some(_) if self.error_checking => Err(Errno::EPERM),
            None if self.error_checking => Err(Errno::EPERM),
            _ => Ok(()),
        }
    }

    /// Forcibly release the mutex, waking all waiters with an error so
    /// they can unwind instead of deadlocking (`try_delete` in the
    /// original). Used when the owning process is torn down.
    pub fn force_release(&self) {
        let mut st = self.state.lock();
        st.owner = None;
        st.lockcount = 0;
        let waiters = core::mem::take(&mut st.waiting);
        drop(st);
        for w in waiters {
            crate::sched::scheduler::clear_blocking_on(w);
            crate::sched::scheduler::unblock(w);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }
}

pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
}

impl<'a, T: ?Sized> core::fmt::Debug for MutexGuard<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    /// Exposes the source mutex so `Condition::wait` can unlock and later
    /// reacquire it around the same guard type.
    pub fn source(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        let _ = self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_lock_counts() {
        let m = Mutex::new_recursive(0i32);
        let g1 = m.lock();
        let g2 = m.lock();
        drop(g2);
        assert!(m.is_locked());
        drop(g1);
        assert!(!m.is_locked());
    }

    #[test]
    fn non_recursive_try_lock_busy() {
        let m = Mutex::new(0i32);
        let _g = m.try_lock().unwrap();
        assert_eq!(m.try_lock().unwrap_err(), Errno::EBUSY);
    }

    #[test]
    fn error_checking_self_relock_is_deadlk() {
        let m = Mutex::new(0i32);
        let _g = m.try_lock().unwrap();
        assert_eq!(m.try_lock().unwrap_err(), Errno::EDEADLK);
    }

    #[test]
    fn force_release_clears_owner() {
        let m = Mutex::new(0i32);
        let g = m.try_lock().unwrap();
        core::mem::forget(g);
        assert!(m.is_locked());
        m.force_release();
        assert!(!m.is_locked());
        assert!(m.try_lock().is_ok());
    }
}
