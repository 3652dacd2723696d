//! IRQ-masking spinlock: a bare compare-and-swap lock that additionally
//! masks local IRQs for its duration, so it is safe to take from
//! interrupt context and never reenters the scheduler. Held sections
//! must be O(1) - this is the primitive underneath the blocking
//! primitives in this module, not a replacement for them.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::irq;

/// A spinlock that masks IRQs on the calling core while held.
pub struct Spinlock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    /// Spin until acquired, masking IRQs first so the lock can't be taken
    /// recursively by an interrupt on this core.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let irq_was_enabled = irq::disable();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        SpinlockGuard {
            lock: self,
            irq_was_enabled,
        }
    }

    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        let irq_was_enabled = irq::disable();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard {
                lock: self,
                irq_was_enabled,
            })
        } else {
            if irq_was_enabled {
                irq::enable();
            }
            None
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// # Safety
    /// Caller must hold the lock and must not alias the returned reference.
    pub unsafe fn force_unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

pub struct SpinlockGuard<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
    irq_was_enabled: bool,
}

impl<'a, T: ?Sized> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        if self.irq_was_enabled {
            irq::enable();
        }
    }
}

/// RAII IRQ mask with no associated data, for critical sections that only
/// need to keep the scheduler off this core (e.g. touching per-cpu state).
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    pub fn new() -> Self {
        Self {
            was_enabled: irq::disable(),
        }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            irq::enable();
        }
    }
}

// Internal: a guard over an already-IRQ-masked lock, so the multi-lock
// guards below hold one outer IrqGuard instead of nesting IRQ state
// per-lock.
struct SpinlockGuardNoIrq<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
}

impl<'a, T: ?Sized> Deref for SpinlockGuardNoIrq<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}
impl<'a, T: ?Sized> DerefMut for SpinlockGuardNoIrq<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}
impl<'a, T: ?Sized> Drop for SpinlockGuardNoIrq<'a, T> {
    fn drop(&mut self) {
        unsafe { self.lock.force_unlock() };
    }
}

fn try_raw<T: ?Sized>(lock: &Spinlock<T>) -> bool {
    lock.locked
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
}

/// Holds two spinlocks at once under a single IRQ mask.
pub struct CriticalGuard2<'a, T1: ?Sized, T2: ?Sized> {
    _irq: IrqGuard,
    g1: SpinlockGuardNoIrq<'a, T1>,
    g2: SpinlockGuardNoIrq<'a, T2>,
}

impl<'a, T1: ?Sized, T2: ?Sized> CriticalGuard2<'a, T1, T2> {
    pub fn first(&self) -> &T1 {
        &self.g1
    }
    pub fn first_mut(&mut self) -> &mut T1 {
        &mut self.g1
    }
    pub fn second(&self) -> &T2 {
        &self.g2
    }
    pub fn second_mut(&mut self) -> &mut T2 {
        &mut self.g2
    }
}

/// Holds three spinlocks at once under a single IRQ mask.
pub struct CriticalGuard3<'a, T1: ?Sized, T2: ?Sized, T3: ?Sized> {
    _irq: IrqGuard,
    g1: SpinlockGuardNoIrq<'a, T1>,
    g2: SpinlockGuardNoIrq<'a, T2>,
    g3: SpinlockGuardNoIrq<'a, T3>,
}

impl<'a, T1: ?Sized, T2: ?Sized, T3: ?Sized> CriticalGuard3<'a, T1, T2, T3> {
    pub fn first(&self) -> &T1 {
        &self.g1
    }
    pub fn first_mut(&mut self) -> &mut T1 {
        &mut self.g1
    }
    pub fn second(&self) -> &T2 {
        &self.g2
    }
    pub fn second_mut(&mut self) -> &mut T2 {
        &mut self.g2
    }
    pub fn third(&self) -> &T3 {
        &self.g3
    }
    pub fn third_mut(&mut self) -> &mut T3 {
        &mut self.g3
    }
}

/// Acquire two spinlocks at once: disable interrupts, then greedily
/// try-lock each in order; on failure release what's held, re-enable
/// interrupts, yield, and retry from the top. Deadlock-free regardless
/// of which order two concurrent callers pass their locks in.
pub fn lock_pair<'a, T1: ?Sized, T2: ?Sized>(
    l1: &'a Spinlock<T1>,
    l2: &'a Spinlock<T2>,
) -> CriticalGuard2<'a, T1, T2> {
    loop {
        let irq = IrqGuard::new();
        if try_raw(l1) {
            if try_raw(l2) {
                return CriticalGuard2 {
                    _irq: irq,
                    g1: SpinlockGuardNoIrq { lock: l1 },
                    g2: SpinlockGuardNoIrq { lock: l2 },
                };
            }
            unsafe { l1.force_unlock() };
        }
        drop(irq);
        crate::sched::scheduler::yield_now();
    }
}

/// Three-lock counterpart of [`lock_pair`].
pub fn lock_triple<'a, T1: ?Sized, T2: ?Sized, T3: ?Sized>(
    l1: &'a Spinlock<T1>,
    l2: &'a Spinlock<T2>,
    l3: &'a Spinlock<T3>,
) -> CriticalGuard3<'a, T1, T2, T3> {
    loop {
        let irq = IrqGuard::new();
        if try_raw(l1) {
            if try_raw(l2) {
                if try_raw(l3) {
                    return CriticalGuard3 {
                        _irq: irq,
                        g1: SpinlockGuardNoIrq { lock: l1 },
                        g2: SpinlockGuardNoIrq { lock: l2 },
                        g3: SpinlockGuardNoIrq { lock: l3 },
                    };
                }
                unsafe { l2.force_unlock() };
            }
            unsafe { l1.force_unlock() };
        }
        drop(irq);
        crate::sched::scheduler::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_unlock_roundtrip() {
        let lock = Spinlock::new(0u32);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = Spinlock::new(0u32);
        let _g = lock.lock();
        assert!(lock.try_lock().is_none());
    }

    #[test]
    fn lock_pair_acquires_both() {
        let a = Spinlock::new(1u32);
        let b = Spinlock::new("x");
        {
            let mut g = lock_pair(&a, &b);
            *g.first_mut() += 1;
            assert_eq!(*g.second(), "x");
        }
        assert_eq!(*a.lock(), 2);
    }

    #[test]
    fn lock_triple_acquires_all() {
        let a = Spinlock::new(1u32);
        let b = Spinlock::new(2u32);
        let c = Spinlock::new(3u32);
        let g = lock_triple(&a, &b, &c);
        assert_eq!(*g.first() + *g.second() + *g.third(), 6);
    }
}
