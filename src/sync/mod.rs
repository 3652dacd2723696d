//! Scheduler-integrated synchronization primitives
//!
//! Everything here blocks by parking the calling thread in the scheduler
//! rather than busy-waiting, except `spinlock` which is the primitive the
//! scheduler itself is built on and must never block.

pub mod spinlock;
pub mod signal;
pub mod mutex;
pub mod rwlock;
pub mod sem;
pub mod condvar;

pub use spinlock::{lock_pair, lock_triple, CriticalGuard2, CriticalGuard3, IrqGuard, Spinlock, SpinlockGuard};
pub use signal::{SimpleSignal, SignalOperation};
pub use mutex::Mutex;
pub use rwlock::RwLock;
pub use sem::{CountingSemaphore, BinarySemaphore};
pub use condvar::Condition;
