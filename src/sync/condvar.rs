//! Condition variable with an explicit wait-list (not a `SimpleSignal`):
//! unlike a mutex, any number of threads may block here concurrently.
//! Tracks a map of waiting thread to a `{timeout, signalled}` record,
//! with `wait`/`signal(_all)` operations. Priority inheritance is
//! deliberately not applied to condvar waiters - the scheduler's
//! blocker-chain walk only follows mutex ownership.

use alloc::vec::Vec;

use crate::sched::thread::{BlockReason, ThreadId};
use crate::sync::mutex::{Mutex, MutexGuard};
use crate::sync::spinlock::Spinlock;

struct Waiter {
    tid: ThreadId,
    signalled: bool,
}

pub struct Condition {
    waiting: Spinlock<Vec<Waiter>>,
}

impl Condition {
    pub const fn new() -> Self {
        Self {
            waiting: Spinlock::new(Vec::new()),
        }
    }

    /// Atomically unlock `guard`, block until signalled, then reacquire.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T>
    where
        T: 'a,
    {
        let mutex: &'a Mutex<T> = guard.source();
        let me = crate::sched::scheduler::current_thread_id();
        self.waiting.lock().push(Waiter {
            tid: me,
            signalled: false,
        });
        drop(guard);

        loop {
            {
                let mut w = self.waiting.lock();
                if let Some(idx) = w.iter().position(|x| x.tid == me) {
                    if w[idx].signalled {
                        w.remove(idx);
                        break;
                    }
                } else {
                    break;
                }
            }
            crate::sched::scheduler::block_current(BlockReason::Condvar);
        }
        mutex.lock()
    }

    /// Wake one waiter (`all = false`) or every waiter (`all = true`).
    pub fn signal(&self, all: bool) {
        let mut w = self.waiting.lock();
        if w.is_empty() {
            return;
        }
        if all {
            for waiter in w.iter_mut() {
                waiter.signalled = true;
            }
            let woken: Vec<ThreadId> = w.iter().map(|x| x.tid).collect();
            drop(w);
            for tid in woken {
                crate::sched::scheduler::unblock(tid);
            }
        } else {
            w[0].signalled = true;
            let tid = w[0].tid;
            drop(w);
            crate::sched::scheduler::unblock(tid);
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}
