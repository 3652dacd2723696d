//! Counting and binary semaphores, both backed by `SimpleSignal`: the
//! signal's value is the count. `post` applies `SignalOperation::Add`
//! (saturated at 1 for the binary form); `wait` blocks while the count
//! is zero, then `Sub`s one off atomically with the wake so two waiters
//! can't both observe the same post.

use crate::lib::error::Errno;
use crate::sync::signal::{SignalOperation, SimpleSignal};

pub struct CountingSemaphore {
    signal: SimpleSignal,
    max: u32,
}

impl CountingSemaphore {
    pub const fn new(initial: u32, max: u32) -> Self {
        Self {
            signal: SimpleSignal::new(initial),
            max,
        }
    }

    pub fn wait(&self) {
        loop {
            let v = self.signal.wait_while(|v| v == 0);
            if v == 0 {
                continue;
            }
            let after = self.signal.signal(SignalOperation::Sub, 1);
            if after == v.wrapping_sub(1) {
                return;
            }
        }
    }

    pub fn try_wait(&self) -> Result<(), Errno> {
        if self.signal.value() == 0 {
            return Err(Errno::EAGAIN);
        }
        self.signal.signal(SignalOperation::Sub, 1);
        Ok(())
    }

    pub fn post(&self, n: u32) {
        let cur = self.signal.value();
        let add = core::cmp::min(n, self.max.saturating_sub(cur));
        if add > 0 {
            self.signal.signal(SignalOperation::Add, add);
        }
    }

    pub fn value(&self) -> u32 {
        self.signal.value()
    }
}

pub struct BinarySemaphore {
    sem: CountingSemaphore,
}

impl BinarySemaphore {
    pub const fn new(initial: bool) -> Self {
        Self {
            sem: CountingSemaphore::new(if initial { 1 } else { 0 }, 1),
        }
    }

    pub fn wait(&self) {
        self.sem.wait();
    }

    pub fn try_wait(&self) -> Result<(), Errno> {
        self.sem.try_wait()
    }

    pub fn post(&self) {
        self.sem.post(1);
    }

    pub fn is_set(&self) -> bool {
        self.sem.value() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_post_caps_at_max() {
        let s = CountingSemaphore::new(0, 2);
        s.post(5);
        assert_eq!(s.value(), 2);
    }

    #[test]
    fn binary_try_wait() {
        let b = BinarySemaphore::new(true);
        assert!(b.try_wait().is_ok());
        assert!(b.try_wait().is_err());
        b.post();
        assert!(b.is_set());
    }
}
