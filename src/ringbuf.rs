//! Lock-free SPSC ring buffer.
//!
//! Exactly one producer and one consumer may call `push`/`pop`
//! concurrently without blocking each other (separate `head`/`tail`
//! atomics, `Acquire`/`Release` at the handoff). Callers with more than
//! one producer or consumer (the cleanup queue, the kernel log) wrap an
//! instance in a `Spinlock` themselves - multiplexing access doesn't
//! change the underlying primitive.

use core::sync::atomic::{AtomicUsize, Ordering};
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

pub struct RingBuffer<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    pub const fn new() -> Self {
        const fn uninit<T>() -> UnsafeCell<MaybeUninit<T>> {
            UnsafeCell::new(MaybeUninit::uninit())
        }
        Self {
            buffer: [const { uninit() }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Push one item. Returns `false` (without modifying the buffer) if
    /// full - the producer decides whether to drop, retry, or overwrite.
    pub fn push(&self, item: T) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next = (head + 1) % N;
        if next == tail {
            return false;
        }
        unsafe {
            (*self.buffer[head].get()).write(item);
        }
        self.head.store(next, Ordering::Release);
        true
    }

    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let item = unsafe { (*self.buffer[tail].get()).as_ptr().read() };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(item)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        (self.head.load(Ordering::Acquire) + 1) % N == self.tail.load(Ordering::Acquire)
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub fn drain_all(&self) -> alloc::vec::Vec<T> {
        let mut out = alloc::vec::Vec::new();
        while let Some(item) = self.pop() {
            out.push(item);
        }
        out
    }

    /// Non-destructive copy of everything currently queued, oldest first.
    pub fn snapshot(&self) -> alloc::vec::Vec<T> {
        let mut out = alloc::vec::Vec::new();
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        let mut i = tail;
        while i != head {
            out.push(unsafe { (*self.buffer[i].get()).assume_init_read() });
            i = (i + 1) % N;
        }
        out
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_fifo_order() {
        let rb: RingBuffer<u32, 4> = RingBuffer::new();
        assert!(rb.push(1));
        assert!(rb.push(2));
        assert_eq!(rb.pop(), Some(1));
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.pop(), None);
    }

    #[test]
    fn full_rejects_push() {
        let rb: RingBuffer<u32, 4> = RingBuffer::new();
        assert!(rb.push(1));
        assert!(rb.push(2));
        assert!(rb.push(3));
        assert!(!rb.push(4)); // one slot always kept empty to disambiguate full/empty
        assert!(rb.is_full());
    }
}
