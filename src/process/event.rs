//! Per-process event queue.
//!
//! A bounded ring of kernel-originated events (thread exits, signal
//! delivery notices, IPC wakeups) a process can poll/peek with a
//! dedicated syscall rather than synthesizing them from file descriptors.
//! Built on the same lock-free `RingBuffer` shape `printk`/`smp::ipi`
//! reuse for their own queues.

use crate::ringbuf::RingBuffer;

#[derive(Debug, Clone, Copy)]
pub enum Event {
    ThreadExited { tid: u32, code: i32 },
    ChildExited { pid: u32, code: i32 },
    Signal { value: u32 },
}

const QUEUE_CAPACITY: usize = 64;

pub struct EventQueue {
    ring: RingBuffer<Event, QUEUE_CAPACITY>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
        }
    }

    pub fn push(&self, event: Event) {
        self.ring.push(event);
    }

    pub fn pop(&self) -> Option<Event> {
        self.ring.pop()
    }

    pub fn peek_all(&self) -> alloc::vec::Vec<Event> {
        self.ring.snapshot()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
