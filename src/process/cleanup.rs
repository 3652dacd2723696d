//! Cleanup queue: a bounded queue of `{is_thread, ptr}` entries, drained
//! by one dedicated kernel thread.
//!
//! Thread and process teardown never frees memory or removes table
//! entries synchronously from arbitrary contexts (an IRQ handler, a
//! syscall on another core) - it posts here instead, and the drainer
//! performs the actual free once nothing else can be mid-iteration over
//! the structure being torn down.

use alloc::sync::Arc;

use crate::process::task::{Pid, Process};
use crate::ringbuf::RingBuffer;
use crate::sched::scheduler;
use crate::sched::thread::ThreadId;
use crate::syscall::objects::KernelObject;

pub enum CleanupItem {
    Thread { pid: Pid, tid: ThreadId, slot: usize },
    Process(Arc<Process>),
}

const QUEUE_CAPACITY: usize = 128;

static QUEUE: RingBuffer<CleanupItemSlot, QUEUE_CAPACITY> = RingBuffer::new();

/// `RingBuffer<T, N>` requires `T: Copy`, but cleanup items own an `Arc`;
/// box the item so the ring stores a plain pointer-sized, `Copy` slot and
/// reclaims ownership on pop.
#[derive(Clone, Copy)]
struct CleanupItemSlot(*mut CleanupItem);

unsafe impl Send for CleanupItemSlot {}

pub fn post(item: CleanupItem) {
    let boxed = alloc::boxed::Box::new(item);
    let raw = alloc::boxed::Box::into_raw(boxed);
    if !QUEUE.push(CleanupItemSlot(raw)) {
        // Queue full: reclaim immediately rather than leak, accepting the
        // synchronous cost here since it means the drainer has fallen
        // badly behind.
        let item = unsafe { alloc::boxed::Box::from_raw(raw) };
        run_one(*item);
    }
}

fn run_one(item: CleanupItem) {
    match item {
        CleanupItem::Thread { pid, tid: _tid, slot } => {
            if let Some(p) = crate::process::pid::get(pid) {
                p.retire_thread(slot);
            }
        }
        CleanupItem::Process(p) => {
            for tid in p.thread_ids() {
                force_release_held(tid);
            }
            // Dropping `p` here releases the last strong reference once
            // the process table's own entry has also been removed.
        }
    }
}

/// Force every mutex/rwlock `tid` is still holding back open, waking
/// stragglers with `EBUSY`/`EPERM` instead of leaving them parked on a
/// lock whose owner no longer exists.
fn force_release_held(tid: ThreadId) {
    let held = scheduler::with_thread_mut(tid, |t| {
        let mut mutexes = alloc::vec::Vec::new();
        let mut rwlocks = alloc::vec::Vec::new();
        core::mem::swap(&mut mutexes, &mut t.locked_mutexes);
        core::mem::swap(&mut rwlocks, &mut t.locked_rwlocks);
        (mutexes, rwlocks)
    });
    let Some((mutexes, rwlocks)) = held else { return };
    for obj in mutexes.into_iter().chain(rwlocks) {
        match &*obj {
            KernelObject::Mutex(m) => m.force_release(),
            KernelObject::Semaphore(_) => {}
        }
    }
}

/// Body of the dedicated cleanup-drainer kernel thread: pop and free
/// until the queue runs dry, then the caller should block until woken
/// again (e.g. by the next `post`).
pub fn drain_once() -> usize {
    let mut n = 0;
    while let Some(slot) = QUEUE.pop() {
        let item = unsafe { *alloc::boxed::Box::from_raw(slot.0) };
        run_one(item);
        n += 1;
    }
    n
}
