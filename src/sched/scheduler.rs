//! Priority-based, per-core, affinity-aware preemptive scheduler.
//!
//! Round robin within a priority bucket; a thread blocked on a mutex
//! temporarily inherits the effective priority of the highest-priority
//! thread transitively blocked on it, walking `Thread::blocking_on`
//! (never semaphore/condvar/signal waiters) up to 256 hops.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::mm::mpu::MpuBank;
use crate::sched::thread::{
    Affinity, BlockReason, Thread, ThreadId, ThreadState, CORE_APP, CORE_RT, MAX_CORES,
    NPRIORITIES,
};
use crate::sync::spinlock::Spinlock;

const MAX_BLOCKER_CHAIN: usize = 256;

struct PerCore {
    current: Option<ThreadId>,
    ready: [VecDeque<ThreadId>; NPRIORITIES],
    running: bool,
}

impl PerCore {
    const fn new() -> Self {
        Self {
            current: None,
            ready: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
            running: false,
        }
    }
}

struct SchedulerState {
    threads: Vec<Option<Thread>>,
    cores: [PerCore; MAX_CORES],
    next_id: u32,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            threads: Vec::new(),
            cores: [PerCore::new(), PerCore::new()],
            next_id: 0,
        }
    }

    fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id.0 as usize).and_then(|t| t.as_ref())
    }

    fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(id.0 as usize).and_then(|t| t.as_mut())
    }

    fn enqueue_ready(&mut self, core: usize, id: ThreadId) {
        if let Some(t) = self.get_mut(id) {
            t.state = ThreadState::Ready;
            let prio = t.effective_priority() as usize;
            self.cores[core].ready[prio].push_back(id);
        }
    }

    /// Walk the blocker chain from `waiter`, boosting every ancestor's
    /// effective priority to at least `floor`. Bounded to avoid livelock
    /// on a corrupted or cyclic chain.
    fn propagate_priority(&mut self, start: ThreadId, floor: u8) {
        let mut cur = start;
        for _ in 0..MAX_BLOCKER_CHAIN {
            let next = match self.get(cur) {
                Some(t) => t.blocking_on,
                None => return,
            };
            let owner = match next {
                Some(o) => o,
                None => return,
            };
            let changed = if let Some(ot) = self.get_mut(owner) {
                if ot.priority < floor {
                    ot.priority = floor;
                    true
                } else {
                    false
                }
            } else {
                return;
            };
            if !changed {
                return;
            }
            cur = owner;
        }
    }
}

static STATE: Spinlock<SchedulerState> = Spinlock::new(SchedulerState::new());

/// Which physical core this call is executing on. On real hardware this
/// reads MPIDR_EL1; tests pretend to always be on the app core.
pub fn current_core() -> usize {
    #[cfg(target_arch = "aarch64")]
    {
        let mpidr: u64;
        unsafe { core::arch::asm!("mrs {0}, mpidr_el1", out(reg) mpidr) };
        (mpidr & 0xFF) as usize % MAX_CORES
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        CORE_APP
    }
}

pub fn current_thread_id() -> ThreadId {
    let st = STATE.lock();
    st.cores[current_core()].current.unwrap_or(ThreadId::INVALID)
}

/// Create a new thread record in `Ready` state but not yet enqueued;
/// caller enqueues via `enqueue` once its context is fully set up.
pub fn spawn(pid: u32, name: &str, priority: u8, affinity: Affinity, mpu_bank: MpuBank) -> ThreadId {
    let mut st = STATE.lock();
    let id = ThreadId(st.next_id);
    st.next_id += 1;
    let thread = Thread::new(id, pid, name, priority, affinity, mpu_bank);
    if (id.0 as usize) < st.threads.len() {
        st.threads[id.0 as usize] = Some(thread);
    } else {
        st.threads.push(Some(thread));
    }
    id
}

pub fn enqueue(id: ThreadId) {
    let mut st = STATE.lock();
    let core = match st.get(id).map(|t| t.affinity) {
        Some(Affinity::Core(c)) => c,
        Some(Affinity::Any) | None => CORE_APP,
    };
    st.enqueue_ready(core, id);
}

pub fn start_for_current_core() {
    let core = current_core();
    let mut st = STATE.lock();
    st.cores[core].running = true;
}

/// Mark `id` as this core's current thread without going through
/// `schedule()`'s requeue-outgoing path, for the one-time switch out of
/// the boot stack into the first thread a core ever runs.
pub fn bootstrap_current(id: ThreadId) {
    let core = current_core();
    let mut st = STATE.lock();
    for prio in &mut st.cores[core].ready {
        prio.retain(|&t| t != id);
    }
    if let Some(t) = st.get_mut(id) {
        t.state = ThreadState::Running;
    }
    st.cores[core].current = Some(id);
}

pub fn need_resched() -> bool {
    let core = current_core();
    let st = STATE.lock();
    st.cores[core].ready.iter().any(|q| !q.is_empty())
}

/// Pick the next ready thread for `core`: highest non-empty priority
/// bucket, round-robin within it. Returns `None` if nothing is runnable
/// (caller should idle / WFE).
fn get_next_thread(st: &mut SchedulerState, core: usize) -> Option<ThreadId> {
    for prio in (0..NPRIORITIES).rev() {
        if let Some(id) = st.cores[core].ready[prio].pop_front() {
            return Some(id);
        }
    }
    None
}

/// Perform a context switch decision for the current core: requeue the
/// outgoing thread (if still runnable) and select the next one. Returns
/// the thread to switch into, if any; the caller (trap/IRQ path) does the
/// register-level switch via `arch::switch`.
pub fn schedule() -> Option<ThreadId> {
    let core = current_core();
    let mut st = STATE.lock();
    let outgoing = st.cores[core].current.take();
    if let Some(out) = outgoing {
        let still_runnable = matches!(
            st.get(out).map(|t| t.state),
            Some(ThreadState::Running) | Some(ThreadState::Ready)
        );
        if still_runnable {
            st.enqueue_ready(core, out);
        }
    }
    let next = get_next_thread(&mut st, core);
    if let Some(id) = next {
        if let Some(t) = st.get_mut(id) {
            t.state = ThreadState::Running;
        }
        st.cores[core].current = Some(id);
    }
    next
}

pub fn timer_tick() {
    let core = current_core();
    let mut st = STATE.lock();
    if let Some(cur) = st.cores[core].current {
        if let Some(t) = st.get_mut(cur) {
            if t.ticks_remaining > 0 {
                t.ticks_remaining -= 1;
            }
        }
    }
}

/// Block the calling thread with the given reason; returns once it has
/// been unblocked and rescheduled. The actual parking is a yield loop
/// driven by the caller's predicate - this just marks state and lets the
/// next `schedule()` skip it.
pub fn block_current(reason: BlockReason) {
    let core = current_core();
    {
        let mut st = STATE.lock();
        if let Some(cur) = st.cores[core].current {
            if let Some(t) = st.get_mut(cur) {
                t.state = ThreadState::Blocked(reason);
            }
        }
    }
    yield_now();
}

pub fn unblock(id: ThreadId) {
    let core = {
        let mut st = STATE.lock();
        let core = match st.get(id) {
            Some(t)
                if matches!(t.state, ThreadState::Blocked(_)) || t.state == ThreadState::Sleeping =>
            {
                match t.affinity {
                    Affinity::Core(c) => c,
                    Affinity::Any => CORE_APP,
                }
            }
            _ => return,
        };
        st.enqueue_ready(core, id);
        core
    };
    if core != current_core() {
        crate::smp::ipi::signal_thread_woken(core, id);
    }
}

pub fn set_blocking_on(waiter: ThreadId, owner: ThreadId) {
    let mut st = STATE.lock();
    let floor = st.get(waiter).map(|t| t.effective_priority()).unwrap_or(0);
    if let Some(w) = st.get_mut(waiter) {
        w.blocking_on = Some(owner);
    }
    st.propagate_priority(waiter, floor);
}

pub fn clear_blocking_on(waiter: ThreadId) {
    let mut st = STATE.lock();
    if let Some(w) = st.get_mut(waiter) {
        w.blocking_on = None;
        let base = w.base_priority;
        w.priority = base;
    }
}

/// Cooperative yield: ask for a reschedule on this core. On real hardware
/// this pends the scheduler IPI/PendSV-equivalent; the trap return path
/// performs the actual register switch.
pub fn yield_now() {
    crate::arch::switch::request_resched(current_core());
}

pub fn exit_current(code: i32) {
    let core = current_core();
    let mut st = STATE.lock();
    if let Some(cur) = st.cores[core].current {
        if let Some(t) = st.get_mut(cur) {
            t.state = ThreadState::Zombie;
            t.exit_code = code;
        }
    }
    drop(st);
    yield_now();
}

/// Mark an arbitrary thread (not necessarily the calling one) a zombie,
/// e.g. when a process exits and all of its other threads must be torn
/// down with it. Safe to call on a thread that is currently blocked,
/// ready, or running on another core.
pub fn terminate_thread(id: ThreadId, code: i32) {
    let mut st = STATE.lock();
    if let Some(t) = st.get_mut(id) {
        t.state = ThreadState::Zombie;
        t.exit_code = code;
    }
}

/// Raw pointer to a thread's deferred-return slot, valid as long as the
/// thread record isn't reaped by the cleanup queue. Used by the syscall
/// dispatcher to arm/wait/complete a `Suspended` call without holding
/// `STATE`'s lock across a blocking wait.
pub fn deferred_slot(id: ThreadId) -> Option<*const crate::sync::signal::DeferredSlot> {
    STATE.lock().get(id).map(|t| &t.deferred as *const _)
}

pub fn with_thread<R>(id: ThreadId, f: impl FnOnce(&Thread) -> R) -> Option<R> {
    STATE.lock().get(id).map(f)
}

pub fn with_thread_mut<R>(id: ThreadId, f: impl FnOnce(&mut Thread) -> R) -> Option<R> {
    STATE.lock().get_mut(id).map(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::mpu::MpuBank;

    #[test]
    fn priority_buckets_pick_highest_first() {
        let mut st = SchedulerState::new();
        st.threads.push(Some(Thread::new(ThreadId(0), 1, "low", 1, Affinity::Core(0), MpuBank::empty())));
        st.threads.push(Some(Thread::new(ThreadId(1), 1, "high", 4, Affinity::Core(0), MpuBank::empty())));
        st.enqueue_ready(0, ThreadId(0));
        st.enqueue_ready(0, ThreadId(1));
        assert_eq!(get_next_thread(&mut st, 0), Some(ThreadId(1)));
        assert_eq!(get_next_thread(&mut st, 0), Some(ThreadId(0)));
    }

    #[test]
    fn priority_inheritance_boosts_owner() {
        let mut st = SchedulerState::new();
        st.threads.push(Some(Thread::new(ThreadId(0), 1, "owner", 1, Affinity::Core(0), MpuBank::empty())));
        st.threads.push(Some(Thread::new(ThreadId(1), 1, "waiter", 4, Affinity::Core(0), MpuBank::empty())));
        st.get_mut(ThreadId(1)).unwrap().blocking_on = Some(ThreadId(0));
        st.propagate_priority(ThreadId(1), 4);
        assert_eq!(st.get(ThreadId(0)).unwrap().priority, 4);
    }
}
