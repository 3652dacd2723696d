//! Context-switch orchestration.
//!
//! `request_resched` pends a reschedule on a core (the software
//! equivalent of PendSV: set a per-core flag, and on the RT core send a
//! `Wakeup` IPI so it notices even if it's in WFE). The actual register
//! switch happens in `perform_pending_switch`, called from the timer IRQ
//! path and from `sync` primitives' block points once they return control
//! to the trap-return path.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::sched::thread::MAX_CORES;

static RESCHED_PENDING: [AtomicBool; MAX_CORES] = [AtomicBool::new(false), AtomicBool::new(false)];

pub fn request_resched(core: usize) {
    RESCHED_PENDING[core].store(true, Ordering::Release);
    if core != crate::sched::scheduler::current_core() {
        crate::smp::ipi::send(core, crate::smp::ipi::IpiMessage::Wakeup, None);
    }
}

pub fn take_pending(core: usize) -> bool {
    RESCHED_PENDING[core].swap(false, Ordering::AcqRel)
}

/// Called from the timer/IPI IRQ return path: if a reschedule is
/// pending, ask the scheduler for the next thread and perform the
/// register-level switch into it.
pub fn perform_pending_switch() {
    let core = crate::sched::scheduler::current_core();
    if !take_pending(core) && !crate::sched::scheduler::need_resched() {
        return;
    }
    let prev_id = crate::sched::scheduler::current_thread_id();
    if let Some(next_id) = crate::sched::scheduler::schedule() {
        if next_id == prev_id {
            return;
        }
        let prev_ctx: *mut crate::arch::CpuContext = crate::sched::scheduler::with_thread_mut(
            prev_id,
            |t| &mut t.cpu_context as *mut _,
        )
        .unwrap_or(core::ptr::null_mut());
        let next_ctx: *const crate::arch::CpuContext = crate::sched::scheduler::with_thread(
            next_id,
            |t| &t.cpu_context as *const _,
        )
        .expect("scheduled thread must exist");
        if !prev_ctx.is_null() {
            unsafe { crate::arch::context::switch_to(prev_ctx, next_ctx) };
        }
    }
}
