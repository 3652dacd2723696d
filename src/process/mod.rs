//! Process management: PID table, records, wait/exit, events, teardown.

pub mod cleanup;
pub mod event;
pub mod pid;
pub mod task;
pub mod wait;

pub use task::{Credentials, Pid, Process, ProcessState};

/// PID of the current thread's owning process, looked up via the
/// scheduler's notion of "current thread" and that thread's `pid` field.
pub fn current_pid() -> Pid {
    let tid = crate::sched::scheduler::current_thread_id();
    crate::sched::scheduler::with_thread(tid, |t| t.pid).unwrap_or(0)
}

pub fn current_process() -> Option<alloc::sync::Arc<Process>> {
    pid::get(current_pid())
}

/// Terminate a process from the outside (e.g. a fault handler, a kill
/// syscall) rather than the process exiting itself. Unlike `wait::do_exit`
/// this doesn't assume the caller IS the dying process, so it never
/// yields away the calling thread.
pub fn terminate(pid: Pid, code: i32) {
    let Some(process) = pid::get(pid) else {
        return;
    };
    if process.is_zombie() {
        return;
    }
    process.mark_exited(code);
    crate::warn!("process {} terminated with code {}", pid, code);

    pid::reparent_to_init(pid);

    if let Some(parent) = pid::get(process.ppid) {
        parent
            .events
            .push(event::Event::ChildExited { pid, code });
    }

    for tid in process.thread_ids() {
        crate::sched::scheduler::terminate_thread(tid, code);
    }

    if current_pid() == pid {
        crate::sched::scheduler::yield_now();
    }
}
