//! wait4/exit implementation for zombie reaping.
//!
//! Adapted to the `Arc<Process>` table and the cleanup queue: `do_exit`
//! no longer frees the process inline, it marks it a zombie and posts
//! the teardown to `process::cleanup` once the parent has reaped it via
//! `do_wait4`.

use super::task::{Pid, Process};
use crate::lib::error::Errno;
use alloc::sync::Arc;
use alloc::vec;

pub const WNOHANG: i32 = 1;
pub const WUNTRACED: i32 = 2;
pub const WCONTINUED: i32 = 8;

pub fn w_exitcode(exit_code: i32, signal: i32) -> i32 {
    (exit_code << 8) | (signal & 0x7f)
}

/// Wait for a child process to exit.
///
/// - `pid > 0`: wait for that specific child
/// - `pid == -1`: wait for any child
/// - other values: process groups, not supported
///
/// Returns the reaped child's PID and exit status, `Ok(0)` if
/// `WNOHANG` was set and nothing was ready, or an error.
pub fn do_wait4(current_pid: Pid, pid: i32, options: i32) -> Result<(Pid, i32), Errno> {
    let children = if pid > 0 {
        vec![pid as Pid]
    } else if pid == -1 {
        super::pid::find_children(current_pid)
    } else {
        return Err(Errno::EINVAL);
    };

    if children.is_empty() {
        return Err(Errno::ECHILD);
    }

    for child_pid in children {
        if let Some(child) = super::pid::get(child_pid) {
            if child.is_zombie() {
                let status = w_exitcode(child.exit_code(), 0);
                reap(child_pid, child);
                return Ok((child_pid, status));
            }
        }
    }

    if (options & WNOHANG) != 0 {
        return Ok((0, 0));
    }

    // The caller blocks by retrying through the syscall dispatcher's
    // deferred-return protocol; this layer only reports "not ready yet".
    Err(Errno::EAGAIN)
}

fn reap(pid: Pid, process: Arc<Process>) {
    super::pid::remove(pid);
    super::cleanup::post(super::cleanup::CleanupItem::Process(process));
}

/// Mark the current process a zombie, reparent its children to init, and
/// notify the parent. Caller (the syscall dispatcher) is responsible for
/// invoking the scheduler afterwards - this never runs the calling thread
/// again so it doesn't return.
pub fn do_exit(current_pid: Pid, exit_code: i32) -> ! {
    if let Some(process) = super::pid::get(current_pid) {
        process.mark_exited(exit_code);
        crate::info!("process {} exited with code {}", current_pid, exit_code);

        super::pid::reparent_to_init(current_pid);

        if let Some(parent) = super::pid::get(process.ppid) {
            parent.events.push(super::event::Event::ChildExited {
                pid: current_pid,
                code: exit_code,
            });
        }

        let calling = crate::sched::scheduler::current_thread_id();
        for tid in process.thread_ids() {
            if tid != calling {
                crate::sched::scheduler::terminate_thread(tid, exit_code);
            }
        }
    }

    crate::sched::scheduler::exit_current(exit_code);
    loop {
        crate::sched::scheduler::yield_now();
    }
}
