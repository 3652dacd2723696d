//! PID allocation and process table.
//!
//! `PidTable`/`PROCESS_TABLE`, `MAX_PIDS`, `NEXT_PID` starting past init,
//! holding `Arc<Process>` instead of `Box<Task>` so the cleanup queue and
//! `wait4` can hold a reference to a process after it has left the table.

use super::task::{Pid, Process};
use crate::lib::error::KernelError;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

/// Maximum number of processes.
const MAX_PIDS: usize = 32768;

/// PID 1 is init; real allocation starts after it.
static NEXT_PID: AtomicU32 = AtomicU32::new(2);

enum PidEntry {
    Free,
    Used(Arc<Process>),
}

pub struct PidTable {
    entries: Vec<PidEntry>,
}

impl PidTable {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(MAX_PIDS);
        for _ in 0..MAX_PIDS {
            entries.push(PidEntry::Free);
        }
        Self { entries }
    }

    pub fn alloc_pid(&self) -> Result<Pid, KernelError> {
        let pid = NEXT_PID.fetch_add(1, Ordering::SeqCst);
        if pid as usize >= MAX_PIDS {
            return Err(KernelError::OutOfMemory);
        }
        Ok(pid)
    }

    pub fn insert(&mut self, process: Arc<Process>) -> Result<(), KernelError> {
        let idx = process.pid as usize;
        if idx >= MAX_PIDS {
            return Err(KernelError::InvalidArgument);
        }
        self.entries[idx] = PidEntry::Used(process);
        Ok(())
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        match self.entries.get(pid as usize)? {
            PidEntry::Used(p) => Some(p.clone()),
            PidEntry::Free => None,
        }
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Arc<Process>> {
        let idx = pid as usize;
        if idx >= self.entries.len() {
            return None;
        }
        match core::mem::replace(&mut self.entries[idx], PidEntry::Free) {
            PidEntry::Used(p) => Some(p),
            PidEntry::Free => None,
        }
    }

    pub fn find_children(&self, ppid: Pid) -> Vec<Pid> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| match entry {
                PidEntry::Used(p) if p.ppid == ppid => Some(idx as Pid),
                _ => None,
            })
            .collect()
    }

    /// Reparent all children of a dying process to init (PID 1). `ppid` is
    /// fixed at process creation, so orphans keep their original recorded
    /// parent for audit purposes; what actually changes is which process
    /// lists them as a child for `wait4` purposes.
    pub fn reparent_to_init(&mut self, dying_pid: Pid) {
        let orphans = self.find_children(dying_pid);
        if orphans.is_empty() {
            return;
        }
        if let Some(init) = self.get(1) {
            let mut children = init.children.lock();
            for pid in orphans {
                if !children.contains(&pid) {
                    children.push(pid);
                }
            }
        }
    }

    pub fn count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e, PidEntry::Used(_))).count()
    }
}

impl Default for PidTable {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_TABLE: Mutex<Option<PidTable>> = Mutex::new(None);

pub fn init_process_table() {
    let mut table = PROCESS_TABLE.lock();
    *table = Some(PidTable::new());
    crate::info!("process table initialized (max {} pids)", MAX_PIDS);
}

pub fn alloc_pid() -> Result<Pid, KernelError> {
    let table = PROCESS_TABLE.lock();
    table.as_ref().ok_or(KernelError::NotInitialized)?.alloc_pid()
}

pub fn insert(process: Arc<Process>) -> Result<(), KernelError> {
    let mut table = PROCESS_TABLE.lock();
    table.as_mut().ok_or(KernelError::NotInitialized)?.insert(process)
}

/// Look up a live process by PID. Used by the cleanup queue and wait4.
pub fn get(pid: Pid) -> Option<Arc<Process>> {
    PROCESS_TABLE.lock().as_ref()?.get(pid)
}

pub fn remove(pid: Pid) -> Option<Arc<Process>> {
    PROCESS_TABLE.lock().as_mut()?.remove(pid)
}

pub fn find_children(ppid: Pid) -> Vec<Pid> {
    PROCESS_TABLE
        .lock()
        .as_ref()
        .map(|t| t.find_children(ppid))
        .unwrap_or_default()
}

pub fn reparent_to_init(dying_pid: Pid) {
    if let Some(table) = PROCESS_TABLE.lock().as_mut() {
        table.reparent_to_init(dying_pid);
    }
}

pub fn count() -> usize {
    PROCESS_TABLE.lock().as_ref().map(|t| t.count()).unwrap_or(0)
}
