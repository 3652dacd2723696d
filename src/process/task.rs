//! Process record: PID/PPID, a `Credentials`/`ProcessState` pair, an
//! optional heap region handle, and an `MpuBank` describing what memory
//! its threads may touch. Threads are owned by the process in an arena
//! with stable indices so a thread reference never dangles across a
//! `Vec` resize; actual teardown only happens via the cleanup queue
//! (`process::cleanup`) to avoid racing an iterator over `threads`.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicI32, Ordering};

use crate::fs::file::FileTable;
use crate::lib::error::{Errno, KernelError};
use crate::mm::mpu::MpuBank;
use crate::mm::region::RegionHandle;
use crate::sched::thread::ThreadId;
use crate::sync::mutex::Mutex;

pub type Pid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    Zombie,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

/// A thread slot in the process's arena: `None` once the thread has
/// exited and been reaped by the cleanup queue, but the index stays
/// reserved so other slots never shift.
enum ThreadSlot {
    Occupied(ThreadId),
    Free,
}

pub struct Process {
    pub pid: Pid,
    pub ppid: Pid,
    pub name: String,
    state: Mutex<ProcessState>,
    exit_code: AtomicI32,
    pub cred: Credentials,
    pub mpu_bank: Mutex<MpuBank>,
    /// Heap/code-data region owned by this process (None for kernel
    /// processes that only carry threads).
    pub heap: Option<RegionHandle>,
    threads: Mutex<Vec<ThreadSlot>>,
    pub files: Mutex<FileTable>,
    pub objects: Mutex<crate::syscall::objects::ObjectTable>,
    pub children: Mutex<Vec<Pid>>,
    pub events: crate::process::event::EventQueue,
    /// Back-pointer set used by the cleanup queue; weak so a dying
    /// process doesn't keep itself alive via its own Arc.
    pub self_ref: Mutex<Weak<Process>>,
}

impl Process {
    pub fn new(pid: Pid, ppid: Pid, name: &str, heap: Option<RegionHandle>) -> Arc<Self> {
        let p = Arc::new(Self {
            pid,
            ppid,
            name: String::from(name),
            state: Mutex::new(ProcessState::Running),
            exit_code: AtomicI32::new(0),
            cred: Credentials::default(),
            mpu_bank: Mutex::new(MpuBank::empty()),
            heap,
            threads: Mutex::new(Vec::new()),
            files: Mutex::new(FileTable::new()),
            objects: Mutex::new(crate::syscall::objects::ObjectTable::new()),
            children: Mutex::new(Vec::new()),
            events: crate::process::event::EventQueue::new(),
            self_ref: Mutex::new(Weak::new()),
        });
        *p.self_ref.lock() = Arc::downgrade(&p);
        p
    }

    /// Add a thread, returning its stable slot index.
    pub fn add_thread(&self, tid: ThreadId) -> usize {
        let mut threads = self.threads.lock();
        for (i, slot) in threads.iter_mut().enumerate() {
            if matches!(slot, ThreadSlot::Free) {
                *slot = ThreadSlot::Occupied(tid);
                return i;
            }
        }
        threads.push(ThreadSlot::Occupied(tid));
        threads.len() - 1
    }

    /// Mark a slot free without touching the arena's length, called only
    /// from the cleanup queue once the thread record itself is gone.
    pub fn retire_thread(&self, idx: usize) {
        let mut threads = self.threads.lock();
        if let Some(slot) = threads.get_mut(idx) {
            *slot = ThreadSlot::Free;
        }
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads
            .lock()
            .iter()
            .filter_map(|s| match s {
                ThreadSlot::Occupied(tid) => Some(*tid),
                ThreadSlot::Free => None,
            })
            .collect()
    }

    pub fn thread_count(&self) -> usize {
        self.threads
            .lock()
            .iter()
            .filter(|s| matches!(s, ThreadSlot::Occupied(_)))
            .count()
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    pub fn is_zombie(&self) -> bool {
        self.state() == ProcessState::Zombie
    }

    /// Mark this process a zombie with the given exit code. Idempotent:
    /// a process can only exit once.
    pub fn mark_exited(&self, code: i32) {
        self.exit_code.store(code, Ordering::Release);
        *self.state.lock() = ProcessState::Zombie;
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("ppid", &self.ppid)
            .field("name", &self.name)
            .finish()
    }
}

pub fn alloc_pcb(pid: Pid, ppid: Pid, name: &str, heap_size: usize) -> Result<Arc<Process>, KernelError> {
    let heap = if heap_size > 0 {
        Some(
            crate::mm::region::allocate(crate::mm::RegionTag::BulkSRAM, heap_size)
                .map_err(|_| KernelError::OutOfMemory)?,
        )
    } else {
        None
    };
    Ok(Process::new(pid, ppid, name, heap))
}

pub fn errno_from(e: KernelError) -> Errno {
    e.into()
}
