//! Thread record: per-thread control block carrying the saved register
//! context, scheduling state, and the MPU bank that bounds what memory
//! it can touch while running.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::arch::{CpuContext, TrapFrame};
use crate::mm::mpu::MpuBank;
use crate::sync::signal::DeferredSlot;
use crate::syscall::objects::KernelObject;

pub const NPRIORITIES: usize = 5;
pub const MAX_CORES: usize = 2;
pub const CORE_APP: usize = 0;
pub const CORE_RT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const INVALID: ThreadId = ThreadId(u32::MAX);
}

/// Which core(s) a thread is allowed to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Any,
    Core(usize),
}

impl Affinity {
    pub fn allows(&self, core: usize) -> bool {
        match self {
            Affinity::Any => true,
            Affinity::Core(c) => *c == core,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked(BlockReason),
    Sleeping,
    Zombie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Mutex,
    RwLock,
    Condvar,
    Signal,
    Semaphore,
    Event,
    Syscall,
}

/// Fixed-capacity per-thread local storage table, addressed by small
/// integer keys the way pthread TLS keys work.
pub const TLS_SLOTS: usize = 16;

pub struct Thread {
    pub id: ThreadId,
    pub pid: u32,
    pub name: heapless::String<32>,
    pub priority: u8,
    pub base_priority: u8,
    pub affinity: Affinity,
    pub state: ThreadState,
    /// Thread this one is waiting on, for the blocker-chain walk. Only
    /// set for mutex contention, never for semaphore/condvar/signal.
    pub blocking_on: Option<ThreadId>,
    pub cpu_context: CpuContext,
    pub trap_frame: TrapFrame,
    pub mpu_bank: MpuBank,
    pub stack_region: Option<crate::mm::region::RegionHandle>,
    pub tls: [usize; TLS_SLOTS],
    pub deferred: DeferredSlot,
    pub ticks_remaining: u32,
    pub exit_code: i32,
    /// Mutexes/rwlocks currently held by this thread, one entry per
    /// successful lock call (so a recursive lock appears more than
    /// once). Drained by process teardown to force every primitive a
    /// dying process's threads still hold back open.
    pub locked_mutexes: Vec<Arc<KernelObject>>,
    pub locked_rwlocks: Vec<Arc<KernelObject>>,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        pid: u32,
        name: &str,
        priority: u8,
        affinity: Affinity,
        mpu_bank: MpuBank,
    ) -> Self {
        Self {
            id,
            pid,
            name: heapless::String::try_from(name).unwrap_or_default(),
            priority,
            base_priority: priority,
            affinity,
            state: ThreadState::Ready,
            blocking_on: None,
            cpu_context: CpuContext::new(),
            trap_frame: TrapFrame::default(),
            mpu_bank,
            stack_region: None,
            tls: [0; TLS_SLOTS],
            deferred: DeferredSlot::new(),
            ticks_remaining: 0,
            exit_code: 0,
            locked_mutexes: Vec::new(),
            locked_rwlocks: Vec::new(),
        }
    }

    pub fn effective_priority(&self) -> u8 {
        self.priority
    }
}
