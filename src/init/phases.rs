//! Ordered boot phases, each building on guarantees the previous phase
//! established: nothing allocates before `early_init`, nothing touches
//! a region allocator before `memory_init`, nothing schedules before
//! `subsystem_init`, and PID 1 only starts running in `late_init`.

use super::error::{KernelError, KernelResult};

/// Check the exception level, start the kernel clock, and bring up the
/// heap - everything downstream needs `alloc` to work.
///
/// # Safety
/// Must be called exactly once, first, with the boot stack already set up.
pub unsafe fn early_init() -> KernelResult<()> {
    #[cfg(target_arch = "aarch64")]
    {
        let current_el: u64;
        core::arch::asm!("mrs {0}, CurrentEL", out(reg) current_el);
        let el = ((current_el >> 2) & 0x3) as u8;
        if el != 1 {
            return Err(KernelError::InvalidExceptionLevel(el));
        }
    }

    crate::time::init_boot_timestamp();
    crate::lib::printk::recover_persisted_log();
    super::mm_init::init_memory()?;
    Ok(())
}

/// Bring up the region-tagged buddy allocators. Kept as its own phase
/// even though `early_init` already ran `mm_init::init_memory` once,
/// in case a board variant needs the two split apart (e.g. a boot
/// loader that hands over a heap but not the region table yet).
pub fn memory_init() -> KernelResult<()> {
    crate::info!(
        "memory: {} live region extents tracked",
        crate::mm::region::live_extent_count()
    );
    Ok(())
}

/// Process table, exception vectors, companion-core boot.
///
/// # Safety
/// Must run after `memory_init`.
pub unsafe fn subsystem_init() -> KernelResult<()> {
    super::subsystems::init_core_subsystems()
}

/// Create PID 1, give it a main thread, enable interrupts and start
/// this core's scheduler loop. Does not return: the idle path below
/// only runs until the first preemption hands control to PID 1.
///
/// # Safety
/// Must run last, after every other phase has succeeded.
pub unsafe fn late_init() -> KernelResult<()> {
    use crate::mm::mpu::MpuBank;
    use crate::process::pid;
    use crate::process::task::Process;
    use crate::sched::thread::Affinity;

    let init_process = Process::new(1, 0, "init", None);
    pid::insert(init_process.clone()).map_err(|_| KernelError::LateInit("failed to insert PID 1"))?;

    let stack = crate::mm::region::allocate_for_stack(crate::config::DEFAULT_STACK_SIZE)
        .map_err(|_| KernelError::LateInit("failed to allocate PID 1's stack"))?;
    let stack_top = stack.base + stack.len;

    let tid = crate::sched::scheduler::spawn(1, "init", 1, Affinity::Any, MpuBank::empty());
    crate::sched::scheduler::with_thread_mut(tid, |t| {
        t.cpu_context.prepare(super::idle_main, stack_top);
        t.stack_region = Some(stack);
    });
    init_process.add_thread(tid);
    crate::sched::scheduler::start_for_current_core();
    crate::sched::scheduler::bootstrap_current(tid);

    #[cfg(target_arch = "aarch64")]
    {
        let interval_ms = crate::config::TICK_INTERVAL_MS;
        crate::arch::aarch64::timer::init_timer(interval_ms);
    }

    crate::info!("boot: switching from the boot stack into PID 1");

    // One-time hop off the boot stack: its register state is discarded,
    // so a throwaway context is enough as the `prev` save target.
    let mut boot_ctx = crate::arch::CpuContext::new();
    let next_ctx: *const crate::arch::CpuContext =
        crate::sched::scheduler::with_thread(tid, |t| &t.cpu_context as *const _)
            .expect("PID 1's thread must exist");
    crate::arch::irq::enable();
    unsafe { crate::arch::context::switch_to(&mut boot_ctx, next_ctx) };

    Ok(())
}
