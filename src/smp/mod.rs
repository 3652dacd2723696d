//! Dual-core bring-up: the application core boots first and brings up the
//! fixed real-time companion core via `secondary_cpu_boot`/`cpu_on` PSCI
//! calls, trimmed from a generic N-CPU hotplug model to this device's
//! fixed two cores.

pub mod ipi;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;

use crate::sched::thread::{CORE_APP, CORE_RT, MAX_CORES};

#[cfg(target_arch = "aarch64")]
const CPU_STACK_SIZE: usize = 16 * 1024;

#[cfg(target_arch = "aarch64")]
#[repr(C, align(16))]
struct CpuStack([u8; CPU_STACK_SIZE]);

#[cfg(target_arch = "aarch64")]
static RT_CORE_STACK: CpuStack = CpuStack([0; CPU_STACK_SIZE]);

static CPU_COUNT: AtomicUsize = AtomicUsize::new(1);
static CPU_ONLINE: [AtomicBool; MAX_CORES] = [AtomicBool::new(false), AtomicBool::new(false)];
static SMP_INIT_LOCK: Mutex<()> = Mutex::new(());

pub fn num_cores_online() -> usize {
    CPU_COUNT.load(Ordering::Acquire)
}

pub fn is_core_online(core: usize) -> bool {
    core < MAX_CORES && CPU_ONLINE[core].load(Ordering::Acquire)
}

fn mark_online(core: usize) {
    if core < MAX_CORES && !CPU_ONLINE[core].swap(true, Ordering::Release) {
        CPU_COUNT.fetch_add(1, Ordering::Release);
        crate::info!("smp: core {} online", core);
    }
}

/// Entry point for the real-time companion core, reached via
/// `rt_core_boot` once PSCI has handed it a stack and jumped here.
#[cfg(target_arch = "aarch64")]
#[no_mangle]
pub extern "C" fn rt_core_entry() -> ! {
    mark_online(CORE_RT);
    crate::sched::scheduler::start_for_current_core();
    loop {
        ipi::drain_for_current_core();
        unsafe { core::arch::asm!("wfe", options(nomem, nostack)) };
    }
}

/// Physical entry point PSCI jumps to for the companion core: set up a
/// stack, then hand off to Rust.
///
/// # Safety
/// Must only be invoked once, by firmware, as the companion core's reset
/// vector.
#[cfg(target_arch = "aarch64")]
#[no_mangle]
pub unsafe extern "C" fn rt_core_boot() -> ! {
    let stack_top = RT_CORE_STACK.0.as_ptr() as usize + CPU_STACK_SIZE;
    core::arch::asm!(
        "mov sp, {stack_top}",
        "b {entry}",
        stack_top = in(reg) stack_top,
        entry = sym rt_core_entry,
        options(noreturn)
    );
}

/// Bring up the companion core. Called once from the application core's
/// boot path. A single-core build (the `single-core` feature) skips this
/// and runs everything on `CORE_APP`.
pub fn init() {
    let _lock = SMP_INIT_LOCK.lock();
    mark_online(CORE_APP);

    #[cfg(feature = "single-core")]
    {
        crate::info!("smp: single-core build, not starting the companion core");
        return;
    }

    #[cfg(all(not(feature = "single-core"), target_arch = "aarch64"))]
    {
        let entry_point = rt_core_boot as *const () as u64;
        match crate::arch::aarch64::psci::cpu_on(CORE_RT as u64, entry_point, 0) {
            Ok(()) => crate::info!("smp: companion core boot initiated"),
            Err(e) => {
                crate::warn!("smp: failed to bring up companion core: {:?}, running app core only", e)
            }
        }
    }
    #[cfg(all(not(feature = "single-core"), not(target_arch = "aarch64")))]
    {
        crate::warn!("smp: no PSCI backend for this target, running app core only");
    }
}
