//! Kernel boot sequence: early/memory/subsystem/late phases, run once
//! from the aarch64 reset path before handing control to PID 1.

pub mod error;
mod mm_init;
mod phases;
mod subsystems;

pub use error::{KernelError, KernelResult};

/// Run every boot phase in order. Does not return on success: `late_init`
/// switches off the boot stack and into PID 1's thread.
///
/// # Safety
/// Must be called exactly once, from the reset vector, before any other
/// kernel code runs.
pub unsafe fn boot() -> KernelResult<()> {
    phases::early_init()?;
    phases::memory_init()?;
    phases::subsystem_init()?;
    phases::late_init()?;
    Ok(())
}

/// PID 1's entry point. There is no userspace program loader in this
/// kernel - PID 1 just idles, leaving the ready queue to whatever other
/// threads get spawned via syscalls, and parking the core in `wfe`
/// between ticks rather than busy-spinning.
extern "C" fn idle_main() -> ! {
    loop {
        crate::smp::ipi::drain_for_current_core();
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "aarch64"))]
        core::hint::spin_loop();
    }
}
