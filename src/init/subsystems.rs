//! Core subsystem bring-up: process table, exception vectors, and the
//! companion-core boot, in the order each depends on the last.

use super::error::KernelResult;

/// # Safety
/// Must run after memory bring-up and before any thread is spawned.
pub unsafe fn init_core_subsystems() -> KernelResult<()> {
    crate::process::pid::init_process_table();

    #[cfg(target_arch = "aarch64")]
    crate::arch::aarch64::trap::init_exception_vectors();

    crate::smp::init();
    Ok(())
}
