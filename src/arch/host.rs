//! Stand-in for the aarch64 backend when building for `cargo test` on the
//! host (x86_64). Only the pieces pure data-structure tests need.

use core::sync::atomic::{AtomicBool, Ordering};

/// Per-thread-in-test IRQ mask flag; not a real interrupt mask, just
/// enough state for the spinlock/IrqGuard tests to exercise nesting.
static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);

pub mod irq {
    use super::*;

    /// Disable and return whether IRQs were previously enabled.
    pub fn disable() -> bool {
        IRQ_ENABLED.swap(false, Ordering::AcqRel)
    }

    pub fn enable() {
        IRQ_ENABLED.store(true, Ordering::Release);
    }

    pub fn enabled() -> bool {
        IRQ_ENABLED.load(Ordering::Acquire)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    pub regs: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64,
}
