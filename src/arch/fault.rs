//! Hardware fault handler.
//!
//! Distinct from the Rust `panic_handler` (`lib/panic.rs`): this handles
//! CPU-raised faults (data/instruction aborts, alignment, undefined
//! instruction) reported through `ESR_EL1`/`FAR_EL1`. A fault while
//! running kernel code is unrecoverable and freezes the core for
//! postmortem inspection before a watchdog reset; a fault in a user
//! thread logs the register and MPU-bank state and terminates just that
//! process, the same postmortem idiom as the panic path but scoped to
//! one process instead of the whole machine.

use crate::arch::TrapFrame;
use crate::mm::mpu::MpuBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    Kernel,
    Process(u32),
}

pub struct FaultReport {
    pub origin: FaultOrigin,
    pub fault_addr: usize,
    pub esr: u64,
    pub pc: u64,
}

/// Diff the faulting address against the thread's MPU bank, logging
/// which slot (if any) would have covered it and by how much it missed.
fn log_mpu_context(bank: &MpuBank, fault_addr: usize) {
    let mut covered_by = None;
    for (i, slot) in bank.slots.iter().enumerate() {
        if slot.valid && fault_addr >= slot.base && fault_addr < slot.base + slot.length {
            covered_by = Some(i);
        }
    }
    match covered_by {
        Some(i) => crate::error!(
            "fault: address {:#x} is inside MPU slot {} despite an access fault (rights violation)",
            fault_addr,
            i
        ),
        None => crate::error!("fault: address {:#x} is not covered by any MPU slot", fault_addr),
    }
}

pub fn handle_fault(report: FaultReport, frame: &TrapFrame, bank: &MpuBank) {
    crate::error!(
        "fault: origin={:?} esr={:#x} pc={:#x} far={:#x}",
        report.origin,
        report.esr,
        report.pc,
        report.fault_addr
    );
    log_mpu_context(bank, report.fault_addr);

    match report.origin {
        FaultOrigin::Kernel => {
            crate::error!("fault: unrecoverable kernel fault, freezing core");
            freeze_for_inspection(frame);
        }
        FaultOrigin::Process(pid) => {
            crate::error!("fault: terminating process {}", pid);
            crate::process::terminate(pid, -1);
        }
    }
}

/// Halt the current core with IRQs masked so register/memory state is
/// preserved for a debugger or the persisted log, until the watchdog
/// (driven externally) resets the board.
fn freeze_for_inspection(_frame: &TrapFrame) -> ! {
    let _g = crate::sync::spinlock::IrqGuard::new();
    loop {
        core::hint::spin_loop();
    }
}
