//! PSCI CPU_ON, trimmed to the one call the companion-core bring-up
//! needs.

use core::arch::asm;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsciError {
    NotSupported = -1,
    InvalidParameters = -2,
    Denied = -3,
    AlreadyOn = -4,
    OnPending = -5,
    InternalFailure = -6,
    NotPresent = -7,
    Disabled = -8,
    InvalidAddress = -9,
}

impl PsciError {
    fn from_i32(code: i32) -> Result<(), Self> {
        match code {
            0 => Ok(()),
            -1 => Err(Self::NotSupported),
            -2 => Err(Self::InvalidParameters),
            -3 => Err(Self::Denied),
            -4 => Err(Self::AlreadyOn),
            -5 => Err(Self::OnPending),
            -6 => Err(Self::InternalFailure),
            -7 => Err(Self::NotPresent),
            -8 => Err(Self::Disabled),
            -9 => Err(Self::InvalidAddress),
            _ => Err(Self::InternalFailure),
        }
    }
}

const PSCI_CPU_ON: u32 = 0xC400_0003;

#[inline]
unsafe fn psci_call(function: u32, arg0: u64, arg1: u64, arg2: u64) -> i32 {
    let result: i32;
    asm!(
        "mov x0, {function}",
        "mov x1, {arg0}",
        "mov x2, {arg1}",
        "mov x3, {arg2}",
        "smc #0",
        "sxtw {result}, w0",
        function = in(reg) function as u64,
        arg0 = in(reg) arg0,
        arg1 = in(reg) arg1,
        arg2 = in(reg) arg2,
        result = out(reg) result,
        options(nomem, nostack)
    );
    result
}

/// Bring a secondary CPU online at `entry_point` with `context_id`
/// passed through (conventionally the target core index).
pub fn cpu_on(target_cpu: u64, entry_point: u64, context_id: u64) -> Result<(), PsciError> {
    let result = unsafe { psci_call(PSCI_CPU_ON, target_cpu, entry_point, context_id) };
    PsciError::from_i32(result)
}
