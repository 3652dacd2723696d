// AArch64 Generic Timer support.
//
// Drives the kernel clock's tick via the EL1 physical timer (PPI 30).
// Frequency is read from CNTFRQ_EL0, set by firmware before the kernel
// gets control. Routing PPI 30 through the interrupt controller is a
// platform bring-up concern handled ahead of this module; here we only
// read the counter and arm/rearm the comparator.

use core::arch::asm;

pub const TIMER_IRQ_PHYS: u32 = 30;

#[inline(always)]
pub fn read_cntpct() -> u64 {
    let count: u64;
    unsafe {
        asm!("mrs {}, CNTPCT_EL0", out(reg) count);
    }
    count
}

#[inline(always)]
pub fn read_cntfrq() -> u64 {
    let freq: u64;
    unsafe {
        asm!("mrs {}, CNTFRQ_EL0", out(reg) freq);
    }
    freq
}

pub fn get_time_us() -> u64 {
    let count = read_cntpct();
    let freq = read_cntfrq();
    if freq == 0 {
        return 0;
    }
    (count * 1_000_000) / freq
}

pub fn get_time_ms() -> u64 {
    get_time_us() / 1000
}

/// Arm the physical timer to fire `interval_ms` from now and enable it.
pub fn init_timer(interval_ms: u64) {
    unsafe {
        let freq = read_cntfrq();
        let cycles = (freq * interval_ms) / 1000;
        let now = read_cntpct();
        let cval = now + cycles;
        asm!("msr CNTP_CVAL_EL0, {}", in(reg) cval);
        asm!("msr CNTP_CTL_EL0, {}", in(reg) 1u64);
        asm!("isb");
    }
}

/// Arm the timer to fire `us` microseconds from now, without touching
/// the enable bit.
pub fn set_timer_interrupt(us: u64) {
    unsafe {
        let freq = read_cntfrq();
        let cycles = (freq * us) / 1_000_000;
        let now = read_cntpct();
        let cval = now + cycles;
        asm!("msr CNTP_CVAL_EL0, {}", in(reg) cval);
        asm!("isb");
    }
}

pub fn disable_timer() {
    unsafe {
        asm!("msr CNTP_CTL_EL0, {}", in(reg) 0u64);
        asm!("isb");
    }
}

/// Reload the comparator for another `interval_ms`, called from the IRQ
/// handler to keep the tick periodic. Only reloads if ISTATUS shows the
/// prior interrupt actually fired.
///
/// # Safety
/// Must be called from the IRQ exception handler.
pub unsafe fn handle_timer_interrupt(interval_ms: u64) {
    let ctl: u64;
    asm!("mrs {}, CNTP_CTL_EL0", out(reg) ctl);

    if (ctl & 0x04) != 0 {
        let freq = read_cntfrq();
        let cycles = (freq * interval_ms) / 1000;
        let now = read_cntpct();
        let next = now + cycles;
        asm!("msr CNTP_CVAL_EL0, {}", in(reg) next);
        asm!("isb");
    }
}
