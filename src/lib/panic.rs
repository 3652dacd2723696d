//! Panic handler: register dump, heap stats, recent log lines and a
//! best-effort frame-pointer walk, all written through the raw panic
//! console since the ring-buffered logger may itself be unreachable by
//! the time a panic fires.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::arch::aarch64::console;

static PANICKING: AtomicBool = AtomicBool::new(false);
static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn panic_handler(info: &PanicInfo) -> ! {
    if PANICKING.swap(true, Ordering::SeqCst) {
        console::write(b"\n!!! RECURSIVE PANIC !!!\n");
        halt();
    }

    let panic_num = PANIC_COUNT.fetch_add(1, Ordering::SeqCst) + 1;

    disable_interrupts();

    print_panic_header(panic_num);
    print_panic_info(info);
    print_registers();
    print_system_state();
    print_recent_logs();
    print_stack_trace();
    print_next_steps();

    halt();
}

fn print_panic_header(panic_num: u64) {
    console::write(b"\n");
    console::write(b"================================================================================\n");
    console::write(b"!!!                        KERNEL PANIC                                      !!!\n");
    console::write(b"================================================================================\n");
    if panic_num > 1 {
        console::write(alloc::format!("Panic #{}\n", panic_num).as_bytes());
    }
    console::write(b"\n");
}

fn print_panic_info(info: &PanicInfo) {
    console::write(b"PANIC INFORMATION:\n");
    console::write(b"------------------\n");

    if let Some(location) = info.location() {
        let loc = alloc::format!(
            "  Location: {}:{}:{}\n",
            location.file(),
            location.line(),
            location.column()
        );
        console::write(loc.as_bytes());
    } else {
        console::write(b"  Location: <unknown>\n");
    }

    if let Some(payload) = info.payload().downcast_ref::<&str>() {
        console::write(alloc::format!("  Message:  {}\n", payload).as_bytes());
    } else if let Some(payload) = info.payload().downcast_ref::<alloc::string::String>() {
        console::write(alloc::format!("  Message:  {}\n", payload).as_bytes());
    } else {
        console::write(b"  Message:  <no message>\n");
    }

    console::write(b"\n");
}

fn print_registers() {
    console::write(b"REGISTER DUMP:\n");
    console::write(b"--------------\n");
    print_aarch64_registers();
    console::write(b"\n");
}

fn print_aarch64_registers() {
    use core::arch::asm;

    unsafe {
        let mut x0: u64;
        let mut x1: u64;
        let mut x2: u64;
        let mut x3: u64;
        let mut x4: u64;
        let mut x5: u64;
        let mut x6: u64;
        let mut x7: u64;
        let mut x8: u64;
        let mut x9: u64;
        let mut x10: u64;
        let mut x11: u64;
        let mut x12: u64;
        let mut x13: u64;
        let mut x14: u64;
        let mut x15: u64;
        let mut x16: u64;
        let mut x17: u64;
        let mut x18: u64;
        let mut x19: u64;
        let mut x20: u64;
        let mut x21: u64;
        let mut x22: u64;
        let mut x23: u64;
        let mut x24: u64;
        let mut x25: u64;
        let mut x26: u64;
        let mut x27: u64;
        let mut x28: u64;
        let mut x29: u64;
        let mut x30: u64;
        let mut sp: u64;
        let mut pc: u64;

        asm!("mov {}, x0", out(reg) x0);
        asm!("mov {}, x1", out(reg) x1);
        asm!("mov {}, x2", out(reg) x2);
        asm!("mov {}, x3", out(reg) x3);
        asm!("mov {}, x4", out(reg) x4);
        asm!("mov {}, x5", out(reg) x5);
        asm!("mov {}, x6", out(reg) x6);
        asm!("mov {}, x7", out(reg) x7);
        asm!("mov {}, x8", out(reg) x8);
        asm!("mov {}, x9", out(reg) x9);
        asm!("mov {}, x10", out(reg) x10);
        asm!("mov {}, x11", out(reg) x11);
        asm!("mov {}, x12", out(reg) x12);
        asm!("mov {}, x13", out(reg) x13);
        asm!("mov {}, x14", out(reg) x14);
        asm!("mov {}, x15", out(reg) x15);
        asm!("mov {}, x16", out(reg) x16);
        asm!("mov {}, x17", out(reg) x17);
        asm!("mov {}, x18", out(reg) x18);
        asm!("mov {}, x19", out(reg) x19);
        asm!("mov {}, x20", out(reg) x20);
        asm!("mov {}, x21", out(reg) x21);
        asm!("mov {}, x22", out(reg) x22);
        asm!("mov {}, x23", out(reg) x23);
        asm!("mov {}, x24", out(reg) x24);
        asm!("mov {}, x25", out(reg) x25);
        asm!("mov {}, x26", out(reg) x26);
        asm!("mov {}, x27", out(reg) x27);
        asm!("mov {}, x28", out(reg) x28);
        asm!("mov {}, x29", out(reg) x29);
        asm!("mov {}, x30", out(reg) x30);
        asm!("mov {}, sp", out(reg) sp);
        asm!("adr {}, .", out(reg) pc);

        let regs = alloc::format!(
            "  x0:  {:016x}  x1:  {:016x}  x2:  {:016x}  x3:  {:016x}\n\
             x4:  {:016x}  x5:  {:016x}  x6:  {:016x}  x7:  {:016x}\n\
             x8:  {:016x}  x9:  {:016x}  x10: {:016x}  x11: {:016x}\n\
             x12: {:016x}  x13: {:016x}  x14: {:016x}  x15: {:016x}\n\
             x16: {:016x}  x17: {:016x}  x18: {:016x}  x19: {:016x}\n\
             x20: {:016x}  x21: {:016x}  x22: {:016x}  x23: {:016x}\n\
             x24: {:016x}  x25: {:016x}  x26: {:016x}  x27: {:016x}\n\
             x28: {:016x}  x29: {:016x}  x30: {:016x}\n\
             sp:  {:016x}  pc:  {:016x}\n",
            x0, x1, x2, x3, x4, x5, x6, x7, x8, x9, x10, x11, x12, x13, x14, x15, x16, x17, x18,
            x19, x20, x21, x22, x23, x24, x25, x26, x27, x28, x29, x30, sp, pc
        );
        console::write(regs.as_bytes());
    }
}

fn print_system_state() {
    console::write(b"SYSTEM STATE:\n");
    console::write(b"-------------\n");

    let uptime_ms = crate::time::get_uptime_ms();
    console::write(
        alloc::format!(
            "  Uptime:       {} seconds ({} ms)\n",
            uptime_ms / 1000,
            uptime_ms
        )
        .as_bytes(),
    );

    let stats = crate::heap::get_heap_stats();
    let current_mb = stats.current_allocated() / (1024 * 1024);
    let peak_mb = stats.peak_allocated() / (1024 * 1024);
    let allocs = stats.total_allocations();
    let deallocs = stats.total_deallocations();
    console::write(
        alloc::format!(
            "  Heap usage:   {} MB current, {} MB peak\n\
             Allocations: {} allocs, {} deallocs, {} active\n\
             Failures:    {}\n",
            current_mb,
            peak_mb,
            allocs,
            deallocs,
            allocs.saturating_sub(deallocs),
            stats.allocation_failures()
        )
        .as_bytes(),
    );

    console::write(b"\n");
}

fn print_recent_logs() {
    console::write(b"RECENT LOGS:\n");
    console::write(b"------------\n");

    let entries = crate::lib::printk::recent_logs();
    if entries.is_empty() {
        console::write(b"  <none>\n");
    } else {
        for entry in entries.iter().rev().take(20).rev() {
            console::write(b"  [");
            console::write(entry.level.as_str().as_bytes());
            console::write(b"] ");
            console::write(&entry.message[..entry.len]);
            console::write(b"\n");
        }
    }
    console::write(b"\n");
}

fn print_stack_trace() {
    console::write(b"STACK TRACE:\n");
    console::write(b"------------\n");
    console::write(b"  [Best-effort frame pointer walk]\n");

    use core::arch::asm;
    let mut fp: u64;
    unsafe { asm!("mov {}, x29", out(reg) fp) };

    for i in 0..10 {
        if fp == 0 || fp < 0x4000_0000 || fp > 0x1000_0000_0000 {
            break;
        }
        let frame_ptr = fp as *const u64;
        let lr = unsafe { frame_ptr.offset(1).read_volatile() };
        console::write(alloc::format!("  #{}: {:016x}\n", i, lr).as_bytes());
        fp = unsafe { frame_ptr.read_volatile() };
    }

    console::write(b"\n");
}

fn print_next_steps() {
    console::write(b"DEBUGGING STEPS:\n");
    console::write(b"----------------\n");
    console::write(b"  1. Check panic location and message above\n");
    console::write(b"  2. Examine register values for invalid pointers\n");
    console::write(b"  3. Check heap usage for memory exhaustion\n");
    console::write(b"  4. Review recent logs for error patterns\n");
    console::write(b"  5. If stack trace available, identify call chain\n");
    console::write(b"\n");
}

#[inline(always)]
fn disable_interrupts() {
    unsafe { core::arch::asm!("msr daifset, #0xf") };
}

#[inline(always)]
fn halt() -> ! {
    console::write(b"================================================================================\n");
    console::write(b"System halted.\n");
    console::write(b"================================================================================\n");
    loop {
        unsafe { core::arch::asm!("wfe") };
    }
}

pub fn get_panic_count() -> u64 {
    PANIC_COUNT.load(Ordering::Relaxed)
}

pub fn is_panicking() -> bool {
    PANICKING.load(Ordering::Relaxed)
}
