//! Raw panic console: a single MMIO word write to the QEMU virt PL011,
//! bypassing the ring-buffered logger entirely. Panics need output that
//! survives a corrupted heap or a logger that can no longer be drained;
//! this is the only place in the kernel that touches UART hardware
//! directly, and it exists for that one purpose, not as a driver.

const PL011_BASE: usize = 0x0900_0000;

pub fn write(msg: &[u8]) {
    let dr = PL011_BASE as *mut u32;
    for &b in msg {
        unsafe { core::ptr::write_volatile(dr, b as u32) };
    }
}
