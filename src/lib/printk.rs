//! Ring-buffered kernel log, trimmed of any UART passthrough - console
//! output is a driver concern and lives outside this kernel's scope.
//! `log()` records into `KERNEL_LOG`; retrieval happens through
//! `sys_dmesg` as an in-memory diagnostic log drained by a syscall
//! rather than streamed live.

use crate::ringbuf::RingBuffer;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// Human-readable or JSON output, selected at runtime for automated
/// collection during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogFormat {
    Human = 0,
    Json = 1,
}

static LOG_FORMAT: AtomicU8 = AtomicU8::new(LogFormat::Human as u8);

pub fn set_log_format(format: LogFormat) {
    LOG_FORMAT.store(format as u8, Ordering::Relaxed);
}

pub fn get_log_format() -> LogFormat {
    match LOG_FORMAT.load(Ordering::Relaxed) {
        1 => LogFormat::Json,
        _ => LogFormat::Human,
    }
}

#[derive(Copy, Clone)]
pub struct LogEntry {
    pub timestamp_us: u64,
    pub level: LogLevel,
    pub message: [u8; 256],
    pub len: usize,
}

pub struct LogBuffer {
    buffer: Mutex<RingBuffer<LogEntry, 4096>>,
}

impl LogBuffer {
    pub const fn new() -> Self {
        Self {
            buffer: Mutex::new(RingBuffer::new()),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut buffer = self.buffer.lock();
        if !buffer.push(entry) {
            // Oldest-first eviction: drop one record to make room rather
            // than lose the newest log line.
            buffer.pop();
            buffer.push(entry);
        }
    }

    pub fn drain_all(&self) -> alloc::vec::Vec<LogEntry> {
        self.buffer.lock().drain_all()
    }

    pub fn snapshot(&self) -> alloc::vec::Vec<LogEntry> {
        self.buffer.lock().snapshot()
    }
}

static KERNEL_LOG: LogBuffer = LogBuffer::new();

fn make_entry(level: LogLevel, message: &str) -> LogEntry {
    let mut buf = [0u8; 256];
    let len = core::cmp::min(message.len(), buf.len());
    buf[..len].copy_from_slice(&message.as_bytes()[..len]);
    LogEntry {
        timestamp_us: crate::time::get_timestamp_us(),
        level,
        message: buf,
        len,
    }
}

pub fn log(level: LogLevel, args: fmt::Arguments) {
    let msg = alloc::format!("{}", args);
    let entry = make_entry(level, &msg);
    persist::append(&entry);
    KERNEL_LOG.push(entry);
}

/// The kernel log's SRAM-backed half: a fixed-record ring living in the
/// carve-out ahead of `BulkSRAM`, recognized by its header on boot so
/// content survives a warm reset. `KERNEL_LOG` above is the fast volatile
/// mirror `sys_dmesg` actually reads from; this module only exists to
/// get the previous boot's tail onto the console before it's overwritten.
mod persist {
    use super::{LogEntry, LogLevel};

    const MAGIC: u32 = 0x4B4C_4F47; // "KLOG"
    const HEADER_BYTES: usize = 16;
    const MSG_CAP: usize = 128;
    const RECORD_BYTES: usize = 8 + 1 + 2 + MSG_CAP;

    const NUM_SLOTS: usize = (crate::config::PERSIST_LOG_BYTES - HEADER_BYTES) / RECORD_BYTES;

    #[cfg(target_arch = "aarch64")]
    mod raw {
        use super::{HEADER_BYTES, NUM_SLOTS, RECORD_BYTES};

        const MAGIC_OFF: usize = 0;
        const PRODUCER_OFF: usize = 4;
        const CONSUMER_OFF: usize = 8;
        const CAPACITY_OFF: usize = 12;

        fn base() -> *mut u8 {
            crate::config::PERSIST_LOG_BASE as *mut u8
        }

        pub unsafe fn read_u32(off: usize) -> u32 {
            core::ptr::read_volatile(base().add(off) as *const u32)
        }

        pub unsafe fn write_u32(off: usize, val: u32) {
            core::ptr::write_volatile(base().add(off) as *mut u32, val)
        }

        pub fn magic_off() -> usize {
            MAGIC_OFF
        }
        pub fn producer_off() -> usize {
            PRODUCER_OFF
        }
        pub fn consumer_off() -> usize {
            CONSUMER_OFF
        }
        pub fn capacity_off() -> usize {
            CAPACITY_OFF
        }

        pub unsafe fn record_ptr(slot: usize) -> *mut u8 {
            base().add(HEADER_BYTES + (slot % NUM_SLOTS) * RECORD_BYTES)
        }
    }

    #[cfg(target_arch = "aarch64")]
    pub fn recover_and_init() {
        use raw::*;
        unsafe {
            let magic = read_u32(magic_off());
            let capacity = read_u32(capacity_off());
            if magic == MAGIC && capacity as usize == NUM_SLOTS {
                drain_previous_boot();
            } else {
                write_u32(magic_off(), MAGIC);
                write_u32(producer_off(), 0);
                write_u32(consumer_off(), 0);
                write_u32(capacity_off(), NUM_SLOTS as u32);
            }
        }
    }

    #[cfg(target_arch = "aarch64")]
    unsafe fn drain_previous_boot() {
        use raw::*;
        let producer = read_u32(producer_off()) as usize;
        let mut consumer = read_u32(consumer_off()) as usize;
        crate::arch::aarch64::console::write(b"\n-- recovered log from previous boot --\n");
        while consumer % NUM_SLOTS != producer % NUM_SLOTS {
            let rec = record_ptr(consumer);
            let len = core::ptr::read_unaligned(rec.add(9) as *const u16) as usize;
            let len = len.min(MSG_CAP);
            let msg = core::slice::from_raw_parts(rec.add(11), len);
            crate::arch::aarch64::console::write(msg);
            crate::arch::aarch64::console::write(b"\n");
            consumer = consumer.wrapping_add(1);
        }
        write_u32(consumer_off(), (producer % NUM_SLOTS) as u32);
    }

    #[cfg(target_arch = "aarch64")]
    pub fn append(entry: &LogEntry) {
        use raw::*;
        unsafe {
            let producer = read_u32(producer_off()) as usize;
            let next = (producer + 1) % NUM_SLOTS;
            let rec = record_ptr(producer);
            core::ptr::write_unaligned(rec as *mut u64, entry.timestamp_us);
            core::ptr::write_unaligned(rec.add(8) as *mut u8, entry.level as u8);
            let len = entry.len.min(MSG_CAP) as u16;
            core::ptr::write_unaligned(rec.add(9) as *mut u16, len);
            core::ptr::copy_nonoverlapping(entry.message.as_ptr(), rec.add(11), len as usize);
            write_u32(producer_off(), next as u32);
            if next == read_u32(consumer_off()) as usize {
                write_u32(consumer_off(), ((next + 1) % NUM_SLOTS) as u32);
            }
        }
    }

    #[cfg(not(target_arch = "aarch64"))]
    pub fn recover_and_init() {}

    #[cfg(not(target_arch = "aarch64"))]
    pub fn append(_entry: &LogEntry) {
        let _ = LogLevel::Info;
    }
}

/// Recognize (or (re)initialize) the persisted log header and, on a warm
/// reset, drain the previous boot's tail to the physical console. Must
/// run after the exception level check but has no dependency on the heap.
pub fn recover_persisted_log() {
    persist::recover_and_init();
}

/// Structured `subsystem: status` logging for automated bring-up checks.
pub fn log_structured(subsystem: &str, status: &str, level: LogLevel) {
    let msg = match get_log_format() {
        LogFormat::Json => alloc::format!(
            "{{\"ts\":{},\"subsystem\":\"{}\",\"status\":\"{}\",\"level\":\"{}\"}}",
            crate::time::get_timestamp_us(),
            subsystem,
            status,
            level.as_str()
        ),
        LogFormat::Human => alloc::format!("{}: {}", subsystem, status),
    };
    KERNEL_LOG.push(make_entry(level, &msg));
}

pub fn log_structured_kv(subsystem: &str, level: LogLevel, kvs: &[(&str, &str)]) {
    let mut msg = match get_log_format() {
        LogFormat::Json => alloc::format!(
            "{{\"ts\":{},\"subsystem\":\"{}\",\"level\":\"{}\"",
            crate::time::get_timestamp_us(),
            subsystem,
            level.as_str()
        ),
        LogFormat::Human => alloc::format!("{}: ", subsystem),
    };
    for (i, (key, value)) in kvs.iter().enumerate() {
        match get_log_format() {
            LogFormat::Json => msg.push_str(&alloc::format!(",\"{}\":\"{}\"", key, value)),
            LogFormat::Human => {
                if i > 0 {
                    msg.push_str(", ");
                }
                msg.push_str(&alloc::format!("{}={}", key, value));
            }
        }
    }
    if get_log_format() == LogFormat::Json {
        msg.push('}');
    }
    KERNEL_LOG.push(make_entry(level, &msg));
}

#[macro_export]
macro_rules! printk {
    ($level:expr, $($arg:tt)*) => {
        $crate::lib::printk::log($level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::printk::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::printk::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::printk::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::printk::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::printk::LogLevel::Trace, $($arg)*)
    };
}

#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {
        $crate::printk!($level, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_event {
    ($subsystem:expr, $status:expr) => {
        $crate::lib::printk::log_structured(
            $subsystem,
            $status,
            $crate::lib::printk::LogLevel::Info
        )
    };
    ($subsystem:expr, $status:expr, $level:expr) => {
        $crate::lib::printk::log_structured($subsystem, $status, $level)
    };
}

#[macro_export]
macro_rules! log_kv {
    ($subsystem:expr, $level:expr, $($key:expr => $value:expr),+) => {
        {
            let kvs: &[(&str, &str)] = &[$(($key, $value)),+];
            $crate::lib::printk::log_structured_kv($subsystem, $level, kvs)
        }
    };
}

/// Non-destructive oldest-first copy of the current log contents, for the
/// panic handler's "recent log lines" section.
pub fn recent_logs() -> alloc::vec::Vec<LogEntry> {
    KERNEL_LOG.snapshot()
}

/// Backing implementation for `SyscallNo::Dmesg`: drains the log and
/// copies raw message bytes into the caller's buffer, oldest first.
pub fn sys_dmesg(buf: *mut u8, count: usize) -> Result<isize, crate::lib::error::Errno> {
    use crate::lib::error::Errno;

    if buf.is_null() {
        return Err(Errno::EFAULT);
    }

    let entries = KERNEL_LOG.drain_all();
    let mut written = 0;

    for entry in entries {
        if written + entry.len > count {
            break;
        }
        unsafe {
            core::ptr::copy_nonoverlapping(entry.message.as_ptr(), buf.add(written), entry.len);
        }
        written += entry.len;
    }

    Ok(written as isize)
}
