//! Boot-phase errors, returned by each phase in `init::phases` so a
//! failure can be reported with the phase that caused it instead of a
//! bare panic partway through bring-up.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Heap bring-up failed before anything else could run.
    EarlyInit(&'static str),
    /// Region table bring-up failed.
    MemoryInit(&'static str),
    /// Process table, scheduler, or exception vector bring-up failed.
    SubsystemInit(&'static str),
    /// PID 1 creation or initial scheduling failed.
    LateInit(&'static str),
    /// Booted at an exception level other than EL1.
    InvalidExceptionLevel(u8),
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EarlyInit(msg) => write!(f, "early init failed: {}", msg),
            Self::MemoryInit(msg) => write!(f, "memory init failed: {}", msg),
            Self::SubsystemInit(msg) => write!(f, "subsystem init failed: {}", msg),
            Self::LateInit(msg) => write!(f, "late init failed: {}", msg),
            Self::InvalidExceptionLevel(el) => write!(f, "invalid exception level: EL{}", el),
        }
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
