//! Architecture glue: the aarch64 backend plus the small set of traits
//! and types the rest of the kernel depends on regardless of target.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{irq, TrapFrame};

#[cfg(not(target_arch = "aarch64"))]
pub mod host;
#[cfg(not(target_arch = "aarch64"))]
pub use host::{irq, TrapFrame};

pub mod context;
pub mod cache;
pub mod fault;
pub mod switch;

pub use context::CpuContext;
