//! Compile-time board configuration: per-region base/length tables, core
//! count, MPU slot count, priority levels and default stack sizes. Board
//! variants are selected via Cargo features (dual-core by default,
//! `single-core` for the app-core-only configuration).

use crate::mm::region::RegionTag;

#[cfg(feature = "single-core")]
pub const NUM_CORES: usize = 1;
#[cfg(not(feature = "single-core"))]
pub const NUM_CORES: usize = 2;

pub const NPRIORITIES: usize = crate::sched::thread::NPRIORITIES;
pub const MPU_SLOTS: usize = crate::mm::mpu::MPU_SLOTS;

pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;
pub const DEFAULT_HEAP_SIZE: usize = 64 * 1024;
pub const STACK_GUARD_SIZE: usize = 4 * 1024;

/// Max timeslice in timer ticks before a thread is preempted in favor of
/// an equal-priority peer.
pub const MAX_TIMESLICE_TICKS: u32 = 10;

/// Period of the generic timer tick, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 10;

/// Base and size of the uncached SRAM carve-out reserved for the
/// persisted kernel log, in the unmapped gap between `FastSRAM` and
/// `BulkSRAM` so it doesn't disturb either buddy allocator's
/// power-of-two extent. Content here survives a warm reset - only cold
/// power-on clears SRAM.
pub const PERSIST_LOG_BASE: usize = 0x2FF0_0000;
pub const PERSIST_LOG_BYTES: usize = 64 * 1024;

/// Static per-region (base, length, minimum block) table. Lengths and
/// bases are board constants; QEMU/virt values stand in for silicon
/// addresses for this crate's `aarch64` simulation target.
pub struct RegionConfig {
    pub tag: RegionTag,
    pub base: usize,
    pub length: usize,
    pub min_block: usize,
}

pub const REGIONS: &[RegionConfig] = &[
    RegionConfig {
        tag: RegionTag::TightlyCoupledCode,
        base: 0x0000_0000,
        length: 256 * 1024,
        min_block: 256,
    },
    RegionConfig {
        tag: RegionTag::TightlyCoupledData,
        base: 0x1000_0000,
        length: 128 * 1024,
        min_block: 128,
    },
    RegionConfig {
        tag: RegionTag::FastSRAM,
        base: 0x2000_0000,
        length: 512 * 1024,
        min_block: 256,
    },
    RegionConfig {
        tag: RegionTag::BulkSRAM,
        base: 0x3000_0000,
        length: 4 * 1024 * 1024,
        min_block: 1024,
    },
    RegionConfig {
        tag: RegionTag::ExternalDRAM,
        base: 0x4000_0000,
        length: 64 * 1024 * 1024,
        min_block: 4096,
    },
];

/// Affinity-ordered region preference for stack allocation: fastest/
/// tightest-coupled memory first, falling back to bulk/external when the
/// preferred tiers are exhausted.
pub const STACK_REGION_PREFERENCE: &[RegionTag] = &[
    RegionTag::TightlyCoupledData,
    RegionTag::FastSRAM,
    RegionTag::BulkSRAM,
    RegionTag::ExternalDRAM,
];
