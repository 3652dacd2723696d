//! Memory Protection Unit descriptors and per-thread banks.
//!
//! The board has a fixed 16-slot MPU rather than page tables: each
//! process/thread gets a bank of descriptors (base, length, access
//! rights, region tag) burst-loaded into the MPU registers on context
//! switch (`arch::switch`). Shaped like a handful of named regions per
//! address space, generalized away from any full paging model.

use bitflags::bitflags;

use crate::mm::region::RegionTag;

pub const MPU_SLOTS: usize = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessRights: u8 {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXEC    = 1 << 2;
        const USER    = 1 << 3;
        const DEVICE  = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpuDescriptor {
    pub base: usize,
    pub length: usize,
    pub rights: AccessRights,
    pub tag: RegionTag,
    pub valid: bool,
}

impl MpuDescriptor {
    pub const fn empty() -> Self {
        Self {
            base: 0,
            length: 0,
            rights: AccessRights::empty(),
            tag: RegionTag::BulkSRAM,
            valid: false,
        }
    }

    pub fn covers(&self, addr: usize, len: usize) -> bool {
        self.valid
            && addr >= self.base
            && addr.saturating_add(len) <= self.base.saturating_add(self.length)
    }
}

/// A bank of up to 16 descriptors belonging to one thread or process.
/// One slot is reserved as a guard (invalid, zero-length) immediately
/// past the top of every stack region to turn overflow into a fault
/// instead of silent corruption.
#[derive(Debug, Clone, Copy)]
pub struct MpuBank {
    pub slots: [MpuDescriptor; MPU_SLOTS],
}

impl MpuBank {
    pub const fn empty() -> Self {
        Self {
            slots: [MpuDescriptor::empty(); MPU_SLOTS],
        }
    }

    pub fn add(&mut self, desc: MpuDescriptor) -> Result<usize, crate::lib::error::Errno> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.valid {
                *slot = desc;
                return Ok(i);
            }
        }
        Err(crate::lib::error::Errno::ENOMEM)
    }

    pub fn add_stack_with_guard(
        &mut self,
        base: usize,
        len: usize,
        rights: AccessRights,
        tag: RegionTag,
        guard_len: usize,
    ) -> Result<usize, crate::lib::error::Errno> {
        let idx = self.add(MpuDescriptor {
            base,
            length: len,
            rights,
            tag,
            valid: true,
        })?;
        // Guard slot: invalid/zero-length marker just past the stack top,
        // carried for fault-handler diagnostics (arch::fault checks
        // whether a fault address lands in the gap instead of a slot).
        let _ = self.add(MpuDescriptor {
            base: base + len,
            length: guard_len,
            rights: AccessRights::empty(),
            tag,
            valid: false,
        });
        Ok(idx)
    }

    pub fn remove(&mut self, idx: usize) {
        if idx < MPU_SLOTS {
            self.slots[idx] = MpuDescriptor::empty();
        }
    }

    pub fn find_covering(&self, addr: usize, len: usize) -> Option<&MpuDescriptor> {
        self.slots.iter().find(|d| d.covers(addr, len))
    }

    pub fn check_access(&self, addr: usize, len: usize, need: AccessRights) -> bool {
        match self.find_covering(addr, len) {
            Some(d) => d.rights.contains(need),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_find_covering() {
        let mut bank = MpuBank::empty();
        bank.add(MpuDescriptor {
            base: 0x1000,
            length: 0x100,
            rights: AccessRights::READ | AccessRights::WRITE,
            tag: RegionTag::FastSRAM,
            valid: true,
        })
        .unwrap();
        assert!(bank.check_access(0x1010, 0x10, AccessRights::READ));
        assert!(!bank.check_access(0x2000, 0x10, AccessRights::READ));
    }

    #[test]
    fn bank_exhaustion() {
        let mut bank = MpuBank::empty();
        for i in 0..MPU_SLOTS {
            assert!(bank
                .add(MpuDescriptor {
                    base: i * 0x1000,
                    length: 0x100,
                    rights: AccessRights::READ,
                    tag: RegionTag::FastSRAM,
                    valid: true,
                })
                .is_ok());
        }
        assert!(bank
            .add(MpuDescriptor {
                base: 0xFFFF,
                length: 0x10,
                rights: AccessRights::READ,
                tag: RegionTag::FastSRAM,
                valid: true,
            })
            .is_err());
    }
}
