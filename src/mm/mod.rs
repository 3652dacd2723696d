//! Memory management: region-tagged buddy allocators and MPU descriptors.

pub mod buddy;
pub mod region;
pub mod region_alloc;
pub mod mpu;

pub use region::{allocate, allocate_for_stack, RegionHandle, RegionTag};
pub use region_alloc::RegionBox;
pub use mpu::{AccessRights, MpuBank, MpuDescriptor, MPU_SLOTS};

pub fn init() {
    region::init();
    crate::info!("mm: {} regions initialized", crate::config::REGIONS.len());
}
