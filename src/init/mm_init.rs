//! Memory bring-up: the general-purpose heap, then the per-region
//! buddy allocators.

use super::error::{KernelError, KernelResult};

/// # Safety
/// Must be called once, early, before any code allocates.
pub unsafe fn init_memory() -> KernelResult<()> {
    crate::heap::init_heap().map_err(KernelError::EarlyInit)?;
    crate::info!(
        "heap: {} bytes available for Box/Vec/Arc",
        crate::heap::heap_total_size()
    );

    crate::mm::init();
    Ok(())
}
