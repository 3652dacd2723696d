//! General-purpose kernel heap (`Box`/`Vec`/`Arc` backing store).
//!
//! Distinct from `mm::region`'s per-region buddy allocators: those hand
//! out board-address-tagged extents for stacks and `RegionBox<T>`
//! values under MPU accounting, not a generally addressable arena. The
//! global allocator needs real backing memory it can read and write, so
//! it keeps its own static arena instead.

use core::alloc::{GlobalAlloc, Layout};
use core::sync::atomic::{AtomicBool, Ordering};
use linked_list_allocator::LockedHeap;
use spin::Mutex;

const HEAP_SIZE: usize = 8 * 1024 * 1024;

#[repr(align(64))]
struct HeapArena([u8; HEAP_SIZE]);

static mut HEAP_MEMORY: HeapArena = HeapArena([0; HEAP_SIZE]);
static ALLOCATOR: LockedHeap = LockedHeap::empty();
static HEAP_INIT_DONE: AtomicBool = AtomicBool::new(false);

pub struct HeapStats {
    total_allocations: usize,
    total_deallocations: usize,
    current_allocated: usize,
    peak_allocated: usize,
    allocation_failures: usize,
}

impl HeapStats {
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }
    pub fn total_deallocations(&self) -> usize {
        self.total_deallocations
    }
    pub fn current_allocated(&self) -> usize {
        self.current_allocated
    }
    pub fn peak_allocated(&self) -> usize {
        self.peak_allocated
    }
    pub fn allocation_failures(&self) -> usize {
        self.allocation_failures
    }
}

static HEAP_STATS: Mutex<HeapStats> = Mutex::new(HeapStats {
    total_allocations: 0,
    total_deallocations: 0,
    current_allocated: 0,
    peak_allocated: 0,
    allocation_failures: 0,
});

pub fn get_heap_stats() -> HeapStats {
    let s = HEAP_STATS.lock();
    HeapStats {
        total_allocations: s.total_allocations,
        total_deallocations: s.total_deallocations,
        current_allocated: s.current_allocated,
        peak_allocated: s.peak_allocated,
        allocation_failures: s.allocation_failures,
    }
}

pub const fn heap_total_size() -> usize {
    HEAP_SIZE
}

/// Initialize the kernel heap. Idempotent; only the first caller wins.
pub fn init_heap() -> Result<(), &'static str> {
    if HEAP_INIT_DONE
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        unsafe {
            let arena_ptr = core::ptr::addr_of_mut!(HEAP_MEMORY) as *mut HeapArena;
            let start = core::ptr::addr_of_mut!((*arena_ptr).0) as *mut u8;
            ALLOCATOR.lock().init(start, HEAP_SIZE);
        }
    }
    Ok(())
}

struct StatsTrackingAllocator;

unsafe impl GlobalAlloc for StatsTrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = ALLOCATOR.alloc(layout);
        let mut stats = HEAP_STATS.lock();
        if !ptr.is_null() {
            stats.total_allocations += 1;
            stats.current_allocated += layout.size();
            if stats.current_allocated > stats.peak_allocated {
                stats.peak_allocated = stats.current_allocated;
            }
        } else {
            stats.allocation_failures += 1;
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let mut stats = HEAP_STATS.lock();
        stats.total_deallocations += 1;
        stats.current_allocated = stats.current_allocated.saturating_sub(layout.size());
        drop(stats);
        ALLOCATOR.dealloc(ptr, layout);
    }
}

#[cfg(not(test))]
#[global_allocator]
static GLOBAL_ALLOC: StatsTrackingAllocator = StatsTrackingAllocator;

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    crate::error!(
        "heap: allocation of {} bytes (align {}) failed",
        layout.size(),
        layout.align()
    );
    loop {
        core::hint::spin_loop();
    }
}
