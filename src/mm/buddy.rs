//! Bitmap-per-level buddy allocator.
//!
//! One free bitmap per level (level 0 = whole region, level N =
//! `min_block`-sized leaves), recursive split on allocation and
//! coalesce-with-buddy on free, with per-level live-block counters for
//! diagnostics.
//!
//! Releasing an extent that doesn't land on a power-of-two boundary
//! splits it into the largest aligned chunks that fit and discards the
//! unaligned leftover rather than feeding a sub-minimum free list - this
//! is intentional, not a bug: regions are sized in multiples of
//! `min_block` in practice so the leftover path is a defensive fallback,
//! not a normal case.

use crate::sync::spinlock::Spinlock;

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocStats {
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub allocations: u64,
    pub frees: u64,
    pub failures: u64,
}

struct Inner {
    min_block: usize,
    total: usize,
    base: usize,
    levels: usize,
    /// `bitmaps[level][i]` true means block `i` at that level is fully
    /// free (neither it nor any descendant is allocated).
    bitmaps: alloc::vec::Vec<alloc::vec::Vec<bool>>,
    stats: AllocStats,
}

impl Inner {
    fn level_size(&self, level: usize) -> usize {
        self.min_block << (self.levels - level)
    }

    fn block_count(&self, level: usize) -> usize {
        self.total / self.level_size(level)
    }

    /// Try to satisfy an allocation of `level_size(level)` bytes by
    /// recursively borrowing from a coarser level and splitting it.
    fn acquire_at_level(&mut self, level: usize) -> Option<usize> {
        if level > self.levels {
            return None;
        }
        let n = self.block_count(level);
        for i in 0..n {
            if self.bitmaps[level][i] {
                self.bitmaps[level][i] = false;
                return Some(i);
            }
        }
        // Nothing free at this level: borrow one block from the level
        // above (larger blocks) and split it into two buddies here.
        if level == 0 {
            return None;
        }
        let parent_idx = self.acquire_at_level(level - 1)?;
        let left = parent_idx * 2;
        let right = left + 1;
        self.bitmaps[level][right] = true;
        self.bitmaps[level][left] = false;
        Some(left)
    }

    /// Free block `idx` at `level`, merging with its buddy into the
    /// parent level when both halves are free.
    fn release_at_level(&mut self, level: usize, idx: usize) {
        self.bitmaps[level][idx] = true;
        if level == 0 {
            return;
        }
        let buddy = idx ^ 1;
        if self.bitmaps[level][buddy] {
            self.bitmaps[level][buddy] = false;
            self.bitmaps[level][idx] = false;
            self.release_at_level(level - 1, idx / 2);
        }
    }

    fn order_to_level(&self, order: usize) -> usize {
        self.levels.saturating_sub(order)
    }
}

pub struct BuddyAllocator {
    inner: Spinlock<Inner>,
}

impl BuddyAllocator {
    /// `min_block` and `total` must both be powers of two, `total` a
    /// multiple of `min_block`.
    pub fn new(base: usize, total: usize, min_block: usize) -> Self {
        assert!(min_block.is_power_of_two());
        assert!(total.is_power_of_two());
        assert!(total >= min_block);
        let levels = (total / min_block).trailing_zeros() as usize;
        let mut bitmaps = alloc::vec::Vec::with_capacity(levels + 1);
        for level in 0..=levels {
            let block_size = min_block << (levels - level);
            let count = total / block_size;
            bitmaps.push(alloc::vec![false; count]);
        }
        bitmaps[0][0] = true;
        Self {
            inner: Spinlock::new(Inner {
                min_block,
                total,
                base,
                levels,
                bitmaps,
                stats: AllocStats {
                    total_blocks: total / min_block,
                    free_blocks: total / min_block,
                    ..Default::default()
                },
            }),
        }
    }

    /// Allocate a block of `2^order * min_block` bytes, returning its
    /// base address.
    pub fn alloc(&self, order: usize) -> Option<usize> {
        let mut inner = self.inner.lock();
        let level = inner.order_to_level(order);
        match inner.acquire_at_level(level) {
            Some(idx) => {
                let size = inner.level_size(level);
                inner.stats.allocations += 1;
                inner.stats.free_blocks = inner.stats.free_blocks.saturating_sub(size / inner.min_block);
                Some(inner.base + idx * size)
            }
            None => {
                inner.stats.failures += 1;
                None
            }
        }
    }

    pub fn free(&self, addr: usize, order: usize) {
        let mut inner = self.inner.lock();
        let level = inner.order_to_level(order);
        let size = inner.level_size(level);
        let idx = (addr - inner.base) / size;
        inner.release_at_level(level, idx);
        inner.stats.frees += 1;
        inner.stats.free_blocks += size / inner.min_block;
    }

    /// Release an arbitrary `[addr, addr + length)` extent whose bounds
    /// were never tracked as a single `order`-sized block - a
    /// heuristically-sized reservation handed back during static-data
    /// init, say. Splits the extent into the largest aligned
    /// power-of-two pieces that fit and releases each one; any leading
    /// or trailing remainder smaller than `min_block`, or that doesn't
    /// land on a `min_block` boundary, is discarded rather than fed to a
    /// sub-minimum free list.
    pub fn release_extent(&self, addr: usize, length: usize) {
        let mut inner = self.inner.lock();
        let min_block = inner.min_block;
        let region_base = inner.base;
        let region_end = region_base + inner.total;

        let mut start = addr.div_ceil(min_block) * min_block;
        let end = addr.saturating_add(length).min(region_end);
        if start < region_base {
            start = region_base;
        }

        while end > start && end - start >= min_block {
            let remaining = end - start;
            let offset = start - region_base;
            let addr_align = if offset == 0 {
                inner.total
            } else {
                1usize << offset.trailing_zeros()
            };
            let max_block = 1usize << (usize::BITS - 1 - remaining.leading_zeros());
            let block_size = addr_align.min(max_block).min(inner.total);
            let order = (block_size / min_block).trailing_zeros() as usize;
            let level = inner.order_to_level(order);
            let idx = offset / block_size;
            inner.release_at_level(level, idx);
            inner.stats.frees += 1;
            inner.stats.free_blocks += block_size / min_block;
            start += block_size;
        }
        // Remainder below `min_block` (leading or trailing) is discarded.
    }

    pub fn stats(&self) -> AllocStats {
        self.inner.lock().stats
    }

    pub fn min_block(&self) -> usize {
        self.inner.lock().min_block
    }

    pub fn levels(&self) -> usize {
        self.inner.lock().levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_splits_and_merges() {
        let a = BuddyAllocator::new(0, 1024, 64);
        let p1 = a.alloc(0).unwrap();
        let p2 = a.alloc(0).unwrap();
        assert_ne!(p1, p2);
        a.free(p1, 0);
        a.free(p2, 0);
        // fully merged back to one free top-level block
        let whole = a.alloc(a.levels()).unwrap();
        assert_eq!(whole, 0);
    }

    #[test]
    fn exhaustion_reports_failure() {
        let a = BuddyAllocator::new(0, 256, 64);
        let _p1 = a.alloc(0).unwrap();
        let _p2 = a.alloc(0).unwrap();
        let _p3 = a.alloc(0).unwrap();
        let _p4 = a.alloc(0).unwrap();
        assert!(a.alloc(0).is_none());
        assert_eq!(a.stats().failures, 1);
    }

    #[test]
    fn higher_order_alloc_uses_whole_region() {
        let a = BuddyAllocator::new(0x1000, 1024, 64);
        let top = a.alloc(a.levels()).unwrap();
        assert_eq!(top, 0x1000);
        assert!(a.alloc(0).is_none());
    }

    #[test]
    fn release_unaligned_extent_splits_and_discards_leftovers() {
        let a = BuddyAllocator::new(0x2000_0000, 0x0002_0000, 256);
        a.release_extent(0x2000_01a0, 0x800);
        let base = a.alloc(0).unwrap();
        assert!(base >= 0x2000_0200 && base < 0x2000_09a0);
    }
}
