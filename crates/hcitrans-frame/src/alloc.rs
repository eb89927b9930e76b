use std::sync::{Mutex, PoisonError};

use bytes::BytesMut;
use tracing::warn;

/// Source of outbound packet buffers.
///
/// Allocation failure is an expected outcome, not a fatal one. Every buffer
/// handed out is given back through [`free`](BufferAllocator::free) exactly once.
pub trait BufferAllocator: Send + Sync {
    /// A buffer with room for at least `size` bytes, or `None`.
    fn alloc(&self, size: usize) -> Option<BytesMut>;

    /// Return a buffer obtained from [`alloc`](BufferAllocator::alloc).
    fn free(&self, buffer: BytesMut);
}

/// Allocates from the global heap. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn alloc(&self, size: usize) -> Option<BytesMut> {
        Some(BytesMut::with_capacity(size))
    }

    fn free(&self, buffer: BytesMut) {
        drop(buffer);
    }
}

/// Usage counters of a [`PoolAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub block_size: usize,
    pub blocks: usize,
    pub in_use: usize,
    pub allocations: u64,
    pub frees: u64,
    pub failures: u64,
}

/// A fixed number of fixed-size blocks.
///
/// Requests larger than the block size, or made while every block is in use,
/// fail.
#[derive(Debug)]
pub struct PoolAllocator {
    stats: Mutex<PoolStats>,
}

impl PoolAllocator {
    pub fn new(block_size: usize, blocks: usize) -> Self {
        Self {
            stats: Mutex::new(PoolStats {
                block_size,
                blocks,
                ..PoolStats::default()
            }),
        }
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers handed out and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.stats().in_use
    }
}

impl BufferAllocator for PoolAllocator {
    fn alloc(&self, size: usize) -> Option<BytesMut> {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if size > stats.block_size || stats.in_use == stats.blocks {
            stats.failures += 1;
            return None;
        }
        stats.in_use += 1;
        stats.allocations += 1;
        Some(BytesMut::with_capacity(stats.block_size))
    }

    fn free(&self, buffer: BytesMut) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if stats.in_use == 0 {
            warn!(len = buffer.len(), "free with no block outstanding");
            return;
        }
        stats.in_use -= 1;
        stats.frees += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocator_always_succeeds() {
        let heap = HeapAllocator;
        let buffer = heap.alloc(1024).unwrap();
        assert!(buffer.capacity() >= 1024);
        heap.free(buffer);
    }

    #[test]
    fn pool_exhaustion_and_release() {
        let pool = PoolAllocator::new(64, 2);
        let a = pool.alloc(10).unwrap();
        let b = pool.alloc(64).unwrap();
        assert!(pool.alloc(1).is_none());
        assert_eq!(pool.outstanding(), 2);

        pool.free(a);
        let c = pool.alloc(1).unwrap();
        pool.free(b);
        pool.free(c);

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.allocations, 3);
        assert_eq!(stats.frees, 3);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn pool_rejects_oversized_request() {
        let pool = PoolAllocator::new(16, 4);
        assert!(pool.alloc(17).is_none());
        assert_eq!(pool.stats().failures, 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn zero_block_pool_always_fails() {
        let pool = PoolAllocator::new(256, 0);
        assert!(pool.alloc(3).is_none());
    }
}
