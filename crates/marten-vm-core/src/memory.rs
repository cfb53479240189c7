//! Memory accounting for Marten VM
//!
//! Runtime structures that can grow with script behavior (stack snapshots
//! in particular) book their size here before materializing. Exceeding the
//! limit yields `VmError::OutOfMemory` instead of a partial result.

use crate::error::{VmError, VmResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Manages memory limits and accounting for a VM instance
#[derive(Debug)]
pub struct MemoryManager {
    /// Total bytes currently booked
    allocated: AtomicUsize,
    /// Maximum bytes allowed for this VM
    limit: usize,
}

impl MemoryManager {
    /// Create a new memory manager with the specified limit
    pub fn new(limit: usize) -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            limit,
        }
    }

    /// Create a memory manager with a very large limit (for tests)
    pub fn test() -> Self {
        Self::new(usize::MAX / 2)
    }

    /// Try to book `size` bytes. Returns Err(VmError::OutOfMemory) if limit exceeded.
    pub fn alloc(&self, size: usize) -> VmResult<()> {
        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(size).filter(|total| *total <= self.limit)
            })
            .map_err(|_| VmError::OutOfMemory)?;
        Ok(())
    }

    /// Record release of `size` bytes
    pub fn free(&self, size: usize) {
        self.allocated.fetch_sub(size, Ordering::AcqRel);
    }

    /// Get current booked bytes
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Get memory limit
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A booking that is released when dropped
#[derive(Debug)]
pub struct Allocation {
    size: usize,
    manager: Arc<MemoryManager>,
}

impl Allocation {
    /// Book `size` bytes against `manager`
    pub fn new(size: usize, manager: Arc<MemoryManager>) -> VmResult<Self> {
        manager.alloc(size)?;
        Ok(Self { size, manager })
    }

    /// Booked size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.manager.free(self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_within_limit() {
        let mm = MemoryManager::new(100);
        mm.alloc(60).unwrap();
        mm.alloc(40).unwrap();
        assert_eq!(mm.allocated(), 100);
    }

    #[test]
    fn test_alloc_over_limit_leaves_state_untouched() {
        let mm = MemoryManager::new(100);
        mm.alloc(60).unwrap();

        let result = mm.alloc(41);
        assert!(matches!(result, Err(VmError::OutOfMemory)));
        assert_eq!(mm.allocated(), 60);
    }

    #[test]
    fn test_alloc_overflow_is_out_of_memory() {
        let mm = MemoryManager::new(usize::MAX);
        mm.alloc(10).unwrap();
        assert!(matches!(mm.alloc(usize::MAX), Err(VmError::OutOfMemory)));
    }

    #[test]
    fn test_allocation_released_on_drop() {
        let mm = Arc::new(MemoryManager::new(64));
        {
            let booking = Allocation::new(64, Arc::clone(&mm)).unwrap();
            assert_eq!(booking.size(), 64);
            assert_eq!(mm.allocated(), 64);
            assert!(Allocation::new(1, Arc::clone(&mm)).is_err());
        }
        assert_eq!(mm.allocated(), 0);
    }
}
