//! Flat scratch buffers

use std::collections::HashMap;

use log::{debug, warn};
use sysinfo::System;

use super::block::RawBlock;

/// Buffers handed to the plug-in, keyed by their own address
#[derive(Debug)]
pub struct BufferTable {
    buffers: HashMap<usize, RawBlock>,
    ceiling: u64,
}

impl BufferTable {
    /// Empty table reporting at most `ceiling` bytes of free space
    pub fn new(ceiling: u64) -> Self {
        BufferTable {
            buffers: HashMap::new(),
            ceiling,
        }
    }

    /// Allocate a zeroed buffer, null for negative sizes or when memory ran out
    pub fn allocate(&mut self, size: i32) -> *mut u8 {
        let Ok(size) = usize::try_from(size) else {
            return std::ptr::null_mut();
        };
        match RawBlock::try_new(size) {
            Some(block) => {
                let ptr = block.as_ptr();
                self.buffers.insert(ptr as usize, block);
                ptr
            }
            None => {
                warn!("buffer allocation of {size} bytes failed");
                std::ptr::null_mut()
            }
        }
    }

    /// Try `requested` bytes, halving down to `minimum`. Returns the buffer and the size obtained
    pub fn allocate_negotiated(&mut self, requested: u32, minimum: u32) -> Option<(*mut u8, u32)> {
        let mut size = requested.max(minimum);
        loop {
            let ptr = i32::try_from(size).map_or(std::ptr::null_mut(), |s| self.allocate(s));
            if !ptr.is_null() {
                return Some((ptr, size));
            }
            if size <= minimum {
                return None;
            }
            size = (size / 2).max(minimum);
        }
    }

    /// Resize a buffer, possibly moving it. Null pointers allocate; unknown
    /// pointers and failures return null and leave the buffer as it was
    pub fn reallocate(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if ptr.is_null() {
            return i32::try_from(size).map_or(std::ptr::null_mut(), |s| self.allocate(s));
        }
        let Some(mut block) = self.buffers.remove(&(ptr as usize)) else {
            debug!("ignoring reallocate of unknown buffer {ptr:p}");
            return std::ptr::null_mut();
        };
        let resized = block.try_resize(size);
        let addr = block.as_ptr();
        self.buffers.insert(addr as usize, block);
        if resized {
            addr
        } else {
            warn!("buffer resize to {size} bytes failed");
            std::ptr::null_mut()
        }
    }

    /// Free a buffer. Unknown pointers are ignored
    pub fn dispose(&mut self, ptr: *mut u8) {
        if self.buffers.remove(&(ptr as usize)).is_none() && !ptr.is_null() {
            debug!("ignoring dispose of unknown buffer {ptr:p}");
        }
    }

    /// Whether the buffer is live
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.buffers.contains_key(&(ptr as usize))
    }

    /// Size of a live buffer
    pub fn size(&self, ptr: *const u8) -> Option<usize> {
        self.buffers.get(&(ptr as usize)).map(RawBlock::len)
    }

    /// Address of a live buffer, null for unknown ids
    pub fn lock(&self, ptr: *mut u8) -> *mut u8 {
        if self.contains(ptr) {
            ptr
        } else {
            std::ptr::null_mut()
        }
    }

    /// Number of live buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// No live buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bytes the plug-in may still allocate
    pub fn available_space(&self) -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        self.capped(system.available_memory())
    }

    fn capped(&self, available: u64) -> u64 {
        if available == 0 {
            // platform without a memory query
            self.ceiling
        } else {
            available.min(self.ceiling)
        }
    }

    /// Free every live buffer, returning how many were outstanding
    pub fn free_all(&mut self) -> usize {
        let count = self.buffers.len();
        if count > 0 {
            debug!("freeing {count} outstanding buffers");
        }
        self.buffers.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_dispose() {
        let mut table = BufferTable::new(1 << 20);
        let ptr = table.allocate(100);
        assert!(!ptr.is_null());
        assert_eq!(table.size(ptr), Some(100));
        assert_eq!(table.lock(ptr), ptr);
        table.dispose(ptr);
        table.dispose(ptr);
        assert!(table.is_empty());
        assert!(table.lock(ptr).is_null());
    }

    #[test]
    fn test_reallocate_keeps_contents() {
        let mut table = BufferTable::new(1 << 20);
        let ptr = table.allocate(4);
        // SAFETY: four bytes were allocated
        unsafe { ptr.copy_from_nonoverlapping([1u8, 2, 3, 4].as_ptr(), 4) };
        let moved = table.reallocate(ptr, 64);
        assert!(!moved.is_null());
        assert_eq!(table.size(moved), Some(64));
        // SAFETY: the buffer is 64 bytes long
        assert_eq!(unsafe { std::slice::from_raw_parts(moved, 5) }, &[1, 2, 3, 4, 0]);
        assert_eq!(table.len(), 1);
        let mut local = 0u8;
        assert!(table.reallocate(&mut local, 8).is_null());
    }

    #[test]
    fn test_negative_size_is_refused() {
        let mut table = BufferTable::new(1 << 20);
        assert!(table.allocate(-5).is_null());
    }

    #[test]
    fn test_negotiated_allocation_prefers_requested_size() {
        let mut table = BufferTable::new(1 << 20);
        let (ptr, size) = table.allocate_negotiated(4096, 16).unwrap();
        assert_eq!(size, 4096);
        assert_eq!(table.size(ptr), Some(4096));
    }

    #[test]
    fn test_space_is_capped_by_ceiling() {
        let table = BufferTable::new(1000);
        assert_eq!(table.capped(50), 50);
        assert_eq!(table.capped(5000), 1000);
        assert_eq!(table.capped(0), 1000);
        assert!(table.available_space() <= 1000);
    }

    #[test]
    fn test_free_all() {
        let mut table = BufferTable::new(1 << 20);
        table.allocate(1);
        table.allocate(1);
        assert_eq!(table.free_all(), 2);
        assert_eq!(table.len(), 0);
    }
}
