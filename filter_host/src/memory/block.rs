//! Heap block backing handles and buffers

use std::alloc::Layout;
use std::ptr::NonNull;

const ALIGN: usize = 16;

fn layout(len: usize) -> Option<Layout> {
    Layout::from_size_align(len.max(1), ALIGN).ok()
}

/// Zero-initialized heap block whose address is handed to plug-ins.
///
/// Allocation failure is reported as `None`/`false` instead of aborting.
#[derive(Debug)]
pub(crate) struct RawBlock {
    ptr: NonNull<u8>,
    len: usize,
}

impl RawBlock {
    pub(crate) fn try_new(len: usize) -> Option<Self> {
        let layout = layout(len)?;
        // SAFETY: layout has a non-zero size
        let ptr = NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })?;
        Some(RawBlock { ptr, len })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let block = Self::try_new(bytes.len())?;
        // SAFETY: block is at least bytes.len() long and freshly allocated
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), block.ptr.as_ptr(), bytes.len()) };
        Some(block)
    }

    /// Resize, possibly moving. The block is unchanged when memory runs out
    pub(crate) fn try_resize(&mut self, len: usize) -> bool {
        let (Some(old), Some(new)) = (layout(self.len), layout(len)) else {
            return false;
        };
        // SAFETY: ptr was allocated with `old` and the new size is non-zero
        let Some(ptr) = NonNull::new(unsafe { std::alloc::realloc(self.ptr.as_ptr(), old, new.size()) })
        else {
            return false;
        };
        if len > self.len {
            // SAFETY: the grown tail lies inside the new allocation
            unsafe { ptr.as_ptr().add(self.len).write_bytes(0, len - self.len) };
        }
        self.ptr = ptr;
        self.len = len;
        true
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes while self lives
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        if let Some(layout) = layout(self.len) {
            // SAFETY: allocated in try_new/try_resize with this layout
            unsafe { std::alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_is_zeroed() {
        let block = RawBlock::try_new(32).unwrap();
        assert_eq!(block.len(), 32);
        assert!(block.as_slice().iter().all(|&b| b == 0));
        assert_eq!(block.as_ptr() as usize % ALIGN, 0);
    }

    #[test]
    fn test_zero_sized_block_has_an_address() {
        let block = RawBlock::try_new(0).unwrap();
        assert!(!block.as_ptr().is_null());
        assert!(block.as_slice().is_empty());
    }

    #[test]
    fn test_resize_keeps_prefix_and_zeroes_tail() {
        let mut block = RawBlock::from_bytes(&[7, 8, 9]).unwrap();
        assert!(block.try_resize(6));
        assert_eq!(block.as_slice(), &[7, 8, 9, 0, 0, 0]);
        assert!(block.try_resize(2));
        assert_eq!(block.as_slice(), &[7, 8]);
    }
}
