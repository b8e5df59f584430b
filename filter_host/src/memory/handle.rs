//! Double-indirect relocatable handles

use std::collections::{HashMap, HashSet};
use std::os::raw::c_char;
use std::ptr::NonNull;

use filter_abi::{Handle, StatusCode};
use log::{debug, warn};

use super::block::RawBlock;
use super::native::{self, Access};

const PTR: usize = std::mem::size_of::<usize>();

/// A suite handle: the pointer-sized cell the plug-in sees plus the block it points at.
/// The cell address is the identity, the block may move on resize.
#[derive(Debug)]
struct HandleEntry {
    cell: NonNull<*mut c_char>,
    block: RawBlock,
    locks: u32,
}

impl HandleEntry {
    fn sync_cell(&mut self) {
        // SAFETY: the cell is owned by this entry and lives until drop
        unsafe { *self.cell.as_ptr() = self.block.as_ptr().cast() };
    }
}

impl Drop for HandleEntry {
    fn drop(&mut self) {
        // SAFETY: created by Box::into_raw in HandleTable::allocate
        drop(unsafe { Box::from_raw(self.cell.as_ptr()) });
    }
}

/// How a handle id the table never issued was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignHandle {
    /// OS block whose first field points at another OS block holding the data
    Legacy {
        /// Address of the data block
        data: *mut u8,
        /// Size of the data block
        size: usize,
    },
    /// OS block holding the data itself
    Native {
        /// Address of the data
        data: *mut u8,
        /// Size of the block
        size: usize,
    },
    /// Readable and writable memory of unknown size
    Pointer {
        /// The pointer as handed in
        data: *mut u8,
    },
}

impl ForeignHandle {
    /// Address the plug-in should use
    pub fn data(&self) -> *mut u8 {
        match *self {
            ForeignHandle::Legacy { data, .. }
            | ForeignHandle::Native { data, .. }
            | ForeignHandle::Pointer { data } => data,
        }
    }

    /// Known size, zero for bare pointers
    pub fn size(&self) -> usize {
        match *self {
            ForeignHandle::Legacy { size, .. } | ForeignHandle::Native { size, .. } => size,
            ForeignHandle::Pointer { .. } => 0,
        }
    }
}

/// Classify a handle the suite did not allocate. Memory is only dereferenced
/// after a page query confirmed it readable.
pub fn resolve_foreign(h: Handle) -> Option<ForeignHandle> {
    let addr = h.cast::<u8>();
    if addr.is_null() {
        return None;
    }
    let block_size = native::size(addr);
    if block_size > 0 {
        let data = native::lock(addr);
        if block_size >= PTR && native::probe(data, PTR, Access::Read) {
            // SAFETY: probed readable for a pointer-sized field
            let inner = unsafe { data.cast::<*mut u8>().read_unaligned() };
            let inner_size = native::size(inner);
            if inner_size > 0 {
                return Some(ForeignHandle::Legacy {
                    data: native::lock(inner),
                    size: inner_size,
                });
            }
        }
        return Some(ForeignHandle::Native {
            data,
            size: block_size,
        });
    }
    if native::probe(addr, PTR, Access::ReadWrite) {
        warn!("treating unknown handle {addr:p} as a plain pointer");
        return Some(ForeignHandle::Pointer { data: addr });
    }
    warn!("unknown handle {addr:p} is not accessible");
    None
}

/// Every handle issued to the plug-in, keyed by cell address.
/// OS blocks the host created on the plug-in's behalf are tracked as adopted
/// so the teardown sweep can release them.
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: HashMap<usize, HandleEntry>,
    adopted: HashSet<usize>,
}

impl HandleTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed handle, null for negative sizes or when memory ran out
    pub fn allocate(&mut self, size: i32) -> Handle {
        let Ok(size) = usize::try_from(size) else {
            return std::ptr::null_mut();
        };
        match RawBlock::try_new(size) {
            Some(block) => self.insert(block),
            None => {
                warn!("handle allocation of {size} bytes failed");
                std::ptr::null_mut()
            }
        }
    }

    /// Allocate a handle holding a copy of `bytes`
    pub fn allocate_from(&mut self, bytes: &[u8]) -> Handle {
        match RawBlock::from_bytes(bytes) {
            Some(block) => self.insert(block),
            None => std::ptr::null_mut(),
        }
    }

    fn insert(&mut self, block: RawBlock) -> Handle {
        let cell = Box::into_raw(Box::new(block.as_ptr().cast::<c_char>()));
        // SAFETY: Box::into_raw never returns null
        let cell = unsafe { NonNull::new_unchecked(cell) };
        let handle = cell.as_ptr();
        self.entries.insert(
            handle as usize,
            HandleEntry {
                cell,
                block,
                locks: 0,
            },
        );
        handle
    }

    /// Track an OS block handed to the plug-in so `free_all` releases it
    pub fn adopt_native(&mut self, ptr: *mut u8) {
        if !ptr.is_null() {
            self.adopted.insert(ptr as usize);
        }
    }

    fn free_native(&mut self, ptr: *mut u8) {
        self.adopted.remove(&(ptr as usize));
        native::free(ptr);
    }

    /// Whether `h` was issued by this table and is still live
    pub fn contains(&self, h: Handle) -> bool {
        self.entries.contains_key(&(h as usize))
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No live handles
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free a handle. Unknown ids are probed: OS blocks are released, anything else is left alone
    pub fn dispose(&mut self, h: Handle) {
        if h.is_null() {
            return;
        }
        if self.entries.remove(&(h as usize)).is_some() {
            return;
        }
        self.dispose_regular(h);
    }

    /// Free an OS handle the host gave out in native form
    pub fn dispose_regular(&mut self, h: Handle) {
        if self.entries.remove(&(h as usize)).is_some() {
            return;
        }
        let addr = h.cast::<u8>();
        if native::size(addr) == 0 {
            debug!("ignoring dispose of unknown handle {addr:p}");
            return;
        }
        if let Some(ForeignHandle::Legacy { data, .. }) = resolve_foreign(h) {
            native::unlock(data);
            // SAFETY: resolve_foreign probed the first field readable
            let inner = unsafe { native::lock(addr).cast::<*mut u8>().read_unaligned() };
            self.free_native(inner);
        }
        native::unlock(addr);
        self.free_native(addr);
    }

    /// Logical size, zero for unknown ids
    pub fn size(&self, h: Handle) -> i32 {
        let len = match self.entries.get(&(h as usize)) {
            Some(entry) => entry.block.len(),
            None => resolve_foreign(h).map_or(0, |f| f.size()),
        };
        i32::try_from(len).unwrap_or(i32::MAX)
    }

    /// Resize a handle, moving its block if needed and rewriting the cell
    pub fn set_size(&mut self, h: Handle, new_size: i32) -> StatusCode {
        let Ok(new_size) = usize::try_from(new_size) else {
            return StatusCode::ParamErr;
        };
        if let Some(entry) = self.entries.get_mut(&(h as usize)) {
            if !entry.block.try_resize(new_size) {
                warn!("handle resize to {new_size} bytes failed");
                return StatusCode::MemFullErr;
            }
            entry.sync_cell();
            return StatusCode::NoErr;
        }
        match resolve_foreign(h) {
            Some(ForeignHandle::Legacy { data, .. }) => {
                let moved = native::realloc(data, new_size);
                if moved.is_null() {
                    return StatusCode::MemFullErr;
                }
                if self.adopted.remove(&(data as usize)) {
                    self.adopted.insert(moved as usize);
                }
                // SAFETY: the first field was probed readable when resolving, and OS blocks are writable
                unsafe { native::lock(h.cast()).cast::<*mut u8>().write_unaligned(moved) };
                StatusCode::NoErr
            }
            Some(ForeignHandle::Native { data, .. }) => {
                if native::shrink(data, new_size) {
                    StatusCode::NoErr
                } else {
                    StatusCode::MemFullErr
                }
            }
            Some(ForeignHandle::Pointer { .. }) => StatusCode::MemFullErr,
            None => StatusCode::NilHandleErr,
        }
    }

    /// Lock and return the block address, null for inaccessible ids
    pub fn lock(&mut self, h: Handle) -> *mut c_char {
        if let Some(entry) = self.entries.get_mut(&(h as usize)) {
            entry.locks = entry.locks.saturating_add(1);
            return entry.block.as_ptr().cast();
        }
        resolve_foreign(h).map_or(std::ptr::null_mut(), |f| f.data().cast())
    }

    /// Release one lock
    pub fn unlock(&mut self, h: Handle) {
        match self.entries.get_mut(&(h as usize)) {
            Some(entry) => entry.locks = entry.locks.saturating_sub(1),
            None => {
                if native::size(h.cast()) > 0 {
                    native::unlock(h.cast());
                }
            }
        }
    }

    /// Lock or unlock, reporting the block address and whether the handle was locked before
    pub fn set_lock(&mut self, h: Handle, lock: bool) -> (*mut c_char, bool) {
        let was_locked = self
            .entries
            .get(&(h as usize))
            .is_some_and(|entry| entry.locks > 0);
        if lock {
            (self.lock(h), was_locked)
        } else {
            self.unlock(h);
            (std::ptr::null_mut(), was_locked)
        }
    }

    /// Copy of the logical bytes of a suite handle
    pub fn bytes(&self, h: Handle) -> Option<Vec<u8>> {
        self.entries
            .get(&(h as usize))
            .map(|entry| entry.block.as_slice().to_vec())
    }

    /// Copy of the bytes behind any handle, suite or foreign with a known size
    pub fn read_any(&self, h: Handle) -> Option<Vec<u8>> {
        if let Some(bytes) = self.bytes(h) {
            return Some(bytes);
        }
        let foreign = resolve_foreign(h)?;
        if foreign.size() == 0 {
            return None;
        }
        // SAFETY: OS blocks are readable for their registered size
        Some(unsafe { std::slice::from_raw_parts(foreign.data(), foreign.size()) }.to_vec())
    }

    /// Free every live handle and adopted OS block, returning how many were outstanding
    pub fn free_all(&mut self) -> usize {
        let count = self.entries.len() + self.adopted.len();
        if count > 0 {
            debug!("freeing {count} outstanding handles");
        }
        self.entries.clear();
        for addr in self.adopted.drain() {
            native::free(addr as *mut u8);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cell_points_at_block_and_is_not_the_block() {
        let mut table = HandleTable::new();
        let h = table.allocate(16);
        assert!(!h.is_null());
        let data = table.lock(h);
        assert_ne!(h.cast::<c_char>(), data);
        // SAFETY: h is a live handle
        assert_eq!(unsafe { *h }, data);
    }

    #[test]
    fn test_negative_size_is_refused() {
        let mut table = HandleTable::new();
        assert!(table.allocate(-1).is_null());
        assert!(table.is_empty());
    }

    #[test]
    fn test_resize_rewrites_the_cell() {
        let mut table = HandleTable::new();
        let h = table.allocate_from(b"abc");
        assert_eq!(table.set_size(h, 4096), StatusCode::NoErr);
        assert_eq!(table.size(h), 4096);
        // SAFETY: h is live and the cell tracks the block
        let data = unsafe { *h };
        assert_eq!(data, table.lock(h));
        assert_eq!(&table.bytes(h).unwrap()[..3], b"abc");
        assert_eq!(table.set_size(h, -4), StatusCode::ParamErr);
    }

    #[test]
    fn test_double_dispose_is_a_no_op() {
        let mut table = HandleTable::new();
        let h = table.allocate(8);
        table.dispose(h);
        table.dispose(h);
        assert!(!table.contains(h));
        assert_eq!(table.size(h), 0);
    }

    #[test]
    fn test_set_lock_reports_previous_state() {
        let mut table = HandleTable::new();
        let h = table.allocate(8);
        let (address, was_locked) = table.set_lock(h, true);
        assert!(!address.is_null());
        assert!(!was_locked);
        let (_, was_locked) = table.set_lock(h, false);
        assert!(was_locked);
    }

    #[test]
    fn test_legacy_handle_is_recognized() {
        let data = native::alloc(12);
        let outer = native::alloc(PTR);
        // SAFETY: outer is pointer-sized
        unsafe { outer.cast::<*mut u8>().write_unaligned(data) };
        let h = outer.cast::<*mut c_char>();

        let mut table = HandleTable::new();
        assert_eq!(table.size(h), 12);
        assert_eq!(table.lock(h), data.cast());
        assert_eq!(table.set_size(h, 20), StatusCode::NoErr);
        assert_eq!(table.size(h), 20);

        table.dispose(h);
        assert_eq!(native::size(outer), 0);
    }

    #[test]
    fn test_raw_native_block_locks_to_itself() {
        let block = native::alloc(24);
        let h = block.cast::<*mut c_char>();
        let mut table = HandleTable::new();
        assert_eq!(table.size(h), 24);
        assert_eq!(table.lock(h), block.cast());
        table.dispose_regular(h);
        assert_eq!(native::size(block), 0);
    }

    #[test]
    fn test_free_all_reports_outstanding_handles() {
        let mut table = HandleTable::new();
        table.allocate(1);
        table.allocate(2);
        let block = native::alloc(4);
        table.adopt_native(block);
        assert_eq!(table.free_all(), 3);
        assert_eq!(native::size(block), 0);
        assert_eq!(table.free_all(), 0);
    }

    proptest! {
        #[test]
        fn test_locked_handle_is_writable_for_its_size(size in 0i32..8192) {
            let mut table = HandleTable::new();
            let h = table.allocate(size);
            prop_assert!(!h.is_null());
            let data = table.lock(h).cast::<u8>();
            // SAFETY: the block is `size` bytes long
            unsafe { data.write_bytes(0xab, size as usize) };
            prop_assert!(table.bytes(h).unwrap().iter().all(|&b| b == 0xab));
            prop_assert_eq!(table.size(h), size);
        }

        #[test]
        fn test_get_size_follows_set_size(size in 0i32..4096, new_size in 0i32..65536) {
            let mut table = HandleTable::new();
            let h = table.allocate(size);
            prop_assert_eq!(table.set_size(h, new_size), StatusCode::NoErr);
            prop_assert_eq!(table.size(h), new_size);
        }
    }
}
