//! Host-side OS allocations and page attribute queries.
//!
//! Plug-ins sometimes hand back blocks that did not come from the handle
//! suite. The host can only size such blocks when they came from this module
//! (or, on Windows, from `GlobalAlloc`), so every allocation here is recorded
//! in a registry keyed by address.

use std::alloc::Layout;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

use log::{debug, warn};

const ALIGN: usize = 16;

#[derive(Debug, Clone, Copy)]
struct NativeBlock {
    /// Logical size reported to callers
    len: usize,
    /// Size the block was allocated or mapped with
    capacity: usize,
    executable: bool,
}

impl NativeBlock {
    fn new(size: usize, executable: bool) -> Self {
        NativeBlock {
            len: size,
            capacity: size.max(1),
            executable,
        }
    }

    fn layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.capacity, ALIGN).ok()
    }
}

static BLOCKS: LazyLock<Mutex<HashMap<usize, NativeBlock>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn blocks() -> MutexGuard<'static, HashMap<usize, NativeBlock>> {
    BLOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Kind of access a probe must confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable pages
    Read,
    /// Readable and writable pages
    ReadWrite,
}

/// Protection of the page containing an address
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageProtection {
    /// Page is readable
    pub readable: bool,
    /// Page is writable
    pub writable: bool,
    /// Page is executable
    pub executable: bool,
}

/// Allocate a zeroed block, null on failure
pub fn alloc(size: usize) -> *mut u8 {
    let Ok(layout) = Layout::from_size_align(size.max(1), ALIGN) else {
        return std::ptr::null_mut();
    };
    // SAFETY: layout has a non-zero size
    let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
    if !ptr.is_null() {
        blocks().insert(ptr as usize, NativeBlock::new(size, false));
    }
    ptr
}

/// Allocate a zeroed block in readable, writable and executable pages, null on failure
pub fn alloc_executable(size: usize) -> *mut u8 {
    // SAFETY: os::map_executable only maps fresh anonymous memory
    let ptr = unsafe { os::map_executable(size.max(1)) };
    if ptr.is_null() {
        warn!("executable allocation of {size} bytes refused");
    } else {
        blocks().insert(ptr as usize, NativeBlock::new(size, true));
    }
    ptr
}

/// Free a block from this module. Unknown pointers are left alone and report false
pub fn free(ptr: *mut u8) -> bool {
    let Some(block) = blocks().remove(&(ptr as usize)) else {
        return false;
    };
    release(ptr, block);
    true
}

fn release(ptr: *mut u8, block: NativeBlock) {
    if block.executable {
        // SAFETY: the registry recorded this mapping with this length
        unsafe { os::unmap_executable(ptr, block.capacity) };
    } else if let Some(layout) = block.layout() {
        // SAFETY: allocated in `alloc` with the same layout
        unsafe { std::alloc::dealloc(ptr, layout) };
    }
}

/// Resize a block from this module, keeping its executability.
/// Returns the new address, null when the block is unknown or memory ran out
/// (the old block is then untouched).
pub fn realloc(ptr: *mut u8, size: usize) -> *mut u8 {
    let Some(block) = blocks().get(&(ptr as usize)).copied() else {
        return std::ptr::null_mut();
    };
    let fresh = if block.executable {
        alloc_executable(size)
    } else {
        alloc(size)
    };
    if fresh.is_null() {
        return fresh;
    }
    // SAFETY: both blocks are live and at least min(len, size) bytes long
    unsafe { std::ptr::copy_nonoverlapping(ptr, fresh, block.len.min(size)) };
    free(ptr);
    fresh
}

/// Shrink the recorded length of a block in place. Growing is refused
pub fn shrink(ptr: *mut u8, size: usize) -> bool {
    let mut blocks = blocks();
    match blocks.get_mut(&(ptr as usize)) {
        Some(block) if size <= block.len && !block.executable => {
            // capacity keeps the allocation layout for dealloc
            block.len = size;
            true
        }
        _ => false,
    }
}

/// Size of an OS block, zero when the address is not a known block
pub fn size(ptr: *const u8) -> usize {
    if ptr.is_null() {
        return 0;
    }
    if let Some(block) = blocks().get(&(ptr as usize)) {
        return block.len;
    }
    os::foreign_block_size(ptr)
}

/// Address of the data of an OS block
pub fn lock(ptr: *mut u8) -> *mut u8 {
    if blocks().contains_key(&(ptr as usize)) {
        return ptr;
    }
    os::foreign_block_lock(ptr)
}

/// Undo `lock` for foreign OS blocks
pub fn unlock(ptr: *mut u8) {
    if !blocks().contains_key(&(ptr as usize)) {
        os::foreign_block_unlock(ptr);
    }
}

/// Whether this module allocated the block executable
pub fn allocated_executable(ptr: *const u8) -> bool {
    blocks()
        .get(&(ptr as usize))
        .is_some_and(|block| block.executable)
}

/// Whether the page containing `ptr` is executable
pub fn is_executable(ptr: *const u8) -> bool {
    page_protection(ptr).is_some_and(|p| p.executable)
}

/// Protection of the page containing `ptr`, `None` when unmapped or unknown
pub fn page_protection(ptr: *const u8) -> Option<PageProtection> {
    if ptr.is_null() {
        return None;
    }
    os::query(ptr as usize).map(|region| region.protection)
}

/// Confirm that `len` bytes starting at `ptr` are mapped with the given access.
/// The check walks consecutive mappings so ranges spanning regions are accepted.
pub fn probe(ptr: *const u8, len: usize, access: Access) -> bool {
    if ptr.is_null() {
        return false;
    }
    let start = ptr as usize;
    let Some(end) = start.checked_add(len.max(1)) else {
        return false;
    };
    let mut cursor = start;
    while cursor < end {
        let Some(region) = os::query(cursor) else {
            debug!("probe of {start:#x} failed at {cursor:#x}");
            return false;
        };
        let p = region.protection;
        let allowed = match access {
            Access::Read => p.readable,
            Access::ReadWrite => p.readable && p.writable,
        };
        if !allowed || region.end <= cursor {
            return false;
        }
        cursor = region.end;
    }
    true
}

struct Region {
    end: usize,
    protection: PageProtection,
}

#[cfg(target_os = "linux")]
mod os {
    use super::{PageProtection, Region};

    pub(super) fn query(addr: usize) -> Option<Region> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        maps.lines().find_map(|line| parse_line(line, addr))
    }

    fn parse_line(line: &str, addr: usize) -> Option<Region> {
        let mut fields = line.split_whitespace();
        let (start, end) = fields.next()?.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if addr < start || addr >= end {
            return None;
        }
        let perms = fields.next()?.as_bytes();
        Some(Region {
            end,
            protection: PageProtection {
                readable: perms.first() == Some(&b'r'),
                writable: perms.get(1) == Some(&b'w'),
                executable: perms.get(2) == Some(&b'x'),
            },
        })
    }

    pub(super) unsafe fn map_executable(len: usize) -> *mut u8 {
        // SAFETY: anonymous private mapping, no file descriptor involved
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            std::ptr::null_mut()
        } else {
            ptr.cast()
        }
    }

    pub(super) unsafe fn unmap_executable(ptr: *mut u8, len: usize) {
        // SAFETY: caller passes a mapping created by map_executable
        unsafe { libc::munmap(ptr.cast(), len) };
    }

    pub(super) fn foreign_block_size(_ptr: *const u8) -> usize {
        0
    }

    pub(super) fn foreign_block_lock(ptr: *mut u8) -> *mut u8 {
        ptr
    }

    pub(super) fn foreign_block_unlock(_ptr: *mut u8) {}

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_maps_line() {
            let line = "7f00a000-7f00c000 r-xp 00000000 08:01 1234 /usr/lib/libc.so";
            let region = parse_line(line, 0x7f00b000).unwrap();
            assert_eq!(region.end, 0x7f00c000);
            assert!(region.protection.readable);
            assert!(!region.protection.writable);
            assert!(region.protection.executable);
            assert!(parse_line(line, 0x7f00c000).is_none());
        }
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
mod os {
    use super::Region;

    // Without a portable page query foreign pointers are never trusted.
    pub(super) fn query(_addr: usize) -> Option<Region> {
        None
    }

    pub(super) unsafe fn map_executable(len: usize) -> *mut u8 {
        // SAFETY: anonymous private mapping, no file descriptor involved
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            std::ptr::null_mut()
        } else {
            ptr.cast()
        }
    }

    pub(super) unsafe fn unmap_executable(ptr: *mut u8, len: usize) {
        // SAFETY: caller passes a mapping created by map_executable
        unsafe { libc::munmap(ptr.cast(), len) };
    }

    pub(super) fn foreign_block_size(_ptr: *const u8) -> usize {
        0
    }

    pub(super) fn foreign_block_lock(ptr: *mut u8) -> *mut u8 {
        ptr
    }

    pub(super) fn foreign_block_unlock(_ptr: *mut u8) {}
}

#[cfg(windows)]
mod os {
    use super::{PageProtection, Region};
    use windows_sys::Win32::System::Memory::{
        GlobalLock, GlobalSize, GlobalUnlock, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
        MEMORY_BASIC_INFORMATION, PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE,
        PAGE_EXECUTE_WRITECOPY, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY, VirtualAlloc,
        VirtualFree, VirtualQuery,
    };

    pub(super) fn query(addr: usize) -> Option<Region> {
        // SAFETY: MEMORY_BASIC_INFORMATION is plain data
        let mut info: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
        // SAFETY: VirtualQuery only reads the address space map
        let written = unsafe {
            VirtualQuery(
                addr as *const _,
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 || info.State != MEM_COMMIT {
            return None;
        }
        let protect = info.Protect & 0xff;
        let readable = [
            PAGE_READONLY,
            PAGE_READWRITE,
            PAGE_WRITECOPY,
            PAGE_EXECUTE_READ,
            PAGE_EXECUTE_READWRITE,
            PAGE_EXECUTE_WRITECOPY,
        ]
        .contains(&protect);
        let writable = [
            PAGE_READWRITE,
            PAGE_WRITECOPY,
            PAGE_EXECUTE_READWRITE,
            PAGE_EXECUTE_WRITECOPY,
        ]
        .contains(&protect);
        let executable = [
            PAGE_EXECUTE,
            PAGE_EXECUTE_READ,
            PAGE_EXECUTE_READWRITE,
            PAGE_EXECUTE_WRITECOPY,
        ]
        .contains(&protect);
        Some(Region {
            end: info.BaseAddress as usize + info.RegionSize,
            protection: PageProtection {
                readable,
                writable,
                executable,
            },
        })
    }

    pub(super) unsafe fn map_executable(len: usize) -> *mut u8 {
        // SAFETY: fresh reservation, no address hint
        unsafe {
            VirtualAlloc(
                std::ptr::null(),
                len,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_EXECUTE_READWRITE,
            )
            .cast()
        }
    }

    pub(super) unsafe fn unmap_executable(ptr: *mut u8, _len: usize) {
        // SAFETY: caller passes a region created by map_executable
        unsafe { VirtualFree(ptr.cast(), 0, MEM_RELEASE) };
    }

    pub(super) fn foreign_block_size(ptr: *const u8) -> usize {
        // SAFETY: GlobalSize validates its argument and returns 0 for non-handles
        unsafe { GlobalSize(ptr as *mut _) }
    }

    pub(super) fn foreign_block_lock(ptr: *mut u8) -> *mut u8 {
        // SAFETY: only reached for blocks GlobalSize accepted
        unsafe { GlobalLock(ptr.cast()).cast() }
    }

    pub(super) fn foreign_block_unlock(ptr: *mut u8) {
        // SAFETY: pairs with foreign_block_lock
        unsafe { GlobalUnlock(ptr.cast()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_records_size_and_free_forgets_it() {
        let ptr = alloc(24);
        assert!(!ptr.is_null());
        assert_eq!(size(ptr), 24);
        assert!(!allocated_executable(ptr));
        assert!(free(ptr));
        assert_eq!(size(ptr), 0);
        assert!(!free(ptr));
    }

    #[test]
    fn test_realloc_preserves_prefix() {
        let ptr = alloc(4);
        // SAFETY: four bytes were just allocated
        unsafe { std::ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr, 4) };
        let grown = realloc(ptr, 8);
        assert!(!grown.is_null());
        assert_eq!(size(grown), 8);
        // SAFETY: grown is 8 bytes long
        let bytes = unsafe { std::slice::from_raw_parts(grown, 8) };
        assert_eq!(bytes, &[1, 2, 3, 4, 0, 0, 0, 0]);
        assert!(free(grown));
    }

    #[test]
    fn test_shrink_keeps_address() {
        let ptr = alloc(16);
        assert!(shrink(ptr, 8));
        assert_eq!(size(ptr), 8);
        assert!(!shrink(ptr, 32));
        assert!(free(ptr));
    }

    #[test]
    fn test_shrink_keeps_allocation_layout() {
        let ptr = alloc(4096);
        assert!(shrink(ptr, 8));
        let block = blocks().get(&(ptr as usize)).copied().unwrap();
        assert_eq!(block.len, 8);
        assert_eq!(block.layout().unwrap().size(), 4096);
        assert!(free(ptr));
    }

    #[test]
    fn test_zero_sized_block_frees_with_one_byte_layout() {
        let ptr = alloc(0);
        let block = blocks().get(&(ptr as usize)).copied().unwrap();
        assert_eq!(size(ptr), 0);
        assert_eq!(block.layout().unwrap().size(), 1);
        assert!(free(ptr));
    }

    #[test]
    fn test_null_is_never_probed_readable() {
        assert!(!probe(std::ptr::null(), 8, Access::Read));
        assert_eq!(page_protection(std::ptr::null()), None);
    }

    #[cfg(any(target_os = "linux", windows))]
    #[test]
    fn test_heap_memory_probes_read_write() {
        let data = vec![0u8; 64];
        assert!(probe(data.as_ptr(), data.len(), Access::ReadWrite));
        assert!(!is_executable(data.as_ptr()));
    }

    #[cfg(any(target_os = "linux", windows))]
    #[test]
    fn test_executable_allocation_is_reported_executable() {
        let ptr = alloc_executable(32);
        if ptr.is_null() {
            // W^X kernels refuse RWX mappings
            return;
        }
        assert!(allocated_executable(ptr));
        assert!(is_executable(ptr));
        assert_eq!(size(ptr), 32);
        assert!(free(ptr));
    }
}
