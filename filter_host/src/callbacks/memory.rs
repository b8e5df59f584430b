//! Handle and buffer callbacks, classic tables and PICA suites

use std::os::raw::{c_char, c_void};

use filter_abi::pica::{PsBufferSuite1, PsHandleSuite1, PsHandleSuite2};
use filter_abi::procs::{
    BUFFER_PROCS_COUNT, BUFFER_PROCS_VERSION, BufferProcs, HANDLE_PROCS_COUNT, HANDLE_PROCS_VERSION,
    HandleProcs,
};
use filter_abi::types::{Boolean, BufferId};
use filter_abi::{Handle, OsErr, StatusCode};
use log::{debug, error};

use super::{with_context, write_optional};
use crate::memory::{BufferTable, HandleTable};

fn with_handles<R: Copy>(fallback: R, f: impl FnOnce(&mut HandleTable) -> R) -> R {
    with_context(fallback, |ctx| match ctx.memory.handles.try_borrow_mut() {
        Ok(mut handles) => f(&mut handles),
        Err(_) => {
            error!("handle table is already in use");
            fallback
        }
    })
}

fn with_buffers<R: Copy>(fallback: R, f: impl FnOnce(&mut BufferTable) -> R) -> R {
    with_context(fallback, |ctx| match ctx.memory.buffers.try_borrow_mut() {
        Ok(mut buffers) => f(&mut buffers),
        Err(_) => {
            error!("buffer table is already in use");
            fallback
        }
    })
}

unsafe extern "C" fn new_handle(size: i32) -> Handle {
    with_handles(std::ptr::null_mut(), |handles| handles.allocate(size))
}

/// Free `h` and drop any descriptor the classic procs tied to its address
fn dispose_with(h: Handle, dispose: impl FnOnce(&mut HandleTable, Handle)) {
    with_context((), |ctx| {
        if let Ok(mut store) = ctx.scripting.try_borrow_mut() {
            store.classic.forget_handle(h);
        }
        match ctx.memory.handles.try_borrow_mut() {
            Ok(mut handles) => dispose(&mut handles, h),
            Err(_) => error!("handle table is already in use"),
        }
    })
}

unsafe extern "C" fn dispose_handle(h: Handle) {
    dispose_with(h, HandleTable::dispose)
}

unsafe extern "C" fn dispose_regular_handle(h: Handle) {
    dispose_with(h, HandleTable::dispose_regular)
}

unsafe extern "C" fn get_handle_size(h: Handle) -> i32 {
    with_handles(0, |handles| handles.size(h))
}

unsafe extern "C" fn set_handle_size(h: Handle, new_size: i32) -> OsErr {
    with_handles(StatusCode::MemFullErr.code(), |handles| handles.set_size(h, new_size).code())
}

unsafe extern "C" fn lock_handle(h: Handle, _move_high: Boolean) -> *mut c_char {
    with_handles(std::ptr::null_mut(), |handles| handles.lock(h))
}

unsafe extern "C" fn unlock_handle(h: Handle) {
    with_handles((), |handles| handles.unlock(h))
}

unsafe extern "C" fn recover_space(size: i32) {
    debug!("plug-in asked to recover {size} bytes");
}

unsafe extern "C" fn set_handle_lock(h: Handle, lock: Boolean, address: *mut *mut c_char, old_lock: *mut Boolean) {
    let (data, was_locked) = with_handles((std::ptr::null_mut(), false), |handles| handles.set_lock(h, lock != 0));
    // SAFETY: out-pointers supplied by the plug-in, null when unused
    unsafe {
        if lock != 0 {
            write_optional(address, data);
        }
        write_optional(old_lock, Boolean::from(was_locked));
    }
}

unsafe extern "C" fn allocate_buffer(size: i32, buffer_id: *mut BufferId) -> OsErr {
    if buffer_id.is_null() {
        return StatusCode::ParamErr.code();
    }
    let ptr = with_buffers(std::ptr::null_mut(), |buffers| buffers.allocate(size));
    // SAFETY: checked non-null above
    unsafe { buffer_id.write_unaligned(ptr.cast()) };
    if ptr.is_null() {
        StatusCode::MemFullErr.code()
    } else {
        StatusCode::NoErr.code()
    }
}

unsafe extern "C" fn lock_buffer(buffer_id: BufferId, _move_high: Boolean) -> *mut c_void {
    with_buffers(std::ptr::null_mut(), |buffers| buffers.lock(buffer_id.cast()).cast())
}

unsafe extern "C" fn unlock_buffer(_buffer_id: BufferId) {}

unsafe extern "C" fn free_buffer(buffer_id: BufferId) {
    with_buffers((), |buffers| buffers.dispose(buffer_id.cast()))
}

unsafe extern "C" fn buffer_space() -> i32 {
    with_buffers(0, |buffers| i32::try_from(buffers.available_space()).unwrap_or(i32::MAX))
}

unsafe extern "C" fn new_buffer(requested_size: *mut u32, minimum_size: u32) -> *mut c_char {
    let requested = if requested_size.is_null() {
        minimum_size
    } else {
        // SAFETY: non-null in-out pointer supplied by the plug-in
        unsafe { requested_size.read_unaligned() }
    };
    let obtained = with_buffers(None, |buffers| buffers.allocate_negotiated(requested, minimum_size));
    match obtained {
        Some((ptr, size)) => {
            // SAFETY: as above
            unsafe { write_optional(requested_size, size) };
            ptr.cast()
        }
        None => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn dispose_buffer(buffer: *mut *mut c_char) {
    if buffer.is_null() {
        return;
    }
    // SAFETY: non-null pointer to the plug-in's buffer variable
    let ptr = unsafe { buffer.read_unaligned() };
    with_buffers((), |buffers| buffers.dispose(ptr.cast()));
    // SAFETY: as above
    unsafe { buffer.write_unaligned(std::ptr::null_mut()) };
}

unsafe extern "C" fn get_buffer_size(buffer: *mut c_char) -> u32 {
    with_buffers(0, |buffers| {
        buffers
            .size(buffer.cast())
            .map_or(0, |size| u32::try_from(size).unwrap_or(u32::MAX))
    })
}

unsafe extern "C" fn get_buffer_space() -> u32 {
    with_buffers(0, |buffers| u32::try_from(buffers.available_space()).unwrap_or(u32::MAX))
}

/// Classic handle procs of the filter record
pub(crate) fn handle_procs() -> HandleProcs {
    HandleProcs {
        handle_procs_version: HANDLE_PROCS_VERSION,
        num_handle_procs: HANDLE_PROCS_COUNT,
        new_proc: Some(new_handle),
        dispose_proc: Some(dispose_handle),
        get_size_proc: Some(get_handle_size),
        set_size_proc: Some(set_handle_size),
        lock_proc: Some(lock_handle),
        unlock_proc: Some(unlock_handle),
        recover_space_proc: Some(recover_space),
        dispose_regular_handle_proc: Some(dispose_regular_handle),
    }
}

/// Classic buffer procs of the filter record
pub(crate) fn buffer_procs() -> BufferProcs {
    BufferProcs {
        buffer_procs_version: BUFFER_PROCS_VERSION,
        num_buffer_procs: BUFFER_PROCS_COUNT,
        allocate_proc: Some(allocate_buffer),
        lock_proc: Some(lock_buffer),
        unlock_proc: Some(unlock_buffer),
        free_proc: Some(free_buffer),
        space_proc: Some(buffer_space),
    }
}

/// Handle suite, version 1
pub(crate) fn handle_suite1() -> PsHandleSuite1 {
    PsHandleSuite1 {
        new: Some(new_handle),
        dispose: Some(dispose_handle),
        set_lock: Some(set_handle_lock),
        get_size: Some(get_handle_size),
        set_size: Some(set_handle_size),
        recover_space: Some(recover_space),
    }
}

/// Handle suite, version 2
pub(crate) fn handle_suite2() -> PsHandleSuite2 {
    PsHandleSuite2 {
        new: Some(new_handle),
        dispose: Some(dispose_handle),
        dispose_regular_handle: Some(dispose_regular_handle),
        set_lock: Some(set_handle_lock),
        get_size: Some(get_handle_size),
        set_size: Some(set_handle_size),
        recover_space: Some(recover_space),
    }
}

/// Buffer suite, version 1
pub(crate) fn buffer_suite1() -> PsBufferSuite1 {
    PsBufferSuite1 {
        new: Some(new_buffer),
        dispose: Some(dispose_buffer),
        get_size: Some(get_buffer_size),
        get_space: Some(get_buffer_space),
    }
}
