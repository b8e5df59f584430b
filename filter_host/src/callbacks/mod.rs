//! `extern "C"` callbacks handed to plug-ins.
//!
//! A callback finds the running host through a thread-local installed around
//! each selector call. Bodies run under `catch_unwind` and report failures as
//! status codes, so nothing ever unwinds into plug-in code.

pub(crate) mod basic;
pub(crate) mod classic;
pub(crate) mod host;
pub(crate) mod memory;
pub(crate) mod scripting;

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;
use std::rc::Rc;

use log::error;

use crate::engine::HostContext;
use crate::scripting::ScriptError;

thread_local! {
    static CURRENT: RefCell<Option<Rc<HostContext>>> = const { RefCell::new(None) };
}

/// Restores the previously installed host when dropped
pub(crate) struct ContextGuard {
    previous: Option<Rc<HostContext>>,
}

/// Make `ctx` the host callbacks on this thread talk to
pub(crate) fn install(ctx: Rc<HostContext>) -> ContextGuard {
    let previous = CURRENT.with(|current| current.replace(Some(ctx)));
    ContextGuard { previous }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT.try_with(|current| current.replace(previous));
    }
}

/// Run `f` against the installed host, or return `fallback` when there is
/// none or `f` panicked
pub(crate) fn with_context<R>(fallback: R, f: impl FnOnce(&HostContext) -> R) -> R {
    let Some(ctx) = CURRENT.with(|current| current.borrow().clone()) else {
        error!("callback invoked outside of a filter call");
        return fallback;
    };
    match catch_unwind(AssertUnwindSafe(|| f(&ctx))) {
        Ok(value) => value,
        Err(_) => {
            error!("panic inside a plug-in callback");
            fallback
        }
    }
}

/// Store `value` through an out-pointer supplied by the plug-in
///
/// # Safety
///
/// `ptr` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(ptr: *mut T, value: T) -> Result<(), ScriptError> {
    if ptr.is_null() {
        return Err(ScriptError::InvalidId);
    }
    // SAFETY: non-null and writable per the caller
    unsafe { ptr.write_unaligned(value) };
    Ok(())
}

/// Like `write_out`, for out-pointers the plug-in may leave null
///
/// # Safety
///
/// As for `write_out`.
pub(crate) unsafe fn write_optional<T>(ptr: *mut T, value: T) {
    if !ptr.is_null() {
        // SAFETY: non-null and writable per the caller
        unsafe { ptr.write_unaligned(value) };
    }
}

/// Heap value at a fixed address for as long as it lives.
///
/// Plug-ins keep raw pointers to these, so the value is never moved or
/// reborrowed through a `Box`.
pub(crate) struct Pinned<T>(NonNull<T>);

impl<T> Pinned<T> {
    pub(crate) fn new(value: T) -> Self {
        Pinned(NonNull::from(Box::leak(Box::new(value))))
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    /// # Safety
    ///
    /// No other reference to the value may be used while the result is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self) -> &mut T {
        // SAFETY: exclusive per the caller, valid until drop
        unsafe { &mut *self.0.as_ptr() }
    }
}

impl<T> Drop for Pinned<T> {
    fn drop(&mut self) {
        // SAFETY: created by Box::leak in `new` and dropped once
        unsafe { drop(Box::from_raw(self.0.as_ptr())) };
    }
}

/// Copy `text` into a caller buffer of `max_len` bytes, truncating and NUL terminating
///
/// # Safety
///
/// `out` must be null or valid for `max_len` bytes.
pub(crate) unsafe fn copy_c_string(text: &[u8], out: *mut u8, max_len: usize) -> Result<(), ScriptError> {
    if out.is_null() || max_len == 0 {
        return Err(ScriptError::InvalidId);
    }
    let len = text.len().min(max_len - 1);
    // SAFETY: len + 1 <= max_len
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr(), out, len);
        out.add(len).write(0);
    }
    Ok(())
}

/// Bytes of a NUL-terminated C string, empty for null
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn c_bytes<'a>(ptr: *const std::os::raw::c_char) -> &'a [u8] {
    if ptr.is_null() {
        return &[];
    }
    // SAFETY: NUL-terminated per the caller
    unsafe { std::ffi::CStr::from_ptr(ptr) }.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_without_host_return_fallback() {
        assert_eq!(with_context(-1, |_| 0), -1);
    }

    #[test]
    fn test_copy_c_string_truncates() {
        let mut buf = [0xffu8; 4];
        unsafe { copy_c_string(b"hello", buf.as_mut_ptr(), buf.len()) }.unwrap();
        assert_eq!(&buf, b"hel\0");
        assert!(unsafe { copy_c_string(b"x", buf.as_mut_ptr(), 0) }.is_err());
    }

    #[test]
    fn test_write_out_rejects_null() {
        assert_eq!(
            unsafe { write_out(std::ptr::null_mut::<u32>(), 1) },
            Err(ScriptError::InvalidId)
        );
        let mut value = 0u32;
        unsafe { write_out(&mut value, 7) }.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_pinned_address_is_stable() {
        let pinned = Pinned::new([1u8; 16]);
        let before = pinned.as_ptr();
        let moved = pinned;
        assert_eq!(moved.as_ptr(), before);
        unsafe { moved.get_mut()[0] = 9 };
        assert_eq!(unsafe { (*moved.as_ptr())[0] }, 9);
    }
}
