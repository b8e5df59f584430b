//! SPBasic suite: suite acquisition and block allocation

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};

use filter_abi::pica::{
    ACTION_DESCRIPTOR_SUITE, ACTION_LIST_SUITE, ACTION_REFERENCE_SUITE, AsZStringSuite, BASIC_SUITE,
    BUFFER_SUITE, HANDLE_SUITE, PsActionDescriptorProcs, PsActionListProcs, PsActionReferenceProcs,
    PsBufferSuite1, PsHandleSuite1, PsHandleSuite2, SpBasicSuite, ZSTRING_SUITE,
};
use filter_abi::types::Boolean;
use filter_abi::{SpErr, SpError};
use log::debug;

use super::{Pinned, memory, scripting, with_context, write_out};

/// Suite tables served through `AcquireSuite`, with acquire counts.
///
/// Every table but SPBasic is built the first time a plug-in asks for it.
pub(crate) struct SuiteRegistry {
    basic: Pinned<SpBasicSuite>,
    handle1: OnceCell<Pinned<PsHandleSuite1>>,
    handle2: OnceCell<Pinned<PsHandleSuite2>>,
    buffer1: OnceCell<Pinned<PsBufferSuite1>>,
    descriptor: OnceCell<Pinned<PsActionDescriptorProcs>>,
    list: OnceCell<Pinned<PsActionListProcs>>,
    reference: OnceCell<Pinned<PsActionReferenceProcs>>,
    zstring: OnceCell<Pinned<AsZStringSuite>>,
    acquired: RefCell<HashMap<(String, i32), u32>>,
}

/// Pinned table in `cell`, built on first use
fn lazy_table<T>(cell: &OnceCell<Pinned<T>>, build: fn() -> T) -> *const c_void {
    cell.get_or_init(|| Pinned::new(build())).as_ptr().cast()
}

impl SuiteRegistry {
    pub(crate) fn new() -> Self {
        SuiteRegistry {
            basic: Pinned::new(basic_suite()),
            handle1: OnceCell::new(),
            handle2: OnceCell::new(),
            buffer1: OnceCell::new(),
            descriptor: OnceCell::new(),
            list: OnceCell::new(),
            reference: OnceCell::new(),
            zstring: OnceCell::new(),
            acquired: RefCell::new(HashMap::new()),
        }
    }

    /// Address for `FilterRecord::s_sp_basic`
    pub(crate) fn basic_ptr(&self) -> *mut SpBasicSuite {
        self.basic.as_ptr()
    }

    /// Table for a suite name and version
    pub(crate) fn lookup(&self, name: &str, version: i32) -> Result<*const c_void, SpError> {
        let table: *const c_void = match (name, version) {
            (BASIC_SUITE, _) => self.basic.as_ptr().cast(),
            (HANDLE_SUITE, 1) => lazy_table(&self.handle1, memory::handle_suite1),
            (HANDLE_SUITE, 2) => lazy_table(&self.handle2, memory::handle_suite2),
            (BUFFER_SUITE, 1) => lazy_table(&self.buffer1, memory::buffer_suite1),
            (ACTION_DESCRIPTOR_SUITE, 1 | 2) => lazy_table(&self.descriptor, scripting::descriptor_suite),
            (ACTION_LIST_SUITE, 1) => lazy_table(&self.list, scripting::list_suite),
            (ACTION_REFERENCE_SUITE, 2 | 3) => lazy_table(&self.reference, scripting::reference_suite),
            (ZSTRING_SUITE, 1) => lazy_table(&self.zstring, scripting::zstring_suite),
            _ => {
                debug!("suite {name:?} version {version} is not available");
                return Err(SpError::SuiteNotFound);
            }
        };
        Ok(table)
    }

    /// Number of suite tables built so far, SPBasic excluded
    #[cfg(test)]
    fn built(&self) -> usize {
        [
            self.handle1.get().is_some(),
            self.handle2.get().is_some(),
            self.buffer1.get().is_some(),
            self.descriptor.get().is_some(),
            self.list.get().is_some(),
            self.reference.get().is_some(),
            self.zstring.get().is_some(),
        ]
        .into_iter()
        .filter(|&built| built)
        .count()
    }

    pub(crate) fn acquire(&self, name: &str, version: i32) -> Result<*const c_void, SpError> {
        let table = self.lookup(name, version)?;
        *self.acquired.borrow_mut().entry((name.to_owned(), version)).or_insert(0) += 1;
        Ok(table)
    }

    pub(crate) fn release(&self, name: &str, version: i32) -> Result<(), SpError> {
        self.lookup(name, version)?;
        let mut acquired = self.acquired.borrow_mut();
        if let Some(count) = acquired.get_mut(&(name.to_owned(), version)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    /// Acquisitions not yet released
    pub(crate) fn outstanding(&self) -> u32 {
        self.acquired.borrow().values().sum()
    }
}

fn suite_name<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    // SAFETY: NUL-terminated suite name from the plug-in
    unsafe { CStr::from_ptr(name) }.to_str().ok()
}

fn code(result: Result<(), SpError>) -> SpErr {
    result.err().unwrap_or(SpError::NoError).code()
}

unsafe extern "C" fn acquire_suite(name: *const c_char, version: i32, suite: *mut *const c_void) -> SpErr {
    let Some(name) = suite_name(name) else {
        return SpError::BadParameter.code();
    };
    with_context(SpError::BadParameter.code(), |ctx| {
        let result = ctx.tables.suites.acquire(name, version).and_then(|table| {
            // SAFETY: out-pointer supplied by the plug-in
            unsafe { write_out(suite, table) }.map_err(|_| SpError::BadParameter)
        });
        code(result)
    })
}

unsafe extern "C" fn release_suite(name: *const c_char, version: i32) -> SpErr {
    let Some(name) = suite_name(name) else {
        return SpError::BadParameter.code();
    };
    with_context(SpError::BadParameter.code(), |ctx| code(ctx.tables.suites.release(name, version)))
}

unsafe extern "C" fn is_equal(token1: *const c_char, token2: *const c_char) -> Boolean {
    if token1.is_null() || token2.is_null() {
        return 0;
    }
    // SAFETY: both NUL-terminated per the calling convention
    let same = unsafe { CStr::from_ptr(token1) == CStr::from_ptr(token2) };
    Boolean::from(same)
}

unsafe extern "C" fn allocate_block(size: usize, block: *mut *mut c_void) -> SpErr {
    let Ok(size) = i32::try_from(size) else {
        return SpError::OutOfMemory.code();
    };
    let ptr = with_context(std::ptr::null_mut(), |ctx| match ctx.memory.buffers.try_borrow_mut() {
        Ok(mut buffers) => buffers.allocate(size),
        Err(_) => std::ptr::null_mut(),
    });
    if ptr.is_null() {
        return SpError::OutOfMemory.code();
    }
    // SAFETY: out-pointer supplied by the plug-in
    code(unsafe { write_out(block, ptr.cast()) }.map_err(|_| SpError::BadParameter))
}

unsafe extern "C" fn free_block(block: *mut c_void) -> SpErr {
    with_context(SpError::BadParameter.code(), |ctx| match ctx.memory.buffers.try_borrow_mut() {
        Ok(mut buffers) => {
            buffers.dispose(block.cast());
            SpError::NoError.code()
        }
        Err(_) => SpError::BadParameter.code(),
    })
}

unsafe extern "C" fn reallocate_block(block: *mut c_void, new_size: usize, new_block: *mut *mut c_void) -> SpErr {
    let ptr = with_context(std::ptr::null_mut(), |ctx| match ctx.memory.buffers.try_borrow_mut() {
        Ok(mut buffers) => buffers.reallocate(block.cast(), new_size),
        Err(_) => std::ptr::null_mut(),
    });
    if ptr.is_null() {
        return SpError::OutOfMemory.code();
    }
    // SAFETY: out-pointer supplied by the plug-in
    code(unsafe { write_out(new_block, ptr.cast()) }.map_err(|_| SpError::BadParameter))
}

unsafe extern "C" fn undefined() -> SpErr {
    SpError::Unimplemented.code()
}

fn basic_suite() -> SpBasicSuite {
    SpBasicSuite {
        acquire_suite: Some(acquire_suite),
        release_suite: Some(release_suite),
        is_equal: Some(is_equal),
        allocate_block: Some(allocate_block),
        free_block: Some(free_block),
        reallocate_block: Some(reallocate_block),
        undefined: Some(undefined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_routes_versions() {
        let suites = SuiteRegistry::new();
        assert!(suites.lookup(BASIC_SUITE, 8).is_ok());
        assert!(suites.lookup(HANDLE_SUITE, 1).is_ok());
        assert!(suites.lookup(HANDLE_SUITE, 2).is_ok());
        assert_ne!(suites.lookup(HANDLE_SUITE, 1), suites.lookup(HANDLE_SUITE, 2));
        assert_eq!(
            suites.lookup(ACTION_DESCRIPTOR_SUITE, 1),
            suites.lookup(ACTION_DESCRIPTOR_SUITE, 2)
        );
        assert_eq!(suites.lookup(BUFFER_SUITE, 2), Err(SpError::SuiteNotFound));
        assert_eq!(suites.lookup("Some Other Suite", 1), Err(SpError::SuiteNotFound));
    }

    #[test]
    fn test_tables_are_built_on_first_request() {
        let suites = SuiteRegistry::new();
        assert_eq!(suites.built(), 0);
        let first = suites.lookup(ACTION_LIST_SUITE, 1).unwrap();
        assert_eq!(suites.built(), 1);
        assert_eq!(suites.lookup(ACTION_LIST_SUITE, 1).unwrap(), first);
        assert_eq!(suites.built(), 1);
        suites.lookup("Some Other Suite", 1).unwrap_err();
        assert_eq!(suites.built(), 1);
    }

    #[test]
    fn test_acquire_and_release_balance() {
        let suites = SuiteRegistry::new();
        suites.acquire(ZSTRING_SUITE, 1).unwrap();
        suites.acquire(ZSTRING_SUITE, 1).unwrap();
        assert_eq!(suites.outstanding(), 2);
        suites.release(ZSTRING_SUITE, 1).unwrap();
        suites.release(ZSTRING_SUITE, 1).unwrap();
        suites.release(ZSTRING_SUITE, 1).unwrap();
        assert_eq!(suites.outstanding(), 0);
        assert_eq!(suites.release(ZSTRING_SUITE, 9), Err(SpError::SuiteNotFound));
    }

    #[test]
    fn test_is_equal_compares_contents() {
        let a = c"AS ZString Suite";
        let b = c"AS ZString Suite";
        let c = c"SP Basic Suite";
        unsafe {
            assert_eq!(is_equal(a.as_ptr(), b.as_ptr()), 1);
            assert_eq!(is_equal(a.as_ptr(), c.as_ptr()), 0);
            assert_eq!(is_equal(a.as_ptr(), std::ptr::null()), 0);
        }
    }

    #[test]
    fn test_undefined_is_unimplemented() {
        assert_eq!(unsafe { undefined() }, SpError::Unimplemented.code());
    }
}
