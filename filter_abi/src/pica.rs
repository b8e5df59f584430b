//! PICA suites acquired through `SPBasicSuite`

use std::os::raw::{c_char, c_void};

use crate::procs::{
    DisposePiHandleProc, DisposeRegularHandleProc, GetPiHandleSizeProc, NewPiHandleProc,
    RecoverSpaceProc, SetPiHandleSizeProc,
};
use crate::status::SpErr;
use crate::types::{Boolean, Handle};

/// `SPBasicSuite` name
pub const BASIC_SUITE: &str = "SP Basic Suite";
/// `PSHandleSuite` name, versions 1 and 2
pub const HANDLE_SUITE: &str = "Photoshop Handle Suite for Plug-ins";
/// `PSBufferSuite` name, version 1
pub const BUFFER_SUITE: &str = "Photoshop Buffer Suite for Plug-ins";
/// `PSActionDescriptorProcs` name, versions 1 and 2
pub const ACTION_DESCRIPTOR_SUITE: &str = "df135115-c769-11d0-8079-00c04fd7ec47";
/// `PSActionListProcs` name, version 1
pub const ACTION_LIST_SUITE: &str = "df135116-c769-11d0-8079-00c04fd7ec47";
/// `PSActionReferenceProcs` name, versions 2 and 3
pub const ACTION_REFERENCE_SUITE: &str = "df135117-c769-11d0-8079-00c04fd7ec47";
/// `ASZStringSuite` name, version 1
pub const ZSTRING_SUITE: &str = "AS ZString Suite";

/// Opaque descriptor id
pub type PiActionDescriptor = *mut c_void;
/// Opaque list id
pub type PiActionList = *mut c_void;
/// Opaque reference id
pub type PiActionReference = *mut c_void;
/// Opaque localizable string id
pub type AsZString = *mut c_void;
/// UTF-16 code unit
pub type AsUnicode = u16;
/// One-byte boolean of the AS suites
pub type AsBoolean = u8;
/// AS suites status
pub type AsErr = i32;

/// Basic suite handed to plug-ins through `FilterRecord::s_sp_basic`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpBasicSuite {
    /// `AcquireSuite`
    pub acquire_suite: Option<
        unsafe extern "C" fn(name: *const c_char, version: i32, suite: *mut *const c_void) -> SpErr,
    >,
    /// `ReleaseSuite`
    pub release_suite: Option<unsafe extern "C" fn(name: *const c_char, version: i32) -> SpErr>,
    /// `IsEqual`
    pub is_equal: Option<unsafe extern "C" fn(token1: *const c_char, token2: *const c_char) -> Boolean>,
    /// `AllocateBlock`
    pub allocate_block: Option<unsafe extern "C" fn(size: usize, block: *mut *mut c_void) -> SpErr>,
    /// `FreeBlock`
    pub free_block: Option<unsafe extern "C" fn(block: *mut c_void) -> SpErr>,
    /// `ReallocateBlock`
    pub reallocate_block: Option<
        unsafe extern "C" fn(block: *mut c_void, new_size: usize, new_block: *mut *mut c_void) -> SpErr,
    >,
    /// `Undefined`
    pub undefined: Option<unsafe extern "C" fn() -> SpErr>,
}

/// `SetLock`: locks or unlocks, reporting the address and previous lock state
pub type SetPiHandleLockProc =
    unsafe extern "C" fn(h: Handle, lock: Boolean, address: *mut *mut c_char, old_lock: *mut Boolean);

/// Handle suite, version 1
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PsHandleSuite1 {
    /// `New`
    pub new: Option<NewPiHandleProc>,
    /// `Dispose`
    pub dispose: Option<DisposePiHandleProc>,
    /// `SetLock`
    pub set_lock: Option<SetPiHandleLockProc>,
    /// `GetSize`
    pub get_size: Option<GetPiHandleSizeProc>,
    /// `SetSize`
    pub set_size: Option<SetPiHandleSizeProc>,
    /// `RecoverSpace`
    pub recover_space: Option<RecoverSpaceProc>,
}

/// Handle suite, version 2
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PsHandleSuite2 {
    /// `New`
    pub new: Option<NewPiHandleProc>,
    /// `Dispose`
    pub dispose: Option<DisposePiHandleProc>,
    /// `DisposeRegularHandle`
    pub dispose_regular_handle: Option<DisposeRegularHandleProc>,
    /// `SetLock`
    pub set_lock: Option<SetPiHandleLockProc>,
    /// `GetSize`
    pub get_size: Option<GetPiHandleSizeProc>,
    /// `SetSize`
    pub set_size: Option<SetPiHandleSizeProc>,
    /// `RecoverSpace`
    pub recover_space: Option<RecoverSpaceProc>,
}

/// Buffer suite, version 1
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PsBufferSuite1 {
    /// `New`: tries the requested size, shrinking toward `minimum_size`
    pub new: Option<unsafe extern "C" fn(requested_size: *mut u32, minimum_size: u32) -> *mut c_char>,
    /// `Dispose`: frees and nulls the caller's pointer
    pub dispose: Option<unsafe extern "C" fn(buffer: *mut *mut c_char)>,
    /// `GetSize`
    pub get_size: Option<unsafe extern "C" fn(buffer: *mut c_char) -> u32>,
    /// `GetSpace`
    pub get_space: Option<unsafe extern "C" fn() -> u32>,
}

type Desc = PiActionDescriptor;
type List = PiActionList;
type Ref = PiActionReference;

/// Action descriptor suite, version 2 (version 1 is its prefix)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct PsActionDescriptorProcs {
    pub make: Option<unsafe extern "C" fn(descriptor: *mut Desc) -> SpErr>,
    pub free: Option<unsafe extern "C" fn(descriptor: Desc) -> SpErr>,
    pub get_type: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, type_: *mut u32) -> SpErr>,
    pub get_key: Option<unsafe extern "C" fn(descriptor: Desc, index: u32, key: *mut u32) -> SpErr>,
    pub has_key: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, has_key: *mut Boolean) -> SpErr>,
    pub get_count: Option<unsafe extern "C" fn(descriptor: Desc, count: *mut u32) -> SpErr>,
    pub is_equal: Option<unsafe extern "C" fn(descriptor: Desc, other: Desc, is_equal: *mut Boolean) -> SpErr>,
    pub erase: Option<unsafe extern "C" fn(descriptor: Desc, key: u32) -> SpErr>,
    pub clear: Option<unsafe extern "C" fn(descriptor: Desc) -> SpErr>,
    pub put_integer: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: i32) -> SpErr>,
    pub put_float: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: f64) -> SpErr>,
    pub put_unit_float: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, unit: u32, value: f64) -> SpErr>,
    pub put_string: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *const c_char) -> SpErr>,
    pub put_boolean: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: Boolean) -> SpErr>,
    pub put_list: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: List) -> SpErr>,
    pub put_object: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, class_id: u32, value: Desc) -> SpErr>,
    pub put_global_object:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, class_id: u32, value: Desc) -> SpErr>,
    pub put_enumerated: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, type_: u32, value: u32) -> SpErr>,
    pub put_reference: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: Ref) -> SpErr>,
    pub put_class: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: u32) -> SpErr>,
    pub put_global_class: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: u32) -> SpErr>,
    pub put_alias: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: Handle) -> SpErr>,
    pub get_integer: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut i32) -> SpErr>,
    pub get_float: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut f64) -> SpErr>,
    pub get_unit_float:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, unit: *mut u32, value: *mut f64) -> SpErr>,
    pub get_string_length: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, length: *mut u32) -> SpErr>,
    pub get_string:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut c_char, max_length: u32) -> SpErr>,
    pub get_boolean: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut Boolean) -> SpErr>,
    pub get_list: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut List) -> SpErr>,
    pub get_object:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, class_id: *mut u32, value: *mut Desc) -> SpErr>,
    pub get_global_object:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, class_id: *mut u32, value: *mut Desc) -> SpErr>,
    pub get_enumerated:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, type_: *mut u32, value: *mut u32) -> SpErr>,
    pub get_reference: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut Ref) -> SpErr>,
    pub get_class: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut u32) -> SpErr>,
    pub get_global_class: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut u32) -> SpErr>,
    pub get_alias: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut Handle) -> SpErr>,
    pub has_keys: Option<unsafe extern "C" fn(descriptor: Desc, keys: *mut u32, has_keys: *mut Boolean) -> SpErr>,
    pub put_integers:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, count: u32, values: *const i32) -> SpErr>,
    pub get_integers:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, count: u32, values: *mut i32) -> SpErr>,
    pub as_handle: Option<unsafe extern "C" fn(descriptor: Desc, value: *mut Handle) -> SpErr>,
    pub handle_to_descriptor: Option<unsafe extern "C" fn(value: Handle, descriptor: *mut Desc) -> SpErr>,
    pub put_zstring: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: AsZString) -> SpErr>,
    pub get_zstring: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut AsZString) -> SpErr>,
    pub put_data:
        Option<unsafe extern "C" fn(descriptor: Desc, key: u32, length: i32, value: *const c_void) -> SpErr>,
    pub get_data_length: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, length: *mut i32) -> SpErr>,
    pub get_data: Option<unsafe extern "C" fn(descriptor: Desc, key: u32, value: *mut c_void) -> SpErr>,
}

/// Action list suite, version 1
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct PsActionListProcs {
    pub make: Option<unsafe extern "C" fn(list: *mut List) -> SpErr>,
    pub free: Option<unsafe extern "C" fn(list: List) -> SpErr>,
    pub get_type: Option<unsafe extern "C" fn(list: List, index: u32, type_: *mut u32) -> SpErr>,
    pub get_count: Option<unsafe extern "C" fn(list: List, count: *mut u32) -> SpErr>,
    pub put_integer: Option<unsafe extern "C" fn(list: List, value: i32) -> SpErr>,
    pub put_float: Option<unsafe extern "C" fn(list: List, value: f64) -> SpErr>,
    pub put_unit_float: Option<unsafe extern "C" fn(list: List, unit: u32, value: f64) -> SpErr>,
    pub put_string: Option<unsafe extern "C" fn(list: List, value: *const c_char) -> SpErr>,
    pub put_boolean: Option<unsafe extern "C" fn(list: List, value: Boolean) -> SpErr>,
    pub put_list: Option<unsafe extern "C" fn(list: List, value: List) -> SpErr>,
    pub put_object: Option<unsafe extern "C" fn(list: List, class_id: u32, value: Desc) -> SpErr>,
    pub put_global_object: Option<unsafe extern "C" fn(list: List, class_id: u32, value: Desc) -> SpErr>,
    pub put_enumerated: Option<unsafe extern "C" fn(list: List, type_: u32, value: u32) -> SpErr>,
    pub put_reference: Option<unsafe extern "C" fn(list: List, value: Ref) -> SpErr>,
    pub put_class: Option<unsafe extern "C" fn(list: List, value: u32) -> SpErr>,
    pub put_global_class: Option<unsafe extern "C" fn(list: List, value: u32) -> SpErr>,
    pub put_alias: Option<unsafe extern "C" fn(list: List, value: Handle) -> SpErr>,
    pub get_integer: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut i32) -> SpErr>,
    pub get_float: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut f64) -> SpErr>,
    pub get_unit_float:
        Option<unsafe extern "C" fn(list: List, index: u32, unit: *mut u32, value: *mut f64) -> SpErr>,
    pub get_string_length: Option<unsafe extern "C" fn(list: List, index: u32, length: *mut u32) -> SpErr>,
    pub get_string:
        Option<unsafe extern "C" fn(list: List, index: u32, value: *mut c_char, max_length: u32) -> SpErr>,
    pub get_boolean: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut Boolean) -> SpErr>,
    pub get_list: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut List) -> SpErr>,
    pub get_object:
        Option<unsafe extern "C" fn(list: List, index: u32, class_id: *mut u32, value: *mut Desc) -> SpErr>,
    pub get_global_object:
        Option<unsafe extern "C" fn(list: List, index: u32, class_id: *mut u32, value: *mut Desc) -> SpErr>,
    pub get_enumerated:
        Option<unsafe extern "C" fn(list: List, index: u32, type_: *mut u32, value: *mut u32) -> SpErr>,
    pub get_reference: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut Ref) -> SpErr>,
    pub get_class: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut u32) -> SpErr>,
    pub get_global_class: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut u32) -> SpErr>,
    pub get_alias: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut Handle) -> SpErr>,
    pub put_integers: Option<unsafe extern "C" fn(list: List, count: u32, values: *const i32) -> SpErr>,
    pub get_integers: Option<unsafe extern "C" fn(list: List, count: u32, values: *mut i32) -> SpErr>,
    pub put_data: Option<unsafe extern "C" fn(list: List, length: i32, value: *const c_void) -> SpErr>,
    pub get_data_length: Option<unsafe extern "C" fn(list: List, index: u32, length: *mut i32) -> SpErr>,
    pub get_data: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut c_void) -> SpErr>,
    pub put_zstring: Option<unsafe extern "C" fn(list: List, value: AsZString) -> SpErr>,
    pub get_zstring: Option<unsafe extern "C" fn(list: List, index: u32, value: *mut AsZString) -> SpErr>,
}

/// Action reference suite, version 2
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct PsActionReferenceProcs {
    pub make: Option<unsafe extern "C" fn(reference: *mut Ref) -> SpErr>,
    pub free: Option<unsafe extern "C" fn(reference: Ref) -> SpErr>,
    pub get_form: Option<unsafe extern "C" fn(reference: Ref, form: *mut u32) -> SpErr>,
    pub get_desired_class: Option<unsafe extern "C" fn(reference: Ref, class_id: *mut u32) -> SpErr>,
    pub put_name: Option<unsafe extern "C" fn(reference: Ref, class_id: u32, value: *const c_char) -> SpErr>,
    pub put_index: Option<unsafe extern "C" fn(reference: Ref, class_id: u32, value: u32) -> SpErr>,
    pub put_identifier: Option<unsafe extern "C" fn(reference: Ref, class_id: u32, value: u32) -> SpErr>,
    pub put_offset: Option<unsafe extern "C" fn(reference: Ref, class_id: u32, value: i32) -> SpErr>,
    pub put_enumerated:
        Option<unsafe extern "C" fn(reference: Ref, class_id: u32, type_: u32, value: u32) -> SpErr>,
    pub put_property: Option<unsafe extern "C" fn(reference: Ref, class_id: u32, value: u32) -> SpErr>,
    pub put_class: Option<unsafe extern "C" fn(reference: Ref, class_id: u32) -> SpErr>,
    pub get_name_length: Option<unsafe extern "C" fn(reference: Ref, length: *mut u32) -> SpErr>,
    pub get_name: Option<unsafe extern "C" fn(reference: Ref, value: *mut c_char, max_length: u32) -> SpErr>,
    pub get_index: Option<unsafe extern "C" fn(reference: Ref, value: *mut u32) -> SpErr>,
    pub get_identifier: Option<unsafe extern "C" fn(reference: Ref, value: *mut u32) -> SpErr>,
    pub get_offset: Option<unsafe extern "C" fn(reference: Ref, value: *mut i32) -> SpErr>,
    pub get_enumerated: Option<unsafe extern "C" fn(reference: Ref, type_: *mut u32, value: *mut u32) -> SpErr>,
    pub get_property: Option<unsafe extern "C" fn(reference: Ref, value: *mut u32) -> SpErr>,
    pub get_container: Option<unsafe extern "C" fn(reference: Ref, value: *mut Ref) -> SpErr>,
}

type Z = AsZString;

/// Localizable string suite, version 1
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct AsZStringSuite {
    pub make_from_unicode:
        Option<unsafe extern "C" fn(src: *const AsUnicode, byte_count: usize, out: *mut Z) -> AsErr>,
    pub make_from_cstring: Option<unsafe extern "C" fn(src: *const c_char, byte_count: usize, out: *mut Z) -> AsErr>,
    pub make_from_pascal_string:
        Option<unsafe extern "C" fn(src: *const u8, byte_count: usize, out: *mut Z) -> AsErr>,
    pub make_romanization_of_integer: Option<unsafe extern "C" fn(value: i32, out: *mut Z) -> AsErr>,
    pub make_romanization_of_fixed: Option<
        unsafe extern "C" fn(value: i32, places: i16, trim: AsBoolean, is_signed: AsBoolean, out: *mut Z) -> AsErr,
    >,
    pub make_romanization_of_double: Option<unsafe extern "C" fn(value: f64, out: *mut Z) -> AsErr>,
    pub get_empty: Option<unsafe extern "C" fn() -> Z>,
    pub copy: Option<unsafe extern "C" fn(source: Z, copy: *mut Z) -> AsErr>,
    pub replace: Option<unsafe extern "C" fn(zstr: Z, index: u32, replacement: Z) -> AsErr>,
    pub trim_ellipsis: Option<unsafe extern "C" fn(zstr: Z) -> AsErr>,
    pub trim_spaces: Option<unsafe extern "C" fn(zstr: Z) -> AsErr>,
    pub remove_accelerators: Option<unsafe extern "C" fn(zstr: Z) -> AsErr>,
    pub add_ref: Option<unsafe extern "C" fn(zstr: Z) -> AsErr>,
    pub release: Option<unsafe extern "C" fn(zstr: Z) -> AsErr>,
    pub is_all_white_space: Option<unsafe extern "C" fn(zstr: Z) -> AsBoolean>,
    pub is_empty: Option<unsafe extern "C" fn(zstr: Z) -> AsBoolean>,
    pub will_replace: Option<unsafe extern "C" fn(zstr: Z, index: u32) -> AsBoolean>,
    pub length_as_unicode_cstring: Option<unsafe extern "C" fn(zstr: Z) -> u32>,
    pub as_unicode_cstring:
        Option<unsafe extern "C" fn(zstr: Z, out: *mut AsUnicode, size: u32, check_size: AsBoolean) -> AsErr>,
    pub length_as_cstring: Option<unsafe extern "C" fn(zstr: Z) -> u32>,
    pub as_cstring: Option<unsafe extern "C" fn(zstr: Z, out: *mut c_char, size: u32, check_size: AsBoolean) -> AsErr>,
    pub length_as_pascal_string: Option<unsafe extern "C" fn(zstr: Z) -> u32>,
    pub as_pascal_string:
        Option<unsafe extern "C" fn(zstr: Z, out: *mut c_char, size: u32, check_size: AsBoolean) -> AsErr>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    const PTR: usize = size_of::<usize>();

    #[test]
    fn test_suite_tables_are_packed_function_pointers() {
        assert_eq!(size_of::<SpBasicSuite>(), 7 * PTR);
        assert_eq!(size_of::<PsHandleSuite1>(), 6 * PTR);
        assert_eq!(size_of::<PsHandleSuite2>(), 7 * PTR);
        assert_eq!(size_of::<PsBufferSuite1>(), 4 * PTR);
        assert_eq!(size_of::<PsActionDescriptorProcs>(), 46 * PTR);
        assert_eq!(size_of::<PsActionListProcs>(), 38 * PTR);
        assert_eq!(size_of::<PsActionReferenceProcs>(), 19 * PTR);
        assert_eq!(size_of::<AsZStringSuite>(), 23 * PTR);
    }
}
