//! Classic callback tables referenced from the filter record

use std::os::raw::{c_char, c_void};

use crate::status::OsErr;
use crate::types::{Boolean, BufferId, Handle, Str255};

/// Returns non-zero when the user asked to cancel
pub type TestAbortProc = unsafe extern "C" fn() -> Boolean;
/// Reports `done` out of `total`
pub type ProgressProc = unsafe extern "C" fn(done: i32, total: i32);
/// Services the requested rectangles immediately
pub type AdvanceStateProc = unsafe extern "C" fn() -> OsErr;
/// Host specific callback, unused
pub type HostProc = unsafe extern "C" fn(selector: i16, data: *mut isize);

/// Allocates a handle, null on failure
pub type NewPiHandleProc = unsafe extern "C" fn(size: i32) -> Handle;
/// Frees a handle
pub type DisposePiHandleProc = unsafe extern "C" fn(h: Handle);
/// Logical size of a handle
pub type GetPiHandleSizeProc = unsafe extern "C" fn(h: Handle) -> i32;
/// Resizes a handle, the block may move
pub type SetPiHandleSizeProc = unsafe extern "C" fn(h: Handle, new_size: i32) -> OsErr;
/// Locks a handle and returns its block address
pub type LockPiHandleProc = unsafe extern "C" fn(h: Handle, move_high: Boolean) -> *mut c_char;
/// Unlocks a handle
pub type UnlockPiHandleProc = unsafe extern "C" fn(h: Handle);
/// Asks the host to free memory
pub type RecoverSpaceProc = unsafe extern "C" fn(size: i32);
/// Frees an OS handle the plug-in received from the host
pub type DisposeRegularHandleProc = unsafe extern "C" fn(h: Handle);

/// Current classic handle procs version
pub const HANDLE_PROCS_VERSION: i16 = 1;
/// Number of procs in `HandleProcs`
pub const HANDLE_PROCS_COUNT: i16 = 8;

/// Classic handle callbacks
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HandleProcs {
    /// Table version
    pub handle_procs_version: i16,
    /// Number of procs that follow
    pub num_handle_procs: i16,
    /// `NewPIHandle`
    pub new_proc: Option<NewPiHandleProc>,
    /// `DisposePIHandle`
    pub dispose_proc: Option<DisposePiHandleProc>,
    /// `GetPIHandleSize`
    pub get_size_proc: Option<GetPiHandleSizeProc>,
    /// `SetPIHandleSize`
    pub set_size_proc: Option<SetPiHandleSizeProc>,
    /// `LockPIHandle`
    pub lock_proc: Option<LockPiHandleProc>,
    /// `UnlockPIHandle`
    pub unlock_proc: Option<UnlockPiHandleProc>,
    /// `RecoverSpace`
    pub recover_space_proc: Option<RecoverSpaceProc>,
    /// `DisposeRegularHandle`
    pub dispose_regular_handle_proc: Option<DisposeRegularHandleProc>,
}

/// Allocates a buffer and stores its id
pub type AllocateBufferProc = unsafe extern "C" fn(size: i32, buffer_id: *mut BufferId) -> OsErr;
/// Locks a buffer and returns its address
pub type LockBufferProc = unsafe extern "C" fn(buffer_id: BufferId, move_high: Boolean) -> *mut c_void;
/// Unlocks a buffer
pub type UnlockBufferProc = unsafe extern "C" fn(buffer_id: BufferId);
/// Frees a buffer
pub type FreeBufferProc = unsafe extern "C" fn(buffer_id: BufferId);
/// Available buffer space
pub type BufferSpaceProc = unsafe extern "C" fn() -> i32;

/// Current classic buffer procs version
pub const BUFFER_PROCS_VERSION: i16 = 2;
/// Number of procs in `BufferProcs`
pub const BUFFER_PROCS_COUNT: i16 = 5;

/// Classic buffer callbacks
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BufferProcs {
    /// Table version
    pub buffer_procs_version: i16,
    /// Number of procs that follow
    pub num_buffer_procs: i16,
    /// `AllocateBuffer`
    pub allocate_proc: Option<AllocateBufferProc>,
    /// `LockBuffer`
    pub lock_proc: Option<LockBufferProc>,
    /// `UnlockBuffer`
    pub unlock_proc: Option<UnlockBufferProc>,
    /// `FreeBuffer`
    pub free_proc: Option<FreeBufferProc>,
    /// `BufferSpace`
    pub space_proc: Option<BufferSpaceProc>,
}

/// Opaque read descriptor token
pub type PiReadDescriptor = *mut c_void;
/// Opaque write descriptor token
pub type PiWriteDescriptor = *mut c_void;
/// Descriptor handle exchanged through `PIDescriptorParameters`
pub type PiDescriptorHandle = Handle;

/// Key data of a simple reference
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PiDescriptorSimpleReferenceKeyData {
    /// Name for `formName`
    pub name: Str255,
    /// Index for `formIndex`
    pub index: i32,
    /// Enumeration type for `formEnumerated`
    pub type_: u32,
    /// Enumeration value for `formEnumerated`
    pub value: u32,
}

/// Single-item reference used by the classic procs
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PiDescriptorSimpleReference {
    /// Class of the referenced object
    pub desired_class: u32,
    /// Reference form
    pub key_form: u32,
    /// Form payload
    pub key_data: PiDescriptorSimpleReferenceKeyData,
}

/// `OpenReadDescriptor`
pub type OpenReadDescriptorProc =
    unsafe extern "C" fn(descriptor: PiDescriptorHandle, keys: *mut u32) -> PiReadDescriptor;
/// `CloseReadDescriptor`
pub type CloseReadDescriptorProc = unsafe extern "C" fn(token: PiReadDescriptor) -> OsErr;
/// `GetKey`
pub type GetKeyProc = unsafe extern "C" fn(
    token: PiReadDescriptor,
    key: *mut u32,
    type_: *mut u32,
    flags: *mut i32,
) -> Boolean;
/// `GetInteger`
pub type GetIntegerProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut i32) -> OsErr;
/// `GetFloat`
pub type GetFloatProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut f64) -> OsErr;
/// `GetUnitFloat`
pub type GetUnitFloatProc =
    unsafe extern "C" fn(token: PiReadDescriptor, unit: *mut u32, value: *mut f64) -> OsErr;
/// `GetBoolean`
pub type GetBooleanProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut Boolean) -> OsErr;
/// `GetText` and `GetAlias`
pub type GetHandleValueProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut Handle) -> OsErr;
/// `GetEnumerated` and `GetClass`
pub type GetTypeValueProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut u32) -> OsErr;
/// `GetSimpleReference`
pub type GetSimpleReferenceProc =
    unsafe extern "C" fn(token: PiReadDescriptor, value: *mut PiDescriptorSimpleReference) -> OsErr;
/// `GetObject`
pub type GetObjectProc = unsafe extern "C" fn(
    token: PiReadDescriptor,
    class_id: *mut u32,
    value: *mut PiDescriptorHandle,
) -> OsErr;
/// `GetCount`
pub type GetCountProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut u32) -> OsErr;
/// `GetString`
pub type GetStringProc = unsafe extern "C" fn(token: PiReadDescriptor, value: *mut Str255) -> OsErr;
/// `GetPinnedInteger`
pub type GetPinnedIntegerProc =
    unsafe extern "C" fn(token: PiReadDescriptor, min: i32, max: i32, value: *mut i32) -> OsErr;
/// `GetPinnedFloat`
pub type GetPinnedFloatProc = unsafe extern "C" fn(
    token: PiReadDescriptor,
    min: *const f64,
    max: *const f64,
    value: *mut f64,
) -> OsErr;
/// `GetPinnedUnitFloat`
pub type GetPinnedUnitFloatProc = unsafe extern "C" fn(
    token: PiReadDescriptor,
    min: *const f64,
    max: *const f64,
    unit: *mut u32,
    value: *mut f64,
) -> OsErr;

/// Current read descriptor procs version
pub const READ_DESCRIPTOR_PROCS_VERSION: i16 = 0;
/// Number of procs in `ReadDescriptorProcs`
pub const READ_DESCRIPTOR_PROCS_COUNT: i16 = 18;

/// Classic descriptor reading callbacks
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ReadDescriptorProcs {
    /// Table version
    pub read_descriptor_procs_version: i16,
    /// Number of procs that follow
    pub num_read_descriptor_procs: i16,
    /// `OpenReadDescriptor`
    pub open_read_descriptor_proc: Option<OpenReadDescriptorProc>,
    /// `CloseReadDescriptor`
    pub close_read_descriptor_proc: Option<CloseReadDescriptorProc>,
    /// `GetKey`
    pub get_key_proc: Option<GetKeyProc>,
    /// `GetInteger`
    pub get_integer_proc: Option<GetIntegerProc>,
    /// `GetFloat`
    pub get_float_proc: Option<GetFloatProc>,
    /// `GetUnitFloat`
    pub get_unit_float_proc: Option<GetUnitFloatProc>,
    /// `GetBoolean`
    pub get_boolean_proc: Option<GetBooleanProc>,
    /// `GetText`
    pub get_text_proc: Option<GetHandleValueProc>,
    /// `GetAlias`
    pub get_alias_proc: Option<GetHandleValueProc>,
    /// `GetEnumerated`
    pub get_enumerated_proc: Option<GetTypeValueProc>,
    /// `GetClass`
    pub get_class_proc: Option<GetTypeValueProc>,
    /// `GetSimpleReference`
    pub get_simple_reference_proc: Option<GetSimpleReferenceProc>,
    /// `GetObject`
    pub get_object_proc: Option<GetObjectProc>,
    /// `GetCount`
    pub get_count_proc: Option<GetCountProc>,
    /// `GetString`
    pub get_string_proc: Option<GetStringProc>,
    /// `GetPinnedInteger`
    pub get_pinned_integer_proc: Option<GetPinnedIntegerProc>,
    /// `GetPinnedFloat`
    pub get_pinned_float_proc: Option<GetPinnedFloatProc>,
    /// `GetPinnedUnitFloat`
    pub get_pinned_unit_float_proc: Option<GetPinnedUnitFloatProc>,
}

/// `OpenWriteDescriptor`
pub type OpenWriteDescriptorProc = unsafe extern "C" fn() -> PiWriteDescriptor;
/// `CloseWriteDescriptor`
pub type CloseWriteDescriptorProc =
    unsafe extern "C" fn(token: PiWriteDescriptor, descriptor: *mut PiDescriptorHandle) -> OsErr;
/// `PutInteger`
pub type PutIntegerProc = unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: i32) -> OsErr;
/// `PutFloat`
pub type PutFloatProc =
    unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: *const f64) -> OsErr;
/// `PutUnitFloat`
pub type PutUnitFloatProc =
    unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, unit: u32, value: *const f64) -> OsErr;
/// `PutBoolean`
pub type PutBooleanProc = unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: Boolean) -> OsErr;
/// `PutText` and `PutAlias`
pub type PutHandleValueProc = unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: Handle) -> OsErr;
/// `PutEnumerated`
pub type PutEnumeratedProc =
    unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, type_: u32, value: u32) -> OsErr;
/// `PutClass` and `PutScopedClass`
pub type PutClassProc = unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: u32) -> OsErr;
/// `PutSimpleReference`
pub type PutSimpleReferenceProc = unsafe extern "C" fn(
    token: PiWriteDescriptor,
    key: u32,
    value: *const PiDescriptorSimpleReference,
) -> OsErr;
/// `PutObject` and `PutScopedObject`
pub type PutObjectProc = unsafe extern "C" fn(
    token: PiWriteDescriptor,
    key: u32,
    class_id: u32,
    value: PiDescriptorHandle,
) -> OsErr;
/// `PutCount`
pub type PutCountProc = unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, count: u32) -> OsErr;
/// `PutString`
pub type PutStringProc =
    unsafe extern "C" fn(token: PiWriteDescriptor, key: u32, value: *const u8) -> OsErr;

/// Current write descriptor procs version
pub const WRITE_DESCRIPTOR_PROCS_VERSION: i16 = 0;
/// Number of procs in `WriteDescriptorProcs`
pub const WRITE_DESCRIPTOR_PROCS_COUNT: i16 = 16;

/// Classic descriptor writing callbacks
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WriteDescriptorProcs {
    /// Table version
    pub write_descriptor_procs_version: i16,
    /// Number of procs that follow
    pub num_write_descriptor_procs: i16,
    /// `OpenWriteDescriptor`
    pub open_write_descriptor_proc: Option<OpenWriteDescriptorProc>,
    /// `CloseWriteDescriptor`
    pub close_write_descriptor_proc: Option<CloseWriteDescriptorProc>,
    /// `PutInteger`
    pub put_integer_proc: Option<PutIntegerProc>,
    /// `PutFloat`
    pub put_float_proc: Option<PutFloatProc>,
    /// `PutUnitFloat`
    pub put_unit_float_proc: Option<PutUnitFloatProc>,
    /// `PutBoolean`
    pub put_boolean_proc: Option<PutBooleanProc>,
    /// `PutText`
    pub put_text_proc: Option<PutHandleValueProc>,
    /// `PutAlias`
    pub put_alias_proc: Option<PutHandleValueProc>,
    /// `PutEnumerated`
    pub put_enumerated_proc: Option<PutEnumeratedProc>,
    /// `PutClass`
    pub put_class_proc: Option<PutClassProc>,
    /// `PutSimpleReference`
    pub put_simple_reference_proc: Option<PutSimpleReferenceProc>,
    /// `PutObject`
    pub put_object_proc: Option<PutObjectProc>,
    /// `PutCount`
    pub put_count_proc: Option<PutCountProc>,
    /// `PutString`
    pub put_string_proc: Option<PutStringProc>,
    /// `PutScopedClass`
    pub put_scoped_class_proc: Option<PutClassProc>,
    /// `PutScopedObject`
    pub put_scoped_object_proc: Option<PutObjectProc>,
}

/// Current descriptor parameters version
pub const DESCRIPTOR_PARAMETERS_VERSION: i16 = 0;

/// Scripting block referenced by `FilterRecord::descriptor_parameters`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PiDescriptorParameters {
    /// Block version
    pub descriptor_parameters_version: i16,
    /// How the plug-in should treat its dialog on playback
    pub play_info: i16,
    /// Whether the plug-in should record a descriptor
    pub record_info: i16,
    /// Descriptor handle, in and out
    pub descriptor: PiDescriptorHandle,
    /// Writing callbacks
    pub write_descriptor_procs: *mut WriteDescriptorProcs,
    /// Reading callbacks
    pub read_descriptor_procs: *mut ReadDescriptorProcs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    const PTR: usize = size_of::<usize>();

    #[test]
    fn test_handle_procs_layout() {
        assert_eq!(offset_of!(HandleProcs, new_proc), PTR.max(4));
        assert_eq!(size_of::<HandleProcs>(), PTR.max(4) + 8 * PTR);
    }

    #[test]
    fn test_descriptor_tables_hold_declared_number_of_procs() {
        assert_eq!(
            size_of::<ReadDescriptorProcs>(),
            PTR.max(4) + READ_DESCRIPTOR_PROCS_COUNT as usize * PTR
        );
        assert_eq!(
            size_of::<WriteDescriptorProcs>(),
            PTR.max(4) + WRITE_DESCRIPTOR_PROCS_COUNT as usize * PTR
        );
        assert_eq!(
            size_of::<BufferProcs>(),
            PTR.max(4) + BUFFER_PROCS_COUNT as usize * PTR
        );
    }

    #[test]
    fn test_simple_reference_layout() {
        assert_eq!(size_of::<PiDescriptorSimpleReferenceKeyData>(), 256 + 12);
        assert_eq!(offset_of!(PiDescriptorSimpleReference, key_data), 8);
    }
}
