//! Action descriptor, list, reference and ZString suites

use std::os::raw::{c_char, c_void};

use filter_abi::pica::{
    AsBoolean, AsErr, AsUnicode, AsZString, AsZStringSuite, PiActionDescriptor, PiActionList,
    PiActionReference, PsActionDescriptorProcs, PsActionListProcs, PsActionReferenceProcs,
};
use filter_abi::types::Boolean;
use filter_abi::{Handle, SpErr, SpError};

use super::{c_bytes, copy_c_string, with_context, write_optional, write_out};
use crate::engine::HostContext;
use crate::scripting::zstring::{decode_c_text, romanize_fixed, to_pascal};
use crate::scripting::{
    ActionDescriptor, ActionList, ActionReference, AeteValue, ReferenceForm, ScriptError, ScriptingStore,
};

type Desc = PiActionDescriptor;
type List = PiActionList;
type Ref = PiActionReference;

fn id(ptr: *mut c_void) -> usize {
    ptr as usize
}

fn object(id: usize) -> *mut c_void {
    id as *mut c_void
}

fn with_store(f: impl FnOnce(&HostContext, &mut ScriptingStore) -> Result<(), ScriptError>) -> SpErr {
    with_context(SpError::BadParameter.code(), |ctx| {
        let Ok(mut store) = ctx.scripting.try_borrow_mut() else {
            return SpError::BadParameter.code();
        };
        match f(ctx, &mut store) {
            Ok(()) => SpError::NoError.code(),
            Err(e) => e.sp_code(),
        }
    })
}

fn new_handle_from(ctx: &HostContext, bytes: &[u8]) -> Result<Handle, ScriptError> {
    let mut handles = ctx.memory.handles.try_borrow_mut().map_err(|_| ScriptError::InvalidId)?;
    let h = handles.allocate_from(bytes);
    if h.is_null() { Err(ScriptError::OutOfMemory) } else { Ok(h) }
}

fn handle_bytes(ctx: &HostContext, h: Handle) -> Result<Vec<u8>, ScriptError> {
    let handles = ctx.memory.handles.try_borrow().map_err(|_| ScriptError::InvalidId)?;
    handles.read_any(h).ok_or(ScriptError::InvalidId)
}

/// Zero-terminated key array
///
/// # Safety
///
/// `keys` must be null or point to an array ending with a zero key.
unsafe fn key_array(keys: *const u32) -> Vec<u32> {
    let mut out = Vec::new();
    if keys.is_null() {
        return out;
    }
    // SAFETY: zero-terminated per the caller
    unsafe {
        let mut slot = keys;
        while *slot != 0 {
            out.push(*slot);
            slot = slot.add(1);
        }
    }
    out
}

/// `count` integers from a plug-in array
///
/// # Safety
///
/// `values` must be null or valid for `count` reads.
unsafe fn integer_list(count: u32, values: *const i32) -> Result<ActionList, ScriptError> {
    if values.is_null() && count > 0 {
        return Err(ScriptError::InvalidId);
    }
    let mut list = ActionList::new();
    for i in 0..count as usize {
        // SAFETY: i < count
        list.push(AeteValue::integer(unsafe { values.add(i).read_unaligned() }))?;
    }
    Ok(list)
}

/// Copy the first `count` integers of `list` out
///
/// # Safety
///
/// `values` must be null or valid for `count` writes.
unsafe fn copy_integers(list: &ActionList, count: u32, values: *mut i32) -> Result<(), ScriptError> {
    if values.is_null() {
        return Err(ScriptError::InvalidId);
    }
    for i in 0..count {
        let value = list.get(i)?.as_integer()?;
        // SAFETY: i < count
        unsafe { values.add(i as usize).write_unaligned(value) };
    }
    Ok(())
}

/// Copy `bytes` out, `values` sized by a prior length query
///
/// # Safety
///
/// `value` must be null or valid for `bytes.len()` writes.
unsafe fn copy_data(bytes: &[u8], value: *mut c_void) -> Result<(), ScriptError> {
    if value.is_null() {
        return Err(ScriptError::InvalidId);
    }
    // SAFETY: sized by the plug-in from GetDataLength
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), value.cast::<u8>(), bytes.len()) };
    Ok(())
}

/// Bytes passed with PutData
///
/// # Safety
///
/// `value` must be null or valid for `length` reads.
unsafe fn data_bytes(length: i32, value: *const c_void) -> Result<Vec<u8>, ScriptError> {
    let len = usize::try_from(length).map_err(|_| ScriptError::BadIndex(0))?;
    if len == 0 {
        return Ok(Vec::new());
    }
    if value.is_null() {
        return Err(ScriptError::InvalidId);
    }
    // SAFETY: length bytes readable per the caller
    Ok(unsafe { std::slice::from_raw_parts(value.cast::<u8>(), len) }.to_vec())
}

fn length(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

// Descriptor suite

unsafe extern "C" fn desc_make(descriptor: *mut Desc) -> SpErr {
    with_store(|_, s| {
        let new = s.descriptors.insert(ActionDescriptor::new())?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(descriptor, object(new)) }
    })
}

unsafe extern "C" fn desc_free(descriptor: Desc) -> SpErr {
    with_store(|_, s| s.descriptors.remove(id(descriptor)).map(drop))
}

unsafe extern "C" fn desc_get_type(descriptor: Desc, key: u32, type_: *mut u32) -> SpErr {
    // SAFETY: out-pointer supplied by the plug-in
    with_store(|_, s| unsafe { write_out(type_, s.descriptors.get(id(descriptor))?.type_of(key)?) })
}

unsafe extern "C" fn desc_get_key(descriptor: Desc, index: u32, key: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(key, s.descriptors.get(id(descriptor))?.key_at(index)?) })
}

unsafe extern "C" fn desc_has_key(descriptor: Desc, key: u32, has_key: *mut Boolean) -> SpErr {
    with_store(|_, s| {
        let found = s.descriptors.get(id(descriptor))?.has_key(key);
        // SAFETY: as above
        unsafe { write_out(has_key, Boolean::from(found)) }
    })
}

unsafe extern "C" fn desc_get_count(descriptor: Desc, count: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(count, length(s.descriptors.get(id(descriptor))?.len())) })
}

unsafe extern "C" fn desc_is_equal(descriptor: Desc, other: Desc, is_equal: *mut Boolean) -> SpErr {
    with_store(|_, s| {
        let same = s.descriptors.get(id(descriptor))? == s.descriptors.get(id(other))?;
        // SAFETY: as above
        unsafe { write_out(is_equal, Boolean::from(same)) }
    })
}

unsafe extern "C" fn desc_erase(descriptor: Desc, key: u32) -> SpErr {
    with_store(|_, s| s.descriptors.get_mut(id(descriptor))?.erase(key))
}

unsafe extern "C" fn desc_clear(descriptor: Desc) -> SpErr {
    with_store(|_, s| {
        s.descriptors.get_mut(id(descriptor))?.clear();
        Ok(())
    })
}

unsafe extern "C" fn desc_put_integer(descriptor: Desc, key: u32, value: i32) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::integer(value)))
}

unsafe extern "C" fn desc_put_float(descriptor: Desc, key: u32, value: f64) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::float(value)))
}

unsafe extern "C" fn desc_put_unit_float(descriptor: Desc, key: u32, unit: u32, value: f64) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::unit_float(unit, value)))
}

unsafe extern "C" fn desc_put_string(descriptor: Desc, key: u32, value: *const c_char) -> SpErr {
    // SAFETY: NUL-terminated string from the plug-in
    let text = decode_c_text(unsafe { c_bytes(value) });
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::text(text)))
}

unsafe extern "C" fn desc_put_boolean(descriptor: Desc, key: u32, value: Boolean) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::boolean(value != 0)))
}

unsafe extern "C" fn desc_put_list(descriptor: Desc, key: u32, value: List) -> SpErr {
    with_store(|_, s| {
        let list = s.snapshot_list(id(value))?;
        s.put(id(descriptor), key, AeteValue::list(list))
    })
}

unsafe extern "C" fn desc_put_object(descriptor: Desc, key: u32, class_id: u32, value: Desc) -> SpErr {
    with_store(|_, s| {
        let nested = s.snapshot_descriptor(id(value))?;
        s.put(id(descriptor), key, AeteValue::object(class_id, nested))
    })
}

unsafe extern "C" fn desc_put_global_object(descriptor: Desc, key: u32, class_id: u32, value: Desc) -> SpErr {
    with_store(|_, s| {
        let nested = s.snapshot_descriptor(id(value))?;
        s.put(id(descriptor), key, AeteValue::global_object(class_id, nested))
    })
}

unsafe extern "C" fn desc_put_enumerated(descriptor: Desc, key: u32, type_: u32, value: u32) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::enumerated(type_, value)))
}

unsafe extern "C" fn desc_put_reference(descriptor: Desc, key: u32, value: Ref) -> SpErr {
    with_store(|_, s| {
        let reference = s.snapshot_reference(id(value))?;
        s.put(id(descriptor), key, AeteValue::reference(reference))
    })
}

unsafe extern "C" fn desc_put_class(descriptor: Desc, key: u32, value: u32) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::class(value)))
}

unsafe extern "C" fn desc_put_global_class(descriptor: Desc, key: u32, value: u32) -> SpErr {
    with_store(|_, s| s.put(id(descriptor), key, AeteValue::global_class(value)))
}

unsafe extern "C" fn desc_put_alias(descriptor: Desc, key: u32, value: Handle) -> SpErr {
    with_store(|ctx, s| {
        let bytes = handle_bytes(ctx, value)?;
        s.put(id(descriptor), key, AeteValue::alias(bytes))
    })
}

unsafe extern "C" fn desc_get_integer(descriptor: Desc, key: u32, value: *mut i32) -> SpErr {
    // SAFETY: out-pointer supplied by the plug-in
    with_store(|_, s| unsafe { write_out(value, s.get(id(descriptor), key)?.as_integer()?) })
}

unsafe extern "C" fn desc_get_float(descriptor: Desc, key: u32, value: *mut f64) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(value, s.get(id(descriptor), key)?.as_float()?) })
}

unsafe extern "C" fn desc_get_unit_float(descriptor: Desc, key: u32, unit: *mut u32, value: *mut f64) -> SpErr {
    with_store(|_, s| {
        let (u, v) = s.get(id(descriptor), key)?.as_unit_float()?;
        // SAFETY: as above
        unsafe {
            write_optional(unit, u);
            write_out(value, v)
        }
    })
}

unsafe extern "C" fn desc_get_string_length(descriptor: Desc, key: u32, len: *mut u32) -> SpErr {
    with_store(|_, s| {
        let text = s.get(id(descriptor), key)?.as_text()?;
        // SAFETY: as above
        unsafe { write_out(len, length(text.len())) }
    })
}

unsafe extern "C" fn desc_get_string(descriptor: Desc, key: u32, value: *mut c_char, max_length: u32) -> SpErr {
    with_store(|_, s| {
        let text = s.get(id(descriptor), key)?.as_text()?;
        // SAFETY: buffer of max_length bytes supplied by the plug-in
        unsafe { copy_c_string(text.as_bytes(), value.cast(), max_length as usize) }
    })
}

unsafe extern "C" fn desc_get_boolean(descriptor: Desc, key: u32, value: *mut Boolean) -> SpErr {
    with_store(|_, s| {
        let flag = s.get(id(descriptor), key)?.as_boolean()?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(value, Boolean::from(flag)) }
    })
}

unsafe extern "C" fn desc_get_list(descriptor: Desc, key: u32, value: *mut List) -> SpErr {
    with_store(|_, s| {
        let list = s.get(id(descriptor), key)?.as_list()?.clone();
        let new = s.lists.insert(list)?;
        // SAFETY: as above
        unsafe { write_out(value, object(new)) }
    })
}

unsafe extern "C" fn desc_get_object(descriptor: Desc, key: u32, class_id: *mut u32, value: *mut Desc) -> SpErr {
    with_store(|_, s| {
        let (class, nested) = s.get(id(descriptor), key)?.as_object()?;
        let nested = nested.clone();
        let new = s.descriptors.insert(nested)?;
        // SAFETY: as above
        unsafe {
            write_optional(class_id, class);
            write_out(value, object(new))
        }
    })
}

unsafe extern "C" fn desc_get_enumerated(descriptor: Desc, key: u32, type_: *mut u32, value: *mut u32) -> SpErr {
    with_store(|_, s| {
        let (t, v) = s.get(id(descriptor), key)?.as_enumerated()?;
        // SAFETY: as above
        unsafe {
            write_optional(type_, t);
            write_out(value, v)
        }
    })
}

unsafe extern "C" fn desc_get_reference(descriptor: Desc, key: u32, value: *mut Ref) -> SpErr {
    with_store(|_, s| {
        let reference = s.get(id(descriptor), key)?.as_reference()?.clone();
        let new = s.references.insert(reference)?;
        // SAFETY: as above
        unsafe { write_out(value, object(new)) }
    })
}

unsafe extern "C" fn desc_get_class(descriptor: Desc, key: u32, value: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(value, s.get(id(descriptor), key)?.as_class()?) })
}

unsafe extern "C" fn desc_get_alias(descriptor: Desc, key: u32, value: *mut Handle) -> SpErr {
    with_store(|ctx, s| {
        let h = new_handle_from(ctx, s.get(id(descriptor), key)?.as_bytes()?)?;
        // SAFETY: as above
        unsafe { write_out(value, h) }
    })
}

unsafe extern "C" fn desc_has_keys(descriptor: Desc, keys: *mut u32, has_keys: *mut Boolean) -> SpErr {
    with_store(|_, s| {
        // SAFETY: zero-terminated key array from the plug-in
        let wanted = unsafe { key_array(keys) };
        let found = s.descriptors.get(id(descriptor))?.has_keys(&wanted);
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(has_keys, Boolean::from(found)) }
    })
}

unsafe extern "C" fn desc_put_integers(descriptor: Desc, key: u32, count: u32, values: *const i32) -> SpErr {
    with_store(|_, s| {
        // SAFETY: count integers supplied by the plug-in
        let list = unsafe { integer_list(count, values) }?;
        s.put(id(descriptor), key, AeteValue::list(list))
    })
}

unsafe extern "C" fn desc_get_integers(descriptor: Desc, key: u32, count: u32, values: *mut i32) -> SpErr {
    with_store(|_, s| {
        let list = s.get(id(descriptor), key)?.as_list()?;
        // SAFETY: room for count integers supplied by the plug-in
        unsafe { copy_integers(list, count, values) }
    })
}

unsafe extern "C" fn desc_as_handle(descriptor: Desc, value: *mut Handle) -> SpErr {
    with_store(|ctx, s| {
        let copy = s.snapshot_descriptor(id(descriptor))?;
        let h = new_handle_from(ctx, &[])?;
        s.classic.register_handle(h, copy);
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(value, h) }
    })
}

unsafe extern "C" fn desc_handle_to_descriptor(value: Handle, descriptor: *mut Desc) -> SpErr {
    with_store(|_, s| {
        let copy = s.classic.descriptor_for(value).cloned().ok_or(ScriptError::InvalidId)?;
        let new = s.descriptors.insert(copy)?;
        // SAFETY: as above
        unsafe { write_out(descriptor, object(new)) }
    })
}

unsafe extern "C" fn desc_put_zstring(descriptor: Desc, key: u32, value: AsZString) -> SpErr {
    with_store(|_, s| {
        let text = s.zstrings.get(id(value))?.to_owned();
        s.put(id(descriptor), key, AeteValue::text(text))
    })
}

unsafe extern "C" fn desc_get_zstring(descriptor: Desc, key: u32, value: *mut AsZString) -> SpErr {
    with_store(|_, s| {
        let text = s.get(id(descriptor), key)?.as_text()?.to_owned();
        let new = s.zstrings.make(text)?;
        // SAFETY: as above
        unsafe { write_out(value, object(new)) }
    })
}

unsafe extern "C" fn desc_put_data(descriptor: Desc, key: u32, len: i32, value: *const c_void) -> SpErr {
    with_store(|_, s| {
        // SAFETY: len bytes supplied by the plug-in
        let bytes = unsafe { data_bytes(len, value) }?;
        s.put(id(descriptor), key, AeteValue::raw_data(bytes))
    })
}

unsafe extern "C" fn desc_get_data_length(descriptor: Desc, key: u32, len: *mut i32) -> SpErr {
    with_store(|_, s| {
        let size = s.get(id(descriptor), key)?.as_bytes()?.len();
        // SAFETY: as above
        unsafe { write_out(len, i32::try_from(size).unwrap_or(i32::MAX)) }
    })
}

unsafe extern "C" fn desc_get_data(descriptor: Desc, key: u32, value: *mut c_void) -> SpErr {
    with_store(|_, s| {
        let bytes = s.get(id(descriptor), key)?.as_bytes()?;
        // SAFETY: buffer sized from GetDataLength
        unsafe { copy_data(bytes, value) }
    })
}

// List suite

unsafe extern "C" fn list_make(list: *mut List) -> SpErr {
    with_store(|_, s| {
        let new = s.lists.insert(ActionList::new())?;
        // SAFETY: as above
        unsafe { write_out(list, object(new)) }
    })
}

unsafe extern "C" fn list_free(list: List) -> SpErr {
    with_store(|_, s| s.lists.remove(id(list)).map(drop))
}

unsafe extern "C" fn list_get_type(list: List, index: u32, type_: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(type_, s.lists.get(id(list))?.type_of(index)?) })
}

unsafe extern "C" fn list_get_count(list: List, count: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(count, length(s.lists.get(id(list))?.len())) })
}

unsafe extern "C" fn list_put_integer(list: List, value: i32) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::integer(value)))
}

unsafe extern "C" fn list_put_float(list: List, value: f64) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::float(value)))
}

unsafe extern "C" fn list_put_unit_float(list: List, unit: u32, value: f64) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::unit_float(unit, value)))
}

unsafe extern "C" fn list_put_string(list: List, value: *const c_char) -> SpErr {
    // SAFETY: NUL-terminated string from the plug-in
    let text = decode_c_text(unsafe { c_bytes(value) });
    with_store(|_, s| s.push(id(list), AeteValue::text(text)))
}

unsafe extern "C" fn list_put_boolean(list: List, value: Boolean) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::boolean(value != 0)))
}

unsafe extern "C" fn list_put_list(list: List, value: List) -> SpErr {
    with_store(|_, s| {
        let nested = s.snapshot_list(id(value))?;
        s.push(id(list), AeteValue::list(nested))
    })
}

unsafe extern "C" fn list_put_object(list: List, class_id: u32, value: Desc) -> SpErr {
    with_store(|_, s| {
        let nested = s.snapshot_descriptor(id(value))?;
        s.push(id(list), AeteValue::object(class_id, nested))
    })
}

unsafe extern "C" fn list_put_global_object(list: List, class_id: u32, value: Desc) -> SpErr {
    with_store(|_, s| {
        let nested = s.snapshot_descriptor(id(value))?;
        s.push(id(list), AeteValue::global_object(class_id, nested))
    })
}

unsafe extern "C" fn list_put_enumerated(list: List, type_: u32, value: u32) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::enumerated(type_, value)))
}

unsafe extern "C" fn list_put_reference(list: List, value: Ref) -> SpErr {
    with_store(|_, s| {
        let reference = s.snapshot_reference(id(value))?;
        s.push(id(list), AeteValue::reference(reference))
    })
}

unsafe extern "C" fn list_put_class(list: List, value: u32) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::class(value)))
}

unsafe extern "C" fn list_put_global_class(list: List, value: u32) -> SpErr {
    with_store(|_, s| s.push(id(list), AeteValue::global_class(value)))
}

unsafe extern "C" fn list_put_alias(list: List, value: Handle) -> SpErr {
    with_store(|ctx, s| {
        let bytes = handle_bytes(ctx, value)?;
        s.push(id(list), AeteValue::alias(bytes))
    })
}

unsafe extern "C" fn list_get_integer(list: List, index: u32, value: *mut i32) -> SpErr {
    // SAFETY: out-pointer supplied by the plug-in
    with_store(|_, s| unsafe { write_out(value, s.item(id(list), index)?.as_integer()?) })
}

unsafe extern "C" fn list_get_float(list: List, index: u32, value: *mut f64) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(value, s.item(id(list), index)?.as_float()?) })
}

unsafe extern "C" fn list_get_unit_float(list: List, index: u32, unit: *mut u32, value: *mut f64) -> SpErr {
    with_store(|_, s| {
        let (u, v) = s.item(id(list), index)?.as_unit_float()?;
        // SAFETY: as above
        unsafe {
            write_optional(unit, u);
            write_out(value, v)
        }
    })
}

unsafe extern "C" fn list_get_string_length(list: List, index: u32, len: *mut u32) -> SpErr {
    with_store(|_, s| {
        let text = s.item(id(list), index)?.as_text()?;
        // SAFETY: as above
        unsafe { write_out(len, length(text.len())) }
    })
}

unsafe extern "C" fn list_get_string(list: List, index: u32, value: *mut c_char, max_length: u32) -> SpErr {
    with_store(|_, s| {
        let text = s.item(id(list), index)?.as_text()?;
        // SAFETY: buffer of max_length bytes supplied by the plug-in
        unsafe { copy_c_string(text.as_bytes(), value.cast(), max_length as usize) }
    })
}

unsafe extern "C" fn list_get_boolean(list: List, index: u32, value: *mut Boolean) -> SpErr {
    with_store(|_, s| {
        let flag = s.item(id(list), index)?.as_boolean()?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(value, Boolean::from(flag)) }
    })
}

unsafe extern "C" fn list_get_list(list: List, index: u32, value: *mut List) -> SpErr {
    with_store(|_, s| {
        let nested = s.item(id(list), index)?.as_list()?.clone();
        let new = s.lists.insert(nested)?;
        // SAFETY: as above
        unsafe { write_out(value, object(new)) }
    })
}

unsafe extern "C" fn list_get_object(list: List, index: u32, class_id: *mut u32, value: *mut Desc) -> SpErr {
    with_store(|_, s| {
        let (class, nested) = s.item(id(list), index)?.as_object()?;
        let nested = nested.clone();
        let new = s.descriptors.insert(nested)?;
        // SAFETY: as above
        unsafe {
            write_optional(class_id, class);
            write_out(value, object(new))
        }
    })
}

unsafe extern "C" fn list_get_enumerated(list: List, index: u32, type_: *mut u32, value: *mut u32) -> SpErr {
    with_store(|_, s| {
        let (t, v) = s.item(id(list), index)?.as_enumerated()?;
        // SAFETY: as above
        unsafe {
            write_optional(type_, t);
            write_out(value, v)
        }
    })
}

unsafe extern "C" fn list_get_reference(list: List, index: u32, value: *mut Ref) -> SpErr {
    with_store(|_, s| {
        let reference = s.item(id(list), index)?.as_reference()?.clone();
        let new = s.references.insert(reference)?;
        // SAFETY: as above
        unsafe { write_out(value, object(new)) }
    })
}

unsafe extern "C" fn list_get_class(list: List, index: u32, value: *mut u32) -> SpErr {
    // SAFETY: as above
    with_store(|_, s| unsafe { write_out(value, s.item(id(list), index)?.as_class()?) })
}

unsafe extern "C" fn list_get_alias(list: List, index: u32, value: *mut Handle) -> SpErr {
    with_store(|ctx, s| {
        let h = new_handle_from(ctx, s.item(id(list), index)?.as_bytes()?)?;
        // SAFETY: as above
        unsafe { write_out(value, h) }
    })
}

unsafe extern "C" fn list_put_integers(list: List, count: u32, values: *const i32) -> SpErr {
    with_store(|_, s| {
        // SAFETY: count integers supplied by the plug-in
        let integers = unsafe { integer_list(count, values) }?;
        let target = s.lists.get_mut(id(list))?;
        for value in integers.iter() {
            target.push(value.clone())?;
        }
        Ok(())
    })
}

unsafe extern "C" fn list_get_integers(list: List, count: u32, values: *mut i32) -> SpErr {
    with_store(|_, s| {
        let source = s.lists.get(id(list))?;
        // SAFETY: room for count integers supplied by the plug-in
        unsafe { copy_integers(source, count, values) }
    })
}

unsafe extern "C" fn list_put_data(list: List, len: i32, value: *const c_void) -> SpErr {
    with_store(|_, s| {
        // SAFETY: len bytes supplied by the plug-in
        let bytes = unsafe { data_bytes(len, value) }?;
        s.push(id(list), AeteValue::raw_data(bytes))
    })
}

unsafe extern "C" fn list_get_data_length(list: List, index: u32, len: *mut i32) -> SpErr {
    with_store(|_, s| {
        let size = s.item(id(list), index)?.as_bytes()?.len();
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(len, i32::try_from(size).unwrap_or(i32::MAX)) }
    })
}

unsafe extern "C" fn list_get_data(list: List, index: u32, value: *mut c_void) -> SpErr {
    with_store(|_, s| {
        let bytes = s.item(id(list), index)?.as_bytes()?;
        // SAFETY: buffer sized from GetDataLength
        unsafe { copy_data(bytes, value) }
    })
}

unsafe extern "C" fn list_put_zstring(list: List, value: AsZString) -> SpErr {
    with_store(|_, s| {
        let text = s.zstrings.get(id(value))?.to_owned();
        s.push(id(list), AeteValue::text(text))
    })
}

unsafe extern "C" fn list_get_zstring(list: List, index: u32, value: *mut AsZString) -> SpErr {
    with_store(|_, s| {
        let text = s.item(id(list), index)?.as_text()?.to_owned();
        let new = s.zstrings.make(text)?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(value, object(new)) }
    })
}

// Reference suite

fn push_form(reference: Ref, class_id: u32, form: ReferenceForm) -> SpErr {
    with_store(|_, s| s.references.get_mut(id(reference))?.push(class_id, form))
}

fn head_form<T>(reference: Ref, out: *mut T, f: impl FnOnce(&ReferenceForm) -> Option<T>) -> SpErr {
    with_store(|_, s| {
        let head = s.references.get(id(reference))?.head()?;
        let value = f(&head.form).ok_or(ScriptError::WrongType)?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(out, value) }
    })
}

unsafe extern "C" fn ref_make(reference: *mut Ref) -> SpErr {
    with_store(|_, s| {
        let new = s.references.insert(ActionReference::new())?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(reference, object(new)) }
    })
}

unsafe extern "C" fn ref_free(reference: Ref) -> SpErr {
    with_store(|_, s| s.references.remove(id(reference)).map(drop))
}

unsafe extern "C" fn ref_get_form(reference: Ref, form: *mut u32) -> SpErr {
    head_form(reference, form, |f| Some(f.form_id()))
}

unsafe extern "C" fn ref_get_desired_class(reference: Ref, class_id: *mut u32) -> SpErr {
    with_store(|_, s| {
        let class = s.references.get(id(reference))?.head()?.desired_class;
        // SAFETY: as above
        unsafe { write_out(class_id, class) }
    })
}

unsafe extern "C" fn ref_put_name(reference: Ref, class_id: u32, value: *const c_char) -> SpErr {
    // SAFETY: NUL-terminated string from the plug-in
    let name = decode_c_text(unsafe { c_bytes(value) });
    push_form(reference, class_id, ReferenceForm::Name(name))
}

unsafe extern "C" fn ref_put_index(reference: Ref, class_id: u32, value: u32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Index(value))
}

unsafe extern "C" fn ref_put_identifier(reference: Ref, class_id: u32, value: u32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Identifier(value))
}

unsafe extern "C" fn ref_put_offset(reference: Ref, class_id: u32, value: i32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Offset(value))
}

unsafe extern "C" fn ref_put_enumerated(reference: Ref, class_id: u32, type_: u32, value: u32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Enumerated { type_id: type_, value })
}

unsafe extern "C" fn ref_put_property(reference: Ref, class_id: u32, value: u32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Property(value))
}

unsafe extern "C" fn ref_put_class(reference: Ref, class_id: u32) -> SpErr {
    push_form(reference, class_id, ReferenceForm::Class)
}

unsafe extern "C" fn ref_get_name_length(reference: Ref, len: *mut u32) -> SpErr {
    head_form(reference, len, |f| match f {
        ReferenceForm::Name(name) => Some(length(name.len())),
        _ => None,
    })
}

unsafe extern "C" fn ref_get_name(reference: Ref, value: *mut c_char, max_length: u32) -> SpErr {
    with_store(|_, s| {
        let ReferenceForm::Name(name) = &s.references.get(id(reference))?.head()?.form else {
            return Err(ScriptError::WrongType);
        };
        // SAFETY: buffer of max_length bytes supplied by the plug-in
        unsafe { copy_c_string(name.as_bytes(), value.cast(), max_length as usize) }
    })
}

unsafe extern "C" fn ref_get_index(reference: Ref, value: *mut u32) -> SpErr {
    head_form(reference, value, |f| match f {
        ReferenceForm::Index(index) => Some(*index),
        _ => None,
    })
}

unsafe extern "C" fn ref_get_identifier(reference: Ref, value: *mut u32) -> SpErr {
    head_form(reference, value, |f| match f {
        ReferenceForm::Identifier(identifier) => Some(*identifier),
        _ => None,
    })
}

unsafe extern "C" fn ref_get_offset(reference: Ref, value: *mut i32) -> SpErr {
    head_form(reference, value, |f| match f {
        ReferenceForm::Offset(offset) => Some(*offset),
        _ => None,
    })
}

unsafe extern "C" fn ref_get_enumerated(reference: Ref, type_: *mut u32, value: *mut u32) -> SpErr {
    with_store(|_, s| {
        let ReferenceForm::Enumerated { type_id, value: v } = &s.references.get(id(reference))?.head()?.form else {
            return Err(ScriptError::WrongType);
        };
        // SAFETY: out-pointers supplied by the plug-in
        unsafe {
            write_optional(type_, *type_id);
            write_out(value, *v)
        }
    })
}

unsafe extern "C" fn ref_get_property(reference: Ref, value: *mut u32) -> SpErr {
    head_form(reference, value, |f| match f {
        ReferenceForm::Property(key) => Some(*key),
        _ => None,
    })
}

unsafe extern "C" fn ref_get_container(reference: Ref, value: *mut Ref) -> SpErr {
    with_store(|_, s| {
        let container = s
            .references
            .get(id(reference))?
            .container()
            .ok_or(ScriptError::BadIndex(1))?;
        let new = s.references.insert(container)?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(value, object(new)) }
    })
}

// ZString suite

fn make_zstring(text: String, out: *mut AsZString) -> AsErr {
    with_store(|_, s| {
        let new = s.zstrings.make(text)?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(out, object(new)) }
    })
}

fn edit_zstring(zstr: AsZString, f: impl FnOnce(&mut ScriptingStore, usize) -> Result<(), ScriptError>) -> AsErr {
    with_store(|_, s| f(s, id(zstr)))
}

fn query_zstring<R: Copy>(zstr: AsZString, fallback: R, f: impl FnOnce(&str) -> R) -> R {
    with_context(fallback, |ctx| {
        let Ok(store) = ctx.scripting.try_borrow() else {
            return fallback;
        };
        store.zstrings.get(id(zstr)).map_or(fallback, f)
    })
}

unsafe extern "C" fn z_make_from_unicode(src: *const AsUnicode, byte_count: usize, out: *mut AsZString) -> AsErr {
    if src.is_null() {
        return SpError::BadParameter.code();
    }
    // SAFETY: byte_count bytes of UTF-16 supplied by the plug-in
    let units = unsafe { std::slice::from_raw_parts(src, byte_count / 2) };
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    make_zstring(String::from_utf16_lossy(&units[..end]), out)
}

unsafe extern "C" fn z_make_from_cstring(src: *const c_char, byte_count: usize, out: *mut AsZString) -> AsErr {
    if src.is_null() {
        return SpError::BadParameter.code();
    }
    // SAFETY: byte_count bytes supplied by the plug-in
    let bytes = unsafe { std::slice::from_raw_parts(src.cast::<u8>(), byte_count) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    make_zstring(decode_c_text(&bytes[..end]), out)
}

unsafe extern "C" fn z_make_from_pascal_string(src: *const u8, byte_count: usize, out: *mut AsZString) -> AsErr {
    if src.is_null() || byte_count == 0 {
        return SpError::BadParameter.code();
    }
    // SAFETY: byte_count bytes supplied by the plug-in, the first being the length
    let bytes = unsafe { std::slice::from_raw_parts(src, byte_count) };
    let len = usize::from(bytes[0]).min(byte_count - 1);
    make_zstring(decode_c_text(&bytes[1..=len]), out)
}

unsafe extern "C" fn z_make_romanization_of_integer(value: i32, out: *mut AsZString) -> AsErr {
    make_zstring(value.to_string(), out)
}

unsafe extern "C" fn z_make_romanization_of_fixed(
    value: i32,
    places: i16,
    trim: AsBoolean,
    is_signed: AsBoolean,
    out: *mut AsZString,
) -> AsErr {
    make_zstring(romanize_fixed(value, places, trim != 0, is_signed != 0), out)
}

unsafe extern "C" fn z_make_romanization_of_double(value: f64, out: *mut AsZString) -> AsErr {
    make_zstring(value.to_string(), out)
}

unsafe extern "C" fn z_get_empty() -> AsZString {
    with_context(std::ptr::null_mut(), |ctx| match ctx.scripting.try_borrow() {
        Ok(store) => object(store.zstrings.empty()),
        Err(_) => std::ptr::null_mut(),
    })
}

unsafe extern "C" fn z_copy(source: AsZString, copy: *mut AsZString) -> AsErr {
    with_store(|_, s| {
        let new = s.zstrings.copy(id(source))?;
        // SAFETY: out-pointer supplied by the plug-in
        unsafe { write_out(copy, object(new)) }
    })
}

unsafe extern "C" fn z_replace(zstr: AsZString, index: u32, replacement: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.replace(z, index, id(replacement)))
}

unsafe extern "C" fn z_trim_ellipsis(zstr: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.trim_ellipsis(z))
}

unsafe extern "C" fn z_trim_spaces(zstr: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.trim_spaces(z))
}

unsafe extern "C" fn z_remove_accelerators(zstr: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.remove_accelerators(z))
}

unsafe extern "C" fn z_add_ref(zstr: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.add_ref(z))
}

unsafe extern "C" fn z_release(zstr: AsZString) -> AsErr {
    edit_zstring(zstr, |s, z| s.zstrings.release(z))
}

unsafe extern "C" fn z_is_all_white_space(zstr: AsZString) -> AsBoolean {
    query_zstring(zstr, 1, |text| AsBoolean::from(text.trim().is_empty()))
}

unsafe extern "C" fn z_is_empty(zstr: AsZString) -> AsBoolean {
    query_zstring(zstr, 1, |text| AsBoolean::from(text.is_empty()))
}

unsafe extern "C" fn z_will_replace(zstr: AsZString, index: u32) -> AsBoolean {
    with_context(0, |ctx| match ctx.scripting.try_borrow() {
        Ok(store) => AsBoolean::from(store.zstrings.will_replace(id(zstr), index).unwrap_or(false)),
        Err(_) => 0,
    })
}

unsafe extern "C" fn z_length_as_unicode_cstring(zstr: AsZString) -> u32 {
    query_zstring(zstr, 0, |text| length(text.encode_utf16().count() + 1))
}

/// Copy `units` plus a terminator into a buffer of `size` elements
///
/// # Safety
///
/// `out` must be null or valid for `size` writes.
unsafe fn copy_terminated<T: Copy + Default>(units: &[T], out: *mut T, size: u32, check_size: AsBoolean) -> AsErr {
    let size = size as usize;
    if out.is_null() || size == 0 || (check_size != 0 && size < units.len() + 1) {
        return SpError::BadParameter.code();
    }
    let len = units.len().min(size - 1);
    // SAFETY: len + 1 <= size
    unsafe {
        std::ptr::copy_nonoverlapping(units.as_ptr(), out, len);
        out.add(len).write(T::default());
    }
    SpError::NoError.code()
}

unsafe extern "C" fn z_as_unicode_cstring(zstr: AsZString, out: *mut AsUnicode, size: u32, check_size: AsBoolean) -> AsErr {
    let Some(units) = query_zstring_owned(zstr, |text| text.encode_utf16().collect::<Vec<_>>()) else {
        return SpError::BadParameter.code();
    };
    // SAFETY: buffer of size units supplied by the plug-in
    unsafe { copy_terminated(&units, out, size, check_size) }
}

unsafe extern "C" fn z_length_as_cstring(zstr: AsZString) -> u32 {
    query_zstring(zstr, 0, |text| length(text.len() + 1))
}

unsafe extern "C" fn z_as_cstring(zstr: AsZString, out: *mut c_char, size: u32, check_size: AsBoolean) -> AsErr {
    let Some(bytes) = query_zstring_owned(zstr, |text| text.as_bytes().to_vec()) else {
        return SpError::BadParameter.code();
    };
    // SAFETY: buffer of size bytes supplied by the plug-in
    unsafe { copy_terminated(&bytes, out.cast::<u8>(), size, check_size) }
}

unsafe extern "C" fn z_length_as_pascal_string(zstr: AsZString) -> u32 {
    query_zstring(zstr, 0, |text| length(to_pascal(text).len()))
}

unsafe extern "C" fn z_as_pascal_string(zstr: AsZString, out: *mut c_char, size: u32, check_size: AsBoolean) -> AsErr {
    let Some(pascal) = query_zstring_owned(zstr, to_pascal) else {
        return SpError::BadParameter.code();
    };
    let size = size as usize;
    if out.is_null() || size == 0 || (check_size != 0 && size < pascal.len()) {
        return SpError::BadParameter.code();
    }
    let len = pascal.len().min(size);
    // SAFETY: len <= size bytes of room supplied by the plug-in
    unsafe {
        std::ptr::copy_nonoverlapping(pascal.as_ptr(), out.cast::<u8>(), len);
        // the length byte must describe what fit
        out.cast::<u8>().write((len - 1) as u8);
    }
    SpError::NoError.code()
}

fn query_zstring_owned<R>(zstr: AsZString, f: impl FnOnce(&str) -> R) -> Option<R> {
    with_context(None, |ctx| {
        let store = ctx.scripting.try_borrow().ok()?;
        store.zstrings.get(id(zstr)).ok().map(f)
    })
}

/// Descriptor suite table
pub(crate) fn descriptor_suite() -> PsActionDescriptorProcs {
    PsActionDescriptorProcs {
        make: Some(desc_make),
        free: Some(desc_free),
        get_type: Some(desc_get_type),
        get_key: Some(desc_get_key),
        has_key: Some(desc_has_key),
        get_count: Some(desc_get_count),
        is_equal: Some(desc_is_equal),
        erase: Some(desc_erase),
        clear: Some(desc_clear),
        put_integer: Some(desc_put_integer),
        put_float: Some(desc_put_float),
        put_unit_float: Some(desc_put_unit_float),
        put_string: Some(desc_put_string),
        put_boolean: Some(desc_put_boolean),
        put_list: Some(desc_put_list),
        put_object: Some(desc_put_object),
        put_global_object: Some(desc_put_global_object),
        put_enumerated: Some(desc_put_enumerated),
        put_reference: Some(desc_put_reference),
        put_class: Some(desc_put_class),
        put_global_class: Some(desc_put_global_class),
        put_alias: Some(desc_put_alias),
        get_integer: Some(desc_get_integer),
        get_float: Some(desc_get_float),
        get_unit_float: Some(desc_get_unit_float),
        get_string_length: Some(desc_get_string_length),
        get_string: Some(desc_get_string),
        get_boolean: Some(desc_get_boolean),
        get_list: Some(desc_get_list),
        get_object: Some(desc_get_object),
        get_global_object: Some(desc_get_object),
        get_enumerated: Some(desc_get_enumerated),
        get_reference: Some(desc_get_reference),
        get_class: Some(desc_get_class),
        get_global_class: Some(desc_get_class),
        get_alias: Some(desc_get_alias),
        has_keys: Some(desc_has_keys),
        put_integers: Some(desc_put_integers),
        get_integers: Some(desc_get_integers),
        as_handle: Some(desc_as_handle),
        handle_to_descriptor: Some(desc_handle_to_descriptor),
        put_zstring: Some(desc_put_zstring),
        get_zstring: Some(desc_get_zstring),
        put_data: Some(desc_put_data),
        get_data_length: Some(desc_get_data_length),
        get_data: Some(desc_get_data),
    }
}

/// List suite table
pub(crate) fn list_suite() -> PsActionListProcs {
    PsActionListProcs {
        make: Some(list_make),
        free: Some(list_free),
        get_type: Some(list_get_type),
        get_count: Some(list_get_count),
        put_integer: Some(list_put_integer),
        put_float: Some(list_put_float),
        put_unit_float: Some(list_put_unit_float),
        put_string: Some(list_put_string),
        put_boolean: Some(list_put_boolean),
        put_list: Some(list_put_list),
        put_object: Some(list_put_object),
        put_global_object: Some(list_put_global_object),
        put_enumerated: Some(list_put_enumerated),
        put_reference: Some(list_put_reference),
        put_class: Some(list_put_class),
        put_global_class: Some(list_put_global_class),
        put_alias: Some(list_put_alias),
        get_integer: Some(list_get_integer),
        get_float: Some(list_get_float),
        get_unit_float: Some(list_get_unit_float),
        get_string_length: Some(list_get_string_length),
        get_string: Some(list_get_string),
        get_boolean: Some(list_get_boolean),
        get_list: Some(list_get_list),
        get_object: Some(list_get_object),
        get_global_object: Some(list_get_object),
        get_enumerated: Some(list_get_enumerated),
        get_reference: Some(list_get_reference),
        get_class: Some(list_get_class),
        get_global_class: Some(list_get_class),
        get_alias: Some(list_get_alias),
        put_integers: Some(list_put_integers),
        get_integers: Some(list_get_integers),
        put_data: Some(list_put_data),
        get_data_length: Some(list_get_data_length),
        get_data: Some(list_get_data),
        put_zstring: Some(list_put_zstring),
        get_zstring: Some(list_get_zstring),
    }
}

/// Reference suite table
pub(crate) fn reference_suite() -> PsActionReferenceProcs {
    PsActionReferenceProcs {
        make: Some(ref_make),
        free: Some(ref_free),
        get_form: Some(ref_get_form),
        get_desired_class: Some(ref_get_desired_class),
        put_name: Some(ref_put_name),
        put_index: Some(ref_put_index),
        put_identifier: Some(ref_put_identifier),
        put_offset: Some(ref_put_offset),
        put_enumerated: Some(ref_put_enumerated),
        put_property: Some(ref_put_property),
        put_class: Some(ref_put_class),
        get_name_length: Some(ref_get_name_length),
        get_name: Some(ref_get_name),
        get_index: Some(ref_get_index),
        get_identifier: Some(ref_get_identifier),
        get_offset: Some(ref_get_offset),
        get_enumerated: Some(ref_get_enumerated),
        get_property: Some(ref_get_property),
        get_container: Some(ref_get_container),
    }
}

/// ZString suite table
pub(crate) fn zstring_suite() -> AsZStringSuite {
    AsZStringSuite {
        make_from_unicode: Some(z_make_from_unicode),
        make_from_cstring: Some(z_make_from_cstring),
        make_from_pascal_string: Some(z_make_from_pascal_string),
        make_romanization_of_integer: Some(z_make_romanization_of_integer),
        make_romanization_of_fixed: Some(z_make_romanization_of_fixed),
        make_romanization_of_double: Some(z_make_romanization_of_double),
        get_empty: Some(z_get_empty),
        copy: Some(z_copy),
        replace: Some(z_replace),
        trim_ellipsis: Some(z_trim_ellipsis),
        trim_spaces: Some(z_trim_spaces),
        remove_accelerators: Some(z_remove_accelerators),
        add_ref: Some(z_add_ref),
        release: Some(z_release),
        is_all_white_space: Some(z_is_all_white_space),
        is_empty: Some(z_is_empty),
        will_replace: Some(z_will_replace),
        length_as_unicode_cstring: Some(z_length_as_unicode_cstring),
        as_unicode_cstring: Some(z_as_unicode_cstring),
        length_as_cstring: Some(z_length_as_cstring),
        as_cstring: Some(z_as_cstring),
        length_as_pascal_string: Some(z_length_as_pascal_string),
        as_pascal_string: Some(z_as_pascal_string),
    }
}
