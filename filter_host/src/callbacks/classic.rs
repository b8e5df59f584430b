//! Classic read and write descriptor procs

use filter_abi::procs::{
    PiDescriptorHandle, PiDescriptorSimpleReference, PiReadDescriptor, PiWriteDescriptor,
    READ_DESCRIPTOR_PROCS_COUNT, READ_DESCRIPTOR_PROCS_VERSION, ReadDescriptorProcs,
    WRITE_DESCRIPTOR_PROCS_COUNT, WRITE_DESCRIPTOR_PROCS_VERSION, WriteDescriptorProcs,
};
use filter_abi::types::{Boolean, Str255};
use filter_abi::{Handle, OsErr, StatusCode};

use super::{with_context, write_optional, write_out};
use crate::engine::HostContext;
use crate::scripting::classic::{COERCED_PARAM, pin_float, pin_integer, reference_from_simple, simple_from_reference};
use crate::scripting::zstring::{decode_c_text, to_pascal};
use crate::scripting::{AeteValue, ScriptError, ValueData};

const NO_ERR: OsErr = StatusCode::NoErr.code();
const PARAM_ERR: OsErr = StatusCode::ParamErr.code();

fn status(result: Result<OsErr, ScriptError>) -> OsErr {
    result.unwrap_or_else(ScriptError::os_code)
}

/// Run a getter on a copy of the current value; failures are remembered for
/// `CloseReadDescriptor`
fn read_with(token: PiReadDescriptor, f: impl FnOnce(&HostContext, &AeteValue) -> Result<OsErr, ScriptError>) -> OsErr {
    let token = token as usize;
    with_context(PARAM_ERR, |ctx| {
        let value = match ctx.scripting.try_borrow() {
            Ok(store) => store.classic.current_value(token).cloned(),
            Err(_) => return PARAM_ERR,
        };
        let code = status(value.and_then(|value| f(ctx, &value)));
        if code < 0 {
            if let Ok(mut store) = ctx.scripting.try_borrow_mut() {
                store.classic.record_error(token, code);
            }
        }
        code
    })
}

/// Build a value and store it under `key` in the descriptor being written
fn write_with(
    token: PiWriteDescriptor,
    key: u32,
    f: impl FnOnce(&HostContext) -> Result<AeteValue, ScriptError>,
) -> OsErr {
    let token = token as usize;
    with_context(PARAM_ERR, |ctx| {
        let value = match f(ctx) {
            Ok(value) => value,
            Err(e) => return e.os_code(),
        };
        let Ok(mut store) = ctx.scripting.try_borrow_mut() else {
            return PARAM_ERR;
        };
        status(store.classic.writer(token).and_then(|d| d.put(key, value)).map(|()| NO_ERR))
    })
}

/// New suite handle holding `bytes`
fn new_handle_from(ctx: &HostContext, bytes: &[u8]) -> Result<Handle, ScriptError> {
    let mut handles = ctx.memory.handles.try_borrow_mut().map_err(|_| ScriptError::InvalidId)?;
    let h = handles.allocate_from(bytes);
    if h.is_null() { Err(ScriptError::OutOfMemory) } else { Ok(h) }
}

/// Bytes behind a handle the plug-in passed in
fn handle_bytes(ctx: &HostContext, h: Handle) -> Result<Vec<u8>, ScriptError> {
    let handles = ctx.memory.handles.try_borrow().map_err(|_| ScriptError::InvalidId)?;
    handles.read_any(h).ok_or(ScriptError::InvalidId)
}

/// Empty suite handle standing for `descriptor`
pub(crate) fn register_descriptor(
    ctx: &HostContext,
    descriptor: crate::scripting::ActionDescriptor,
) -> Result<Handle, ScriptError> {
    let h = new_handle_from(ctx, &[])?;
    let mut store = ctx.scripting.try_borrow_mut().map_err(|_| ScriptError::InvalidId)?;
    store.classic.register_handle(h, descriptor);
    Ok(h)
}

unsafe extern "C" fn open_read_descriptor(descriptor: PiDescriptorHandle, keys: *mut u32) -> PiReadDescriptor {
    with_context(std::ptr::null_mut(), |ctx| {
        let Ok(mut store) = ctx.scripting.try_borrow_mut() else {
            return std::ptr::null_mut();
        };
        // SAFETY: the plug-in keeps its zero-terminated key array alive until close
        match unsafe { store.classic.open_read(descriptor, keys) } {
            Ok(token) => token as PiReadDescriptor,
            Err(_) => std::ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn close_read_descriptor(token: PiReadDescriptor) -> OsErr {
    with_context(PARAM_ERR, |ctx| match ctx.scripting.try_borrow_mut() {
        Ok(mut store) => status(store.classic.close_read(token as usize)),
        Err(_) => PARAM_ERR,
    })
}

unsafe extern "C" fn get_key(token: PiReadDescriptor, key: *mut u32, type_: *mut u32, flags: *mut i32) -> Boolean {
    let info = with_context(None, |ctx| {
        let mut store = ctx.scripting.try_borrow_mut().ok()?;
        store.classic.next_key(token as usize).ok().flatten()
    });
    let Some(info) = info else {
        return 0;
    };
    // SAFETY: out-pointers supplied by the plug-in, null when unused
    unsafe {
        write_optional(key, info.key);
        write_optional(type_, info.type_tag);
        write_optional(flags, info.flags);
    }
    1
}

unsafe extern "C" fn get_integer(token: PiReadDescriptor, value: *mut i32) -> OsErr {
    // SAFETY: out-pointer supplied by the plug-in
    read_with(token, |_, v| unsafe { write_out(value, v.as_integer()?) }.map(|()| NO_ERR))
}

unsafe extern "C" fn get_float(token: PiReadDescriptor, value: *mut f64) -> OsErr {
    // SAFETY: as above
    read_with(token, |_, v| unsafe { write_out(value, v.as_float()?) }.map(|()| NO_ERR))
}

unsafe extern "C" fn get_unit_float(token: PiReadDescriptor, unit: *mut u32, value: *mut f64) -> OsErr {
    read_with(token, |_, v| {
        let (u, f) = v.as_unit_float()?;
        // SAFETY: as above
        unsafe {
            write_optional(unit, u);
            write_out(value, f)?;
        }
        Ok(NO_ERR)
    })
}

unsafe extern "C" fn get_boolean(token: PiReadDescriptor, value: *mut Boolean) -> OsErr {
    // SAFETY: as above
    read_with(token, |_, v| unsafe { write_out(value, Boolean::from(v.as_boolean()?)) }.map(|()| NO_ERR))
}

unsafe extern "C" fn get_text(token: PiReadDescriptor, value: *mut Handle) -> OsErr {
    read_with(token, |ctx, v| {
        let h = new_handle_from(ctx, v.as_text()?.as_bytes())?;
        // SAFETY: as above
        unsafe { write_out(value, h) }.map(|()| NO_ERR)
    })
}

unsafe extern "C" fn get_alias(token: PiReadDescriptor, value: *mut Handle) -> OsErr {
    read_with(token, |ctx, v| {
        let h = new_handle_from(ctx, v.as_bytes()?)?;
        // SAFETY: as above
        unsafe { write_out(value, h) }.map(|()| NO_ERR)
    })
}

unsafe extern "C" fn get_enumerated(token: PiReadDescriptor, value: *mut u32) -> OsErr {
    // SAFETY: as above
    read_with(token, |_, v| unsafe { write_out(value, v.as_enumerated()?.1) }.map(|()| NO_ERR))
}

unsafe extern "C" fn get_class(token: PiReadDescriptor, value: *mut u32) -> OsErr {
    // SAFETY: as above
    read_with(token, |_, v| unsafe { write_out(value, v.as_class()?) }.map(|()| NO_ERR))
}

unsafe extern "C" fn get_simple_reference(token: PiReadDescriptor, value: *mut PiDescriptorSimpleReference) -> OsErr {
    read_with(token, |_, v| {
        let simple = simple_from_reference(v.as_reference()?)?;
        // SAFETY: as above
        unsafe { write_out(value, simple) }.map(|()| NO_ERR)
    })
}

unsafe extern "C" fn get_object(token: PiReadDescriptor, class_id: *mut u32, value: *mut PiDescriptorHandle) -> OsErr {
    read_with(token, |ctx, v| {
        let (class, descriptor) = v.as_object()?;
        let h = register_descriptor(ctx, descriptor.clone())?;
        // SAFETY: as above
        unsafe {
            write_optional(class_id, class);
            write_out(value, h)?;
        }
        Ok(NO_ERR)
    })
}

unsafe extern "C" fn get_count(token: PiReadDescriptor, value: *mut u32) -> OsErr {
    read_with(token, |_, v| {
        let count = match v.data() {
            ValueData::List(list) => u32::try_from(list.len()).unwrap_or(u32::MAX),
            ValueData::Integer(n) => *n as u32,
            _ => return Err(ScriptError::WrongType),
        };
        // SAFETY: as above
        unsafe { write_out(value, count) }.map(|()| NO_ERR)
    })
}

unsafe extern "C" fn get_string(token: PiReadDescriptor, value: *mut Str255) -> OsErr {
    read_with(token, |_, v| {
        let pascal = to_pascal(v.as_text()?);
        let mut out: Str255 = [0; 256];
        out[..pascal.len()].copy_from_slice(&pascal);
        // SAFETY: as above
        unsafe { write_out(value, out) }.map(|()| NO_ERR)
    })
}

unsafe extern "C" fn get_pinned_integer(token: PiReadDescriptor, min: i32, max: i32, value: *mut i32) -> OsErr {
    read_with(token, |_, v| {
        let (pinned, coerced) = pin_integer(v.as_integer()?, min, max);
        // SAFETY: as above
        unsafe { write_out(value, pinned)? };
        Ok(if coerced { COERCED_PARAM } else { NO_ERR })
    })
}

/// Bound read from an optional pointer
///
/// # Safety
///
/// `ptr` must be null or readable.
unsafe fn bound(ptr: *const f64, unbounded: f64) -> f64 {
    if ptr.is_null() {
        unbounded
    } else {
        // SAFETY: non-null per the caller
        unsafe { ptr.read_unaligned() }
    }
}

unsafe extern "C" fn get_pinned_float(token: PiReadDescriptor, min: *const f64, max: *const f64, value: *mut f64) -> OsErr {
    read_with(token, |_, v| {
        // SAFETY: bounds are null or point to doubles
        let (lo, hi) = unsafe { (bound(min, f64::NEG_INFINITY), bound(max, f64::INFINITY)) };
        let Some((pinned, coerced)) = pin_float(v.as_float()?, lo, hi) else {
            return Ok(PARAM_ERR);
        };
        // SAFETY: as above
        unsafe { write_out(value, pinned)? };
        Ok(if coerced { COERCED_PARAM } else { NO_ERR })
    })
}

unsafe extern "C" fn get_pinned_unit_float(
    token: PiReadDescriptor,
    min: *const f64,
    max: *const f64,
    unit: *mut u32,
    value: *mut f64,
) -> OsErr {
    read_with(token, |_, v| {
        let (stored_unit, number) = v.as_unit_float()?;
        if !unit.is_null() {
            // SAFETY: in-out pointer supplied by the plug-in
            let wanted = unsafe { unit.read_unaligned() };
            if wanted != 0 && wanted != stored_unit {
                return Ok(PARAM_ERR);
            }
        }
        // SAFETY: bounds are null or point to doubles
        let (lo, hi) = unsafe { (bound(min, f64::NEG_INFINITY), bound(max, f64::INFINITY)) };
        let Some((pinned, coerced)) = pin_float(number, lo, hi) else {
            return Ok(PARAM_ERR);
        };
        // SAFETY: as above
        unsafe {
            write_optional(unit, stored_unit);
            write_out(value, pinned)?;
        }
        Ok(if coerced { COERCED_PARAM } else { NO_ERR })
    })
}

unsafe extern "C" fn open_write_descriptor() -> PiWriteDescriptor {
    with_context(std::ptr::null_mut(), |ctx| match ctx.scripting.try_borrow_mut() {
        Ok(mut store) => store
            .classic
            .open_write()
            .map_or(std::ptr::null_mut(), |token| token as PiWriteDescriptor),
        Err(_) => std::ptr::null_mut(),
    })
}

unsafe extern "C" fn close_write_descriptor(token: PiWriteDescriptor, descriptor: *mut PiDescriptorHandle) -> OsErr {
    with_context(PARAM_ERR, |ctx| {
        let written = match ctx.scripting.try_borrow_mut() {
            Ok(mut store) => store.classic.close_write(token as usize),
            Err(_) => return PARAM_ERR,
        };
        let result = written
            .and_then(|d| register_descriptor(ctx, d))
            // SAFETY: out-pointer supplied by the plug-in
            .and_then(|h| unsafe { write_out(descriptor, h) })
            .map(|()| NO_ERR);
        status(result)
    })
}

unsafe extern "C" fn put_integer(token: PiWriteDescriptor, key: u32, value: i32) -> OsErr {
    write_with(token, key, |_| Ok(AeteValue::integer(value)))
}

unsafe extern "C" fn put_float(token: PiWriteDescriptor, key: u32, value: *const f64) -> OsErr {
    write_with(token, key, |_| {
        if value.is_null() {
            return Err(ScriptError::InvalidId);
        }
        // SAFETY: non-null pointer to a double
        Ok(AeteValue::float(unsafe { value.read_unaligned() }))
    })
}

unsafe extern "C" fn put_unit_float(token: PiWriteDescriptor, key: u32, unit: u32, value: *const f64) -> OsErr {
    write_with(token, key, |_| {
        if value.is_null() {
            return Err(ScriptError::InvalidId);
        }
        // SAFETY: non-null pointer to a double
        Ok(AeteValue::unit_float(unit, unsafe { value.read_unaligned() }))
    })
}

unsafe extern "C" fn put_boolean(token: PiWriteDescriptor, key: u32, value: Boolean) -> OsErr {
    write_with(token, key, |_| Ok(AeteValue::boolean(value != 0)))
}

unsafe extern "C" fn put_text(token: PiWriteDescriptor, key: u32, value: Handle) -> OsErr {
    write_with(token, key, |ctx| Ok(AeteValue::text(decode_c_text(&handle_bytes(ctx, value)?))))
}

unsafe extern "C" fn put_alias(token: PiWriteDescriptor, key: u32, value: Handle) -> OsErr {
    write_with(token, key, |ctx| Ok(AeteValue::alias(handle_bytes(ctx, value)?)))
}

unsafe extern "C" fn put_enumerated(token: PiWriteDescriptor, key: u32, type_: u32, value: u32) -> OsErr {
    write_with(token, key, |_| Ok(AeteValue::enumerated(type_, value)))
}

unsafe extern "C" fn put_class(token: PiWriteDescriptor, key: u32, value: u32) -> OsErr {
    write_with(token, key, |_| Ok(AeteValue::class(value)))
}

unsafe extern "C" fn put_simple_reference(
    token: PiWriteDescriptor,
    key: u32,
    value: *const PiDescriptorSimpleReference,
) -> OsErr {
    write_with(token, key, |_| {
        if value.is_null() {
            return Err(ScriptError::InvalidId);
        }
        // SAFETY: non-null pointer to a simple reference
        let simple = unsafe { value.read_unaligned() };
        Ok(AeteValue::reference(reference_from_simple(&simple)?))
    })
}

unsafe extern "C" fn put_object(token: PiWriteDescriptor, key: u32, class_id: u32, value: PiDescriptorHandle) -> OsErr {
    write_with(token, key, |ctx| {
        let store = ctx.scripting.try_borrow().map_err(|_| ScriptError::InvalidId)?;
        let descriptor = store.classic.descriptor_for(value).cloned().ok_or(ScriptError::InvalidId)?;
        Ok(AeteValue::object(class_id, descriptor))
    })
}

unsafe extern "C" fn put_count(token: PiWriteDescriptor, key: u32, count: u32) -> OsErr {
    write_with(token, key, |_| Ok(AeteValue::integer(count as i32)))
}

unsafe extern "C" fn put_string(token: PiWriteDescriptor, key: u32, value: *const u8) -> OsErr {
    write_with(token, key, |_| {
        if value.is_null() {
            return Err(ScriptError::InvalidId);
        }
        // SAFETY: Pascal string: a length byte followed by that many bytes
        let text = unsafe {
            let len = usize::from(value.read());
            std::slice::from_raw_parts(value.add(1), len)
        };
        Ok(AeteValue::text(decode_c_text(text)))
    })
}

/// Read procs of the descriptor parameters
pub(crate) fn read_descriptor_procs() -> ReadDescriptorProcs {
    ReadDescriptorProcs {
        read_descriptor_procs_version: READ_DESCRIPTOR_PROCS_VERSION,
        num_read_descriptor_procs: READ_DESCRIPTOR_PROCS_COUNT,
        open_read_descriptor_proc: Some(open_read_descriptor),
        close_read_descriptor_proc: Some(close_read_descriptor),
        get_key_proc: Some(get_key),
        get_integer_proc: Some(get_integer),
        get_float_proc: Some(get_float),
        get_unit_float_proc: Some(get_unit_float),
        get_boolean_proc: Some(get_boolean),
        get_text_proc: Some(get_text),
        get_alias_proc: Some(get_alias),
        get_enumerated_proc: Some(get_enumerated),
        get_class_proc: Some(get_class),
        get_simple_reference_proc: Some(get_simple_reference),
        get_object_proc: Some(get_object),
        get_count_proc: Some(get_count),
        get_string_proc: Some(get_string),
        get_pinned_integer_proc: Some(get_pinned_integer),
        get_pinned_float_proc: Some(get_pinned_float),
        get_pinned_unit_float_proc: Some(get_pinned_unit_float),
    }
}

/// Write procs of the descriptor parameters
pub(crate) fn write_descriptor_procs() -> WriteDescriptorProcs {
    WriteDescriptorProcs {
        write_descriptor_procs_version: WRITE_DESCRIPTOR_PROCS_VERSION,
        num_write_descriptor_procs: WRITE_DESCRIPTOR_PROCS_COUNT,
        open_write_descriptor_proc: Some(open_write_descriptor),
        close_write_descriptor_proc: Some(close_write_descriptor),
        put_integer_proc: Some(put_integer),
        put_float_proc: Some(put_float),
        put_unit_float_proc: Some(put_unit_float),
        put_boolean_proc: Some(put_boolean),
        put_text_proc: Some(put_text),
        put_alias_proc: Some(put_alias),
        put_enumerated_proc: Some(put_enumerated),
        put_class_proc: Some(put_class),
        put_simple_reference_proc: Some(put_simple_reference),
        put_object_proc: Some(put_object),
        put_count_proc: Some(put_count),
        put_string_proc: Some(put_string),
        put_scoped_class_proc: Some(put_class),
        put_scoped_object_proc: Some(put_object),
    }
}
