//! Filter plug-in that inverts the color planes of the selection
//!
//! The amount of inversion lives in the parameters handle and is recorded
//! as a descriptor so a scripted replay can change it.

#![deny(unreachable_pub)]
#![warn(missing_docs)]

use std::os::raw::c_void;
use std::panic::catch_unwind;

use filter_abi::procs::HandleProcs;
use filter_abi::terms::selector;
use filter_abi::{FilterRecord, StatusCode, VRect, four_cc};
use log::{debug, error};

const AMOUNT_KEY: u32 = four_cc(b"Amnt");
const TILE_ROWS: i32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InvertParams {
    /// Percent of full inversion, 0..=100
    amount: i32,
}

impl Default for InvertParams {
    fn default() -> Self {
        InvertParams { amount: 100 }
    }
}

const PARAMS_SIZE: i32 = std::mem::size_of::<InvertParams>() as i32;

/// Filter entry point
///
/// # Arguments
///
/// * `selector` - lifecycle step requested by the host
/// * `record` - `FilterRecord`, or `AboutRecord` for the About selector
/// * `data` - plug-in global, unused
/// * `result` - receives the status of the step
///
/// # Safety
///
/// Pointers are checked for being non-null before usage.
/// `record` must point to a record laid out as the SDK declares it
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PluginMain(selector: i16, record: *mut c_void, _data: *mut isize, result: *mut i16) {
    if result.is_null() {
        return;
    }
    let status = catch_unwind(move || {
        if record.is_null() {
            return StatusCode::ParamErr;
        }
        if selector == selector::ABOUT {
            debug!("invert filter");
            return StatusCode::NoErr;
        }
        // SAFETY: every selector but About passes a FilterRecord
        let record = unsafe { &mut *record.cast::<FilterRecord>() };
        let step = match selector {
            selector::PARAMETERS => parameters(record),
            selector::START => start(record),
            selector::CONTINUE => continue_strip(record),
            selector::FINISH => finish(record),
            _ => Ok(()),
        };
        step.err().unwrap_or(StatusCode::NoErr)
    });

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            error!("panic in PluginMain {e:?}");
            StatusCode::ParamErr.code()
        }
    };
    // SAFETY: checked for null above
    unsafe { *result = code };
}

fn invert(value: u8, amount: i32) -> u8 {
    let v = i32::from(value);
    (v + (255 - 2 * v) * amount / 100).clamp(0, 255) as u8
}

/// Rows of `filter` from `top`, at most `TILE_ROWS` high
fn strip_from(filter: VRect, top: i32) -> Option<VRect> {
    if top >= filter.bottom || filter.is_empty() {
        return None;
    }
    Some(VRect {
        top,
        bottom: (top + TILE_ROWS).min(filter.bottom),
        ..filter
    })
}

fn handle_procs(record: &FilterRecord) -> Result<&HandleProcs, StatusCode> {
    if record.handle_procs.is_null() {
        return Err(StatusCode::ErrPlugInHostInsufficient);
    }
    // SAFETY: non-null table provided by the host for the whole call
    Ok(unsafe { &*record.handle_procs })
}

fn load_params(record: &FilterRecord) -> Result<Option<InvertParams>, StatusCode> {
    if record.parameters.is_null() {
        return Ok(None);
    }
    let procs = handle_procs(record)?;
    let insufficient = StatusCode::ErrPlugInHostInsufficient;
    let get_size = procs.get_size_proc.ok_or(insufficient)?;
    let lock = procs.lock_proc.ok_or(insufficient)?;
    let unlock = procs.unlock_proc.ok_or(insufficient)?;
    // SAFETY: the handle was allocated through these procs, by this run or a replayed one
    unsafe {
        if get_size(record.parameters) < PARAMS_SIZE {
            return Ok(None);
        }
        let p = lock(record.parameters, 0);
        if p.is_null() {
            return Err(StatusCode::NilHandleErr);
        }
        let params = p.cast::<InvertParams>().read_unaligned();
        unlock(record.parameters);
        Ok(Some(params))
    }
}

fn store_params(record: &mut FilterRecord, params: InvertParams) -> Result<(), StatusCode> {
    let procs = *handle_procs(record)?;
    let insufficient = StatusCode::ErrPlugInHostInsufficient;
    let lock = procs.lock_proc.ok_or(insufficient)?;
    let unlock = procs.unlock_proc.ok_or(insufficient)?;
    if record.parameters.is_null() {
        let new = procs.new_proc.ok_or(insufficient)?;
        // SAFETY: host allocation proc
        record.parameters = unsafe { new(PARAMS_SIZE) };
        if record.parameters.is_null() {
            return Err(StatusCode::MemFullErr);
        }
    }
    // SAFETY: handle from the host's handle procs, at least PARAMS_SIZE long
    unsafe {
        let p = lock(record.parameters, 0);
        if p.is_null() {
            return Err(StatusCode::NilHandleErr);
        }
        p.cast::<InvertParams>().write_unaligned(params);
        unlock(record.parameters);
    }
    Ok(())
}

/// Amount recorded by an earlier run, read through the classic read procs
fn scripted_amount(record: &FilterRecord) -> Option<i32> {
    if record.descriptor_parameters.is_null() {
        return None;
    }
    // SAFETY: non-null block provided by the host
    let parameters = unsafe { &*record.descriptor_parameters };
    if parameters.descriptor.is_null() || parameters.read_descriptor_procs.is_null() {
        return None;
    }
    // SAFETY: as above
    let procs = unsafe { &*parameters.read_descriptor_procs };
    let open = procs.open_read_descriptor_proc?;
    let close = procs.close_read_descriptor_proc?;
    let get_key = procs.get_key_proc?;
    let get_pinned_integer = procs.get_pinned_integer_proc?;

    let mut keys = [AMOUNT_KEY, 0];
    let mut amount = None;
    // SAFETY: keys stays alive until the descriptor is closed
    unsafe {
        let token = open(parameters.descriptor, keys.as_mut_ptr());
        if token.is_null() {
            return None;
        }
        let (mut key, mut type_, mut flags) = (0, 0, 0);
        while get_key(token, &mut key, &mut type_, &mut flags) != 0 {
            let mut value = 0;
            if key == AMOUNT_KEY && get_pinned_integer(token, 0, 100, &mut value) == 0 {
                amount = Some(value);
            }
        }
        close(token);
    }
    amount
}

fn parameters(record: &mut FilterRecord) -> Result<(), StatusCode> {
    let params = load_params(record)?.unwrap_or_default();
    store_params(record, params)
}

fn start(record: &mut FilterRecord) -> Result<(), StatusCode> {
    let mut params = load_params(record)?.unwrap_or_default();
    if let Some(amount) = scripted_amount(record) {
        params.amount = amount;
    }
    store_params(record, params)?;

    let filter = record.filter_rect.to_vrect();
    let strip = strip_from(filter, filter.top).unwrap_or_default();
    request(record, strip);
    Ok(())
}

fn request(record: &mut FilterRecord, strip: VRect) {
    record.in_rect = strip.to_rect16();
    record.out_rect = strip.to_rect16();
    record.in_lo_plane = 0;
    record.in_hi_plane = 2;
    record.out_lo_plane = 0;
    record.out_hi_plane = 2;
}

fn continue_strip(record: &mut FilterRecord) -> Result<(), StatusCode> {
    if let Some(abort) = record.abort_proc {
        // SAFETY: host callback
        if unsafe { abort() } != 0 {
            return Err(StatusCode::UserCanceledErr);
        }
    }
    let params = load_params(record)?.unwrap_or_default();
    let rect = record.output_rect();
    if record.in_data.is_null() || record.out_data.is_null() {
        return Err(StatusCode::ParamErr);
    }
    let planes = (record.out_hi_plane - record.out_lo_plane + 1) as usize;
    let row_len = rect.width() as usize * planes;
    for y in 0..rect.height() as usize {
        // SAFETY: the host filled in_data and out_data for this rectangle and planes
        let (src, dst) = unsafe {
            (
                std::slice::from_raw_parts(record.in_data.cast::<u8>().add(y * record.in_row_bytes as usize), row_len),
                std::slice::from_raw_parts_mut(
                    record.out_data.cast::<u8>().add(y * record.out_row_bytes as usize),
                    row_len,
                ),
            )
        };
        for (out, &value) in dst.iter_mut().zip(src) {
            *out = invert(value, params.amount);
        }
    }

    let filter = record.filter_rect.to_vrect();
    if let Some(progress) = record.progress_proc {
        // SAFETY: host callback
        unsafe { progress(rect.bottom - filter.top, filter.height()) };
    }
    let next = strip_from(filter, rect.bottom).unwrap_or_default();
    request(record, next);
    Ok(())
}

fn finish(record: &mut FilterRecord) -> Result<(), StatusCode> {
    let Some(params) = load_params(record)? else {
        return Ok(());
    };
    if record.descriptor_parameters.is_null() {
        return Ok(());
    }
    // SAFETY: non-null block provided by the host
    let parameters = unsafe { &mut *record.descriptor_parameters };
    if parameters.write_descriptor_procs.is_null() {
        return Ok(());
    }
    // SAFETY: as above
    let procs = unsafe { &*parameters.write_descriptor_procs };
    let insufficient = StatusCode::ErrPlugInHostInsufficient;
    let open = procs.open_write_descriptor_proc.ok_or(insufficient)?;
    let put_integer = procs.put_integer_proc.ok_or(insufficient)?;
    let close = procs.close_write_descriptor_proc.ok_or(insufficient)?;
    // SAFETY: host write procs, token used only between open and close
    unsafe {
        let token = open();
        if token.is_null() {
            return Err(StatusCode::MemFullErr);
        }
        put_integer(token, AMOUNT_KEY, params.amount);
        let mut descriptor = std::ptr::null_mut();
        let status = close(token, &mut descriptor);
        if status != 0 {
            return Err(StatusCode::from(status).unwrap_or(StatusCode::ParamErr));
        }
        parameters.descriptor = descriptor;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_amounts() {
        assert_eq!(invert(0, 100), 255);
        assert_eq!(invert(200, 100), 55);
        assert_eq!(invert(200, 0), 200);
        assert_eq!(invert(0, 50), 127);
    }

    #[test]
    fn test_strips_cover_filter_rect() {
        let filter = VRect::new(3, 10, 5, 150);
        let first = strip_from(filter, filter.top).unwrap();
        assert_eq!((first.top, first.bottom, first.left, first.right), (10, 74, 3, 8));
        let second = strip_from(filter, first.bottom).unwrap();
        let third = strip_from(filter, second.bottom).unwrap();
        assert_eq!(third.bottom, 160);
        assert!(strip_from(filter, third.bottom).is_none());
    }

    #[test]
    fn test_continue_inverts_tile_and_requests_next() {
        let mut input = vec![0u8, 10, 20, 30, 40, 50];
        let mut output = vec![0u8; 6];
        let mut record = FilterRecord::zeroed();
        record.filter_rect = VRect::new(0, 0, 2, 1).to_rect16();
        request(&mut record, VRect::new(0, 0, 2, 1));
        record.in_data = input.as_mut_ptr().cast();
        record.in_row_bytes = 6;
        record.out_data = output.as_mut_ptr().cast();
        record.out_row_bytes = 6;

        continue_strip(&mut record).unwrap();
        assert_eq!(output, vec![255, 245, 235, 225, 215, 205]);
        assert!(record.output_rect().is_empty());
    }

    #[test]
    fn test_entry_rejects_null_record() {
        let mut result = 0;
        unsafe { PluginMain(selector::START, std::ptr::null_mut(), std::ptr::null_mut(), &mut result) };
        assert_eq!(result, StatusCode::ParamErr.code());
    }
}
