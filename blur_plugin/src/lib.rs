//! Filter plug-in applying a box blur to the selection

#![deny(unreachable_pub)]
#![warn(missing_docs)]

use std::os::raw::c_void;
use std::panic::catch_unwind;

use filter_abi::procs::{BufferProcs, FreeBufferProc, HandleProcs};
use filter_abi::terms::{padding, selector};
use filter_abi::types::BufferId;
use filter_abi::{FilterRecord, Handle, StatusCode, VRect};
use log::{debug, error};

const TILE_ROWS: i32 = 32;
const PLANES: usize = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlurParams {
    radius: i32,
    iterations: i32,
}

impl Default for BlurParams {
    fn default() -> Self {
        BlurParams { radius: 2, iterations: 1 }
    }
}

const PARAMS_SIZE: i32 = std::mem::size_of::<BlurParams>() as i32;

/// Filter entry point
///
/// # Arguments
///
/// * `selector` - lifecycle step requested by the host
/// * `record` - `FilterRecord`, or `AboutRecord` for the About selector
/// * `data` - plug-in global, holds the handle with the blur settings
/// * `result` - receives the status of the step
///
/// # Safety
///
/// Pointers are checked for being non-null before usage.
/// `record` must point to a record laid out as the SDK declares it
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PluginMain(selector: i16, record: *mut c_void, data: *mut isize, result: *mut i16) {
    if result.is_null() {
        return;
    }
    let status = catch_unwind(move || {
        if record.is_null() || data.is_null() {
            return StatusCode::ParamErr;
        }
        if selector == selector::ABOUT {
            debug!("box blur filter");
            return StatusCode::NoErr;
        }
        // SAFETY: every selector but About passes a FilterRecord; data is the
        // host's cell for this plug-in
        let (record, data) = unsafe { (&mut *record.cast::<FilterRecord>(), &mut *data) };
        let step = match selector {
            selector::PARAMETERS => parameters(record, data),
            selector::START => start(record, *data),
            selector::CONTINUE => continue_strip(record, *data),
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

fn handle_procs(record: &FilterRecord) -> Result<HandleProcs, StatusCode> {
    if record.handle_procs.is_null() {
        return Err(StatusCode::ErrPlugInHostInsufficient);
    }
    // SAFETY: non-null table provided by the host for the whole call
    Ok(unsafe { *record.handle_procs })
}

fn buffer_procs(record: &FilterRecord) -> Result<BufferProcs, StatusCode> {
    if record.buffer_procs.is_null() {
        return Err(StatusCode::ErrPlugInHostInsufficient);
    }
    // SAFETY: as above
    Ok(unsafe { *record.buffer_procs })
}

fn load_params(record: &FilterRecord, data: isize) -> Result<BlurParams, StatusCode> {
    let h = data as Handle;
    if h.is_null() {
        return Ok(BlurParams::default());
    }
    let procs = handle_procs(record)?;
    let insufficient = StatusCode::ErrPlugInHostInsufficient;
    let get_size = procs.get_size_proc.ok_or(insufficient)?;
    let lock = procs.lock_proc.ok_or(insufficient)?;
    let unlock = procs.unlock_proc.ok_or(insufficient)?;
    // SAFETY: the handle was allocated through these procs, by this run or a replayed one
    unsafe {
        if get_size(h) < PARAMS_SIZE {
            return Ok(BlurParams::default());
        }
        let p = lock(h, 0);
        if p.is_null() {
            return Err(StatusCode::NilHandleErr);
        }
        let params = p.cast::<BlurParams>().read_unaligned();
        unlock(h);
        Ok(params)
    }
}

fn parameters(record: &mut FilterRecord, data: &mut isize) -> Result<(), StatusCode> {
    if *data != 0 {
        return Ok(());
    }
    let procs = handle_procs(record)?;
    let insufficient = StatusCode::ErrPlugInHostInsufficient;
    let new = procs.new_proc.ok_or(insufficient)?;
    let lock = procs.lock_proc.ok_or(insufficient)?;
    let unlock = procs.unlock_proc.ok_or(insufficient)?;
    // SAFETY: host handle procs
    unsafe {
        let h = new(PARAMS_SIZE);
        if h.is_null() {
            return Err(StatusCode::MemFullErr);
        }
        let p = lock(h, 0);
        if p.is_null() {
            return Err(StatusCode::NilHandleErr);
        }
        p.cast::<BlurParams>().write_unaligned(BlurParams::default());
        unlock(h);
        *data = h as isize;
    }
    Ok(())
}

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

/// Ask for `strip` of output and the input around it
fn request(record: &mut FilterRecord, strip: VRect, radius: i32) {
    let input = if strip.is_empty() {
        strip
    } else {
        VRect {
            top: strip.top - radius,
            left: strip.left - radius,
            bottom: strip.bottom + radius,
            right: strip.right + radius,
        }
    };
    record.in_rect = input.to_rect16();
    record.out_rect = strip.to_rect16();
    record.in_lo_plane = 0;
    record.in_hi_plane = (PLANES - 1) as i16;
    record.out_lo_plane = 0;
    record.out_hi_plane = (PLANES - 1) as i16;
}

fn start(record: &mut FilterRecord, data: isize) -> Result<(), StatusCode> {
    let params = load_params(record, data)?;
    if params.radius < 0 || params.iterations < 1 {
        return Err(StatusCode::FilterBadParameters);
    }
    record.input_padding = padding::EDGE_REPLICATION;
    let filter = record.filter_rect.to_vrect();
    request(record, strip_from(filter, filter.top).unwrap_or_default(), params.radius);
    Ok(())
}

/// Scratch memory from the host's buffer procs, freed on drop
struct Scratch {
    id: BufferId,
    ptr: *mut u8,
    len: usize,
    free: Option<FreeBufferProc>,
}

impl Scratch {
    fn allocate(record: &FilterRecord, len: usize) -> Result<Self, StatusCode> {
        let procs = buffer_procs(record)?;
        let insufficient = StatusCode::ErrPlugInHostInsufficient;
        let allocate = procs.allocate_proc.ok_or(insufficient)?;
        let lock = procs.lock_proc.ok_or(insufficient)?;
        let size = i32::try_from(len).map_err(|_| StatusCode::MemFullErr)?;
        let mut id: BufferId = std::ptr::null_mut();
        // SAFETY: host buffer procs
        unsafe {
            let status = allocate(size, &mut id);
            if status != 0 {
                return Err(StatusCode::from(status).unwrap_or(StatusCode::MemFullErr));
            }
            let ptr = lock(id, 0).cast::<u8>();
            let scratch = Scratch {
                id,
                ptr,
                len,
                free: procs.free_proc,
            };
            if ptr.is_null() {
                return Err(StatusCode::NilHandleErr);
            }
            Ok(scratch)
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: locked buffer of len bytes owned until drop
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(free) = self.free {
            // SAFETY: id came from the allocate proc and is freed once
            unsafe { free(self.id) };
        }
    }
}

/// Pixel rows of a tile
struct Tile<'a> {
    data: &'a [u8],
    row_bytes: usize,
    width: usize,
    height: usize,
}

impl Tile<'_> {
    fn at(&self, x: usize, y: usize, plane: usize) -> u32 {
        u32::from(self.data[y * self.row_bytes + x * PLANES + plane])
    }
}

/// Box blur of `input` into `output`, which is `radius` smaller on every side.
/// `scratch` holds the horizontal pass and must be `output width * input height * PLANES` long
fn box_blur(input: &Tile<'_>, output: &mut [u8], out_row_bytes: usize, radius: usize, scratch: &mut [u8]) {
    let out_width = input.width - 2 * radius;
    let out_height = input.height - 2 * radius;
    let window = (2 * radius + 1) as u32;

    for y in 0..input.height {
        for x in 0..out_width {
            for plane in 0..PLANES {
                let sum: u32 = (x..=x + 2 * radius).map(|kx| input.at(kx, y, plane)).sum();
                scratch[(y * out_width + x) * PLANES + plane] = ((sum + window / 2) / window) as u8;
            }
        }
    }

    let pass = Tile {
        data: scratch,
        row_bytes: out_width * PLANES,
        width: out_width,
        height: input.height,
    };
    for y in 0..out_height {
        for x in 0..out_width {
            for plane in 0..PLANES {
                let sum: u32 = (y..=y + 2 * radius).map(|ky| pass.at(x, ky, plane)).sum();
                output[y * out_row_bytes + x * PLANES + plane] = ((sum + window / 2) / window) as u8;
            }
        }
    }
}

fn continue_strip(record: &mut FilterRecord, data: isize) -> Result<(), StatusCode> {
    if let Some(abort) = record.abort_proc {
        // SAFETY: host callback
        if unsafe { abort() } != 0 {
            return Err(StatusCode::UserCanceledErr);
        }
    }
    let params = load_params(record, data)?;
    let radius = usize::try_from(params.radius).map_err(|_| StatusCode::FilterBadParameters)?;
    let (input_rect, output_rect) = (record.input_rect(), record.output_rect());
    if record.in_data.is_null() || record.out_data.is_null() {
        return Err(StatusCode::ParamErr);
    }
    let (in_width, in_height) = (input_rect.width() as usize, input_rect.height() as usize);
    let (out_width, out_height) = (output_rect.width() as usize, output_rect.height() as usize);
    let (in_row_bytes, out_row_bytes) = (record.in_row_bytes as usize, record.out_row_bytes as usize);

    let mut scratch = Scratch::allocate(record, out_width * in_height * PLANES)?;
    // SAFETY: the host filled both tiles for the requested rectangles and planes
    let (input, output) = unsafe {
        (
            std::slice::from_raw_parts(record.in_data.cast::<u8>(), in_row_bytes * in_height),
            std::slice::from_raw_parts_mut(record.out_data.cast::<u8>(), out_row_bytes * out_height),
        )
    };
    let tile = Tile {
        data: input,
        row_bytes: in_row_bytes,
        width: in_width,
        height: in_height,
    };
    box_blur(&tile, output, out_row_bytes, radius, scratch.as_mut_slice());

    // further iterations blur the output in place, clamped at the strip
    for _ in 1..params.iterations {
        let copy = output.to_vec();
        let tile = Tile {
            data: &copy,
            row_bytes: out_row_bytes,
            width: out_width,
            height: out_height,
        };
        let padded = pad_edges(&tile, radius);
        let tile = Tile {
            data: &padded,
            row_bytes: (out_width + 2 * radius) * PLANES,
            width: out_width + 2 * radius,
            height: out_height + 2 * radius,
        };
        box_blur(&tile, output, out_row_bytes, radius, scratch.as_mut_slice());
    }
    drop(scratch);

    let filter = record.filter_rect.to_vrect();
    if let Some(progress) = record.progress_proc {
        // SAFETY: host callback
        unsafe { progress(output_rect.bottom - filter.top, filter.height()) };
    }
    request(record, strip_from(filter, output_rect.bottom).unwrap_or_default(), params.radius);
    Ok(())
}

/// Copy of `tile` grown by `radius` on every side by repeating edge pixels
fn pad_edges(tile: &Tile<'_>, radius: usize) -> Vec<u8> {
    let width = tile.width + 2 * radius;
    let height = tile.height + 2 * radius;
    let mut padded = vec![0; width * height * PLANES];
    for y in 0..height {
        let sy = y.saturating_sub(radius).min(tile.height - 1);
        for x in 0..width {
            let sx = x.saturating_sub(radius).min(tile.width - 1);
            for plane in 0..PLANES {
                padded[(y * width + x) * PLANES + plane] = tile.at(sx, sy, plane) as u8;
            }
        }
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: usize, height: usize, value: impl Fn(usize, usize) -> u8) -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = value(x, y);
                data.extend_from_slice(&[v, v, v]);
            }
        }
        data
    }

    #[test]
    fn test_uniform_tile_is_unchanged() {
        let input = flat(5, 5, |_, _| 90);
        let tile = Tile {
            data: &input,
            row_bytes: 15,
            width: 5,
            height: 5,
        };
        let mut output = vec![0; 3 * 3 * PLANES];
        let mut scratch = vec![0; 3 * 5 * PLANES];
        box_blur(&tile, &mut output, 9, 1, &mut scratch);
        assert!(output.iter().all(|&v| v == 90));
    }

    #[test]
    fn test_single_bright_pixel_spreads() {
        let input = flat(3, 3, |x, y| if (x, y) == (1, 1) { 225 } else { 0 });
        let tile = Tile {
            data: &input,
            row_bytes: 9,
            width: 3,
            height: 3,
        };
        let mut output = vec![0; PLANES];
        let mut scratch = vec![0; 3 * PLANES];
        box_blur(&tile, &mut output, 3, 1, &mut scratch);
        // 225 / 3 = 75 per row, then 75 / 3 = 25
        assert_eq!(output, vec![25, 25, 25]);
    }

    #[test]
    fn test_zero_radius_copies() {
        let input = flat(2, 1, |x, _| x as u8 * 100);
        let tile = Tile {
            data: &input,
            row_bytes: 6,
            width: 2,
            height: 1,
        };
        let mut output = vec![0; 2 * PLANES];
        let mut scratch = vec![0; 2 * PLANES];
        box_blur(&tile, &mut output, 6, 0, &mut scratch);
        assert_eq!(output, input);
    }

    #[test]
    fn test_pad_edges_repeats_border() {
        let input = flat(2, 1, |x, _| x as u8 + 1);
        let tile = Tile {
            data: &input,
            row_bytes: 6,
            width: 2,
            height: 1,
        };
        let padded = pad_edges(&tile, 1);
        let reds: Vec<u8> = padded.chunks(PLANES).map(|px| px[0]).collect();
        assert_eq!(reds, vec![1, 1, 2, 2, 1, 1, 2, 2, 1, 1, 2, 2]);
    }

    #[test]
    fn test_request_grows_input_by_radius() {
        let mut record = FilterRecord::zeroed();
        request(&mut record, VRect::new(0, 0, 4, 2), 2);
        let input = record.input_rect();
        assert_eq!((input.left, input.top, input.right, input.bottom), (-2, -2, 6, 4));
        request(&mut record, VRect::default(), 2);
        assert!(record.input_rect().is_empty());
    }
}
