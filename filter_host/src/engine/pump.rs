//! Advance-state: fills the plane buffers a filter asks for and stores its output

use std::os::raw::c_void;

use filter_abi::types::{Fixed, int_to_fixed};
use filter_abi::{FilterRecord, StatusCode, VRect};
use log::debug;

use super::padding::{BGRA_PLANE_OFFSETS, PixelView, fill_tile, plane_offsets, store_tile};
use super::scale::ScaledCache;
use crate::image::{BYTES_PER_PIXEL, SelectionMask, Surface};

/// Pixels a run reads from and writes to
#[derive(Debug, Clone)]
pub struct Images {
    /// Unmodified input
    pub source: Surface,
    /// Output, starts as a copy of the source
    pub dest: Surface,
    /// Optional selection
    pub mask: Option<SelectionMask>,
}

impl Images {
    /// Destination initialized from `source`
    pub fn new(source: Surface, mask: Option<SelectionMask>) -> Self {
        Images {
            dest: source.clone(),
            source,
            mask,
        }
    }
}

/// Buffer work done by the pump, for diagnostics and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Scratch buffers that had to grow
    pub allocations: usize,
    /// Scratch buffers filled from an image
    pub fills: usize,
    /// Output buffers written back to the destination
    pub stores: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Request {
    rect: VRect,
    lo: i16,
    hi: i16,
    rate: Fixed,
    padding: i16,
}

#[derive(Debug, Default)]
struct PlaneBuffer {
    data: Vec<u8>,
    request: Option<Request>,
    row_bytes: i32,
    planes: i32,
}

impl PlaneBuffer {
    fn release(&mut self) {
        self.data = Vec::new();
        self.request = None;
        self.row_bytes = 0;
        self.planes = 0;
    }

    fn ptr(&mut self) -> *mut c_void {
        if self.data.is_empty() {
            std::ptr::null_mut()
        } else {
            self.data.as_mut_ptr().cast()
        }
    }

    fn fill(
        &mut self,
        request: Request,
        rect: VRect,
        view: &PixelView<'_>,
        offsets: &[usize],
        stats: &mut PumpStats,
        abort: &mut dyn FnMut() -> bool,
    ) -> Result<(), StatusCode> {
        if abort() {
            return Err(StatusCode::UserCanceledErr);
        }
        let planes = offsets.len();
        let (row_bytes, len) = tile_size(rect, planes)?;
        self.request = None;
        self.data.clear();
        if self.data.capacity() < len {
            stats.allocations += 1;
            self.data
                .try_reserve_exact(len)
                .map_err(|_| StatusCode::MemFullErr)?;
        }
        self.data.resize(len, 0);
        fill_tile(view, offsets, rect, request.padding, &mut self.data)?;
        stats.fills += 1;
        self.row_bytes = row_bytes;
        self.planes = planes as i32;
        self.request = Some(request);
        Ok(())
    }
}

/// Row bytes and total bytes of a tile, `ParamErr` when the rectangle does not
/// fit the address space
fn tile_size(rect: VRect, planes: usize) -> Result<(i32, usize), StatusCode> {
    let width = rect.checked_width().ok_or(StatusCode::ParamErr)?;
    let height = rect.checked_height().ok_or(StatusCode::ParamErr)?;
    let row_bytes = usize::try_from(width)
        .ok()
        .and_then(|w| w.checked_mul(planes))
        .ok_or(StatusCode::ParamErr)?;
    let len = usize::try_from(height)
        .ok()
        .and_then(|h| h.checked_mul(row_bytes))
        .filter(|&len| isize::try_from(len).is_ok())
        .ok_or(StatusCode::ParamErr)?;
    let row_bytes = i32::try_from(row_bytes).map_err(|_| StatusCode::ParamErr)?;
    Ok((row_bytes, len))
}

/// Integral sampling step for a preview rate
fn sample_scale(rate: Fixed) -> usize {
    if rate <= int_to_fixed(1) {
        1
    } else {
        (rate >> 16) as usize
    }
}

/// Rectangle in the coordinates of a 1:`scale` copy
fn scale_rect(rect: VRect, scale: usize) -> VRect {
    if scale <= 1 {
        return rect;
    }
    let s = i64::try_from(scale).unwrap_or(i64::MAX);
    // quotients of i32 values by s >= 2 always fit in i32
    let floor = |v: i32| i64::from(v).div_euclid(s) as i32;
    let ceil = |v: i32| (-(-i64::from(v)).div_euclid(s)) as i32;
    VRect {
        top: floor(rect.top),
        left: floor(rect.left),
        bottom: ceil(rect.bottom),
        right: ceil(rect.right),
    }
}

/// Plane buffers for the input, output and mask requests of one run
#[derive(Debug, Default)]
pub struct TilingPump {
    input: PlaneBuffer,
    output: PlaneBuffer,
    mask: PlaneBuffer,
    source_scaled: ScaledCache,
    mask_scaled: ScaledCache,
    stats: PumpStats,
}

impl TilingPump {
    /// Fresh pump holding no buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Work done so far
    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    /// Store the previous output, then satisfy the rectangles now in `record`.
    /// `abort` is polled before every fill.
    pub fn advance(
        &mut self,
        record: &mut FilterRecord,
        images: &mut Images,
        abort: &mut dyn FnMut() -> bool,
    ) -> Result<(), StatusCode> {
        self.store_output(images);
        self.advance_input(record, images, abort)?;
        self.advance_output(record, images, abort)?;
        self.advance_mask(record, images, abort)
    }

    /// Store any pending output without touching the requests
    pub fn flush(&mut self, images: &mut Images) {
        self.store_output(images);
        self.output.request = None;
    }

    /// Free every buffer and clear the record's pointers to them
    pub fn release(&mut self, record: &mut FilterRecord) {
        self.input.release();
        self.output.release();
        self.mask.release();
        self.source_scaled.clear();
        self.mask_scaled.clear();
        record.in_data = std::ptr::null_mut();
        record.in_row_bytes = 0;
        record.out_data = std::ptr::null_mut();
        record.out_row_bytes = 0;
        record.mask_data = std::ptr::null_mut();
        record.mask_row_bytes = 0;
    }

    fn store_output(&mut self, images: &mut Images) {
        let Some(request) = self.output.request else {
            return;
        };
        let Some(offsets) = plane_offsets(request.lo, request.hi, &BGRA_PLANE_OFFSETS) else {
            return;
        };
        let dest = &mut images.dest;
        let (width, height) = (dest.width() as i32, dest.height() as i32);
        store_tile(
            dest.data_mut(),
            width,
            height,
            BYTES_PER_PIXEL,
            &offsets,
            request.rect,
            &self.output.data,
        );
        self.stats.stores += 1;
    }

    fn advance_input(
        &mut self,
        record: &mut FilterRecord,
        images: &Images,
        abort: &mut dyn FnMut() -> bool,
    ) -> Result<(), StatusCode> {
        let rect = record.input_rect();
        if rect.is_empty() {
            self.input.release();
            record.in_data = std::ptr::null_mut();
            record.in_row_bytes = 0;
            return Ok(());
        }
        let request = Request {
            rect,
            lo: record.in_lo_plane,
            hi: record.in_hi_plane,
            rate: record.input_rate,
            padding: record.input_padding,
        };
        if self.input.request != Some(request) {
            let offsets = plane_offsets(request.lo, request.hi, &BGRA_PLANE_OFFSETS).ok_or(StatusCode::ParamErr)?;
            let scale = sample_scale(request.rate);
            let source = &images.source;
            let (width, height) = (source.width() as usize, source.height() as usize);
            let (data, width, height) = if scale > 1 {
                self.source_scaled.get(source.data(), width, height, BYTES_PER_PIXEL, scale)
            } else {
                (source.data(), width, height)
            };
            let view = PixelView {
                data,
                width: width as i32,
                height: height as i32,
                bytes_per_pixel: BYTES_PER_PIXEL,
            };
            debug!("filling input {rect:?} planes {}..={} at 1:{scale}", request.lo, request.hi);
            self.input
                .fill(request, scale_rect(rect, scale), &view, &offsets, &mut self.stats, abort)?;
        }
        record.in_data = self.input.ptr();
        record.in_row_bytes = self.input.row_bytes;
        record.in_column_bytes = self.input.planes;
        record.in_plane_bytes = 1;
        Ok(())
    }

    fn advance_output(
        &mut self,
        record: &mut FilterRecord,
        images: &Images,
        abort: &mut dyn FnMut() -> bool,
    ) -> Result<(), StatusCode> {
        let rect = record.output_rect();
        if rect.is_empty() {
            self.output.release();
            record.out_data = std::ptr::null_mut();
            record.out_row_bytes = 0;
            return Ok(());
        }
        let request = Request {
            rect,
            lo: record.out_lo_plane,
            hi: record.out_hi_plane,
            rate: int_to_fixed(1),
            padding: record.output_padding,
        };
        if self.output.request != Some(request) {
            let offsets = plane_offsets(request.lo, request.hi, &BGRA_PLANE_OFFSETS).ok_or(StatusCode::ParamErr)?;
            let dest = &images.dest;
            let view = PixelView {
                data: dest.data(),
                width: dest.width() as i32,
                height: dest.height() as i32,
                bytes_per_pixel: BYTES_PER_PIXEL,
            };
            debug!("filling output {rect:?} planes {}..={}", request.lo, request.hi);
            self.output.fill(request, rect, &view, &offsets, &mut self.stats, abort)?;
        }
        record.out_data = self.output.ptr();
        record.out_row_bytes = self.output.row_bytes;
        record.out_column_bytes = self.output.planes;
        record.out_plane_bytes = 1;
        Ok(())
    }

    fn advance_mask(
        &mut self,
        record: &mut FilterRecord,
        images: &Images,
        abort: &mut dyn FnMut() -> bool,
    ) -> Result<(), StatusCode> {
        let rect = record.mask_rect();
        let Some(mask) = images.mask.as_ref().filter(|_| !rect.is_empty()) else {
            self.mask.release();
            record.mask_data = std::ptr::null_mut();
            record.mask_row_bytes = 0;
            return Ok(());
        };
        let request = Request {
            rect,
            lo: 0,
            hi: 0,
            rate: record.mask_rate,
            padding: record.mask_padding,
        };
        if self.mask.request != Some(request) {
            let scale = sample_scale(request.rate);
            let (width, height) = (mask.width() as usize, mask.height() as usize);
            let (data, width, height) = if scale > 1 {
                self.mask_scaled.get(mask.data(), width, height, 1, scale)
            } else {
                (mask.data(), width, height)
            };
            let view = PixelView {
                data,
                width: width as i32,
                height: height as i32,
                bytes_per_pixel: 1,
            };
            debug!("filling mask {rect:?} at 1:{scale}");
            self.mask
                .fill(request, scale_rect(rect, scale), &view, &[0], &mut self.stats, abort)?;
        }
        record.mask_data = self.mask.ptr();
        record.mask_row_bytes = self.mask.row_bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_abi::terms::padding;

    fn images() -> Images {
        // 4x4, red = 10*y + x, blue = 100, alpha = 255
        let mut data = Vec::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                data.extend_from_slice(&[100, 0, 10 * y + x, 255]);
            }
        }
        Images::new(Surface::from_bgra(4, 4, data).unwrap(), None)
    }

    fn request_input(record: &mut FilterRecord, rect: VRect, lo: i16, hi: i16) {
        record.in_rect = rect.to_rect16();
        record.in_lo_plane = lo;
        record.in_hi_plane = hi;
    }

    fn no_abort() -> impl FnMut() -> bool {
        || false
    }

    unsafe fn buffer<'a>(ptr: *mut c_void, len: usize) -> &'a mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(ptr.cast(), len) }
    }

    #[test]
    fn test_input_planes_in_rgba_order() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(1, 2, 2, 1), 0, 3);
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(record.in_row_bytes, 8);
        assert_eq!(record.in_column_bytes, 4);
        let data = unsafe { buffer(record.in_data, 8) };
        assert_eq!(data, &[21, 0, 100, 255, 22, 0, 100, 255]);
    }

    #[test]
    fn test_unchanged_request_is_not_refilled() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(0, 0, 4, 4), 0, 2);
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        let first = record.in_data;
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(record.in_data, first);
        assert_eq!(pump.stats().allocations, 1);
        assert_eq!(pump.stats().fills, 1);

        // a different single plane is a new request
        request_input(&mut record, VRect::new(0, 0, 4, 4), 1, 1);
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(pump.stats().fills, 2);
        assert_eq!(pump.stats().allocations, 1);
    }

    #[test]
    fn test_empty_request_releases_buffer() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(0, 0, 2, 2), 0, 0);
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert!(!record.in_data.is_null());
        request_input(&mut record, VRect::default(), 0, 0);
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert!(record.in_data.is_null());
        assert_eq!(record.in_row_bytes, 0);
    }

    #[test]
    fn test_output_is_stored_on_the_next_call() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        record.out_rect = VRect::new(0, 0, 1, 1).to_rect16();
        record.out_lo_plane = 0;
        record.out_hi_plane = 2;
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        let out = unsafe { buffer(record.out_data, 3) };
        assert_eq!(out, &[0, 0, 100]);
        out.copy_from_slice(&[1, 2, 3]);
        assert_eq!(images.dest.pixel(0, 0), &[100, 0, 0, 255]);

        record.out_rect = VRect::default().to_rect16();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(images.dest.pixel(0, 0), &[3, 2, 1, 255]);
        assert!(record.out_data.is_null());
        assert_eq!(pump.stats().stores, 1);
    }

    #[test]
    fn test_flush_stores_pending_output() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        record.out_rect = VRect::new(3, 3, 1, 1).to_rect16();
        record.out_lo_plane = 3;
        record.out_hi_plane = 3;
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        (unsafe { buffer(record.out_data, 1) })[0] = 7;
        pump.flush(&mut images);
        pump.flush(&mut images);
        assert_eq!(images.dest.pixel(3, 3)[3], 7);
        assert_eq!(pump.stats().stores, 1);
        pump.release(&mut record);
        assert!(record.out_data.is_null());
    }

    #[test]
    fn test_invalid_planes_are_rejected() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(0, 0, 2, 2), 0, 4);
        let mut pump = TilingPump::new();
        assert_eq!(
            pump.advance(&mut record, &mut images, &mut no_abort()),
            Err(StatusCode::ParamErr)
        );
    }

    #[test]
    fn test_abort_is_polled_before_filling() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(0, 0, 2, 2), 0, 0);
        let mut pump = TilingPump::new();
        assert_eq!(
            pump.advance(&mut record, &mut images, &mut || true),
            Err(StatusCode::UserCanceledErr)
        );
        assert_eq!(pump.stats().fills, 0);
    }

    #[test]
    fn test_padding_outside_the_image() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(-1, 0, 2, 1), 0, 0);
        record.input_padding = padding::EDGE_REPLICATION;
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(unsafe { buffer(record.in_data, 2) }, &[0, 0]);

        record.input_padding = padding::ERROR_ON_BOUNDS_EXCEPTION;
        assert_eq!(
            pump.advance(&mut record, &mut images, &mut no_abort()),
            Err(StatusCode::ParamErr)
        );
    }

    #[test]
    fn test_preview_rate_uses_reduced_copy() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(0, 0, 4, 4), 2, 2);
        record.input_rate = int_to_fixed(2);
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(record.in_row_bytes, 2);
        assert_eq!(unsafe { buffer(record.in_data, 4) }, &[100; 4]);
    }

    #[test]
    fn test_mask_needs_a_selection() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        record.mask_rect = VRect::new(0, 0, 2, 1).to_rect16();
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert!(record.mask_data.is_null());

        images.mask = SelectionMask::new(4, 4, (0..16).collect());
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(record.mask_row_bytes, 2);
        assert_eq!(unsafe { buffer(record.mask_data, 2) }, &[0, 1]);
    }

    #[test]
    fn test_two_plane_request_round_trips() {
        let mut images = images();
        let mut record = FilterRecord::zeroed();
        request_input(&mut record, VRect::new(1, 2, 2, 1), 0, 1);
        record.out_rect = VRect::new(1, 2, 2, 1).to_rect16();
        record.out_lo_plane = 1;
        record.out_hi_plane = 2;
        let mut pump = TilingPump::new();
        pump.advance(&mut record, &mut images, &mut no_abort()).unwrap();
        assert_eq!(record.in_row_bytes, 4);
        assert_eq!(record.in_column_bytes, 2);
        assert_eq!(unsafe { buffer(record.in_data, 4) }, &[21, 0, 22, 0]);

        let out = unsafe { buffer(record.out_data, 4) };
        assert_eq!(out, &[0, 100, 0, 100]);
        out.copy_from_slice(&[5, 6, 7, 8]);
        pump.flush(&mut images);
        assert_eq!(images.dest.pixel(1, 2), &[6, 5, 21, 255]);
        assert_eq!(images.dest.pixel(2, 2), &[8, 7, 22, 255]);
    }

    #[test]
    fn test_oversized_32_bit_rect_is_a_parameter_error() {
        let mut images = images();
        let mut big = filter_abi::types::BigDocumentStruct {
            plugin_using_32_bit_coordinates: 1,
            ..Default::default()
        };
        big.in_rect32 = VRect {
            top: 0,
            left: -2_000_000_000,
            bottom: 1,
            right: 2_000_000_000,
        };
        let mut record = FilterRecord::zeroed();
        record.big_document_data = &mut big;
        record.in_lo_plane = 0;
        record.in_hi_plane = 0;
        let mut pump = TilingPump::new();
        assert_eq!(
            pump.advance(&mut record, &mut images, &mut no_abort()),
            Err(StatusCode::ParamErr)
        );
        assert!(record.in_data.is_null());
        assert_eq!(pump.stats().fills, 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_unallocatable_tile_reports_memory_full() {
        let mut images = images();
        let mut big = filter_abi::types::BigDocumentStruct {
            plugin_using_32_bit_coordinates: 1,
            ..Default::default()
        };
        big.in_rect32 = VRect::new(0, 0, 1 << 28, 1 << 30);
        let mut record = FilterRecord::zeroed();
        record.big_document_data = &mut big;
        record.in_lo_plane = 0;
        record.in_hi_plane = 3;
        let mut pump = TilingPump::new();
        assert_eq!(
            pump.advance(&mut record, &mut images, &mut no_abort()),
            Err(StatusCode::MemFullErr)
        );
    }

    #[test]
    fn test_tile_size_is_checked() {
        assert_eq!(tile_size(VRect::new(0, 0, 3, 2), 2), Ok((6, 12)));
        assert_eq!(tile_size(VRect::new(0, 0, i32::MAX, 1), 4), Err(StatusCode::ParamErr));
    }

    #[test]
    fn test_scale_rect_rounds_outward() {
        let rect = VRect::new(1, 1, 4, 4);
        assert_eq!(
            scale_rect(rect, 2),
            VRect {
                top: 0,
                left: 0,
                bottom: 3,
                right: 3
            }
        );
        assert_eq!(scale_rect(rect, 1), rect);
    }
}
