#![allow(dead_code)]

use std::cell::RefCell;
use std::os::raw::c_void;
use std::rc::Rc;

use filter_abi::FilterRecord;
use filter_host::{FilterHost, HostConfig, MemorySuites, Surface};

thread_local! {
    static CALLS: RefCell<Vec<i16>> = const { RefCell::new(Vec::new()) };
}

/// Forget the selectors logged by an earlier test on this thread
pub fn reset() {
    CALLS.with(|calls| calls.borrow_mut().clear());
}

pub fn log_call(selector: i16) {
    CALLS.with(|calls| calls.borrow_mut().push(selector));
}

/// Selectors the test filters received, in order
pub fn calls() -> Vec<i16> {
    CALLS.with(|calls| calls.borrow().clone())
}

/// # Safety
///
/// `record` must be the filter record the host passed in
pub unsafe fn record<'a>(record: *mut c_void) -> &'a mut FilterRecord {
    unsafe { &mut *record.cast::<FilterRecord>() }
}

pub fn host(entry: filter_abi::FilterEntry) -> FilterHost {
    FilterHost::new(entry, Rc::new(MemorySuites::new(1 << 24)), HostConfig::default())
}

/// 2x2 RGBA image with distinct channels and partial alpha
pub fn sample_image() -> Surface {
    let rgba = vec![
        10, 20, 30, 200, //
        40, 50, 60, 200, //
        70, 80, 90, 200, //
        100, 110, 120, 200,
    ];
    Surface::from_rgba(2, 2, rgba).unwrap()
}

/// Invert the RGB planes of the current input tile into the output tile
///
/// # Safety
///
/// The record must carry matching input and output tiles of three planes
pub unsafe fn invert_tile(r: &FilterRecord) {
    let rect = r.output_rect();
    let (width, height) = (rect.width() as usize, rect.height() as usize);
    let planes = (r.out_hi_plane - r.out_lo_plane + 1) as usize;
    for y in 0..height {
        let src = unsafe { r.in_data.cast::<u8>().add(y * r.in_row_bytes as usize) };
        let dst = unsafe { r.out_data.cast::<u8>().add(y * r.out_row_bytes as usize) };
        for i in 0..width * planes {
            unsafe { *dst.add(i) = 255 - *src.add(i) };
        }
    }
}
