//! Drives one filter entry point through About or the full selector sequence

use std::os::raw::c_void;
use std::rc::Rc;

use filter_abi::terms::{case_flags, data_handling, filter_case, image_mode, play_info, record_info, selector};
use filter_abi::types::{Point16, RgbColor, VPoint, f64_to_fixed, int_to_fixed};
use filter_abi::{AboutRecord, FilterCaseInfo, FilterEntry, StatusCode, VRect};
use log::{debug, warn};

use super::{HostContext, Images, PumpStats};
use crate::callbacks;
use crate::config::HostConfig;
use crate::error::HostError;
use crate::image::{BYTES_PER_PIXEL, SelectionMask, Surface};
use crate::memory::MemorySuites;
use crate::persist::{GlobalParameters, ParameterSet, ScriptingSnapshot};

/// Last selector the filter completed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Nothing called yet
    #[default]
    None,
    /// Parameters returned
    Parameters,
    /// Prepare returned
    Prepare,
    /// Start returned, Continue may be looping
    Start,
    /// Finish returned
    Finish,
}

/// Hooks into the embedding application
pub struct HostCallbacks {
    /// Receives `(done, total)` progress reports
    pub progress: Box<dyn FnMut(i32, i32)>,
    /// Polled for cancellation, `true` stops the run
    pub abort: Box<dyn FnMut() -> bool>,
}

impl Default for HostCallbacks {
    fn default() -> Self {
        HostCallbacks {
            progress: Box::new(|_, _| {}),
            abort: Box::new(|| false),
        }
    }
}

/// Image, selection, colors and remembered parameters of a run
#[derive(Debug, Clone)]
pub struct FilterInput {
    /// Pixels to filter
    pub source: Surface,
    /// Selection, the whole image when absent
    pub mask: Option<SelectionMask>,
    /// Foreground color, RGB
    pub primary: [u8; 3],
    /// Background color, RGB
    pub secondary: [u8; 3],
    /// Parameters captured by an earlier run
    pub parameters: ParameterSet,
}

impl FilterInput {
    /// Input with no selection, black on white and no saved parameters
    pub fn new(source: Surface) -> Self {
        FilterInput {
            source,
            mask: None,
            primary: [0, 0, 0],
            secondary: [255, 255, 255],
            parameters: ParameterSet::default(),
        }
    }
}

/// How to run
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Replay the saved parameters without asking the filter for new ones
    pub repeat: bool,
    /// Capabilities per filter case, indexed by case minus one.
    /// `None` treats every case as supported
    pub filter_case_info: Option<[FilterCaseInfo; 7]>,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// Filtered pixels
    pub image: Surface,
    /// Parameters to pass back for a repeat run
    pub parameters: ParameterSet,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    /// The filter ran to Finish
    Completed(FilterOutput),
    /// The user canceled
    Canceled,
}

/// One loaded filter entry point with the memory suites it allocates from.
///
/// Dropping the host sweeps every handle and buffer still outstanding in the
/// shared suites.
pub struct FilterHost {
    entry: FilterEntry,
    memory: Rc<MemorySuites>,
    config: HostConfig,
    data: Box<isize>,
    state: FilterState,
    stats: PumpStats,
}

impl FilterHost {
    /// Host for `entry`
    pub fn new(entry: FilterEntry, memory: Rc<MemorySuites>, config: HostConfig) -> Self {
        FilterHost {
            entry,
            memory,
            config,
            data: Box::new(0),
            state: FilterState::None,
            stats: PumpStats::default(),
        }
    }

    /// Last completed selector
    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Pump work of the last run
    pub fn pump_stats(&self) -> PumpStats {
        self.stats
    }

    /// Show the filter's about box
    pub fn about(&mut self) -> Result<(), HostError> {
        let ctx = Rc::new(HostContext::new(
            Rc::clone(&self.memory),
            Images::new(Surface::new(0, 0), None),
            HostCallbacks::default(),
        ));
        let mut about = AboutRecord {
            platform_data: ctx.tables.platform_data(),
            s_sp_basic: ctx.tables.suites.basic_ptr(),
            ..AboutRecord::default()
        };
        let result = self.call(&ctx, selector::ABOUT, (&raw mut about).cast());
        if result == StatusCode::NoErr.code() {
            Ok(())
        } else {
            Err(HostError::from_status(result, None).unwrap_or(HostError::FilterFailed(result)))
        }
    }

    /// Run the filter over `input`
    pub fn run(
        &mut self,
        input: FilterInput,
        callbacks: HostCallbacks,
        options: RunOptions,
    ) -> Result<FilterOutcome, HostError> {
        let FilterInput {
            source,
            mask,
            primary,
            secondary,
            parameters,
        } = input;
        let (width, height) = (source.width(), source.height());
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(HostError::ImageTooLarge(width, height));
        }
        if let Some(mask) = &mask {
            if mask.width() != width || mask.height() != height {
                return Err(HostError::MaskSizeMismatch(mask.width(), mask.height(), width, height));
            }
        }
        let (case, info) = select_case(mask.is_some(), options.filter_case_info.as_ref())?;
        let blank = source.is_fully_transparent();

        self.state = FilterState::None;
        self.stats = PumpStats::default();
        let ctx = Rc::new(HostContext::new(
            Rc::clone(&self.memory),
            Images::new(source, mask),
            callbacks,
        ));
        let record: *mut c_void = ctx.record.as_ptr().cast();
        self.setup_record(&ctx, case, primary, secondary, options.repeat);
        self.restore(&ctx, &parameters)?;

        if !options.repeat {
            let result = self.call(&ctx, selector::PARAMETERS, record);
            if check(&ctx, result)? {
                return Ok(FilterOutcome::Canceled);
            }
            self.transition(FilterState::Parameters)?;
        }

        if blank && info.flags1 & case_flags::WORKS_WITH_BLANK_DATA == 0 {
            return Err(HostError::BlankDataNotSupported);
        }

        self.negotiate_space(&ctx);
        let result = self.call(&ctx, selector::PREPARE, record);
        if check(&ctx, result)? {
            return Ok(FilterOutcome::Canceled);
        }
        self.transition(FilterState::Prepare)?;

        let result = self.call(&ctx, selector::START, record);
        if check(&ctx, result)? {
            return Ok(FilterOutcome::Canceled);
        }
        self.transition(FilterState::Start)?;

        match self.continue_loop(&ctx) {
            Ok(false) => {}
            stopped => {
                // Finish still runs so the filter can free what it allocated
                let result = self.call(&ctx, selector::FINISH, record);
                debug!("finish after an interrupted run returned {result}");
                self.state = FilterState::Finish;
                self.release(&ctx);
                return stopped.map(|_| FilterOutcome::Canceled);
            }
        }

        {
            let mut images = ctx.images.borrow_mut();
            ctx.pump.borrow_mut().flush(&mut images);
        }
        let result = self.call(&ctx, selector::FINISH, record);
        let canceled = check(&ctx, result);
        self.release(&ctx);
        if canceled? {
            return Ok(FilterOutcome::Canceled);
        }
        self.transition(FilterState::Finish)?;

        let parameters = if options.repeat {
            parameters
        } else {
            self.persist(&ctx)
        };

        let mut images = ctx.images.borrow_mut();
        post_process(&mut images, &info);
        let image = std::mem::replace(&mut images.dest, Surface::new(0, 0));
        Ok(FilterOutcome::Completed(FilterOutput { image, parameters }))
    }

    fn call(&mut self, ctx: &Rc<HostContext>, selector: i16, record: *mut c_void) -> i16 {
        debug!("calling selector {selector}");
        let _guard = callbacks::install(Rc::clone(ctx));
        let entry = self.entry;
        let data: *mut isize = &mut *self.data;
        let mut result = StatusCode::NoErr.code();
        // SAFETY: the record, the data cell and every table it points to stay
        // at fixed addresses until the context is dropped
        unsafe { entry(selector, record, data, &mut result) };
        debug!("selector {selector} returned {result}");
        result
    }

    fn transition(&mut self, next: FilterState) -> Result<(), HostError> {
        let allowed = matches!(
            (self.state, next),
            (FilterState::None, FilterState::Parameters)
                | (FilterState::None | FilterState::Parameters, FilterState::Prepare)
                | (FilterState::Prepare, FilterState::Start)
                | (FilterState::Start, FilterState::Finish)
        );
        if !allowed {
            return Err(HostError::InvalidState("selector called out of order"));
        }
        self.state = next;
        Ok(())
    }

    /// Run the pump and Continue until the filter stops asking for pixels.
    /// `Ok(true)` when the run was canceled
    fn continue_loop(&mut self, ctx: &Rc<HostContext>) -> Result<bool, HostError> {
        let record: *mut c_void = ctx.record.as_ptr().cast();
        loop {
            let pending = {
                // SAFETY: no plug-in call is in progress
                let r = unsafe { &*ctx.record.as_ptr() };
                !r.input_rect().is_empty() || !r.output_rect().is_empty() || !r.mask_rect().is_empty()
            };
            if !pending {
                return Ok(false);
            }
            match ctx.advance_state() {
                Ok(()) => {}
                Err(StatusCode::UserCanceledErr) => return Ok(true),
                Err(code) => {
                    let code = code.code();
                    return Err(HostError::from_status(code, None).unwrap_or(HostError::FilterFailed(code)));
                }
            }
            let result = self.call(ctx, selector::CONTINUE, record);
            if check(ctx, result)? || ctx.poll_abort() {
                return Ok(true);
            }
        }
    }

    /// Fill the record fields that stay fixed for the run
    fn setup_record(&self, ctx: &HostContext, case: i16, primary: [u8; 3], secondary: [u8; 3], repeat: bool) {
        let images = ctx.images.borrow();
        let (width, height) = (images.source.width() as i32, images.source.height() as i32);
        let whole = VRect::new(0, 0, width, height);
        let filter_rect = images
            .mask
            .as_ref()
            .and_then(SelectionMask::bounds)
            .map_or(whole, |(left, top, right, bottom)| VRect {
                top: top as i32,
                left: left as i32,
                bottom: bottom as i32,
                right: right as i32,
            });
        let has_mask = images.mask.is_some();
        drop(images);

        // SAFETY: no plug-in call is in progress
        let record = unsafe { ctx.record.get_mut() };
        let clamp = |v: i32| v.min(i16::MAX.into()) as i16;
        let size = Point16 {
            v: clamp(height),
            h: clamp(width),
        };
        record.image_size = size;
        record.whole_size = size;
        record.filter_rect = filter_rect.to_rect16();
        record.foreground = RgbColor::from_rgb8(primary[0], primary[1], primary[2]);
        record.background = RgbColor::from_rgb8(secondary[0], secondary[1], secondary[2]);
        record.fore_color = [primary[0], primary[1], primary[2], 0];
        record.back_color = [secondary[0], secondary[1], secondary[2], 0];
        record.have_mask = u8::from(has_mask);
        record.auto_mask = u8::from(has_mask);
        record.host_sig = self.config.host_sig();
        record.image_mode = image_mode::RGB_COLOR;
        record.image_h_res = f64_to_fixed(self.config.resolution);
        record.image_v_res = f64_to_fixed(self.config.resolution);
        record.monitor = filter_abi::types::PlugInMonitor::srgb();
        record.filter_case = case;
        record.dummy_plane_value = self.config.dummy_plane_value;
        record.supports_padding = 1;
        record.input_padding = self.config.default_padding;
        record.output_padding = self.config.default_padding;
        record.mask_padding = self.config.default_padding;
        record.sampling_support = self.config.sampling_support;
        record.input_rate = int_to_fixed(1);
        record.mask_rate = int_to_fixed(1);
        record.depth = 8;

        if is_layer_case(case) {
            record.planes = 4;
            record.in_layer_planes = 3;
            record.in_transparency_mask = 1;
            record.out_layer_planes = 3;
            record.out_transparency_mask = 1;
            record.abs_layer_planes = 3;
            record.abs_transparency_mask = 1;
        } else {
            record.planes = 3;
            record.in_non_layer_planes = 3;
            record.out_non_layer_planes = 3;
            record.abs_non_layer_planes = 3;
        }

        // SAFETY: wired to the pinned block when the context was built
        let big = unsafe { &mut *record.big_document_data };
        let size32 = VPoint { v: height, h: width };
        big.image_size32 = size32;
        big.whole_size32 = size32;
        big.filter_rect32 = filter_rect;

        // SAFETY: as above
        let descriptor = unsafe { &mut *ctx.tables.descriptor_parameters() };
        descriptor.play_info = if repeat {
            play_info::DIALOG_DONT_DISPLAY
        } else {
            play_info::DIALOG_DISPLAY
        };
        descriptor.record_info = record_info::DIALOG_OPTIONAL;
    }

    /// Put back the blocks and descriptor of an earlier run
    fn restore(&mut self, ctx: &HostContext, saved: &ParameterSet) -> Result<(), HostError> {
        {
            let mut handles = ctx.memory.handles.borrow_mut();
            // SAFETY: no plug-in call is in progress
            let record = unsafe { ctx.record.get_mut() };
            if let Some(parameters) = &saved.parameters {
                record.parameters = parameters.restore(&mut handles)?.cast();
            }
            if let Some(data) = &saved.plugin_data {
                *self.data = data.restore(&mut handles)? as isize;
            }
        }
        if let Some(snapshot) = &saved.scripting {
            let h = callbacks::classic::register_descriptor(ctx, snapshot.descriptor.clone())
                .map_err(|_| HostError::OutOfMemory)?;
            // SAFETY: no plug-in call is in progress
            let descriptor = unsafe { &mut *ctx.tables.descriptor_parameters() };
            descriptor.descriptor = h;
            descriptor.record_info = snapshot.record_info;
        }
        Ok(())
    }

    fn negotiate_space(&self, ctx: &HostContext) {
        let available = ctx.memory.buffers.borrow().available_space();
        // SAFETY: no plug-in call is in progress
        let record = unsafe { ctx.record.get_mut() };
        record.buffer_space = i32::try_from(available).unwrap_or(i32::MAX);
        record.max_space = self.config.max_space;
    }

    /// Capture what the filter stored for a repeat run
    fn persist(&self, ctx: &HostContext) -> ParameterSet {
        let handles = ctx.memory.handles.borrow();
        // SAFETY: no plug-in call is in progress
        let record = unsafe { &*ctx.record.as_ptr() };
        let parameters = GlobalParameters::capture(&handles, record.parameters.cast());
        let plugin_data = GlobalParameters::capture(&handles, *self.data as *mut c_void);

        // SAFETY: as above
        let descriptor = unsafe { &*ctx.tables.descriptor_parameters() };
        let scripting = if descriptor.descriptor.is_null() {
            None
        } else {
            let store = ctx.scripting.borrow();
            let recorded = store.classic.descriptor_for(descriptor.descriptor).cloned();
            if recorded.is_none() {
                warn!("descriptor handle was not produced by the write procs");
            }
            recorded.map(|d| ScriptingSnapshot {
                descriptor: d,
                play_info: descriptor.play_info,
                record_info: descriptor.record_info,
            })
        };
        ParameterSet {
            parameters,
            plugin_data,
            scripting,
        }
    }

    fn release(&mut self, ctx: &HostContext) {
        let mut pump = ctx.pump.borrow_mut();
        self.stats = pump.stats();
        // SAFETY: no plug-in call is in progress
        pump.release(unsafe { ctx.record.get_mut() });
    }
}

impl Drop for FilterHost {
    fn drop(&mut self) {
        let freed = self.memory.reset_all();
        if freed > 0 {
            debug!("freed {freed} blocks the filter left behind");
        }
    }
}

/// `Ok(true)` when the filter reported a cancellation
fn check(ctx: &HostContext, result: i16) -> Result<bool, HostError> {
    if result == StatusCode::UserCanceledErr.code() || ctx.is_canceled() {
        return Ok(true);
    }
    let message = if result == StatusCode::ErrReportString.code() {
        ctx.tables.error_message()
    } else {
        None
    };
    match HostError::from_status(result, message) {
        Some(error) => Err(error),
        None => Ok(false),
    }
}

fn is_layer_case(case: i16) -> bool {
    matches!(
        case,
        filter_case::EDITABLE_TRANSPARENCY_NO_SELECTION | filter_case::EDITABLE_TRANSPARENCY_WITH_SELECTION
    )
}

/// Editable transparency when the filter handles it, otherwise a flat image
fn select_case(
    has_selection: bool,
    table: Option<&[FilterCaseInfo; 7]>,
) -> Result<(i16, FilterCaseInfo), HostError> {
    let (layer, flat) = if has_selection {
        (
            filter_case::EDITABLE_TRANSPARENCY_WITH_SELECTION,
            filter_case::FLAT_IMAGE_WITH_SELECTION,
        )
    } else {
        (
            filter_case::EDITABLE_TRANSPARENCY_NO_SELECTION,
            filter_case::FLAT_IMAGE_NO_SELECTION,
        )
    };
    let Some(table) = table else {
        let everything = FilterCaseInfo {
            input_handling: data_handling::NONE,
            output_handling: data_handling::NONE,
            flags1: case_flags::WORKS_WITH_BLANK_DATA,
            flags2: 0,
        };
        return Ok((layer, everything));
    };
    for case in [layer, flat] {
        let info = table[(case - 1) as usize];
        if info.input_handling != data_handling::CANT_FILTER && info.output_handling != data_handling::CANT_FILTER {
            return Ok((case, info));
        }
    }
    Err(HostError::UnsupportedFilterCase)
}

/// Output handling the filter declared for its case
fn post_process(images: &mut Images, info: &FilterCaseInfo) {
    if info.output_handling == data_handling::FILL_MASK {
        for px in images.dest.data_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = 255;
        }
    }
    if info.flags1 & case_flags::WRITES_OUTSIDE_SELECTION == 0 {
        if let Some(mask) = &images.mask {
            restore_unselected(&mut images.dest, &images.source, mask);
        }
    }
}

/// Blend the source back in by inverse selection coverage
fn restore_unselected(dest: &mut Surface, source: &Surface, mask: &SelectionMask) {
    let pixels = dest
        .data_mut()
        .chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(source.data().chunks_exact(BYTES_PER_PIXEL))
        .zip(mask.data());
    for ((out, src), &coverage) in pixels {
        match coverage {
            255 => {}
            0 => out.copy_from_slice(src),
            c => {
                let c = u32::from(c);
                for (o, s) in out.iter_mut().zip(src) {
                    *o = ((u32::from(*o) * c + u32::from(*s) * (255 - c) + 127) / 255) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cant(case: &mut FilterCaseInfo) {
        case.input_handling = data_handling::CANT_FILTER;
        case.output_handling = data_handling::CANT_FILTER;
    }

    fn supported() -> FilterCaseInfo {
        FilterCaseInfo {
            input_handling: data_handling::NONE,
            output_handling: data_handling::NONE,
            flags1: 0,
            flags2: 0,
        }
    }

    #[test]
    fn test_select_case_without_table_supports_everything() {
        let (case, info) = select_case(false, None).unwrap();
        assert_eq!(case, filter_case::EDITABLE_TRANSPARENCY_NO_SELECTION);
        assert_ne!(info.flags1 & case_flags::WORKS_WITH_BLANK_DATA, 0);
        let (case, _) = select_case(true, None).unwrap();
        assert_eq!(case, filter_case::EDITABLE_TRANSPARENCY_WITH_SELECTION);
    }

    #[test]
    fn test_select_case_falls_back_to_flat() {
        let mut table = [supported(); 7];
        cant(&mut table[(filter_case::EDITABLE_TRANSPARENCY_NO_SELECTION - 1) as usize]);
        let (case, _) = select_case(false, Some(&table)).unwrap();
        assert_eq!(case, filter_case::FLAT_IMAGE_NO_SELECTION);

        cant(&mut table[(filter_case::FLAT_IMAGE_NO_SELECTION - 1) as usize]);
        assert!(matches!(
            select_case(false, Some(&table)),
            Err(HostError::UnsupportedFilterCase)
        ));
    }

    #[test]
    fn test_restore_unselected_blends_by_coverage() {
        let source = Surface::from_bgra(3, 1, vec![0; 12]).unwrap();
        let mut dest = Surface::from_bgra(3, 1, vec![255; 12]).unwrap();
        let mask = SelectionMask::new(3, 1, vec![0, 128, 255]).unwrap();
        restore_unselected(&mut dest, &source, &mask);
        assert_eq!(dest.pixel(0, 0), &[0, 0, 0, 0]);
        assert_eq!(dest.pixel(1, 0), &[128, 128, 128, 128]);
        assert_eq!(dest.pixel(2, 0), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_fill_mask_output_is_opaque() {
        let mut images = Images::new(Surface::new(2, 2), None);
        let info = FilterCaseInfo {
            output_handling: data_handling::FILL_MASK,
            ..supported()
        };
        post_process(&mut images, &info);
        assert!(images.dest.data().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_writes_outside_selection_skips_restore() {
        let mut images = Images::new(Surface::new(1, 1), SelectionMask::new(1, 1, vec![0]));
        images.dest.data_mut().copy_from_slice(&[9, 9, 9, 9]);
        let info = FilterCaseInfo {
            flags1: case_flags::WRITES_OUTSIDE_SELECTION,
            ..supported()
        };
        post_process(&mut images, &info);
        assert_eq!(images.dest.pixel(0, 0), &[9, 9, 9, 9]);
    }

    unsafe extern "C" fn failing_entry(_selector: i16, _record: *mut c_void, _data: *mut isize, result: *mut i16) {
        unsafe { *result = StatusCode::FilterBadMode.code() };
    }

    #[test]
    fn test_transition_rejects_out_of_order() {
        let mut host = FilterHost::new(failing_entry, Rc::new(MemorySuites::new(1 << 20)), HostConfig::default());
        assert!(host.transition(FilterState::Start).is_err());
        host.transition(FilterState::Prepare).unwrap();
        host.transition(FilterState::Start).unwrap();
        host.transition(FilterState::Finish).unwrap();
        assert_eq!(host.state(), FilterState::Finish);
    }

    #[test]
    fn test_about_maps_failure() {
        let mut host = FilterHost::new(failing_entry, Rc::new(MemorySuites::new(1 << 20)), HostConfig::default());
        assert!(matches!(host.about(), Err(HostError::BadMode)));
    }
}
