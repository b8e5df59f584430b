//! Filter execution: the selector lifecycle, the advance-state pump and the
//! per-run context the plug-in callbacks reach.

pub mod host;
mod padding;
pub mod pump;
mod scale;

use std::cell::{Cell, RefCell};
use std::os::raw::c_void;
use std::rc::Rc;

use filter_abi::procs::{
    BufferProcs, DESCRIPTOR_PARAMETERS_VERSION, HandleProcs, PiDescriptorParameters, ReadDescriptorProcs,
    WriteDescriptorProcs,
};
use filter_abi::terms::{play_info, record_info};
use filter_abi::types::{BigDocumentStruct, PlatformData, Str255};
use filter_abi::{FilterRecord, StatusCode};
use log::debug;

pub use host::{FilterHost, FilterInput, FilterOutcome, FilterOutput, FilterState, HostCallbacks, RunOptions};
pub use pump::{Images, PumpStats, TilingPump};

use crate::callbacks::basic::SuiteRegistry;
use crate::callbacks::{self, Pinned};
use crate::memory::MemorySuites;
use crate::scripting::ScriptingStore;
use crate::scripting::zstring::decode_c_text;

/// Callback tables and scratch blocks the record points into
pub(crate) struct CallbackTables {
    handle_procs: Pinned<HandleProcs>,
    buffer_procs: Pinned<BufferProcs>,
    read_procs: Pinned<ReadDescriptorProcs>,
    write_procs: Pinned<WriteDescriptorProcs>,
    descriptor_parameters: Pinned<PiDescriptorParameters>,
    error_string: Pinned<Str255>,
    big_document: Pinned<BigDocumentStruct>,
    platform: Pinned<PlatformData>,
    pub(crate) suites: SuiteRegistry,
}

impl CallbackTables {
    fn new() -> Self {
        CallbackTables {
            handle_procs: Pinned::new(callbacks::memory::handle_procs()),
            buffer_procs: Pinned::new(callbacks::memory::buffer_procs()),
            read_procs: Pinned::new(callbacks::classic::read_descriptor_procs()),
            write_procs: Pinned::new(callbacks::classic::write_descriptor_procs()),
            descriptor_parameters: Pinned::new(PiDescriptorParameters {
                descriptor_parameters_version: DESCRIPTOR_PARAMETERS_VERSION,
                play_info: play_info::DIALOG_DISPLAY,
                record_info: record_info::DIALOG_OPTIONAL,
                descriptor: std::ptr::null_mut(),
                write_descriptor_procs: std::ptr::null_mut(),
                read_descriptor_procs: std::ptr::null_mut(),
            }),
            error_string: Pinned::new([0; 256]),
            big_document: Pinned::new(BigDocumentStruct::default()),
            platform: Pinned::new(PlatformData::default()),
            suites: SuiteRegistry::new(),
        }
    }

    /// Point the record at the callbacks and pinned blocks
    fn wire(&self, record: &mut FilterRecord) {
        record.abort_proc = Some(callbacks::host::test_abort);
        record.progress_proc = Some(callbacks::host::update_progress);
        record.advance_state = Some(callbacks::host::advance_state);
        record.host_proc = Some(callbacks::host::host_proc);
        record.handle_procs = self.handle_procs.as_ptr();
        record.buffer_procs = self.buffer_procs.as_ptr();
        // SAFETY: nothing else holds the block before the first selector call
        let parameters = unsafe { self.descriptor_parameters.get_mut() };
        parameters.read_descriptor_procs = self.read_procs.as_ptr();
        parameters.write_descriptor_procs = self.write_procs.as_ptr();
        record.descriptor_parameters = self.descriptor_parameters.as_ptr();
        record.error_string = self.error_string.as_ptr();
        record.big_document_data = self.big_document.as_ptr();
        record.platform_data = self.platform.as_ptr().cast::<c_void>();
        record.s_sp_basic = self.suites.basic_ptr();
    }

    pub(crate) fn descriptor_parameters(&self) -> *mut PiDescriptorParameters {
        self.descriptor_parameters.as_ptr()
    }

    pub(crate) fn platform_data(&self) -> *mut c_void {
        self.platform.as_ptr().cast()
    }

    /// Pascal string the plug-in left in `errorString`
    pub(crate) fn error_message(&self) -> Option<String> {
        // SAFETY: no plug-in call is in progress when the host reads it
        let text = unsafe { &*self.error_string.as_ptr() };
        let len = usize::from(text[0]);
        (len > 0).then(|| decode_c_text(&text[1..=len]))
    }
}

/// Everything the plug-in callbacks of one run reach
pub(crate) struct HostContext {
    pub(crate) memory: Rc<MemorySuites>,
    pub(crate) scripting: RefCell<ScriptingStore>,
    pub(crate) pump: RefCell<TilingPump>,
    pub(crate) images: RefCell<Images>,
    pub(crate) record: Pinned<FilterRecord>,
    pub(crate) callbacks: RefCell<HostCallbacks>,
    pub(crate) tables: CallbackTables,
    canceled: Cell<bool>,
}

impl HostContext {
    pub(crate) fn new(memory: Rc<MemorySuites>, images: Images, callbacks: HostCallbacks) -> Self {
        let tables = CallbackTables::new();
        let mut record = FilterRecord::zeroed();
        tables.wire(&mut record);
        HostContext {
            memory,
            scripting: RefCell::new(ScriptingStore::new()),
            pump: RefCell::new(TilingPump::new()),
            images: RefCell::new(images),
            record: Pinned::new(record),
            callbacks: RefCell::new(callbacks),
            tables,
            canceled: Cell::new(false),
        }
    }

    /// Ask the embedding application whether to stop; sticky once true
    pub(crate) fn poll_abort(&self) -> bool {
        let requested = match self.callbacks.try_borrow_mut() {
            Ok(mut callbacks) => (callbacks.abort)(),
            Err(_) => false,
        };
        if requested {
            self.canceled.set(true);
        }
        self.canceled.get()
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.canceled.get()
    }

    pub(crate) fn report_progress(&self, done: i32, total: i32) {
        if let Ok(mut callbacks) = self.callbacks.try_borrow_mut() {
            (callbacks.progress)(done, total);
        }
    }

    /// Run the pump against the rectangles currently in the record
    pub(crate) fn advance_state(&self) -> Result<(), StatusCode> {
        let mut pump = self.pump.try_borrow_mut().map_err(|_| StatusCode::ParamErr)?;
        let mut images = self.images.try_borrow_mut().map_err(|_| StatusCode::ParamErr)?;
        // SAFETY: the plug-in is blocked in this call or no call is in progress
        let record = unsafe { self.record.get_mut() };
        let result = pump.advance(record, &mut images, &mut || self.poll_abort());
        if result == Err(StatusCode::UserCanceledErr) {
            debug!("advance-state canceled");
            self.canceled.set(true);
        }
        result
    }
}
