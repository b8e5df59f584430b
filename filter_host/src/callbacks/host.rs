//! Abort, progress, advance-state and host procs of the filter record

use filter_abi::types::Boolean;
use filter_abi::{OsErr, StatusCode};
use log::debug;

use super::with_context;

pub(crate) unsafe extern "C" fn test_abort() -> Boolean {
    with_context(0, |ctx| Boolean::from(ctx.poll_abort()))
}

pub(crate) unsafe extern "C" fn update_progress(done: i32, total: i32) {
    with_context((), |ctx| ctx.report_progress(done, total))
}

pub(crate) unsafe extern "C" fn advance_state() -> OsErr {
    with_context(StatusCode::ParamErr.code(), |ctx| match ctx.advance_state() {
        Ok(()) => StatusCode::NoErr.code(),
        Err(code) => code.code(),
    })
}

pub(crate) unsafe extern "C" fn host_proc(selector: i16, _data: *mut isize) {
    debug!("ignoring host proc selector {selector}");
}
