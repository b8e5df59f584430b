mod common;

use std::cell::Cell;
use std::os::raw::c_void;

use filter_abi::terms::{case_flags, data_handling, selector};
use filter_abi::{FilterCaseInfo, StatusCode};
use filter_host::{FilterInput, FilterOutcome, FilterState, HostCallbacks, HostError, ParameterSet, RunOptions, Surface};

use common::{calls, host, invert_tile, log_call, reset, sample_image};

const AMOUNT: i32 = 42;

thread_local! {
    static SEEN_AMOUNT: Cell<Option<i32>> = const { Cell::new(None) };
}

/// Inverts RGB, keeping an amount in a parameters handle
unsafe extern "C" fn invert_entry(selector: i16, record: *mut c_void, _data: *mut isize, _result: *mut i16) {
    log_call(selector);
    if selector == selector::ABOUT {
        return;
    }
    let r = unsafe { common::record(record) };
    let procs = unsafe { &*r.handle_procs };
    match selector {
        selector::PARAMETERS => unsafe {
            let h = procs.new_proc.unwrap()(4);
            let p = procs.lock_proc.unwrap()(h, 0);
            p.cast::<i32>().write_unaligned(AMOUNT);
            procs.unlock_proc.unwrap()(h);
            r.parameters = h;
        },
        selector::START => {
            r.in_rect = r.filter_rect;
            r.out_rect = r.filter_rect;
            r.in_lo_plane = 0;
            r.in_hi_plane = 2;
            r.out_lo_plane = 0;
            r.out_hi_plane = 2;
        }
        selector::CONTINUE => unsafe {
            if !r.parameters.is_null() {
                let p = procs.lock_proc.unwrap()(r.parameters, 0);
                SEEN_AMOUNT.with(|seen| seen.set(Some(p.cast::<i32>().read_unaligned())));
                procs.unlock_proc.unwrap()(r.parameters);
            }
            invert_tile(r);
            r.in_rect = Default::default();
            r.out_rect = Default::default();
        },
        _ => {}
    }
}

unsafe extern "C" fn cancel_in_parameters(selector: i16, _record: *mut c_void, _data: *mut isize, result: *mut i16) {
    log_call(selector);
    if selector == selector::PARAMETERS {
        unsafe { *result = StatusCode::UserCanceledErr.code() };
    }
}

unsafe extern "C" fn report_string_in_prepare(selector: i16, record: *mut c_void, _data: *mut isize, result: *mut i16) {
    log_call(selector);
    if selector == selector::PREPARE {
        let r = unsafe { common::record(record) };
        let message = b"Out of gamut";
        unsafe {
            let text = &mut *r.error_string;
            text[0] = message.len() as u8;
            text[1..=message.len()].copy_from_slice(message);
            *result = StatusCode::ErrReportString.code();
        }
    }
}

fn transparent_image() -> Surface {
    Surface::from_rgba(2, 1, vec![1, 2, 3, 0, 4, 5, 6, 0]).unwrap()
}

fn case_table(info: FilterCaseInfo) -> Option<[FilterCaseInfo; 7]> {
    Some([info; 7])
}

#[test]
fn test_invert_runs_full_lifecycle() {
    reset();
    let mut host = host(invert_entry);
    let outcome = host
        .run(FilterInput::new(sample_image()), HostCallbacks::default(), RunOptions::default())
        .unwrap();
    let FilterOutcome::Completed(output) = outcome else {
        panic!("run was canceled");
    };

    assert_eq!(
        calls(),
        vec![
            selector::PARAMETERS,
            selector::PREPARE,
            selector::START,
            selector::CONTINUE,
            selector::FINISH
        ]
    );
    assert_eq!(host.state(), FilterState::Finish);
    assert_eq!(
        output.image.to_rgba(),
        vec![245, 235, 225, 200, 215, 205, 195, 200, 185, 175, 165, 200, 155, 145, 135, 200]
    );
    assert!(output.parameters.parameters.is_some());
    assert_eq!(SEEN_AMOUNT.with(Cell::get), Some(AMOUNT));
}

#[test]
fn test_repeat_skips_parameters_and_restores_saved_handle() {
    reset();
    let saved = {
        let mut first = host(invert_entry);
        match first
            .run(FilterInput::new(sample_image()), HostCallbacks::default(), RunOptions::default())
            .unwrap()
        {
            FilterOutcome::Completed(output) => output.parameters,
            FilterOutcome::Canceled => panic!("run was canceled"),
        }
    };
    let saved = ParameterSet::from_json(&saved.to_json().unwrap()).unwrap();

    reset();
    SEEN_AMOUNT.with(|seen| seen.set(None));
    let mut input = FilterInput::new(sample_image());
    input.parameters = saved.clone();
    let options = RunOptions {
        repeat: true,
        ..RunOptions::default()
    };
    let mut replay = host(invert_entry);
    let outcome = replay.run(input, HostCallbacks::default(), options).unwrap();

    assert!(!calls().contains(&selector::PARAMETERS));
    assert_eq!(SEEN_AMOUNT.with(Cell::get), Some(AMOUNT));
    match outcome {
        FilterOutcome::Completed(output) => assert_eq!(output.parameters, saved),
        FilterOutcome::Canceled => panic!("replay was canceled"),
    }
}

#[test]
fn test_blank_layer_rejected_before_start() {
    reset();
    let info = FilterCaseInfo {
        input_handling: data_handling::NONE,
        output_handling: data_handling::NONE,
        flags1: 0,
        flags2: 0,
    };
    let options = RunOptions {
        filter_case_info: case_table(info),
        ..RunOptions::default()
    };
    let mut host = host(invert_entry);
    let result = host.run(FilterInput::new(transparent_image()), HostCallbacks::default(), options);

    assert!(matches!(result, Err(HostError::BlankDataNotSupported)));
    assert!(!calls().contains(&selector::PREPARE));
    assert!(!calls().contains(&selector::START));
}

#[test]
fn test_blank_layer_accepted_when_declared() {
    reset();
    let info = FilterCaseInfo {
        input_handling: data_handling::NONE,
        output_handling: data_handling::NONE,
        flags1: case_flags::WORKS_WITH_BLANK_DATA,
        flags2: 0,
    };
    let options = RunOptions {
        filter_case_info: case_table(info),
        ..RunOptions::default()
    };
    let mut host = host(invert_entry);
    let result = host.run(FilterInput::new(transparent_image()), HostCallbacks::default(), options);
    assert!(matches!(result, Ok(FilterOutcome::Completed(_))));
}

#[test]
fn test_unsupported_case_never_calls_the_filter() {
    reset();
    let options = RunOptions {
        filter_case_info: case_table(FilterCaseInfo::default()),
        ..RunOptions::default()
    };
    let mut host = host(invert_entry);
    let result = host.run(FilterInput::new(sample_image()), HostCallbacks::default(), options);
    assert!(matches!(result, Err(HostError::UnsupportedFilterCase)));
    assert!(calls().is_empty());
}

#[test]
fn test_abort_during_pump_still_finishes() {
    reset();
    let callbacks = HostCallbacks {
        abort: Box::new(|| true),
        ..HostCallbacks::default()
    };
    let mut host = host(invert_entry);
    let outcome = host
        .run(FilterInput::new(sample_image()), callbacks, RunOptions::default())
        .unwrap();

    assert!(matches!(outcome, FilterOutcome::Canceled));
    assert_eq!(calls().last(), Some(&selector::FINISH));
}

#[test]
fn test_cancel_in_parameters_is_not_an_error() {
    reset();
    let mut host = host(cancel_in_parameters);
    let outcome = host
        .run(FilterInput::new(sample_image()), HostCallbacks::default(), RunOptions::default())
        .unwrap();
    assert!(matches!(outcome, FilterOutcome::Canceled));
    assert_eq!(calls(), vec![selector::PARAMETERS]);
}

#[test]
fn test_report_string_surfaces_plugin_message() {
    reset();
    let mut host = host(report_string_in_prepare);
    let result = host.run(FilterInput::new(sample_image()), HostCallbacks::default(), RunOptions::default());
    match result {
        Err(HostError::PluginMessage(message)) => assert_eq!(message, "Out of gamut"),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(calls(), vec![selector::PARAMETERS, selector::PREPARE]);
}

#[test]
fn test_mask_size_must_match_image() {
    reset();
    let mut input = FilterInput::new(sample_image());
    input.mask = filter_host::SelectionMask::new(1, 1, vec![255]);
    let mut host = host(invert_entry);
    let result = host.run(input, HostCallbacks::default(), RunOptions::default());
    assert!(matches!(result, Err(HostError::MaskSizeMismatch(1, 1, 2, 2))));
    assert!(calls().is_empty());
}

#[test]
fn test_selection_keeps_unselected_pixels() {
    reset();
    let mut input = FilterInput::new(sample_image());
    input.mask = filter_host::SelectionMask::new(2, 2, vec![255, 0, 0, 0]);
    let mut host = host(invert_entry);
    let FilterOutcome::Completed(output) = host.run(input, HostCallbacks::default(), RunOptions::default()).unwrap()
    else {
        panic!("run was canceled");
    };
    let rgba = output.image.to_rgba();
    assert_eq!(&rgba[0..4], &[245, 235, 225, 200]);
    assert_eq!(&rgba[4..], &sample_image().to_rgba()[4..]);
}

#[test]
fn test_about_reaches_the_filter() {
    reset();
    let mut host = host(invert_entry);
    host.about().unwrap();
    assert_eq!(calls(), vec![selector::ABOUT]);
}

#[test]
fn test_progress_reaches_embedding_application() {
    reset();

    unsafe extern "C" fn reports_progress(selector: i16, record: *mut c_void, _data: *mut isize, _result: *mut i16) {
        if selector == selector::START {
            let r = unsafe { common::record(record) };
            let progress = r.progress_proc.unwrap();
            unsafe {
                progress(1, 4);
                progress(4, 4);
            }
        }
    }

    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&seen);
    let callbacks = HostCallbacks {
        progress: Box::new(move |done, total| sink.borrow_mut().push((done, total))),
        ..HostCallbacks::default()
    };
    let mut host = host(reports_progress);
    host.run(FilterInput::new(sample_image()), callbacks, RunOptions::default())
        .unwrap();
    assert_eq!(*seen.borrow(), vec![(1, 4), (4, 4)]);
}
