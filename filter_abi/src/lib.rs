//! Shared binary interface of the filter plug-in host.
//!
//! Every `#[repr(C)]` type here is part of the contract with plug-ins built
//! against the legacy filter SDK: field order, widths and padding must not
//! change.
#![deny(unreachable_pub)]
#![warn(missing_docs)]

pub mod pica;
pub mod procs;
pub mod record;
pub mod status;
pub mod terms;
pub mod types;

pub use record::{AboutRecord, FilterCaseInfo, FilterEntry, FilterRecord};
pub use status::{OsErr, SpErr, SpError, StatusCode};
pub use types::{Handle, Rect16, VRect, four_cc};
