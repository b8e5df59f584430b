//! Host for native filter plug-ins built against the legacy filter SDK.
//!
//! The host loads an entry point, presents the SDK's parameter record and
//! callback suites to it, feeds it image tiles and collects the result.
#![deny(unreachable_pub)]
#![warn(missing_docs)]

pub mod args;
mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod memory;
pub mod persist;
pub mod plugin;
pub mod scripting;

pub use config::HostConfig;
pub use engine::{FilterHost, FilterInput, FilterOutcome, FilterOutput, FilterState, HostCallbacks, RunOptions};
pub use error::HostError;
pub use image::{SelectionMask, Surface};
pub use memory::MemorySuites;
pub use persist::ParameterSet;
