//! Parameters remembered between runs for "repeat filter"

use std::os::raw::c_void;

use filter_abi::terms::{OTOF_HANDLE_SIZE, OTOF_SIGNATURE};
use filter_abi::types::Handle;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::HandleTable;
use crate::memory::native;
use crate::scripting::ActionDescriptor;

const PTR: usize = std::mem::size_of::<usize>();

/// Persistence failures
#[derive(Debug, Error)]
pub enum PersistError {
    /// Saved parameters are not readable, including unknown storage tags
    #[error("saved parameters are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Memory for the restored block could not be allocated
    #[error("out of memory restoring {0} bytes of parameters")]
    OutOfMemory(usize),
}

/// How the plug-in kept a block it expects back on replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMethod {
    /// A handle from the handle suite
    SuiteHandle,
    /// An OS block holding a pointer to the data followed by the `'OTOF'` signature
    LegacyHandle,
    /// An OS block holding the data itself
    RawBytes,
}

/// Bytes of one captured block and how to recreate it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalParameters {
    /// Allocation method to use on restore
    pub storage_method: StorageMethod,
    /// Captured contents
    pub bytes: Vec<u8>,
    /// The data lived in executable pages
    pub is_executable: bool,
}

impl GlobalParameters {
    /// Capture the block behind a parameters handle or plug-in data pointer.
    /// `None` when there is nothing to capture or the block's size is unknowable.
    pub fn capture(handles: &HandleTable, value: *mut c_void) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let h: Handle = value.cast();
        if let Some(bytes) = handles.bytes(h) {
            return Some(GlobalParameters {
                storage_method: StorageMethod::SuiteHandle,
                bytes,
                is_executable: false,
            });
        }

        let block = value.cast::<u8>();
        let size = native::size(block);
        if size == 0 {
            debug!("block {block:p} has no known size, not persisting it");
            return None;
        }
        let data = native::lock(block);
        if size >= OTOF_HANDLE_SIZE {
            // SAFETY: OS blocks are readable for their whole registered size
            let (inner, signature) = unsafe {
                (
                    data.cast::<*mut u8>().read_unaligned(),
                    data.add(PTR).cast::<u32>().read_unaligned(),
                )
            };
            let inner_size = native::size(inner);
            if signature == OTOF_SIGNATURE && inner_size > 0 {
                let inner_data = native::lock(inner);
                // SAFETY: as above, for the inner block
                let bytes = unsafe { std::slice::from_raw_parts(inner_data, inner_size) }.to_vec();
                let is_executable = native::allocated_executable(inner) || native::is_executable(inner_data);
                native::unlock(inner);
                native::unlock(block);
                return Some(GlobalParameters {
                    storage_method: StorageMethod::LegacyHandle,
                    bytes,
                    is_executable,
                });
            }
        }
        // SAFETY: OS blocks are readable for their whole registered size
        let bytes = unsafe { std::slice::from_raw_parts(data, size) }.to_vec();
        native::unlock(block);
        Some(GlobalParameters {
            storage_method: StorageMethod::RawBytes,
            bytes,
            is_executable: false,
        })
    }

    /// Recreate the block with the method it was captured with.
    /// OS blocks are adopted by `handles` so the teardown sweep frees them.
    pub fn restore(&self, handles: &mut HandleTable) -> Result<*mut c_void, PersistError> {
        let len = self.bytes.len();
        match self.storage_method {
            StorageMethod::SuiteHandle => {
                let h = handles.allocate_from(&self.bytes);
                if h.is_null() {
                    return Err(PersistError::OutOfMemory(len));
                }
                Ok(h.cast())
            }
            StorageMethod::LegacyHandle => {
                let inner = if self.is_executable {
                    let exec = native::alloc_executable(len);
                    if exec.is_null() {
                        warn!("executable memory unavailable, restoring parameters as data");
                        native::alloc(len)
                    } else {
                        exec
                    }
                } else {
                    native::alloc(len)
                };
                if inner.is_null() {
                    return Err(PersistError::OutOfMemory(len));
                }
                handles.adopt_native(inner);
                // SAFETY: inner is len bytes long and freshly allocated
                unsafe { std::ptr::copy_nonoverlapping(self.bytes.as_ptr(), inner, len) };

                let outer = native::alloc(OTOF_HANDLE_SIZE);
                if outer.is_null() {
                    return Err(PersistError::OutOfMemory(OTOF_HANDLE_SIZE));
                }
                handles.adopt_native(outer);
                // SAFETY: outer holds a pointer followed by a u32
                unsafe {
                    outer.cast::<*mut u8>().write_unaligned(inner);
                    outer.add(PTR).cast::<u32>().write_unaligned(OTOF_SIGNATURE);
                }
                Ok(outer.cast())
            }
            StorageMethod::RawBytes => {
                let block = native::alloc(len);
                if block.is_null() {
                    return Err(PersistError::OutOfMemory(len));
                }
                handles.adopt_native(block);
                // SAFETY: block is len bytes long and freshly allocated
                unsafe { std::ptr::copy_nonoverlapping(self.bytes.as_ptr(), block, len) };
                Ok(block.cast())
            }
        }
    }
}

/// Scripting state recorded with the parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptingSnapshot {
    /// Descriptor the plug-in produced
    pub descriptor: ActionDescriptor,
    /// Dialog behavior on playback
    pub play_info: i16,
    /// Recording behavior
    pub record_info: i16,
}

/// Everything remembered from the last run of a filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Block behind `FilterRecord::parameters`
    pub parameters: Option<GlobalParameters>,
    /// Block behind the plug-in's private data pointer
    pub plugin_data: Option<GlobalParameters>,
    /// Descriptor recorded through the scripting procs
    pub scripting: Option<ScriptingSnapshot>,
}

impl ParameterSet {
    /// Nothing was captured
    pub fn is_empty(&self) -> bool {
        self.parameters.is_none() && self.plugin_data.is_none() && self.scripting.is_none()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON produced by `to_json`
    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::AeteValue;

    fn round_trip(handles: &mut HandleTable, value: *mut c_void) -> (GlobalParameters, GlobalParameters) {
        let captured = GlobalParameters::capture(handles, value).unwrap();
        let json = serde_json::to_string(&captured).unwrap();
        let parsed: GlobalParameters = serde_json::from_str(&json).unwrap();
        let restored = parsed.restore(handles).unwrap();
        let recaptured = GlobalParameters::capture(handles, restored).unwrap();
        (captured, recaptured)
    }

    #[test]
    fn test_suite_handle_round_trip() {
        let mut handles = HandleTable::new();
        let h = handles.allocate_from(b"radius=4");
        let (captured, recaptured) = round_trip(&mut handles, h.cast());
        assert_eq!(captured.storage_method, StorageMethod::SuiteHandle);
        assert_eq!(recaptured, captured);
        assert_eq!(captured.bytes, b"radius=4");
    }

    #[test]
    fn test_raw_block_round_trip() {
        let mut handles = HandleTable::new();
        let block = native::alloc(5);
        // SAFETY: five bytes were allocated
        unsafe { std::ptr::copy_nonoverlapping(b"12345".as_ptr(), block, 5) };
        handles.adopt_native(block);
        let (captured, recaptured) = round_trip(&mut handles, block.cast());
        assert_eq!(captured.storage_method, StorageMethod::RawBytes);
        assert_eq!(recaptured, captured);
        handles.free_all();
    }

    fn legacy_block(data: *mut u8) -> *mut u8 {
        let outer = native::alloc(OTOF_HANDLE_SIZE);
        // SAFETY: outer holds a pointer and a u32
        unsafe {
            outer.cast::<*mut u8>().write_unaligned(data);
            outer.add(PTR).cast::<u32>().write_unaligned(OTOF_SIGNATURE);
        }
        outer
    }

    #[test]
    fn test_legacy_handle_round_trip() {
        let mut handles = HandleTable::new();
        let data = native::alloc(3);
        // SAFETY: three bytes were allocated
        unsafe { std::ptr::copy_nonoverlapping([9u8, 8, 7].as_ptr(), data, 3) };
        let outer = legacy_block(data);
        handles.adopt_native(data);
        handles.adopt_native(outer);

        let (captured, recaptured) = round_trip(&mut handles, outer.cast());
        assert_eq!(captured.storage_method, StorageMethod::LegacyHandle);
        assert_eq!(captured.bytes, vec![9, 8, 7]);
        assert!(!captured.is_executable);
        assert_eq!(recaptured, captured);
        handles.free_all();
    }

    #[test]
    fn test_legacy_handle_keeps_executable_flag() {
        let data = native::alloc_executable(4);
        if data.is_null() {
            // W^X kernels refuse RWX mappings
            return;
        }
        let mut handles = HandleTable::new();
        let outer = legacy_block(data);
        handles.adopt_native(data);
        handles.adopt_native(outer);

        let (captured, recaptured) = round_trip(&mut handles, outer.cast());
        assert!(captured.is_executable);
        assert!(recaptured.is_executable);
        assert_eq!(recaptured.bytes, captured.bytes);
        handles.free_all();
    }

    #[test]
    fn test_unknown_storage_tag_is_rejected() {
        let json = r#"{"storage_method":"Mystery","bytes":[1],"is_executable":false}"#;
        assert!(serde_json::from_str::<GlobalParameters>(json).is_err());
        let set = format!(r#"{{"parameters":{json},"plugin_data":null,"scripting":null}}"#);
        assert!(matches!(ParameterSet::from_json(&set), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn test_parameter_set_json() {
        let mut descriptor = ActionDescriptor::new();
        descriptor.put(1, AeteValue::unit_float(2, 0.5)).unwrap();
        let set = ParameterSet {
            parameters: Some(GlobalParameters {
                storage_method: StorageMethod::SuiteHandle,
                bytes: vec![1, 2],
                is_executable: false,
            }),
            plugin_data: None,
            scripting: Some(ScriptingSnapshot {
                descriptor,
                play_info: 0,
                record_info: 0,
            }),
        };
        let back = ParameterSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(back, set);
        assert!(ParameterSet::default().is_empty());
    }

    #[test]
    fn test_unsized_pointer_is_not_captured() {
        let handles = HandleTable::new();
        let mut local = [0u8; 8];
        assert!(GlobalParameters::capture(&handles, local.as_mut_ptr().cast()).is_none());
        assert!(GlobalParameters::capture(&handles, std::ptr::null_mut()).is_none());
    }
}
