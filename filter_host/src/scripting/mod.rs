//! Scripting object model: descriptors, lists, references and localizable strings

pub mod classic;
pub mod descriptor;
pub mod list;
pub mod reference;
pub mod registry;
pub mod value;
pub mod zstring;

use filter_abi::{OsErr, SpErr, SpError, StatusCode};
use thiserror::Error;

pub use classic::ClassicDescriptors;
pub use descriptor::ActionDescriptor;
pub use list::ActionList;
pub use reference::{ActionReference, ReferenceForm, ReferenceItem};
pub use registry::Registry;
pub use value::{AeteValue, ValueData};
pub use zstring::ZStringTable;

/// Failures of scripting store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Id was never issued or already freed
    #[error("unknown or freed scripting object")]
    InvalidId,

    /// Descriptor has no such key
    #[error("key {0:#010x} is not present")]
    MissingKey(u32),

    /// Index past the end
    #[error("index {0} is out of range")]
    BadIndex(u32),

    /// Value has a different type than requested
    #[error("value has a different type")]
    WrongType,

    /// Allocation failed, the store is unchanged
    #[error("out of memory")]
    OutOfMemory,
}

impl ScriptError {
    /// Status returned by the PICA suites
    pub fn sp_code(self) -> SpErr {
        match self {
            ScriptError::InvalidId => SpError::BadParameter.code(),
            ScriptError::MissingKey(_) => StatusCode::ErrMissingParameter.code().into(),
            ScriptError::BadIndex(_) => StatusCode::ParamErr.code().into(),
            ScriptError::WrongType => StatusCode::ErrWrongType.code().into(),
            ScriptError::OutOfMemory => SpError::OutOfMemory.code(),
        }
    }

    /// Status returned by the classic descriptor procs
    pub fn os_code(self) -> OsErr {
        match self {
            ScriptError::InvalidId | ScriptError::BadIndex(_) => StatusCode::ParamErr.code(),
            ScriptError::MissingKey(_) => StatusCode::ErrMissingParameter.code(),
            ScriptError::WrongType => StatusCode::ErrWrongType.code(),
            ScriptError::OutOfMemory => StatusCode::MemFullErr.code(),
        }
    }
}

/// Every scripting object alive during a run
#[derive(Debug, Default)]
pub struct ScriptingStore {
    /// Descriptor suite objects
    pub descriptors: Registry<ActionDescriptor>,
    /// List suite objects
    pub lists: Registry<ActionList>,
    /// Reference suite objects
    pub references: Registry<ActionReference>,
    /// ZString suite objects
    pub zstrings: ZStringTable,
    /// Classic descriptor procs state
    pub classic: ClassicDescriptors,
}

impl ScriptingStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value in a descriptor
    pub fn put(&mut self, descriptor: usize, key: u32, value: AeteValue) -> Result<(), ScriptError> {
        self.descriptors.get_mut(descriptor)?.put(key, value)
    }

    /// Value of a descriptor key
    pub fn get(&self, descriptor: usize, key: u32) -> Result<&AeteValue, ScriptError> {
        self.descriptors.get(descriptor)?.get(key)
    }

    /// Append a value to a list
    pub fn push(&mut self, list: usize, value: AeteValue) -> Result<(), ScriptError> {
        self.lists.get_mut(list)?.push(value)
    }

    /// Value at a list index
    pub fn item(&self, list: usize, index: u32) -> Result<&AeteValue, ScriptError> {
        self.lists.get(list)?.get(index)
    }

    /// Copy of a descriptor, for nesting by value
    pub fn snapshot_descriptor(&self, id: usize) -> Result<ActionDescriptor, ScriptError> {
        self.descriptors.get(id).cloned()
    }

    /// Copy of a list, for nesting by value
    pub fn snapshot_list(&self, id: usize) -> Result<ActionList, ScriptError> {
        self.lists.get(id).cloned()
    }

    /// Copy of a reference, for nesting by value
    pub fn snapshot_reference(&self, id: usize) -> Result<ActionReference, ScriptError> {
        self.references.get(id).cloned()
    }

    /// Drop every object
    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.lists.clear();
        self.references.clear();
        self.zstrings = ZStringTable::new();
        self.classic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_descriptor_survives_free() {
        let mut store = ScriptingStore::new();
        let outer = store.descriptors.insert(ActionDescriptor::new()).unwrap();
        let inner = store.descriptors.insert(ActionDescriptor::new()).unwrap();
        store.put(inner, 1, AeteValue::integer(5)).unwrap();

        let snapshot = store.snapshot_descriptor(inner).unwrap();
        store.put(outer, 2, AeteValue::object(9, snapshot)).unwrap();
        store.descriptors.remove(inner).unwrap();

        let (class_id, nested) = store.get(outer, 2).unwrap().as_object().unwrap();
        assert_eq!(class_id, 9);
        assert_eq!(nested.get(1).and_then(AeteValue::as_integer), Ok(5));
    }

    #[test]
    fn test_nested_list_survives_free() {
        let mut store = ScriptingStore::new();
        let outer = store.lists.insert(ActionList::new()).unwrap();
        let inner = store.lists.insert(ActionList::new()).unwrap();
        store.push(inner, AeteValue::integer(42)).unwrap();
        let snapshot = store.snapshot_list(inner).unwrap();
        store.push(outer, AeteValue::list(snapshot)).unwrap();
        store.lists.remove(inner).unwrap();

        let nested = store.item(outer, 0).unwrap().as_list().unwrap();
        assert_eq!(nested.get(0).and_then(AeteValue::as_integer), Ok(42));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ScriptError::MissingKey(1).sp_code(), -1715);
        assert_eq!(ScriptError::WrongType.os_code(), -1703);
        assert_eq!(ScriptError::BadIndex(3).os_code(), -50);
        assert_eq!(ScriptError::InvalidId.sp_code(), SpError::BadParameter.code());
    }
}
