//! State behind the classic read/write descriptor procs

use std::collections::HashMap;

use filter_abi::procs::{PiDescriptorSimpleReference, PiDescriptorSimpleReferenceKeyData};
use filter_abi::terms::{form_id, type_id};
use filter_abi::{Handle, OsErr, StatusCode};
use log::debug;

use super::ScriptError;
use super::descriptor::ActionDescriptor;
use super::reference::{ActionReference, ReferenceForm};
use super::registry::Registry;
use super::value::AeteValue;
use super::zstring::{decode_c_text, to_pascal};

/// Status of a pinned read that had to clamp its value
pub const COERCED_PARAM: OsErr = filter_abi::status::COERCED_PARAM_ERR;

#[derive(Debug)]
struct ReadSession {
    descriptor: ActionDescriptor,
    position: usize,
    expected: *mut u32,
    current: Option<u32>,
    last_error: OsErr,
}

/// Key produced by `GetKey`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    /// The key
    pub key: u32,
    /// Type tag of its value
    pub type_tag: u32,
    /// Value flags
    pub flags: i32,
}

/// Descriptors exchanged through handles plus the open read and write sessions
#[derive(Debug, Default)]
pub struct ClassicDescriptors {
    by_handle: HashMap<usize, ActionDescriptor>,
    readers: Registry<ReadSession>,
    writers: Registry<ActionDescriptor>,
}

impl ClassicDescriptors {
    /// No descriptors, no sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a descriptor with a handle the plug-in will pass back
    pub fn register_handle(&mut self, h: Handle, descriptor: ActionDescriptor) {
        self.by_handle.insert(h as usize, descriptor);
    }

    /// Descriptor associated with a handle
    pub fn descriptor_for(&self, h: Handle) -> Option<&ActionDescriptor> {
        self.by_handle.get(&(h as usize))
    }

    /// Drop the association of a disposed handle
    pub fn forget_handle(&mut self, h: Handle) -> Option<ActionDescriptor> {
        self.by_handle.remove(&(h as usize))
    }

    /// Start reading the descriptor behind `h`.
    ///
    /// # Safety
    ///
    /// `expected` must be null or point to a writable array terminated by a
    /// zero key that stays valid until the session is closed.
    pub unsafe fn open_read(&mut self, h: Handle, expected: *mut u32) -> Result<usize, ScriptError> {
        let descriptor = self
            .descriptor_for(h)
            .cloned()
            .ok_or(ScriptError::InvalidId)?;
        self.readers.insert(ReadSession {
            descriptor,
            position: 0,
            expected,
            current: None,
            last_error: StatusCode::NoErr.code(),
        })
    }

    /// Advance to the next key, marking its slot in the expected-keys array
    /// with the null type. `None` once every key was produced.
    pub fn next_key(&mut self, token: usize) -> Result<Option<KeyInfo>, ScriptError> {
        let session = self.readers.get_mut(token)?;
        let Some((key, value)) = session.descriptor.entry_at(session.position) else {
            session.current = None;
            return Ok(None);
        };
        let info = KeyInfo {
            key,
            type_tag: value.type_tag(),
            flags: value.flags(),
        };
        session.position += 1;
        session.current = Some(key);
        if !session.expected.is_null() {
            // SAFETY: open_read's contract: zero-terminated writable array
            unsafe {
                let mut slot = session.expected;
                while *slot != 0 {
                    if *slot == key {
                        *slot = type_id::NULL;
                        break;
                    }
                    slot = slot.add(1);
                }
            }
        }
        Ok(Some(info))
    }

    /// Value of the key last produced by `next_key`
    pub fn current_value(&self, token: usize) -> Result<&AeteValue, ScriptError> {
        let session = self.readers.get(token)?;
        let key = session.current.ok_or(ScriptError::BadIndex(0))?;
        session.descriptor.get(key)
    }

    /// Remember a getter failure so closing the session reports it
    pub fn record_error(&mut self, token: usize, status: OsErr) {
        if let Ok(session) = self.readers.get_mut(token) {
            session.last_error = status;
        }
    }

    /// End a read session, returning the last error a getter reported
    pub fn close_read(&mut self, token: usize) -> Result<OsErr, ScriptError> {
        Ok(self.readers.remove(token)?.last_error)
    }

    /// Start writing a new descriptor
    pub fn open_write(&mut self) -> Result<usize, ScriptError> {
        self.writers.insert(ActionDescriptor::new())
    }

    /// Descriptor under construction
    pub fn writer(&mut self, token: usize) -> Result<&mut ActionDescriptor, ScriptError> {
        self.writers.get_mut(token)
    }

    /// Finish writing and return the descriptor
    pub fn close_write(&mut self, token: usize) -> Result<ActionDescriptor, ScriptError> {
        self.writers.remove(token)
    }

    /// Drop every association and session
    pub fn clear(&mut self) {
        if !self.readers.is_empty() || !self.writers.is_empty() {
            debug!(
                "dropping {} open read and {} open write sessions",
                self.readers.len(),
                self.writers.len()
            );
        }
        self.by_handle.clear();
        self.readers.clear();
        self.writers.clear();
    }
}

/// Clamp to `[min, max]`, reporting whether the value changed
pub fn pin_integer(value: i32, min: i32, max: i32) -> (i32, bool) {
    let pinned = value.clamp(min.min(max), max.max(min));
    (pinned, pinned != value)
}

/// Clamp to `[min, max]`, reporting whether the value changed.
/// `None` for a NaN value, which has no place in any range
pub fn pin_float(value: f64, min: f64, max: f64) -> Option<(f64, bool)> {
    if value.is_nan() {
        return None;
    }
    if min.is_nan() || max.is_nan() {
        return Some((value, false));
    }
    let pinned = value.clamp(min.min(max), max.max(min));
    Some((pinned, pinned != value))
}

fn pascal_to_string(name: &[u8; 256]) -> String {
    let len = usize::from(name[0]);
    decode_c_text(&name[1..=len])
}

/// Single-item reference from its classic form
pub fn reference_from_simple(simple: &PiDescriptorSimpleReference) -> Result<ActionReference, ScriptError> {
    let data = &simple.key_data;
    let form = match simple.key_form {
        form_id::CLASS => ReferenceForm::Class,
        form_id::NAME => ReferenceForm::Name(pascal_to_string(&data.name)),
        form_id::INDEX => ReferenceForm::Index(data.index as u32),
        form_id::IDENTIFIER => ReferenceForm::Identifier(data.index as u32),
        form_id::OFFSET => ReferenceForm::Offset(data.index),
        form_id::ENUMERATED => ReferenceForm::Enumerated {
            type_id: data.type_,
            value: data.value,
        },
        form_id::PROPERTY => ReferenceForm::Property(data.value),
        _ => return Err(ScriptError::WrongType),
    };
    let mut reference = ActionReference::new();
    reference.push(simple.desired_class, form)?;
    Ok(reference)
}

/// Classic form of the head item of a reference
pub fn simple_from_reference(reference: &ActionReference) -> Result<PiDescriptorSimpleReference, ScriptError> {
    let head = reference.head()?;
    let mut key_data = PiDescriptorSimpleReferenceKeyData {
        name: [0; 256],
        index: 0,
        type_: 0,
        value: 0,
    };
    match &head.form {
        ReferenceForm::Class => {}
        ReferenceForm::Name(name) => {
            let pascal = to_pascal(name);
            key_data.name[..pascal.len()].copy_from_slice(&pascal);
        }
        ReferenceForm::Index(index) | ReferenceForm::Identifier(index) => key_data.index = *index as i32,
        ReferenceForm::Offset(offset) => key_data.index = *offset,
        ReferenceForm::Enumerated { type_id, value } => {
            key_data.type_ = *type_id;
            key_data.value = *value;
        }
        ReferenceForm::Property(key) => key_data.value = *key,
    }
    Ok(PiDescriptorSimpleReference {
        desired_class: head.desired_class,
        key_form: head.form.form_id(),
        key_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_abi::four_cc;

    fn handle(n: usize) -> Handle {
        n as Handle
    }

    fn sample() -> ActionDescriptor {
        let mut desc = ActionDescriptor::new();
        desc.put(four_cc(b"AAAA"), AeteValue::integer(1)).unwrap();
        desc.put(four_cc(b"CCCC"), AeteValue::float(2.0)).unwrap();
        desc
    }

    #[test]
    fn test_expected_keys_slots_are_nulled_as_produced() {
        let (a, b, c) = (four_cc(b"AAAA"), four_cc(b"BBBB"), four_cc(b"CCCC"));
        let mut keys = [a, b, c, 0];
        let mut classic = ClassicDescriptors::new();
        classic.register_handle(handle(0x1000), sample());

        // SAFETY: keys is zero-terminated and outlives the session
        let token = unsafe { classic.open_read(handle(0x1000), keys.as_mut_ptr()) }.unwrap();
        let mut produced = Vec::new();
        while let Some(info) = classic.next_key(token).unwrap() {
            produced.push(info.key);
        }
        assert_eq!(produced, vec![a, c]);
        assert_eq!(keys, [type_id::NULL, b, type_id::NULL, 0]);
        assert_eq!(classic.close_read(token), Ok(0));
    }

    #[test]
    fn test_current_value_follows_get_key() {
        let mut classic = ClassicDescriptors::new();
        classic.register_handle(handle(0x2000), sample());
        // SAFETY: null expected-keys array
        let token = unsafe { classic.open_read(handle(0x2000), std::ptr::null_mut()) }.unwrap();
        assert_eq!(classic.current_value(token), Err(ScriptError::BadIndex(0)));
        classic.next_key(token).unwrap();
        assert_eq!(classic.current_value(token).and_then(AeteValue::as_integer), Ok(1));
        classic.record_error(token, StatusCode::ErrWrongType.code());
        assert_eq!(classic.close_read(token), Ok(StatusCode::ErrWrongType.code()));
    }

    #[test]
    fn test_unknown_handle_cannot_be_read() {
        let mut classic = ClassicDescriptors::new();
        // SAFETY: null expected-keys array
        let opened = unsafe { classic.open_read(handle(0x3000), std::ptr::null_mut()) };
        assert_eq!(opened, Err(ScriptError::InvalidId));
    }

    #[test]
    fn test_write_session_produces_descriptor() {
        let mut classic = ClassicDescriptors::new();
        let token = classic.open_write().unwrap();
        classic.writer(token).unwrap().put(7, AeteValue::boolean(true)).unwrap();
        let desc = classic.close_write(token).unwrap();
        assert_eq!(desc.get(7).and_then(AeteValue::as_boolean), Ok(true));
        assert!(classic.writer(token).is_err());
    }

    #[test]
    fn test_pinning() {
        assert_eq!(pin_integer(5, 0, 10), (5, false));
        assert_eq!(pin_integer(50, 0, 10), (10, true));
        assert_eq!(pin_float(-1.0, 0.0, 1.0), Some((0.0, true)));
        assert_eq!(pin_float(0.5, 0.0, 1.0), Some((0.5, false)));
    }

    #[test]
    fn test_pinning_rejects_nan() {
        assert_eq!(pin_float(f64::NAN, 0.0, 1.0), None);
        assert_eq!(pin_float(f64::NAN, f64::NEG_INFINITY, f64::INFINITY), None);
        assert_eq!(pin_float(2.0, f64::NAN, 1.0), Some((2.0, false)));
    }

    #[test]
    fn test_simple_reference_conversion() {
        let mut name = [0u8; 256];
        name[..4].copy_from_slice(&[3, b'B', b'g', b'd']);
        let simple = PiDescriptorSimpleReference {
            desired_class: four_cc(b"Lyr "),
            key_form: form_id::NAME,
            key_data: PiDescriptorSimpleReferenceKeyData {
                name,
                index: 0,
                type_: 0,
                value: 0,
            },
        };
        let reference = reference_from_simple(&simple).unwrap();
        assert_eq!(reference.head().unwrap().form, ReferenceForm::Name("Bgd".into()));
        let back = simple_from_reference(&reference).unwrap();
        assert_eq!(back.key_form, form_id::NAME);
        assert_eq!(&back.key_data.name[..4], &name[..4]);
    }
}
