//! Typed values stored in descriptors and lists

use filter_abi::terms::type_id;
use serde::{Deserialize, Serialize};

use super::ScriptError;
use super::descriptor::ActionDescriptor;
use super::list::ActionList;
use super::reference::ActionReference;

/// Payload of a scripting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueData {
    /// 32-bit integer
    Integer(i32),
    /// Double
    Float(f64),
    /// Double with a unit id
    UnitFloat {
        /// Unit four-char code
        unit: u32,
        /// Value
        value: f64,
    },
    /// Boolean
    Boolean(bool),
    /// Alias, path or raw data bytes
    Bytes(Vec<u8>),
    /// Text, from C strings or localizable strings
    Text(String),
    /// Class id
    Class(u32),
    /// Enumerated value
    Enumerated {
        /// Enumeration type
        type_id: u32,
        /// Enumeration value
        value: u32,
    },
    /// Nested descriptor
    Object {
        /// Class of the descriptor
        class_id: u32,
        /// Snapshot of the nested descriptor
        descriptor: ActionDescriptor,
    },
    /// Nested list
    List(ActionList),
    /// Reference chain
    Reference(ActionReference),
    /// No payload
    Null,
}

impl ValueData {
    fn accepts(&self, tag: u32) -> bool {
        match self {
            ValueData::Integer(_) => tag == type_id::INTEGER,
            ValueData::Float(_) => tag == type_id::FLOAT,
            ValueData::UnitFloat { .. } => tag == type_id::UNIT_FLOAT,
            ValueData::Boolean(_) => tag == type_id::BOOLEAN,
            ValueData::Bytes(_) => {
                [type_id::ALIAS, type_id::RAW_DATA, type_id::PATH].contains(&tag)
            }
            ValueData::Text(_) => tag == type_id::CHAR,
            ValueData::Class(_) => tag == type_id::TYPE || tag == type_id::GLOBAL_CLASS,
            ValueData::Enumerated { .. } => tag == type_id::ENUMERATED,
            ValueData::Object { .. } => tag == type_id::OBJECT || tag == type_id::GLOBAL_OBJECT,
            ValueData::List(_) => tag == type_id::VALUE_LIST,
            ValueData::Reference(_) => tag == type_id::OBJECT_REFERENCE,
            ValueData::Null => tag == type_id::NULL,
        }
    }

    fn byte_size(&self) -> i32 {
        let len = match self {
            ValueData::Integer(_) | ValueData::Class(_) | ValueData::Enumerated { .. } => 4,
            ValueData::Float(_) | ValueData::UnitFloat { .. } => 8,
            ValueData::Boolean(_) => 1,
            ValueData::Bytes(bytes) => bytes.len(),
            ValueData::Text(text) => text.len(),
            _ => 0,
        };
        i32::try_from(len).unwrap_or(i32::MAX)
    }
}

/// A value tagged with its descriptor type.
///
/// The tag is checked against the payload on construction, so a value can
/// never claim a type its data does not have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredValue")]
pub struct AeteValue {
    type_tag: u32,
    flags: i32,
    size: i32,
    data: ValueData,
}

/// Persisted form of `AeteValue`, checked before it becomes one
#[derive(Deserialize)]
struct StoredValue {
    type_tag: u32,
    #[serde(default)]
    flags: i32,
    data: ValueData,
}

impl TryFrom<StoredValue> for AeteValue {
    type Error = ScriptError;

    fn try_from(stored: StoredValue) -> Result<Self, Self::Error> {
        let mut value = AeteValue::new(stored.type_tag, stored.data)?;
        value.flags = stored.flags;
        Ok(value)
    }
}

impl AeteValue {
    /// Tagged value, `WrongType` when the tag does not fit the payload
    pub fn new(type_tag: u32, data: ValueData) -> Result<Self, ScriptError> {
        if !data.accepts(type_tag) {
            return Err(ScriptError::WrongType);
        }
        Ok(AeteValue {
            type_tag,
            flags: 0,
            size: data.byte_size(),
            data,
        })
    }

    fn tagged(type_tag: u32, data: ValueData) -> Self {
        debug_assert!(data.accepts(type_tag));
        AeteValue {
            type_tag,
            flags: 0,
            size: data.byte_size(),
            data,
        }
    }

    /// Integer value
    pub fn integer(value: i32) -> Self {
        Self::tagged(type_id::INTEGER, ValueData::Integer(value))
    }

    /// Float value
    pub fn float(value: f64) -> Self {
        Self::tagged(type_id::FLOAT, ValueData::Float(value))
    }

    /// Float with a unit
    pub fn unit_float(unit: u32, value: f64) -> Self {
        Self::tagged(type_id::UNIT_FLOAT, ValueData::UnitFloat { unit, value })
    }

    /// Boolean value
    pub fn boolean(value: bool) -> Self {
        Self::tagged(type_id::BOOLEAN, ValueData::Boolean(value))
    }

    /// Text value
    pub fn text(value: impl Into<String>) -> Self {
        Self::tagged(type_id::CHAR, ValueData::Text(value.into()))
    }

    /// Alias bytes
    pub fn alias(bytes: Vec<u8>) -> Self {
        Self::tagged(type_id::ALIAS, ValueData::Bytes(bytes))
    }

    /// Raw data bytes
    pub fn raw_data(bytes: Vec<u8>) -> Self {
        Self::tagged(type_id::RAW_DATA, ValueData::Bytes(bytes))
    }

    /// Class id
    pub fn class(class_id: u32) -> Self {
        Self::tagged(type_id::TYPE, ValueData::Class(class_id))
    }

    /// Global class id
    pub fn global_class(class_id: u32) -> Self {
        Self::tagged(type_id::GLOBAL_CLASS, ValueData::Class(class_id))
    }

    /// Enumerated value
    pub fn enumerated(type_id: u32, value: u32) -> Self {
        Self::tagged(
            self::type_id::ENUMERATED,
            ValueData::Enumerated { type_id, value },
        )
    }

    /// Nested descriptor snapshot
    pub fn object(class_id: u32, descriptor: ActionDescriptor) -> Self {
        Self::tagged(
            type_id::OBJECT,
            ValueData::Object {
                class_id,
                descriptor,
            },
        )
    }

    /// Nested global descriptor snapshot
    pub fn global_object(class_id: u32, descriptor: ActionDescriptor) -> Self {
        Self::tagged(
            type_id::GLOBAL_OBJECT,
            ValueData::Object {
                class_id,
                descriptor,
            },
        )
    }

    /// Nested list snapshot
    pub fn list(list: ActionList) -> Self {
        Self::tagged(type_id::VALUE_LIST, ValueData::List(list))
    }

    /// Reference chain
    pub fn reference(reference: ActionReference) -> Self {
        Self::tagged(type_id::OBJECT_REFERENCE, ValueData::Reference(reference))
    }

    /// Type tag as reported by `GetType`
    pub fn type_tag(&self) -> u32 {
        self.type_tag
    }

    /// Flags reported by the classic `GetKey`
    pub fn flags(&self) -> i32 {
        self.flags
    }

    /// Payload size in bytes
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Payload
    pub fn data(&self) -> &ValueData {
        &self.data
    }

    /// Integer payload
    pub fn as_integer(&self) -> Result<i32, ScriptError> {
        match self.data {
            ValueData::Integer(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Result<f64, ScriptError> {
        match self.data {
            ValueData::Float(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Unit and value
    pub fn as_unit_float(&self) -> Result<(u32, f64), ScriptError> {
        match self.data {
            ValueData::UnitFloat { unit, value } => Ok((unit, value)),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Boolean payload
    pub fn as_boolean(&self) -> Result<bool, ScriptError> {
        match self.data {
            ValueData::Boolean(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Text payload
    pub fn as_text(&self) -> Result<&str, ScriptError> {
        match &self.data {
            ValueData::Text(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Alias, path or raw data bytes
    pub fn as_bytes(&self) -> Result<&[u8], ScriptError> {
        match &self.data {
            ValueData::Bytes(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Class payload
    pub fn as_class(&self) -> Result<u32, ScriptError> {
        match self.data {
            ValueData::Class(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Enumeration type and value
    pub fn as_enumerated(&self) -> Result<(u32, u32), ScriptError> {
        match self.data {
            ValueData::Enumerated { type_id, value } => Ok((type_id, value)),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Class and nested descriptor
    pub fn as_object(&self) -> Result<(u32, &ActionDescriptor), ScriptError> {
        match &self.data {
            ValueData::Object {
                class_id,
                descriptor,
            } => Ok((*class_id, descriptor)),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// List payload
    pub fn as_list(&self) -> Result<&ActionList, ScriptError> {
        match &self.data {
            ValueData::List(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }

    /// Reference payload
    pub fn as_reference(&self) -> Result<&ActionReference, ScriptError> {
        match &self.data {
            ValueData::Reference(v) => Ok(v),
            _ => Err(ScriptError::WrongType),
        }
    }
}
